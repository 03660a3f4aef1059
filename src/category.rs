//! Transaction category classification
//!
//! Membership is data: a type tag belongs to the first category whose list
//! contains it, and anything unlisted is account management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCategory {
    Settlement,
    Defi,
    Identity,
    AcctMgmt,
}

impl TxCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxCategory::Settlement => "settlement",
            TxCategory::Defi => "defi",
            TxCategory::Identity => "identity",
            TxCategory::AcctMgmt => "acct_mgmt",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxCategory::Settlement => "Settlement",
            TxCategory::Defi => "DeFi",
            TxCategory::Identity => "Identity",
            TxCategory::AcctMgmt => "Acct Mgmt",
        }
    }

    pub fn all() -> [TxCategory; 4] {
        [
            TxCategory::Settlement,
            TxCategory::Defi,
            TxCategory::Identity,
            TxCategory::AcctMgmt,
        ]
    }
}

/// Type tags per category; `AcctMgmt` is the catch-all and has no list
const CATEGORY_TABLE: &[(TxCategory, &[&str])] = &[
    (
        TxCategory::Settlement,
        &["Payment", "CheckCreate", "CheckCash", "CheckCancel"],
    ),
    (
        TxCategory::Defi,
        &[
            "OfferCreate",
            "OfferCancel",
            "AMMCreate",
            "AMMDeposit",
            "AMMWithdraw",
            "AMMBid",
            "AMMVote",
            "AMMDelete",
        ],
    ),
    (
        TxCategory::Identity,
        &[
            "DIDSet",
            "DIDDelete",
            "CredentialCreate",
            "CredentialAccept",
            "CredentialDelete",
            "DepositPreauth",
        ],
    ),
];

pub fn classify(tx_type: &str) -> TxCategory {
    CATEGORY_TABLE
        .iter()
        .find(|(_, tags)| tags.contains(&tx_type))
        .map(|(category, _)| *category)
        .unwrap_or(TxCategory::AcctMgmt)
}

/// Occurrence count per category, always holding all four keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts(BTreeMap<TxCategory, u64>);

impl Default for CategoryCounts {
    fn default() -> Self {
        Self(TxCategory::all().into_iter().map(|c| (c, 0)).collect())
    }
}

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: TxCategory) {
        *self.0.entry(category).or_insert(0) += 1;
    }

    pub fn get(&self, category: TxCategory) -> u64 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TxCategory, u64)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }
}

impl FromIterator<(TxCategory, u64)> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = (TxCategory, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (category, n) in iter {
            *counts.0.entry(category).or_insert(0) += n;
        }
        counts
    }
}
