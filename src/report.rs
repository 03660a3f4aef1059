//! Plain-text rendering of an estimate

use crate::category::TxCategory;
use crate::estimator::EstimateResult;
use chrono::FixedOffset;
use std::fmt::Write;

const RULE_WIDTH: usize = 58;

/// Presentation settings that are not part of the result itself
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub tz: FixedOffset,
    /// Fiat currency code, shown upper-cased
    pub fiat: String,
}

impl ReportContext {
    pub fn new(utc_offset_hours: i32, fiat: &str) -> Option<Self> {
        Some(Self {
            tz: FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?,
            fiat: fiat.to_uppercase(),
        })
    }
}

/// Format an XRP amount for display
pub fn format_xrp(amount: f64, precision: usize) -> String {
    format!("{} XRP", group_thousands(amount, precision))
}

/// Format a fiat amount in millions
pub fn format_fiat_m(amount: f64, fiat: &str) -> String {
    format!("{}M {}", group_thousands(amount / 1_000_000.0, 2), fiat)
}

/// `1234567.891` at precision 2 → `1,234,567.89`
pub fn group_thousands(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    if value.is_sign_negative() && value != 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn or_unavailable(value: Option<String>) -> String {
    value.unwrap_or_else(|| "unavailable".to_string())
}

pub fn render(result: &EstimateResult, ctx: &ReportContext) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, result, ctx);
    out
}

fn write_report(
    out: &mut String,
    result: &EstimateResult,
    ctx: &ReportContext,
) -> std::fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);
    let start = result.window_start.with_timezone(&ctx.tz);
    let now = result.now.with_timezone(&ctx.tz);
    let aggregate = &result.aggregate;

    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "  RESULTS  |  {} → {}  ({:.1}h{})",
        start.format("%d %b %Y %H:%M"),
        now.format("%H:%M %:z"),
        result.elapsed_hours(),
        if result.is_partial { ", partial" } else { "" }
    )?;
    writeln!(out, "{}", rule)?;

    if result.is_fallback {
        writeln!(out, "  ❌ Ledger network unreachable; no figures available")?;
        writeln!(out, "{}", rule)?;
        return Ok(());
    }

    writeln!(
        out,
        "  Price:                 {}",
        or_unavailable(result.price.map(|p| format!("{:.4} {}", p, ctx.fiat)))
    )?;
    writeln!(
        out,
        "  Ledgers in window:     {}  (start via {}){}",
        or_unavailable(result.reference_ledgers.map(|n| group_thousands(n as f64, 0))),
        result
            .start_source
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "none".to_string()),
        aggregate
            .avg_tx_per_ledger
            .map(|avg| format!("  ~{:.1} tx/ledger", avg))
            .unwrap_or_default()
    )?;
    if let Some(cadence) = result.observed_cadence_secs {
        writeln!(out, "  Observed cadence:      {:.2} s/ledger", cadence)?;
    }
    writeln!(
        out,
        "  Sampled:               {}/{} ledgers",
        result.sample_ledgers_fetched, result.sample_ledgers_requested
    )?;
    writeln!(out)?;

    writeln!(out, "  🔥 BURNED")?;
    writeln!(
        out,
        "     Supply delta:       {}",
        or_unavailable(result.burn_amount.map(|b| format_xrp(b, 6)))
    )?;
    writeln!(
        out,
        "     Fee estimate:       {}",
        or_unavailable(aggregate.fee_burn_estimate.map(|f| format_xrp(f, 6)))
    )?;
    if let Some(rate) = result.burn_rate {
        writeln!(
            out,
            "     Rate:               {:.4} XRP/hr  {:.2} XRP/day  {} XRP/yr",
            rate.per_hour,
            rate.per_day,
            group_thousands(rate.per_year, 0)
        )?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "  ⚡ TRANSACTIONS         {}",
        or_unavailable(aggregate.transaction_count_estimate.map(|n| group_thousands(n, 0)))
    )?;
    for category in TxCategory::all() {
        if let (Some(count), Some(share)) = (
            aggregate.category_count_estimates.get(&category),
            result.category_shares().get(&category),
        ) {
            writeln!(
                out,
                "     {:<20} {:>12}  ({:.1}%)",
                category.label(),
                group_thousands(*count, 0),
                share * 100.0
            )?;
        }
    }
    writeln!(out)?;

    writeln!(out, "  💰 SETTLEMENT VOLUME ({})", result.policy.name())?;
    if let Some(typical) = aggregate.typical_payment {
        writeln!(out, "     Typical payment:    {}", format_xrp(typical, 2))?;
    }
    writeln!(
        out,
        "     Volume:             {}",
        or_unavailable(aggregate.settlement_volume_estimate.map(|v| format_xrp(v, 0)))
    )?;
    if let Some(raw) = aggregate.raw_settlement_sum {
        writeln!(out, "     Raw sum:            {}", format_xrp(raw, 0))?;
    }
    if let Some(p) = aggregate.percentiles {
        writeln!(
            out,
            "     p10/p50/p90/p99:    {:.2} / {:.2} / {:.2} / {:.2} XRP  (n={})",
            p.p10, p.p50, p.p90, p.p99, p.samples
        )?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "  📊 SETTLEMENT LOAD      {}",
        or_unavailable(result.settlement_value_fiat.map(|v| format_fiat_m(v, &ctx.fiat)))
    )?;
    for (category, value) in &result.category_value_fiat {
        writeln!(out, "     {:<20} {:>14}", category.label(), format_fiat_m(*value, &ctx.fiat))?;
    }
    writeln!(
        out,
        "  📈 EXCHANGE VOLUME 24H  {}",
        or_unavailable(result.exchange_volume_24h_fiat.map(|v| format_fiat_m(v, &ctx.fiat)))
    )?;
    writeln!(out, "{}", rule)?;

    Ok(())
}
