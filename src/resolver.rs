//! Time-to-ledger resolution
//!
//! Ledgers close roughly every few seconds, so the ledger open at a given
//! instant can be found by estimating a sequence from the cadence, reading its
//! close time, and correcting by the residual. The loop runs for a fixed number
//! of attempts and keeps the closest snapshot seen, so it always terminates and
//! never returns something worse than an earlier attempt.
//!
//! ## Window start fallback chain
//!
//! ```text
//! CachedBaseline (caller-supplied supply, validated against current)
//!     ↓ none
//! Search (estimate-and-correct from the current ledger)
//!     ↓ none
//! FixedOffset (a fixed number of ledgers behind current)
//!     ↓ none
//! burn unavailable
//! ```

use crate::config::ResolverConfig;
use crate::rpc::snapshot::{drops_to_xrp, fetch_snapshot};
use crate::rpc::{LedgerIndex, LedgerRpc, LedgerSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the window start came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartSource {
    CachedBaseline,
    Search,
    FixedOffset,
}

/// Strategies tried in order; the first to produce a start wins
const START_STRATEGIES: [StartSource; 3] = [
    StartSource::CachedBaseline,
    StartSource::Search,
    StartSource::FixedOffset,
];

/// Supply (and, when known, ledger) at the beginning of the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStart {
    pub supply_drops: u64,
    /// Unknown when the start came from a cached baseline
    pub sequence: Option<u64>,
    pub close_time: Option<DateTime<Utc>>,
    pub source: StartSource,
}

impl WindowStart {
    fn from_snapshot(snapshot: LedgerSnapshot, source: StartSource) -> Self {
        Self {
            supply_drops: snapshot.total_supply_drops,
            sequence: Some(snapshot.sequence),
            close_time: snapshot.close_time,
            source,
        }
    }

    pub fn total_supply(&self) -> f64 {
        drops_to_xrp(self.supply_drops)
    }
}

/// First guess: reference sequence plus the elapsed time in ledger closes
pub fn initial_estimate(
    reference_sequence: u64,
    reference_time: DateTime<Utc>,
    target: DateTime<Utc>,
    cadence_secs: f64,
) -> i64 {
    let delta_secs = seconds_between(reference_time, target);
    reference_sequence as i64 + sequence_correction(delta_secs, cadence_secs)
}

/// Ledgers to move for a residual of `delta_secs` (positive = move forward)
pub fn sequence_correction(delta_secs: f64, cadence_secs: f64) -> i64 {
    (delta_secs / cadence_secs).round() as i64
}

/// Signed seconds from `from` to `to`
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

pub struct SnapshotResolver<'a> {
    rpc: &'a dyn LedgerRpc,
    config: ResolverConfig,
}

impl<'a> SnapshotResolver<'a> {
    pub fn new(rpc: &'a dyn LedgerRpc, config: ResolverConfig) -> Self {
        Self { rpc, config }
    }

    /// Find the snapshot whose close time is nearest `target`
    ///
    /// Returns the best snapshot seen within the attempt budget, or `None` when
    /// no attempt produced a snapshot with both supply and close time.
    pub async fn resolve(
        &self,
        target: DateTime<Utc>,
        reference_sequence: u64,
        reference_time: DateTime<Utc>,
    ) -> Option<LedgerSnapshot> {
        let cadence = self.config.cadence_secs;
        let mut estimate = initial_estimate(reference_sequence, reference_time, target, cadence);
        let mut best: Option<(LedgerSnapshot, f64)> = None;

        for attempt in 1..=self.config.max_attempts {
            let sequence = estimate.max(1) as u64;

            let fetched = fetch_snapshot(self.rpc, LedgerIndex::Sequence(sequence)).await;
            let Some((snapshot, close_time)) =
                fetched.and_then(|s| s.close_time.map(|t| (s, t)))
            else {
                estimate = self.nudge(sequence, reference_sequence);
                log::warn!(
                    "  Attempt {}: ledger #{} unusable, nudging to #{}",
                    attempt,
                    sequence,
                    estimate
                );
                continue;
            };

            let delta = seconds_between(close_time, target);
            let correction = sequence_correction(delta, cadence);
            log::info!(
                "  Attempt {}: #{}  {}  (Δ {:+.1} min)",
                attempt,
                snapshot.sequence,
                close_time.format("%H:%M:%S UTC"),
                delta / 60.0
            );

            let closer = best.as_ref().map_or(true, |(_, d)| delta.abs() < *d);
            if closer {
                best = Some((snapshot, delta.abs()));
            }

            if correction.abs() < self.config.convergence_threshold {
                break;
            }
            estimate = sequence as i64 + correction;
        }

        if best.is_none() {
            log::warn!("No usable snapshot within {} attempts", self.config.max_attempts);
        }
        best.map(|(snapshot, _)| snapshot)
    }

    /// Step toward the reference ledger, which is known to exist
    fn nudge(&self, sequence: u64, reference_sequence: u64) -> i64 {
        let step = self.config.nudge_step.abs().max(1);
        if sequence < reference_sequence {
            sequence as i64 + step
        } else {
            sequence as i64 - step
        }
    }

    /// Run the fallback chain for the window starting at `target`
    pub async fn resolve_window_start(
        &self,
        target: DateTime<Utc>,
        current: &LedgerSnapshot,
        cached_baseline: Option<u64>,
    ) -> Option<WindowStart> {
        for strategy in START_STRATEGIES {
            let found = match strategy {
                StartSource::CachedBaseline => self.try_cached_baseline(current, cached_baseline),
                StartSource::Search => self.try_search(target, current).await,
                StartSource::FixedOffset => self.try_fixed_offset(current).await,
            };

            if let Some(start) = found {
                log::info!(
                    "✅ Window start via {:?}: supply={:.6} XRP seq={:?}",
                    strategy,
                    start.total_supply(),
                    start.sequence
                );
                return Some(start);
            }
        }

        log::warn!("❌ Could not resolve window start; burn unavailable");
        None
    }

    /// Accept the cached supply when the implied burn is plausible
    fn try_cached_baseline(
        &self,
        current: &LedgerSnapshot,
        cached_baseline: Option<u64>,
    ) -> Option<WindowStart> {
        let baseline_drops = cached_baseline?;
        let Some(burned) = baseline_drops.checked_sub(current.total_supply_drops) else {
            log::warn!(
                "Discarding cached baseline {:.6} XRP: below current supply {:.6} XRP",
                drops_to_xrp(baseline_drops),
                current.total_supply()
            );
            return None;
        };

        let implied_burn = drops_to_xrp(burned);
        if implied_burn > self.config.max_plausible_burn {
            log::warn!(
                "Discarding cached baseline {:.6} XRP: implied burn {:.6} XRP above {}",
                drops_to_xrp(baseline_drops),
                implied_burn,
                self.config.max_plausible_burn
            );
            return None;
        }

        Some(WindowStart {
            supply_drops: baseline_drops,
            sequence: None,
            close_time: None,
            source: StartSource::CachedBaseline,
        })
    }

    async fn try_search(
        &self,
        target: DateTime<Utc>,
        current: &LedgerSnapshot,
    ) -> Option<WindowStart> {
        let reference_time = current.close_time?;
        let snapshot = self.resolve(target, current.sequence, reference_time).await?;
        Some(WindowStart::from_snapshot(snapshot, StartSource::Search))
    }

    async fn try_fixed_offset(&self, current: &LedgerSnapshot) -> Option<WindowStart> {
        let sequence = current
            .sequence
            .checked_sub(self.config.fallback_offset_ledgers)
            .filter(|s| *s > 0)?;

        log::warn!(
            "Falling back to fixed offset: #{} ({} ledgers behind current)",
            sequence,
            self.config.fallback_offset_ledgers
        );
        let snapshot = fetch_snapshot(self.rpc, LedgerIndex::Sequence(sequence)).await?;
        Some(WindowStart::from_snapshot(snapshot, StartSource::FixedOffset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockLedger;
    use chrono::Duration;

    fn config() -> ResolverConfig {
        ResolverConfig {
            fallback_offset_ledgers: 500,
            ..ResolverConfig::default()
        }
    }

    #[test]
    fn test_initial_estimate_and_negative_correction() {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let target = t + Duration::seconds(350);

        assert_eq!(initial_estimate(1000, t, target, 3.5), 1100);

        // Ledger 1100 actually closed at T+360: we overshot by 10s
        let fetched_close = t + Duration::seconds(360);
        let correction = sequence_correction(seconds_between(fetched_close, target), 3.5);
        assert!(correction < 0);
        assert!(1100 + correction < 1100);
    }

    #[test]
    fn test_future_target_reverses_direction() {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(initial_estimate(1000, t, t - Duration::seconds(35), 3.5), 990);
        assert_eq!(initial_estimate(1000, t, t + Duration::seconds(35), 3.5), 1010);
    }

    #[tokio::test]
    async fn test_resolve_converges_on_uneven_cadence() {
        // Ledgers actually close every 4s, the resolver assumes 3.5s
        let ledger = MockLedger::linear(1, 2000, 4.0);
        let reference_time = ledger.close_time_of(2000);
        let target = ledger.close_time_of(1000);

        let resolver = SnapshotResolver::new(&ledger, config());
        let snapshot = resolver.resolve(target, 2000, reference_time).await.unwrap();

        let off = (snapshot.close_time.unwrap() - target).num_seconds().abs() as f64;
        assert!(off < 5.0 * 3.5, "resolved {} secs from target", off);
    }

    #[tokio::test]
    async fn test_resolve_never_worse_than_first_attempt() {
        // Wildly wrong cadence: the loop will not converge in 2 attempts
        let ledger = MockLedger::linear(1, 3000, 3.5);
        let reference_time = ledger.close_time_of(3000);
        let target = ledger.close_time_of(1000);

        let resolver = SnapshotResolver::new(
            &ledger,
            ResolverConfig {
                cadence_secs: 1.0,
                max_attempts: 2,
                ..config()
            },
        );
        let first_guess = initial_estimate(3000, reference_time, target, 1.0).max(1) as u64;
        let first_off = (ledger.close_time_of(first_guess) - target).num_seconds().abs();

        let snapshot = resolver.resolve(target, 3000, reference_time).await.unwrap();
        let off = (snapshot.close_time.unwrap() - target).num_seconds().abs();
        assert!(off <= first_off);
    }

    #[tokio::test]
    async fn test_missing_close_time_is_nudged() {
        let mut ledger = MockLedger::linear(1, 2000, 3.5);
        let reference_time = ledger.close_time_of(2000);
        let target = ledger.close_time_of(1500);
        ledger.entry_mut(1500).close_time = None;

        let resolver = SnapshotResolver::new(&ledger, config());
        let snapshot = resolver.resolve(target, 2000, reference_time).await.unwrap();

        assert_ne!(snapshot.sequence, 1500);
        assert!((snapshot.sequence as i64 - 1500).abs() < 5);
    }

    #[tokio::test]
    async fn test_resolve_none_when_nothing_usable() {
        let mut ledger = MockLedger::linear(1, 2000, 3.5);
        let reference_time = ledger.close_time_of(2000);
        let target = ledger.close_time_of(1000);
        ledger.unreachable = true;

        let resolver = SnapshotResolver::new(&ledger, config());
        assert!(resolver.resolve(target, 2000, reference_time).await.is_none());
        assert_eq!(ledger.calls(), config().max_attempts as usize);
    }

    #[tokio::test]
    async fn test_cached_baseline_accepted_when_plausible() {
        let ledger = MockLedger::linear(1, 2000, 3.5);
        let current = fetch_snapshot(&ledger, LedgerIndex::Validated).await.unwrap();
        // 12.500001 XRP above current, down to the drop
        let baseline = current.total_supply_drops + 12_500_001;

        let resolver = SnapshotResolver::new(&ledger, config());
        let start = resolver
            .resolve_window_start(ledger.close_time_of(1000), &current, Some(baseline))
            .await
            .unwrap();

        assert_eq!(start.source, StartSource::CachedBaseline);
        assert_eq!(start.sequence, None);
        assert_eq!(start.supply_drops, baseline);
        assert_eq!(start.supply_drops - current.total_supply_drops, 12_500_001);
        // Only the validated fetch above hit the ledger
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn test_implausible_baseline_falls_through_to_search() {
        let ledger = MockLedger::linear(1, 2000, 3.5);
        let current = fetch_snapshot(&ledger, LedgerIndex::Validated).await.unwrap();
        let resolver = SnapshotResolver::new(&ledger, config());

        // Supply grew since the baseline: impossible for a burn-only asset
        let stale = current.total_supply_drops - 1;
        let start = resolver
            .resolve_window_start(ledger.close_time_of(1000), &current, Some(stale))
            .await
            .unwrap();
        assert_eq!(start.source, StartSource::Search);

        // Burn far beyond anything plausible in one window
        let huge = current.total_supply_drops + 1_000_000 * 1_000_000;
        let start = resolver
            .resolve_window_start(ledger.close_time_of(1000), &current, Some(huge))
            .await
            .unwrap();
        assert_eq!(start.source, StartSource::Search);
        assert!(start.sequence.is_some());
    }

    #[tokio::test]
    async fn test_fixed_offset_when_search_fails() {
        let mut ledger = MockLedger::linear(1, 2000, 3.5);
        let current = fetch_snapshot(&ledger, LedgerIndex::Validated).await.unwrap();
        // The whole neighbourhood of the target has no supply data
        for seq in 900..=1100 {
            ledger.entry_mut(seq).total_coins = None;
        }

        let resolver = SnapshotResolver::new(&ledger, config());
        let start = resolver
            .resolve_window_start(ledger.close_time_of(1000), &current, None)
            .await
            .unwrap();

        assert_eq!(start.source, StartSource::FixedOffset);
        assert_eq!(start.sequence, Some(1500));
    }
}
