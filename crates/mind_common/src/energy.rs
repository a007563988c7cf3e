//! Energy ledger - lazy, time-based regeneration and clamped consumption.
//!
//! There is no background timer. Energy "ticks" are derived from the wall
//! clock whenever energy is about to be read or spent:
//! - 1 point per full 5 minutes since `last_recharge`
//! - capped at `MAX_ENERGY`
//! - a full tank never regenerates and never writes

use crate::types::{EnergyResponse, Learner};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Energy cap
pub const MAX_ENERGY: i64 = 5;

/// Minutes needed to recover one point
pub const RECHARGE_MINUTES: i64 = 5;

/// Energy granted to freshly registered learners
pub const STARTING_ENERGY: i64 = MAX_ENERGY;

/// Outcome of a regeneration that changed stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regeneration {
    pub energy: i64,
    pub recovered: i64,
    pub recharged_at: DateTime<Utc>,
}

/// Compute regeneration for a stored `(energy, last_recharge)` pair.
///
/// Returns `None` when nothing must be written: the tank is full or fewer
/// than `RECHARGE_MINUTES` whole minutes elapsed.
pub fn regenerate(
    energy: i64,
    last_recharge: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<Regeneration> {
    if energy >= MAX_ENERGY {
        return None;
    }

    // Clock skew backwards counts as no time at all
    let elapsed_minutes = (now - last_recharge).num_milliseconds().max(0) / 60_000;
    if elapsed_minutes < RECHARGE_MINUTES {
        return None;
    }

    let recovered = elapsed_minutes / RECHARGE_MINUTES;
    Some(Regeneration {
        energy: (energy + recovered).min(MAX_ENERGY),
        recovered,
        recharged_at: now,
    })
}

/// Clamp `energy + delta` into `0..=MAX_ENERGY`
pub fn consume(energy: i64, delta: i64) -> i64 {
    energy.saturating_add(delta).clamp(0, MAX_ENERGY)
}

/// Apply regeneration to a learner snapshot in place.
///
/// Returns true when the snapshot changed and must be persisted.
pub fn apply_regeneration(learner: &mut Learner, now: DateTime<Utc>) -> bool {
    match regenerate(learner.energy, learner.last_recharge, now) {
        Some(regen) => {
            debug!(
                "Learner {} recovered {} energy ({} -> {})",
                learner.id, regen.recovered, learner.energy, regen.energy
            );
            learner.energy = regen.energy;
            learner.last_recharge = regen.recharged_at;
            true
        }
        None => false,
    }
}

/// Apply a consumption delta to a learner snapshot in place.
///
/// Leaving a full tank restarts the recharge clock, so time spent at
/// `MAX_ENERGY` is never credited later.
pub fn apply_consumption(learner: &mut Learner, delta: i64, now: DateTime<Utc>) -> EnergyResponse {
    let before = learner.energy;
    learner.energy = consume(before, delta);

    if before >= MAX_ENERGY && learner.energy < MAX_ENERGY {
        learner.last_recharge = now;
    }

    EnergyResponse {
        energy: learner.energy,
        blocked: learner.energy == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn learner(energy: i64, last_recharge: DateTime<Utc>) -> Learner {
        Learner {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            energy,
            last_recharge,
            coins: 0,
            verified: true,
            version: 0,
        }
    }

    #[test]
    fn test_full_tank_never_regenerates() {
        for minutes in [0, 4, 5, 60, 10_000] {
            let now = t0() + Duration::minutes(minutes);
            assert_eq!(regenerate(5, t0(), now), None);
            assert_eq!(regenerate(6, t0(), now), None);
        }
    }

    #[test]
    fn test_twelve_minutes_recovers_two() {
        let regen = regenerate(2, t0(), t0() + Duration::minutes(12)).unwrap();
        assert_eq!(regen.recovered, 2);
        assert_eq!(regen.energy, 4);
        assert_eq!(regen.recharged_at, t0() + Duration::minutes(12));
    }

    #[test]
    fn test_recovery_formula_over_grid() {
        for energy in 0..MAX_ENERGY {
            for minutes in 0..60 {
                let result = regenerate(energy, t0(), t0() + Duration::minutes(minutes));
                if minutes < RECHARGE_MINUTES {
                    assert!(result.is_none(), "e={} m={}", energy, minutes);
                } else {
                    let regen = result.unwrap();
                    assert_eq!(regen.recovered, minutes / 5);
                    assert_eq!(regen.energy, (energy + minutes / 5).min(5));
                }
            }
        }
    }

    #[test]
    fn test_partial_minutes_are_floored() {
        let now = t0() + Duration::seconds(4 * 60 + 59);
        assert!(regenerate(0, t0(), now).is_none());

        let now = t0() + Duration::seconds(9 * 60 + 59);
        assert_eq!(regenerate(0, t0(), now).unwrap().energy, 1);
    }

    #[test]
    fn test_clock_skew_is_ignored() {
        assert!(regenerate(1, t0(), t0() - Duration::hours(3)).is_none());
    }

    #[test]
    fn test_consume_clamps() {
        assert_eq!(consume(0, -1), 0);
        assert_eq!(consume(5, 10), 5);
        assert_eq!(consume(3, -1), 2);
        assert_eq!(consume(1, i64::MIN), 0);
    }

    #[test]
    fn test_apply_regeneration_moves_clock() {
        let mut l = learner(1, t0());
        let now = t0() + Duration::minutes(7);
        assert!(apply_regeneration(&mut l, now));
        assert_eq!(l.energy, 2);
        assert_eq!(l.last_recharge, now);

        // Same instant again: nothing left to credit
        assert!(!apply_regeneration(&mut l, now));
        assert_eq!(l.energy, 2);
    }

    #[test]
    fn test_consumption_reports_block() {
        let mut l = learner(1, t0());
        let resp = apply_consumption(&mut l, -1, t0());
        assert_eq!(resp, EnergyResponse { energy: 0, blocked: true });
    }

    #[test]
    fn test_leaving_full_tank_restarts_clock() {
        let old = t0() - Duration::days(2);
        let mut l = learner(5, old);
        apply_consumption(&mut l, -1, t0());
        assert_eq!(l.energy, 4);
        assert_eq!(l.last_recharge, t0());

        // A partially drained tank keeps its running clock
        let mut l = learner(3, old);
        apply_consumption(&mut l, -1, t0());
        assert_eq!(l.last_recharge, old);
    }
}
