//! Progress tracker - validates completion claims and grants one-time rewards.
//!
//! Policy:
//! - any mistake rejects the claim outright (no partial credit, no writes)
//! - coins and level advance only on a new high-water mark
//! - badges are set membership, so resubmitting a claim is harmless

use crate::catalog::{self, CompletionFacts, LEVEL_REWARD_COINS};
use crate::db;
use crate::error::{MindError, MindResult};
use crate::types::{CompletionOutcome, Learner};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

/// A learner's claim to have finished `level` of `course`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionClaim<'a> {
    pub course: &'a str,
    pub level: u32,
    pub mistakes: u32,
}

impl CompletionClaim<'_> {
    pub fn validate(&self) -> MindResult<()> {
        if self.course.trim().is_empty() {
            return Err(MindError::invalid("course is required"));
        }
        if self.level < 1 {
            return Err(MindError::invalid("levels start at 1"));
        }
        // The level after this one must be representable
        if self.level == u32::MAX {
            return Err(MindError::invalid(format!("level {} is out of range", self.level)));
        }
        Ok(())
    }
}

fn rejected(claim: &CompletionClaim<'_>, unlocked_level: u32) -> CompletionOutcome {
    CompletionOutcome {
        approved: false,
        coins_awarded: 0,
        badges_granted: Vec::new(),
        unlocked_level,
        message: format!(
            "Completed with {} mistake(s). Try again without failing.",
            claim.mistakes
        ),
    }
}

/// Apply an error-free claim inside an open learner transaction.
///
/// `learner` is the mutable snapshot from [`db::mutate_learner`]; coins are
/// credited on it so the primitive persists them with the version check.
pub fn apply_completion(
    conn: &Connection,
    learner: &mut Learner,
    claim: &CompletionClaim<'_>,
    now: DateTime<Utc>,
) -> MindResult<CompletionOutcome> {
    debug_assert_eq!(claim.mistakes, 0);

    let unlocked = db::unlocked_level(conn, learner.id, claim.course)?;
    let already_mastered = claim.level < unlocked;

    let mut coins_awarded = 0;
    let mut unlocked_level = unlocked;
    if !already_mastered {
        coins_awarded = LEVEL_REWARD_COINS;
        learner.coins += coins_awarded;
        unlocked_level = claim.level + 1;
        db::raise_unlocked_level(conn, learner.id, claim.course, unlocked_level)?;
    }

    let facts = CompletionFacts {
        level: claim.level,
        mistakes: claim.mistakes,
        new_high_water: !already_mastered,
    };
    let mut badges_granted = Vec::new();
    for badge_id in catalog::badges_earned(&facts) {
        if db::grant_badge(conn, learner.id, badge_id, now)? {
            badges_granted.push(badge_id);
        }
    }

    let message = if already_mastered {
        "Level completed again (already mastered, no extra coins).".to_string()
    } else {
        format!("Perfect level! +{} coins", coins_awarded)
    };

    Ok(CompletionOutcome {
        approved: true,
        coins_awarded,
        badges_granted,
        unlocked_level,
        message,
    })
}

/// Validate and record a completion claim as one all-or-nothing operation
pub fn submit_completion(
    conn: &Connection,
    learner_id: i64,
    claim: &CompletionClaim<'_>,
    now: DateTime<Utc>,
) -> MindResult<CompletionOutcome> {
    claim.validate()?;

    if claim.mistakes > 0 {
        // Read-only path: make sure the learner exists, report current level
        db::load_learner(conn, learner_id)?;
        let unlocked = db::unlocked_level(conn, learner_id, claim.course)?;
        info!(
            "Rejected completion of {}:{} by learner {} ({} mistakes)",
            claim.course, claim.level, learner_id, claim.mistakes
        );
        return Ok(rejected(claim, unlocked));
    }

    let (learner, outcome) =
        db::mutate_learner(conn, learner_id, |tx, learner| apply_completion(tx, learner, claim, now))?;

    info!(
        "Learner {} passed {}:{} -> unlocked {}, +{} coins (balance {}), badges {:?}",
        learner.id,
        claim.course,
        claim.level,
        outcome.unlocked_level,
        outcome.coins_awarded,
        learner.coins,
        outcome.badges_granted
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_validation() {
        let ok = CompletionClaim {
            course: "python",
            level: 1,
            mistakes: 0,
        };
        assert!(ok.validate().is_ok());

        let level_zero = CompletionClaim { level: 0, ..ok };
        assert_eq!(level_zero.validate().unwrap_err().kind(), "invalid_request");

        let no_course = CompletionClaim { course: "  ", ..ok };
        assert_eq!(no_course.validate().unwrap_err().kind(), "invalid_request");

        let last_level = CompletionClaim { level: u32::MAX, ..ok };
        assert_eq!(last_level.validate().unwrap_err().kind(), "invalid_request");
        assert!(CompletionClaim { level: u32::MAX - 1, ..ok }.validate().is_ok());
    }

    #[test]
    fn test_rejected_outcome_pays_nothing() {
        let claim = CompletionClaim {
            course: "python",
            level: 3,
            mistakes: 2,
        };
        let outcome = rejected(&claim, 3);
        assert!(!outcome.approved);
        assert_eq!(outcome.coins_awarded, 0);
        assert!(outcome.badges_granted.is_empty());
        assert_eq!(outcome.unlocked_level, 3);
    }
}
