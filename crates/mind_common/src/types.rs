//! Shared records and wire types for mindd and mindctl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric badge identifier, matches the `badges` table primary key
pub type BadgeId = u32;

/// Learner row as seen by the state machine.
///
/// Credentials and one-time codes live in the same table but are only
/// touched by the accounts module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub energy: i64,
    pub last_recharge: DateTime<Utc>,
    pub coins: i64,
    pub verified: bool,
    /// Optimistic lock counter, bumped on every learner write
    pub version: i64,
}

impl Learner {
    pub fn profile(&self) -> LearnerProfile {
        LearnerProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            energy: self.energy,
            coins: self.coins,
            verified: self.verified,
        }
    }
}

/// Learner data returned to clients (never includes credentials)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub energy: i64,
    pub coins: i64,
    pub verified: bool,
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub unlocked_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub learner_id: i64,
    pub course: String,
    pub level: u32,
    pub mistakes: u32,
}

/// Result of a level-completion claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub approved: bool,
    pub coins_awarded: i64,
    /// Badges inserted by this call only; already-held badges are omitted
    pub badges_granted: Vec<BadgeId>,
    pub unlocked_level: u32,
    pub message: String,
}

// ============================================================================
// Energy and store
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnergyAdjustRequest {
    pub delta: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyResponse {
    pub energy: i64,
    /// Energy hit zero: the lesson flow must stop
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub learner_id: i64,
    pub item: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub item: String,
    pub coins: i64,
    pub energy: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItemView {
    pub key: String,
    pub cost: i64,
    pub energy_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeView {
    pub name: String,
    pub icon: String,
    pub description: String,
}

// ============================================================================
// Lessons
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub course: String,
    pub level: u32,
    pub title: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub question: String,
    #[serde(rename = "type", default = "default_exercise_kind")]
    pub kind: String,
    pub options: Vec<ExerciseOption>,
}

fn default_exercise_kind() -> String {
    "multiple_choice".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Email plus one-time code (verification or password recovery)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportRequest {
    pub email: String,
    pub message: String,
}

/// Generic acknowledgement for operations without a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ============================================================================
// Daemon
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_kind_defaults() {
        let json = r#"{"question":"2+2?","options":[{"id":"a","text":"4","is_correct":true}]}"#;
        let exercise: Exercise = serde_json::from_str(json).unwrap();
        assert_eq!(exercise.kind, "multiple_choice");
    }

    #[test]
    fn test_update_profile_password_optional() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert!(req.password.is_none());
    }
}
