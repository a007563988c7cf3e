//! ProgressService - async facade over the learner state machine.
//!
//! Every operation reads the clock once, then runs its whole read-modify-write
//! on the database's blocking thread. Notifications go out after commit.

use crate::accounts;
use crate::catalog;
use crate::clock::{Clock, SystemClock};
use crate::db::{self, MindDb};
use crate::energy;
use crate::error::{MindError, MindResult};
use crate::lessons;
use crate::notify::{self, Notification, Notifier};
use crate::progress::{self, CompletionClaim};
use crate::store;
use crate::types::{
    Ack, BadgeView, CodeRequest, CompletionOutcome, CompletionRequest, EnergyResponse, LearnerProfile,
    Lesson, LoginRequest, ProgressResponse, PurchaseReceipt, RecoveryRequest, RegisterRequest,
    ResetPasswordRequest, StoreItemView, SupportRequest, UpdateProfileRequest,
};
use std::sync::Arc;
use tracing::info;

/// Addresses and lifetimes used when issuing codes and mail
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub sender: String,
    pub support_address: String,
    pub code_ttl_minutes: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            sender: "MIND DEVS <no-reply@minddevs.local>".to_string(),
            support_address: "support@minddevs.local".to_string(),
            code_ttl_minutes: 10,
        }
    }
}

#[derive(Clone)]
pub struct ProgressService {
    db: Arc<MindDb>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl ProgressService {
    pub fn new(db: Arc<MindDb>, notifier: Arc<dyn Notifier>, settings: ServiceSettings) -> Self {
        Self {
            db,
            notifier,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &MindDb {
        &self.db
    }

    fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.settings.code_ttl_minutes)
    }

    // ========================================================================
    // Progress
    // ========================================================================

    pub async fn progress(&self, learner_id: i64, course: String) -> MindResult<ProgressResponse> {
        self.db
            .execute(move |conn| {
                db::load_learner(conn, learner_id)?;
                Ok(ProgressResponse {
                    unlocked_level: db::unlocked_level(conn, learner_id, &course)?,
                })
            })
            .await
    }

    pub async fn submit_completion(&self, req: CompletionRequest) -> MindResult<CompletionOutcome> {
        let now = self.clock.now();
        self.db
            .execute(move |conn| {
                let claim = CompletionClaim {
                    course: &req.course,
                    level: req.level,
                    mistakes: req.mistakes,
                };
                progress::submit_completion(conn, req.learner_id, &claim, now)
            })
            .await
    }

    pub async fn badges(&self, learner_id: i64) -> MindResult<Vec<BadgeView>> {
        self.db
            .execute(move |conn| {
                db::load_learner(conn, learner_id)?;
                db::learner_badges(conn, learner_id)
            })
            .await
    }

    // ========================================================================
    // Energy and store
    // ========================================================================

    /// Spend energy. Positive deltas are refused; energy is only gained by
    /// regeneration or purchase.
    pub async fn adjust_energy(&self, learner_id: i64, delta: i64) -> MindResult<EnergyResponse> {
        if delta > 0 {
            return Err(MindError::invalid("energy can only be consumed; buy recharges in the store"));
        }
        let now = self.clock.now();
        let (_, response) = self
            .db
            .execute(move |conn| {
                db::mutate_learner(conn, learner_id, |_, learner| {
                    energy::apply_regeneration(learner, now);
                    Ok(energy::apply_consumption(learner, delta, now))
                })
            })
            .await?;

        if response.blocked {
            info!("Learner {} is out of energy", learner_id);
        }
        Ok(response)
    }

    pub async fn purchase(&self, learner_id: i64, item: String) -> MindResult<PurchaseReceipt> {
        let now = self.clock.now();
        self.db
            .execute(move |conn| store::purchase(conn, learner_id, &item, now))
            .await
    }

    pub fn store_items(&self) -> Vec<StoreItemView> {
        catalog::store_items()
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// Current profile with regeneration applied and persisted
    pub async fn profile(&self, learner_id: i64) -> MindResult<LearnerProfile> {
        let now = self.clock.now();
        let (learner, ()) = self
            .db
            .execute(move |conn| {
                db::mutate_learner(conn, learner_id, |_, learner| {
                    energy::apply_regeneration(learner, now);
                    Ok(())
                })
            })
            .await?;
        Ok(learner.profile())
    }

    pub async fn update_profile(
        &self,
        learner_id: i64,
        req: UpdateProfileRequest,
    ) -> MindResult<LearnerProfile> {
        let learner = self
            .db
            .execute(move |conn| {
                accounts::update_profile(conn, learner_id, &req.name, req.password.as_deref())
            })
            .await?;
        Ok(learner.profile())
    }

    // ========================================================================
    // Lessons
    // ========================================================================

    pub async fn lesson(&self, course: String, level: u32) -> MindResult<Lesson> {
        self.db
            .execute(move |conn| lessons::get_lesson(conn, &course, level))
            .await
    }

    pub async fn import_lessons(&self, items: Vec<Lesson>) -> MindResult<usize> {
        self.db
            .execute(move |conn| lessons::import_lessons(conn, &items))
            .await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn register(&self, req: RegisterRequest) -> MindResult<Ack> {
        let now = self.clock.now();
        let ttl = self.code_ttl();
        let (learner, code) = self
            .db
            .execute(move |conn| accounts::register(conn, &req, now, ttl))
            .await?;

        notify::dispatch(
            Arc::clone(&self.notifier),
            Notification::verification(
                &self.settings.sender,
                &learner.email,
                &learner.name,
                &code,
                self.settings.code_ttl_minutes,
            ),
        );
        Ok(Ack::ok("Account created. Check your email for the verification code."))
    }

    pub async fn verify(&self, req: CodeRequest) -> MindResult<Ack> {
        let now = self.clock.now();
        self.db
            .execute(move |conn| accounts::verify(conn, &req.email, &req.code, now))
            .await?;
        Ok(Ack::ok("Account verified."))
    }

    /// Authenticate and return the profile with regeneration applied
    pub async fn login(&self, req: LoginRequest) -> MindResult<LearnerProfile> {
        let learner_id = self
            .db
            .execute(move |conn| accounts::authenticate(conn, &req.email, &req.password))
            .await?;
        self.profile(learner_id).await
    }

    pub async fn request_recovery(&self, req: RecoveryRequest) -> MindResult<Ack> {
        let now = self.clock.now();
        let ttl = self.code_ttl();
        let (learner, code) = self
            .db
            .execute(move |conn| accounts::start_recovery(conn, &req.email, now, ttl))
            .await?;

        notify::dispatch(
            Arc::clone(&self.notifier),
            Notification::password_reset(
                &self.settings.sender,
                &learner.email,
                &code,
                self.settings.code_ttl_minutes,
            ),
        );
        Ok(Ack::ok("Recovery code sent."))
    }

    pub async fn validate_recovery(&self, req: CodeRequest) -> MindResult<Ack> {
        let now = self.clock.now();
        self.db
            .execute(move |conn| accounts::validate_recovery(conn, &req.email, &req.code, now))
            .await?;
        Ok(Ack::ok("Code is valid."))
    }

    pub async fn reset_password(&self, req: ResetPasswordRequest) -> MindResult<Ack> {
        let now = self.clock.now();
        self.db
            .execute(move |conn| {
                accounts::reset_password(conn, &req.email, &req.code, &req.new_password, now)
            })
            .await?;
        Ok(Ack::ok("Password updated."))
    }

    // ========================================================================
    // Support
    // ========================================================================

    pub async fn contact_support(&self, req: SupportRequest) -> MindResult<Ack> {
        let email = req.email.trim();
        let message = req.message.trim();
        if email.is_empty() || message.is_empty() {
            return Err(MindError::invalid("email and message are required"));
        }

        notify::dispatch(
            Arc::clone(&self.notifier),
            Notification::support(&self.settings.sender, &self.settings.support_address, email, message),
        );
        info!("Support request queued from {}", email);
        Ok(Ack::ok("Message sent. We will get back to you soon."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn service() -> (TempDir, ProgressService) {
        let dir = TempDir::new().unwrap();
        let db = MindDb::open(dir.path().join("mind.db"), Duration::from_millis(500))
            .await
            .unwrap();
        let svc = ProgressService::new(Arc::new(db), Arc::new(LogNotifier), ServiceSettings::default());
        (dir, svc)
    }

    #[tokio::test]
    async fn test_positive_energy_delta_refused() {
        let (_dir, svc) = service().await;
        let err = svc.adjust_energy(1, 2).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_unknown_learner_is_not_found() {
        let (_dir, svc) = service().await;
        assert_eq!(svc.profile(99).await.unwrap_err().kind(), "not_found");
        assert_eq!(svc.badges(99).await.unwrap_err().kind(), "not_found");
        assert_eq!(
            svc.progress(99, "python".to_string()).await.unwrap_err().kind(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn test_support_requires_fields() {
        let (_dir, svc) = service().await;
        let err = svc
            .contact_support(SupportRequest {
                email: "ada@example.com".to_string(),
                message: "   ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }
}
