//! Account directory: registration, verification, login and password recovery.
//!
//! Credentials are stored as a salted SHA-256 digest. One-time codes are
//! 4 digits and share a single slot per learner, so issuing a recovery code
//! invalidates a pending verification code.

use crate::db::{self, CredentialRecord, NewLearner};
use crate::energy::STARTING_ENERGY;
use crate::error::{MindError, MindResult};
use crate::types::{Learner, RegisterRequest};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use sha2::{Digest, Sha256};
use tracing::info;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> MindResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MindError::invalid(format!("'{}' is not an email address", email)))
    }
}

fn validate_password(password: &str) -> MindResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(MindError::invalid(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> MindResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MindError::invalid("name is required"));
    }
    Ok(name.to_string())
}

pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// 4-digit one-time code
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Check a submitted one-time code against the stored slot
pub fn check_code(record: &CredentialRecord, code: &str, now: DateTime<Utc>) -> MindResult<()> {
    match (&record.code, record.code_expires_at) {
        (Some(stored), Some(expires_at)) if stored == code.trim() => {
            if now > expires_at {
                Err(MindError::invalid("code has expired"))
            } else {
                Ok(())
            }
        }
        _ => Err(MindError::invalid("incorrect code")),
    }
}

fn credentials_for(conn: &Connection, email: &str) -> MindResult<CredentialRecord> {
    db::load_credentials(conn, email)?.ok_or_else(|| MindError::not_found(format!("account {}", email)))
}

/// Create an unverified learner and return it with its verification code
pub fn register(
    conn: &Connection,
    req: &RegisterRequest,
    now: DateTime<Utc>,
    code_ttl: Duration,
) -> MindResult<(Learner, String)> {
    let name = validate_name(&req.name)?;
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_password(&req.password)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if db::find_learner_by_email(&tx, &email)?.is_some() {
        return Err(MindError::invalid("email is already registered"));
    }

    let salt = new_salt();
    let learner_id = db::insert_learner(
        &tx,
        &NewLearner {
            name,
            email,
            credential_hash: hash_password(&req.password, &salt),
            credential_salt: salt,
            energy: STARTING_ENERGY,
            created_at: now,
        },
    )?;

    let code = generate_code();
    db::store_code(&tx, learner_id, Some(&code), Some(now + code_ttl))?;
    let learner = db::load_learner(&tx, learner_id)?;
    tx.commit()?;

    info!("Registered learner {} ({})", learner.id, learner.email);
    Ok((learner, code))
}

/// Confirm the verification code and mark the account verified
pub fn verify(conn: &Connection, email: &str, code: &str, now: DateTime<Utc>) -> MindResult<Learner> {
    let email = normalize_email(email);
    let record = credentials_for(conn, &email)?;
    check_code(&record, code, now)?;

    let (learner, ()) = db::mutate_learner(conn, record.learner_id, |tx, learner| {
        db::store_code(tx, learner.id, None, None)?;
        learner.verified = true;
        Ok(())
    })?;
    info!("Learner {} verified", learner.id);
    Ok(learner)
}

/// Check credentials, returning the learner id
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> MindResult<i64> {
    let record = credentials_for(conn, &normalize_email(email))?;
    if hash_password(password, &record.credential_salt) != record.credential_hash {
        return Err(MindError::InvalidCredentials);
    }
    Ok(record.learner_id)
}

/// Issue a password-recovery code
pub fn start_recovery(
    conn: &Connection,
    email: &str,
    now: DateTime<Utc>,
    code_ttl: Duration,
) -> MindResult<(Learner, String)> {
    let email = normalize_email(email);
    let record = credentials_for(conn, &email)?;
    let code = generate_code();
    db::store_code(conn, record.learner_id, Some(&code), Some(now + code_ttl))?;
    Ok((db::load_learner(conn, record.learner_id)?, code))
}

/// Validate a recovery code without consuming it
pub fn validate_recovery(conn: &Connection, email: &str, code: &str, now: DateTime<Utc>) -> MindResult<()> {
    let record = credentials_for(conn, &normalize_email(email))?;
    check_code(&record, code, now)
}

/// Replace the password and consume the recovery code
pub fn reset_password(
    conn: &Connection,
    email: &str,
    code: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> MindResult<()> {
    validate_password(new_password)?;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let record = credentials_for(&tx, &normalize_email(email))?;
    check_code(&record, code, now)?;

    let salt = new_salt();
    db::store_credentials(&tx, record.learner_id, &hash_password(new_password, &salt), &salt)?;
    db::store_code(&tx, record.learner_id, None, None)?;
    tx.commit()?;

    info!("Password reset for learner {}", record.learner_id);
    Ok(())
}

/// Change display name and optionally password
pub fn update_profile(
    conn: &Connection,
    learner_id: i64,
    name: &str,
    password: Option<&str>,
) -> MindResult<Learner> {
    let name = validate_name(name)?;
    if let Some(password) = password {
        validate_password(password)?;
    }

    let (learner, ()) = db::mutate_learner(conn, learner_id, |tx, learner| {
        if let Some(password) = password {
            let salt = new_salt();
            db::store_credentials(tx, learner.id, &hash_password(password, &salt), &salt)?;
        }
        learner.name = name;
        Ok(())
    })?;
    Ok(learner)
}
