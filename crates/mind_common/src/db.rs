//! SQLite persistence for learners, progress, badges and lessons.
//!
//! All learner mutations go through [`mutate_learner`]: an IMMEDIATE
//! transaction (write lock taken before the read) plus a compare-and-set on
//! the `version` column. A lock that cannot be taken within the busy timeout,
//! or a version mismatch, surfaces as `MindError::Conflict`.

use crate::catalog::BADGES;
use crate::error::{MindError, MindResult};
use crate::types::{BadgeId, BadgeView, Exercise, Learner, Lesson};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default database path for the daemon
pub const DEFAULT_DB_PATH: &str = "/var/lib/mind-devs/mind.db";

const LEARNER_COLUMNS: &str = "id, name, email, energy, last_recharge, coins, verified, version";

/// Shared SQLite handle (single connection guarded by a mutex)
pub struct MindDb {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl MindDb {
    /// Open or create the database, apply pragmas, schema and badge seed
    pub async fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let db_path: PathBuf = path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        info!("Opening mind database at: {}", db_path.display());

        let open_path = db_path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&open_path).context("Failed to open SQLite database")?;

            // WAL lets readers proceed while a learner transaction holds the write lock
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .context("Failed to enable foreign keys")?;
            conn.busy_timeout(busy_timeout)
                .context("Failed to set busy timeout")?;

            initialize_schema(&conn)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path,
        })
    }

    /// Run `f` against the connection on a blocking thread
    pub async fn execute<F, R>(&self, f: F) -> MindResult<R>
    where
        F: FnOnce(&Connection) -> MindResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS learners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            credential_salt TEXT NOT NULL,
            energy INTEGER NOT NULL DEFAULT 5 CHECK (energy BETWEEN 0 AND 5),
            last_recharge TEXT NOT NULL,
            coins INTEGER NOT NULL DEFAULT 0 CHECK (coins >= 0),
            verified INTEGER NOT NULL DEFAULT 0,
            code TEXT,
            code_expires_at TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS progress (
            learner_id INTEGER NOT NULL REFERENCES learners(id),
            course TEXT NOT NULL,
            unlocked_level INTEGER NOT NULL CHECK (unlocked_level >= 1),
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (learner_id, course)
        );

        CREATE TABLE IF NOT EXISTS badges (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS learner_badges (
            learner_id INTEGER NOT NULL REFERENCES learners(id),
            badge_id INTEGER NOT NULL REFERENCES badges(id),
            granted_at TEXT NOT NULL,
            PRIMARY KEY (learner_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS lessons (
            course TEXT NOT NULL,
            level INTEGER NOT NULL CHECK (level >= 1),
            title TEXT NOT NULL,
            exercises TEXT NOT NULL,
            PRIMARY KEY (course, level)
        );
        "#,
    )
    .context("Failed to create schema")?;

    for badge in BADGES {
        conn.execute(
            "INSERT INTO badges (id, name, icon, description) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                icon = excluded.icon,
                description = excluded.description",
            params![badge.id, badge.name, badge.icon, badge.description],
        )
        .context("Failed to seed badge catalog")?;
    }

    Ok(())
}

// ============================================================================
// Learners
// ============================================================================

fn learner_from_row(row: &Row<'_>) -> rusqlite::Result<Learner> {
    Ok(Learner {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        energy: row.get(3)?,
        last_recharge: row.get(4)?,
        coins: row.get(5)?,
        verified: row.get(6)?,
        version: row.get(7)?,
    })
}

pub fn load_learner(conn: &Connection, learner_id: i64) -> MindResult<Learner> {
    conn.query_row(
        &format!("SELECT {} FROM learners WHERE id = ?1", LEARNER_COLUMNS),
        params![learner_id],
        learner_from_row,
    )
    .optional()?
    .ok_or_else(|| MindError::not_found(format!("learner {}", learner_id)))
}

pub fn find_learner_by_email(conn: &Connection, email: &str) -> MindResult<Option<Learner>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM learners WHERE email = ?1", LEARNER_COLUMNS),
            params![email],
            learner_from_row,
        )
        .optional()?)
}

/// Fields needed to create a learner row
#[derive(Debug, Clone)]
pub struct NewLearner {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    pub credential_salt: String,
    pub energy: i64,
    pub created_at: DateTime<Utc>,
}

pub fn insert_learner(conn: &Connection, new: &NewLearner) -> MindResult<i64> {
    conn.execute(
        "INSERT INTO learners (name, email, credential_hash, credential_salt, energy, last_recharge, coins)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![
            new.name,
            new.email,
            new.credential_hash,
            new.credential_salt,
            new.energy,
            new.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn check_invariants(learner: &Learner) -> MindResult<()> {
    if !(0..=crate::energy::MAX_ENERGY).contains(&learner.energy) {
        return Err(MindError::invalid(format!(
            "energy {} outside 0..={}",
            learner.energy,
            crate::energy::MAX_ENERGY
        )));
    }
    if learner.coins < 0 {
        return Err(MindError::invalid(format!("coin balance {} below zero", learner.coins)));
    }
    Ok(())
}

/// The one atomic learner-update primitive.
///
/// Opens an IMMEDIATE transaction, loads the learner, hands the caller a
/// mutable copy plus the transaction (for writes to related tables), then
/// stores the copy with a version compare-and-set and commits. Any error
/// from `f` rolls back everything it did. The learner row is only written
/// when the copy differs from the snapshot.
pub fn mutate_learner<R, F>(conn: &Connection, learner_id: i64, f: F) -> MindResult<(Learner, R)>
where
    F: FnOnce(&Transaction<'_>, &mut Learner) -> MindResult<R>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let snapshot = load_learner(&tx, learner_id)?;

    let mut next = snapshot.clone();
    let out = f(&tx, &mut next)?;

    // Identity and version belong to the primitive, not the caller
    next.id = snapshot.id;
    next.email = snapshot.email.clone();
    next.version = snapshot.version;

    if next != snapshot {
        check_invariants(&next)?;
        let changed = tx.execute(
            "UPDATE learners
             SET name = ?1, energy = ?2, last_recharge = ?3, coins = ?4, verified = ?5,
                 version = version + 1
             WHERE id = ?6 AND version = ?7",
            params![
                next.name,
                next.energy,
                next.last_recharge,
                next.coins,
                next.verified,
                next.id,
                snapshot.version
            ],
        )?;
        if changed == 0 {
            return Err(MindError::Conflict(format!(
                "learner {} changed since version {}",
                learner_id, snapshot.version
            )));
        }
        next.version += 1;
    }

    tx.commit()?;
    Ok((next, out))
}

// ============================================================================
// Credentials and one-time codes
// ============================================================================

// These columns sit outside the state-machine snapshot and do not bump
// `version`; they may be written from inside a `mutate_learner` closure.

/// Credential and code columns of a learner row
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub learner_id: i64,
    pub credential_hash: String,
    pub credential_salt: String,
    pub code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
}

pub fn load_credentials(conn: &Connection, email: &str) -> MindResult<Option<CredentialRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, credential_hash, credential_salt, code, code_expires_at
             FROM learners WHERE email = ?1",
            params![email],
            |row| {
                Ok(CredentialRecord {
                    learner_id: row.get(0)?,
                    credential_hash: row.get(1)?,
                    credential_salt: row.get(2)?,
                    code: row.get(3)?,
                    code_expires_at: row.get(4)?,
                })
            },
        )
        .optional()?)
}

pub fn store_code(
    conn: &Connection,
    learner_id: i64,
    code: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> MindResult<()> {
    conn.execute(
        "UPDATE learners SET code = ?1, code_expires_at = ?2 WHERE id = ?3",
        params![code, expires_at, learner_id],
    )?;
    Ok(())
}

pub fn store_credentials(conn: &Connection, learner_id: i64, hash: &str, salt: &str) -> MindResult<()> {
    conn.execute(
        "UPDATE learners SET credential_hash = ?1, credential_salt = ?2 WHERE id = ?3",
        params![hash, salt, learner_id],
    )?;
    Ok(())
}

// ============================================================================
// Progress and badges
// ============================================================================

/// Highest unlocked level for a course, 1 when the learner never passed one
pub fn unlocked_level(conn: &Connection, learner_id: i64, course: &str) -> MindResult<u32> {
    let level: Option<u32> = conn
        .query_row(
            "SELECT unlocked_level FROM progress WHERE learner_id = ?1 AND course = ?2",
            params![learner_id, course],
            |row| row.get(0),
        )
        .optional()?;
    Ok(level.unwrap_or(1))
}

/// Insert or raise the unlocked level; never lowers it
pub fn raise_unlocked_level(conn: &Connection, learner_id: i64, course: &str, level: u32) -> MindResult<()> {
    conn.execute(
        "INSERT INTO progress (learner_id, course, unlocked_level) VALUES (?1, ?2, ?3)
         ON CONFLICT(learner_id, course) DO UPDATE SET
            unlocked_level = MAX(unlocked_level, excluded.unlocked_level),
            updated_at = CURRENT_TIMESTAMP",
        params![learner_id, course, level],
    )?;
    Ok(())
}

/// Idempotent badge grant. Returns true only when this call inserted it.
pub fn grant_badge(
    conn: &Connection,
    learner_id: i64,
    badge_id: BadgeId,
    at: DateTime<Utc>,
) -> MindResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO learner_badges (learner_id, badge_id, granted_at) VALUES (?1, ?2, ?3)",
        params![learner_id, badge_id, at],
    )?;
    if inserted == 0 {
        debug!("Learner {} already holds badge {}", learner_id, badge_id);
    }
    Ok(inserted == 1)
}

pub fn learner_badges(conn: &Connection, learner_id: i64) -> MindResult<Vec<BadgeView>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, b.icon, b.description
         FROM learner_badges lb
         JOIN badges b ON lb.badge_id = b.id
         WHERE lb.learner_id = ?1
         ORDER BY lb.granted_at, b.id",
    )?;
    let badges = stmt
        .query_map(params![learner_id], |row| {
            Ok(BadgeView {
                name: row.get(0)?,
                icon: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(badges)
}

// ============================================================================
// Lessons
// ============================================================================

pub fn get_lesson(conn: &Connection, course: &str, level: u32) -> MindResult<Option<Lesson>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT title, exercises FROM lessons WHERE course = ?1 AND level = ?2",
            params![course, level],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((title, exercises_json)) => {
            let exercises: Vec<Exercise> = serde_json::from_str(&exercises_json)?;
            Ok(Some(Lesson {
                course: course.to_string(),
                level,
                title,
                exercises,
            }))
        }
        None => Ok(None),
    }
}

pub fn upsert_lesson(conn: &Connection, lesson: &Lesson) -> MindResult<()> {
    let exercises = serde_json::to_string(&lesson.exercises)?;
    conn.execute(
        "INSERT INTO lessons (course, level, title, exercises) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(course, level) DO UPDATE SET
            title = excluded.title,
            exercises = excluded.exercises",
        params![lesson.course, lesson.level, lesson.title, exercises],
    )?;
    Ok(())
}
