//! SQLite store for profiles, the scheme catalog, eligibility links and
//! login state.
//!
//! All statements run on one connection behind a mutex. Multi-statement
//! writes (catalog import, eligibility replace) run inside a transaction.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::schema::{AUTH_SCHEMA_SQL, SCHEMA_SQL};
use niti_core::{
    now_rfc3339, Address, Error, Result, Scheme, SchemeEligibility, UserProfile,
};

/// A live login session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub email: String,
    pub created_at: String,
    /// Unix millis.
    pub expires_at: i64,
}

/// Editable profile fields. State and city travel with the pincode.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub age: Option<u32>,
    pub income: Option<f64>,
    pub address: Option<Address>,
}

const PROFILE_COLUMNS: &str = "email, name, gender, age, pincode, state, city, location, caste, \
     disability, minority, student, bpl, income, profile_photo, aadhar_verified, \
     created_at, updated_at";

const SCHEME_COLUMNS: &str = "id, scheme_name, details, benefits, documents_required, \
     application_process, contact_info, gender, location, eligible_castes_json, \
     disability, minority, student, bpl, age_range, income_range";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the database file at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} profiles, {} schemes, path={}",
            store.count_profiles()?,
            store.count_schemes()?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}", SCHEMA_SQL, AUTH_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Identities & sessions
    // ---------------------------------------------------------------

    /// Create a login identity. Fails with `AlreadyExists` on a taken email.
    pub fn create_identity(&self, email: &str, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO auth_identities (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .map_err(db_err)?
        .execute(params![email, password_hash, now_rfc3339()])
        .map_err(|e| unique_or_db(e, email))?;
        Ok(())
    }

    pub fn get_password_hash(&self, email: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let hash = conn
            .prepare_cached("SELECT password_hash FROM auth_identities WHERE email = ?1")
            .map_err(db_err)?
            .query_row(params![email], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        Ok(hash)
    }

    /// Delete an identity and (by cascade) its sessions.
    pub fn delete_identity(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM auth_identities WHERE email = ?1", params![email])
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn create_session(&self, email: &str, ttl: chrono::Duration) -> Result<AuthSession> {
        let now = chrono::Utc::now();
        let session = AuthSession {
            token: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: now.to_rfc3339(),
            expires_at: (now + ttl).timestamp_millis(),
        };
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO auth_sessions (token, email, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_err)?
        .execute(params![
            session.token,
            session.email,
            session.created_at,
            session.expires_at
        ])
        .map_err(db_err)?;
        debug!("Session created for {}", email);
        Ok(session)
    }

    /// Resolve a session token to its email. Expired sessions are purged.
    pub fn session_email(&self, token: &str) -> Result<Option<String>> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .prepare_cached("SELECT email, expires_at FROM auth_sessions WHERE token = ?1")
            .map_err(db_err)?
            .query_row(params![token], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(db_err)?;

        match row {
            Some((email, expires_at)) if expires_at > now => Ok(Some(email)),
            Some(_) => {
                conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])
                    .map_err(db_err)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Profiles
    // ---------------------------------------------------------------

    pub fn insert_profile(&self, profile: &UserProfile) -> Result<()> {
        let created_at = profile.created_at.clone().unwrap_or_else(now_rfc3339);
        let conn = self.conn.lock();
        conn.prepare_cached(&format!(
            "INSERT INTO user_profiles ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            PROFILE_COLUMNS
        ))
        .map_err(db_err)?
        .execute(params![
            profile.email,
            profile.name,
            profile.gender.as_str(),
            profile.age,
            profile.address.pincode,
            profile.address.state,
            profile.address.city,
            profile.location.as_str(),
            profile.caste,
            profile.disability,
            profile.minority,
            profile.student,
            profile.bpl,
            profile.income,
            profile.profile_photo,
            profile.aadhar_verified,
            created_at,
            profile.updated_at,
        ])
        .map_err(|e| unique_or_db(e, &profile.email))?;
        Ok(())
    }

    pub fn get_profile(&self, email: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock();
        let profile = conn
            .prepare_cached(&format!(
                "SELECT {} FROM user_profiles WHERE email = ?1",
                PROFILE_COLUMNS
            ))
            .map_err(db_err)?
            .query_row(params![email], Self::row_to_profile)
            .optional()
            .map_err(db_err)?;
        Ok(profile)
    }

    pub fn profile_exists(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM user_profiles WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn count_profiles(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM user_profiles", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// Apply an edit. Returns false when no profile has this email.
    pub fn update_profile(&self, email: &str, update: &ProfileUpdate) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let exists: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM user_profiles WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if exists == 0 {
            return Ok(false);
        }

        if let Some(age) = update.age {
            tx.execute(
                "UPDATE user_profiles SET age = ?1 WHERE email = ?2",
                params![age, email],
            )
            .map_err(db_err)?;
        }
        if let Some(income) = update.income {
            tx.execute(
                "UPDATE user_profiles SET income = ?1 WHERE email = ?2",
                params![income, email],
            )
            .map_err(db_err)?;
        }
        if let Some(address) = &update.address {
            tx.execute(
                "UPDATE user_profiles SET pincode = ?1, state = ?2, city = ?3 WHERE email = ?4",
                params![address.pincode, address.state, address.city, email],
            )
            .map_err(db_err)?;
        }
        tx.execute(
            "UPDATE user_profiles SET updated_at = ?1 WHERE email = ?2",
            params![now_rfc3339(), email],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(true)
    }

    /// Flip the verified flag on. Returns false when no profile matched.
    pub fn set_verified(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE user_profiles SET aadhar_verified = 1, updated_at = ?1 WHERE email = ?2",
                params![now_rfc3339(), email],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Record a new photo key. Returns the key it replaced, if any.
    pub fn set_profile_photo(&self, email: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let previous: Option<Option<String>> = tx
            .query_row(
                "SELECT profile_photo FROM user_profiles WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let Some(previous) = previous else {
            return Err(Error::NotFound(format!("profile {}", email)));
        };
        tx.execute(
            "UPDATE user_profiles SET profile_photo = ?1, updated_at = ?2 WHERE email = ?3",
            params![key, now_rfc3339(), email],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(previous)
    }

    fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            email: row.get("email")?,
            name: row.get("name")?,
            gender: parse_text(row, "gender")?,
            age: row.get("age")?,
            address: Address {
                pincode: row.get("pincode")?,
                state: row.get("state")?,
                city: row.get("city")?,
            },
            location: parse_text(row, "location")?,
            caste: row.get("caste")?,
            disability: row.get("disability")?,
            minority: row.get("minority")?,
            student: row.get("student")?,
            bpl: row.get("bpl")?,
            income: row.get("income")?,
            profile_photo: row.get("profile_photo")?,
            aadhar_verified: row.get("aadhar_verified")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    // ---------------------------------------------------------------
    // Scheme catalog
    // ---------------------------------------------------------------

    /// Insert or replace catalog rows in one transaction. Returns the count.
    pub fn import_schemes(&self, schemes: &[Scheme]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(&format!(
                    "INSERT OR REPLACE INTO schemes ({}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    SCHEME_COLUMNS
                ))
                .map_err(db_err)?;
            for scheme in schemes {
                let e = &scheme.eligibility;
                let castes = serde_json::to_string(&e.eligible_castes)?;
                stmt.execute(params![
                    scheme.id,
                    scheme.scheme_name,
                    scheme.details,
                    scheme.benefits,
                    scheme.documents_required,
                    scheme.application_process,
                    scheme.contact_info,
                    e.gender,
                    e.location,
                    castes,
                    e.disability,
                    e.minority,
                    e.student,
                    e.bpl,
                    e.age_range,
                    e.income_range,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        info!("Imported {} schemes", schemes.len());
        Ok(schemes.len())
    }

    pub fn get_scheme(&self, id: &str) -> Result<Option<Scheme>> {
        let conn = self.conn.lock();
        let scheme = conn
            .prepare_cached(&format!("SELECT {} FROM schemes WHERE id = ?1", SCHEME_COLUMNS))
            .map_err(db_err)?
            .query_row(params![id], Self::row_to_scheme)
            .optional()
            .map_err(db_err)?;
        Ok(scheme)
    }

    pub fn get_all_schemes(&self) -> Result<Vec<Scheme>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {} FROM schemes ORDER BY id", SCHEME_COLUMNS))
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_scheme).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn count_schemes(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM schemes", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn row_to_scheme(row: &Row<'_>) -> rusqlite::Result<Scheme> {
        let castes_json: String = row.get("eligible_castes_json")?;
        let eligible_castes: Vec<String> = serde_json::from_str(&castes_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
        })?;
        Ok(Scheme {
            id: row.get("id")?,
            scheme_name: row.get("scheme_name")?,
            details: row.get("details")?,
            benefits: row.get("benefits")?,
            documents_required: row.get("documents_required")?,
            application_process: row.get("application_process")?,
            contact_info: row.get("contact_info")?,
            eligibility: SchemeEligibility {
                gender: row.get("gender")?,
                location: row.get("location")?,
                eligible_castes,
                disability: row.get("disability")?,
                minority: row.get("minority")?,
                student: row.get("student")?,
                bpl: row.get("bpl")?,
                age_range: row.get("age_range")?,
                income_range: row.get("income_range")?,
            },
        })
    }

    // ---------------------------------------------------------------
    // Eligibility links
    // ---------------------------------------------------------------

    /// Atomically supersede a user's eligibility set.
    ///
    /// Delete and insert share one transaction: either the new set is fully
    /// recorded or the previous set is left untouched. Duplicate ids collapse.
    pub fn replace_eligible_schemes(&self, email: &str, scheme_ids: &[String]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let removed = tx
            .execute(
                "DELETE FROM user_eligible_schemes WHERE email = ?1",
                params![email],
            )
            .map_err(db_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO user_eligible_schemes (email, scheme_id) VALUES (?1, ?2)",
                )
                .map_err(db_err)?;
            for id in scheme_ids {
                inserted += stmt.execute(params![email, id]).map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        debug!(
            "Eligibility for {} replaced: -{} +{}",
            email, removed, inserted
        );
        Ok(inserted)
    }

    pub fn get_eligible_scheme_ids(&self, email: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT scheme_id FROM user_eligible_schemes WHERE email = ?1 ORDER BY scheme_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![email], |row| row.get(0))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(db_err)
    }

    /// Catalog rows joined through the user's links. Dangling ids are dropped.
    pub fn get_eligible_schemes(&self, email: &str) -> Result<Vec<Scheme>> {
        let conn = self.conn.lock();
        let columns = SCHEME_COLUMNS
            .split(", ")
            .map(|c| format!("s.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {} FROM user_eligible_schemes l \
                 JOIN schemes s ON s.id = l.scheme_id \
                 WHERE l.email = ?1",
                columns
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![email], Self::row_to_scheme)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn unique_or_db(e: rusqlite::Error, key: &str) -> Error {
    if e.to_string().contains("UNIQUE constraint") {
        Error::AlreadyExists(key.to_string())
    } else {
        Error::Database(e.to_string())
    }
}

fn parse_text<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}
