//! Database schema SQL.

/// Profile, catalog and eligibility tables.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_profiles (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    gender TEXT NOT NULL,
    age INTEGER NOT NULL CHECK (age >= 0),
    pincode TEXT NOT NULL,
    state TEXT NOT NULL,
    city TEXT NOT NULL,
    location TEXT NOT NULL,
    caste TEXT NOT NULL,
    disability INTEGER NOT NULL DEFAULT 0,
    minority INTEGER NOT NULL DEFAULT 0,
    student INTEGER NOT NULL DEFAULT 0,
    bpl INTEGER NOT NULL DEFAULT 0,
    income REAL NOT NULL CHECK (income >= 0),
    profile_photo TEXT,
    aadhar_verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS schemes (
    id TEXT PRIMARY KEY,
    scheme_name TEXT NOT NULL,
    details TEXT,
    benefits TEXT,
    documents_required TEXT,
    application_process TEXT,
    contact_info TEXT,
    gender TEXT NOT NULL DEFAULT 'Anyone',
    location TEXT NOT NULL DEFAULT 'Anyone',
    eligible_castes_json TEXT NOT NULL DEFAULT '["Anyone"]',
    disability TEXT NOT NULL DEFAULT 'No',
    minority TEXT NOT NULL DEFAULT 'No',
    student TEXT NOT NULL DEFAULT 'No',
    bpl TEXT NOT NULL DEFAULT 'No',
    age_range TEXT NOT NULL DEFAULT '',
    income_range TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS user_eligible_schemes (
    email TEXT NOT NULL,
    scheme_id TEXT NOT NULL CHECK (length(scheme_id) > 0),
    PRIMARY KEY (email, scheme_id)
);

CREATE INDEX IF NOT EXISTS idx_eligible_email ON user_eligible_schemes(email);
"#;

/// Login identities and sessions.
pub const AUTH_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS auth_identities (
    email TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS auth_sessions (
    token TEXT PRIMARY KEY,
    email TEXT NOT NULL REFERENCES auth_identities(email) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_email ON auth_sessions(email);
"#;
