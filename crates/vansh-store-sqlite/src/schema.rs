//! SQL schema for the Vansh SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Relations are weak references: no FOREIGN KEY constraints, because a
-- delete is followed by separate updates that clear the references.
CREATE TABLE IF NOT EXISTS people (
    person_id      TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    gender         TEXT NOT NULL,      -- 'male' | 'female'
    birth_clan     TEXT NOT NULL,
    current_clan   TEXT NOT NULL,
    generation     INTEGER NOT NULL,
    father_id      TEXT,
    mother_id      TEXT,
    spouse_id      TEXT,
    dob            TEXT,               -- YYYY-MM-DD
    photo_url      TEXT,
    linked_user_id TEXT,
    created_at     TEXT NOT NULL       -- RFC 3339 UTC; store-assigned
);

-- Runtime-added clan names. Seed clans live in configuration.
CREATE TABLE IF NOT EXISTS clans (
    name TEXT PRIMARY KEY COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS profiles (
    uid              TEXT PRIMARY KEY,
    display_name     TEXT NOT NULL,
    email            TEXT,
    clan             TEXT NOT NULL,
    linked_person_id TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS people_father_idx ON people(father_id);
CREATE INDEX IF NOT EXISTS people_clan_idx   ON people(birth_clan);

PRAGMA user_version = 1;
";
