//! SQL schema for the Parley SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- prompt_digest is the SHA-256 of system_prompt; the UNIQUE constraint is
-- the serialization point for get-or-create by text.
CREATE TABLE IF NOT EXISTS prompt_profiles (
    profile_id    TEXT PRIMARY KEY,
    name          TEXT,
    system_prompt TEXT NOT NULL,
    prompt_digest TEXT NOT NULL UNIQUE,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    conversation_id   TEXT PRIMARY KEY,
    started_at        TEXT NOT NULL,
    prompt_profile_id TEXT REFERENCES prompt_profiles(profile_id),
    variant_label     TEXT
);

-- Written once, when the conversation is materialised.
CREATE TABLE IF NOT EXISTS knowledge_sources (
    source_id       TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
    position        INTEGER NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE (conversation_id, position)
);

-- Only the feedback columns are ever updated.
CREATE TABLE IF NOT EXISTS messages (
    message_id      TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
    role            TEXT NOT NULL,   -- 'user' | 'assistant'
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,   -- fixed-width RFC 3339, sorts lexically
    thumbs_up       INTEGER,
    thumbs_down     INTEGER,
    feedback_text   TEXT,
    CHECK (role IN ('user', 'assistant'))
);

CREATE INDEX IF NOT EXISTS messages_conversation_idx
    ON messages(conversation_id, created_at);
CREATE INDEX IF NOT EXISTS knowledge_conversation_idx
    ON knowledge_sources(conversation_id);

PRAGMA user_version = 1;
";
