//! SQL schema for the Nudge SQLite journal.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Signals are strictly append-only. Resolution is derived on restore from
-- the matches table, never written back here.
CREATE TABLE IF NOT EXISTS signals (
    signal_id     TEXT PRIMARY KEY,
    from_actor    TEXT NOT NULL,
    to_actor      TEXT NOT NULL,
    kind          TEXT NOT NULL,   -- 'like' | 'pass' | 'nudge'
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC; engine-assigned
    location_json TEXT             -- JSON-encoded LocationContext or NULL
);

-- Matches are append-only too; expiry is computed from expires_at on read.
CREATE TABLE IF NOT EXISTS matches (
    match_id   TEXT PRIMARY KEY,
    actor_a    TEXT NOT NULL,
    actor_b    TEXT NOT NULL,
    match_type TEXT NOT NULL,      -- 'regular' | 'nudge'
    created_at TEXT NOT NULL,
    expires_at TEXT,
    CHECK (actor_a < actor_b)
);

-- One row per actor, replaced on every recomputation.
CREATE TABLE IF NOT EXISTS affinity_profiles (
    actor_id     TEXT PRIMARY KEY,
    profile_json TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS signals_pair_idx ON signals(from_actor, to_actor);
CREATE INDEX IF NOT EXISTS matches_pair_idx ON matches(actor_a, actor_b);

PRAGMA user_version = 1;
";
