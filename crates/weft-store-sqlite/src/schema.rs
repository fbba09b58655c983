//! SQL schemas for the two Weft SQLite databases.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `user_version` pragma.

/// Matrix database DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const MATRIX_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS mappings (
    mapping_id     TEXT PRIMARY KEY,
    org_id         TEXT NOT NULL,
    soul_id        TEXT NOT NULL,
    integration_id TEXT NOT NULL,
    is_primary     INTEGER NOT NULL DEFAULT 0,
    priority       INTEGER NOT NULL DEFAULT 0,   -- 0-100, ordering only
    notes          TEXT,
    created_by     TEXT,
    created_at     TEXT NOT NULL,                -- ISO 8601 UTC
    updated_at     TEXT NOT NULL,
    UNIQUE (org_id, soul_id, integration_id)
);

CREATE INDEX IF NOT EXISTS mappings_org_soul_idx
    ON mappings(org_id, soul_id);
CREATE INDEX IF NOT EXISTS mappings_org_integration_idx
    ON mappings(org_id, integration_id);

-- Schema-level backstop for the single-primary rule. Write paths demote
-- siblings before promoting, all inside one transaction; this index turns
-- any gap in that discipline into a hard constraint error.
CREATE UNIQUE INDEX IF NOT EXISTS mappings_primary_idx
    ON mappings(org_id, soul_id) WHERE is_primary = 1;

-- The integration catalog, owned by its directory. Mappings reference it by
-- id only; no foreign key, since the soul side of a mapping lives in a
-- different database anyway and integrity is validated at the service layer.
CREATE TABLE IF NOT EXISTS integrations (
    integration_id TEXT NOT NULL,
    org_id         TEXT NOT NULL,
    name           TEXT NOT NULL,
    picture        TEXT,
    provider       TEXT NOT NULL,
    disabled       INTEGER NOT NULL DEFAULT 0,
    deleted_at     TEXT,                         -- soft delete; NULL = live
    PRIMARY KEY (org_id, integration_id)
);

PRAGMA user_version = 1;
";

/// Soul document database DDL. One JSON document per soul; columns exist
/// only for the lookup key, everything else is read out of `doc`.
pub const SOUL_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS souls (
    org_id  TEXT NOT NULL,
    soul_id TEXT NOT NULL,
    doc     TEXT NOT NULL,
    PRIMARY KEY (org_id, soul_id)
);

PRAGMA user_version = 1;
";
