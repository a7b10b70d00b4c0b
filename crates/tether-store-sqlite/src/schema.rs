//! SQL schema for the Tether SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Contact (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    phoneNumber    TEXT,
    email          TEXT,
    linkedId       INTEGER REFERENCES Contact(id),   -- set on secondaries only
    linkPrecedence TEXT NOT NULL
                   CHECK (linkPrecedence IN ('primary', 'secondary')),
    createdAt      TEXT NOT NULL,                    -- RFC 3339 UTC
    updatedAt      TEXT NOT NULL,                    -- refreshed on every write
    deletedAt      TEXT,                             -- reserved; never written
    CHECK ((linkPrecedence = 'primary') = (linkedId IS NULL))
);

CREATE INDEX IF NOT EXISTS contact_email_idx  ON Contact(email);
CREATE INDEX IF NOT EXISTS contact_phone_idx  ON Contact(phoneNumber);
CREATE INDEX IF NOT EXISTS contact_linked_idx ON Contact(linkedId);

PRAGMA user_version = 1;
";
