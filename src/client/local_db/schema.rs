//! Versioned layout of the local store
//!
//! `schema.sql` creates every table idempotently. The entries below name
//! which of those tables arrived at which version so an older database file
//! records the upgrade when it is opened.

/// Version number and the tables it introduced.
pub const MIGRATIONS: &[(i32, &str)] = &[
    (1, "mutation_log, drafts, sync_metadata"),
    (2, "sync_lease, sync_failures"),
];

/// Latest version this build knows how to open.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Migrations newer than `applied`, oldest first.
pub fn pending_after(applied: i32) -> impl Iterator<Item = (i32, &'static str)> {
    MIGRATIONS
        .iter()
        .copied()
        .filter(move |(version, _)| *version > applied)
}
