use thiserror::Error;

use crate::discover::Direction;

/// Errors produced by the migration engine.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// SQLite error from the underlying connection.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. reading a migration file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The version store does not exist or holds no row yet.
    #[error("Version store is not initialized")]
    Uninitialized,

    /// Re-reading the version store right after initialization returned
    /// something other than 0.
    #[error("Version store holds {found} immediately after initialization")]
    InitVersionMismatch { found: i64 },

    /// The requested target version lies below the database's current
    /// version.
    #[error("Downgrades are not supported (database at version {current}, requested {target})")]
    DowngradesUnsupported { current: i64, target: i64 },

    /// The database reports a current version with no matching record in
    /// the migration set.
    #[error("Cannot find migration for current version {version}")]
    MissingCurrentMigration { version: i64 },

    /// The stored version moved between scheduling and applying a step.
    #[error("Version changed during apply: expected {expected}, found {found}")]
    VersionChanged { expected: i64, found: i64 },

    /// `downgrade` was called on a migration that declares no reverse step.
    #[error("No downgrade defined for migration {version}")]
    NoDowngrade { version: i64 },

    /// A migration file name carries a version that is zero or does not fit
    /// in an `i64`.
    #[error("Version number of file {name:?} is invalid")]
    InvalidVersion { name: String },

    /// Up and down files of one version use different extensions.
    #[error("Mixed extensions for migration version {version}")]
    MixedExtensions { version: i64 },

    /// Two files claim the same direction for the same version.
    #[error("Duplicate {direction} migration for version {version}")]
    DuplicateMigration { direction: Direction, version: i64 },

    /// A version has a down file but no up file.
    #[error("Missing up migration for version {version}")]
    MissingMigration { version: i64 },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MigrateError>;
