//! # stratum
//!
//! Linear schema migrations for SQLite.
//!
//! The engine tracks a database's current schema version in a single-row
//! table and applies an ordered run of migrations, one transaction per
//! step.  Each step re-checks the stored version before writing, so two
//! processes racing to migrate the same database cannot both win: the
//! loser aborts with [`MigrateError::VersionChanged`] and the database
//! keeps the state the winner produced.
//!
//! Migrations come from two places: SQL files named `NNN_up.sql` /
//! `NNN_down.sql` in a directory (see [`migrations_from_dir`]), or
//! callbacks registered by the embedding application (see
//! [`ActionMigration`]).

pub mod discover;
pub mod migration;
pub mod migrator;
pub mod store;

mod error;

pub use discover::{discover, migrations_from_dir, DirSource, Direction, MigrationSource};
pub use error::{MigrateError, Result};
pub use migration::{Action, ActionMigration, Migration, ScriptMigration};
pub use migrator::Migrator;
