//! The migration orchestrator.
//!
//! [`Migrator`] owns a [`rusqlite::Connection`] plus an ordered migration
//! set and brings the database from its current version up to a target
//! version, one transaction per step.
//!
//! Every step re-reads the stored version inside its own transaction and
//! requires it to equal `version - 1`.  Two migrators racing on the same
//! database therefore cannot both apply a step: the loser observes the
//! winner's version and aborts with [`MigrateError::VersionChanged`],
//! leaving the database in the state the winner produced.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{MigrateError, Result};
use crate::migration::Migration;
use crate::store;

/// Applies migrations to a single database, strictly in version order.
pub struct Migrator {
    conn: Connection,
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    /// Wrap an existing connection.
    pub fn new(conn: Connection, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { conn, migrations }
    }

    /// Open (or create) a database file and wrap it.
    ///
    /// Applies the usual connection settings (WAL journal, foreign keys
    /// on).
    pub fn open_at(path: &Path, migrations: Vec<Box<dyn Migration>>) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self::new(conn, migrations))
    }

    /// Return a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Consume the migrator, returning the connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Mutable access to the owned migration set.
    ///
    /// The set may grow or change between upgrade calls; every call sorts
    /// it again before use.
    pub fn migrations_mut(&mut self) -> &mut Vec<Box<dyn Migration>> {
        &mut self.migrations
    }

    /// Ensure the version store exists, creating it at version 0 if
    /// needed.  Idempotent.
    pub fn init(&mut self) -> Result<()> {
        store::initialize(&mut self.conn)
    }

    /// The database's current schema version.
    pub fn current_version(&self) -> Result<i64> {
        store::current_version(&self.conn)
    }

    /// The highest version in the owned migration set, or 0 if it is
    /// empty.
    pub fn max_version(&self) -> i64 {
        self.migrations
            .iter()
            .map(|m| m.version())
            .max()
            .unwrap_or(0)
    }

    /// Upgrade to the highest version in the owned set.
    pub fn upgrade(&mut self) -> Result<Vec<String>> {
        self.upgrade_to_version(self.max_version())
    }

    /// Upgrade from the database's current version towards `target`.
    ///
    /// Returns one status line per applied migration.  The first failure
    /// aborts the run; migrations already committed by this call stay
    /// committed.
    pub fn upgrade_to_version(&mut self, target: i64) -> Result<Vec<String>> {
        let current = store::current_version(&self.conn)?;

        if target < current {
            return Err(MigrateError::DowngradesUnsupported { current, target });
        }
        if target == current {
            return Ok(vec![
                "stratum: database already at current version".to_string()
            ]);
        }

        self.migrations.sort_by_key(|m| m.version());

        let pending = if current > 0 {
            let idx = self
                .migrations
                .binary_search_by_key(&current, |m| m.version())
                .map_err(|_| MigrateError::MissingCurrentMigration { version: current })?;
            &self.migrations[idx + 1..]
        } else {
            &self.migrations[..]
        };

        let mut log = Vec::with_capacity(pending.len());
        for migration in pending {
            apply(&mut self.conn, migration.as_ref())?;
            log.push(format!(
                "stratum: upgraded to version {}",
                migration.version()
            ));
        }
        Ok(log)
    }
}

/// Apply one migration in its own transaction.
///
/// The stored version is re-read through the open transaction rather than
/// trusted from the caller; a concurrent actor advancing it between steps
/// surfaces here as [`MigrateError::VersionChanged`].  Any failure drops
/// the transaction, rolling the step back.
fn apply(conn: &mut Connection, migration: &dyn Migration) -> Result<()> {
    let version = migration.version();

    let tx = conn.transaction()?;

    let current = store::current_version(&tx)?;
    if current != version - 1 {
        return Err(MigrateError::VersionChanged {
            expected: version - 1,
            found: current,
        });
    }

    migration.upgrade(&tx)?;
    store::set_version(&tx, version)?;
    tx.commit()?;

    tracing::info!(version, "applied migration");
    Ok(())
}
