//! Migration records.
//!
//! A [`Migration`] is a versioned unit of schema work.  Two implementations
//! exist: [`ScriptMigration`] runs literal SQL bodies (usually read from
//! disk by the discovery module) and [`ActionMigration`] runs callbacks
//! supplied by the embedding application.

use std::fmt;

use rusqlite::Transaction;

use crate::error::{MigrateError, Result};

/// A single versioned schema change.
///
/// Implementations are immutable value objects; the [`Migrator`] owns a set
/// of them for its lifetime.
///
/// [`Migrator`]: crate::Migrator
pub trait Migration {
    /// The strictly-positive version this migration brings the database to.
    fn version(&self) -> i64;

    /// Run the forward action inside the open transaction.
    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()>;

    /// Run the reverse action inside the open transaction.
    ///
    /// Never called by the automatic upgrade path; exposed for callers that
    /// roll a database back by hand.  The default declares no reverse step.
    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        let _ = tx;
        Err(MigrateError::NoDowngrade {
            version: self.version(),
        })
    }
}

/// A migration backed by literal SQL bodies.
///
/// The up body may contain several statements; it is executed as a batch.
/// An empty down body means the migration declares no reverse step.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    version: i64,
    up: String,
    down: String,
}

impl ScriptMigration {
    pub fn new(version: i64, up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            version,
            up: up.into(),
            down: down.into(),
        }
    }
}

impl Migration for ScriptMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch(&self.up)?;
        Ok(())
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        if self.down.is_empty() {
            return Err(MigrateError::NoDowngrade {
                version: self.version,
            });
        }
        tx.execute_batch(&self.down)?;
        Ok(())
    }
}

/// The callback type run by an [`ActionMigration`].
pub type Action = Box<dyn Fn(&Transaction<'_>) -> Result<()>>;

/// A migration backed by callbacks supplied by the embedding application.
pub struct ActionMigration {
    version: i64,
    up: Action,
    down: Option<Action>,
}

impl ActionMigration {
    pub fn new<F>(version: i64, up: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<()> + 'static,
    {
        Self {
            version,
            up: Box::new(up),
            down: None,
        }
    }

    /// Register a reverse step.
    pub fn with_downgrade<F>(mut self, down: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<()> + 'static,
    {
        self.down = Some(Box::new(down));
        self
    }
}

impl Migration for ActionMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn upgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        (self.up)(tx)
    }

    fn downgrade(&self, tx: &Transaction<'_>) -> Result<()> {
        match &self.down {
            Some(down) => down(tx),
            None => Err(MigrateError::NoDowngrade {
                version: self.version,
            }),
        }
    }
}

impl fmt::Debug for ActionMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMigration")
            .field("version", &self.version)
            .field("has_downgrade", &self.down.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn script_upgrade_executes_the_body() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migration = ScriptMigration::new(1, "CREATE TABLE notes (body TEXT)", "");

        let tx = conn.transaction().unwrap();
        migration.upgrade(&tx).unwrap();
        tx.commit().unwrap();

        conn.execute("INSERT INTO notes (body) VALUES ('x')", [])
            .unwrap();
    }

    #[test]
    fn script_downgrade_runs_the_down_body() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migration = ScriptMigration::new(1, "CREATE TABLE notes (body TEXT)", "DROP TABLE notes");

        let tx = conn.transaction().unwrap();
        migration.upgrade(&tx).unwrap();
        tx.commit().unwrap();

        let tx = conn.transaction().unwrap();
        migration.downgrade(&tx).unwrap();
        tx.commit().unwrap();

        assert!(conn.execute("INSERT INTO notes (body) VALUES ('x')", []).is_err());
    }

    #[test]
    fn script_downgrade_without_body_errors() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migration = ScriptMigration::new(3, "CREATE TABLE notes (body TEXT)", "");

        let tx = conn.transaction().unwrap();
        let err = migration.downgrade(&tx).unwrap_err();
        assert!(matches!(err, MigrateError::NoDowngrade { version: 3 }));
    }

    #[test]
    fn action_migration_runs_callbacks() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migration = ActionMigration::new(2, |tx| {
            tx.execute_batch("CREATE TABLE recorded (x INTEGER)")?;
            Ok(())
        })
        .with_downgrade(|tx| {
            tx.execute_batch("DROP TABLE recorded")?;
            Ok(())
        });

        assert_eq!(migration.version(), 2);

        let tx = conn.transaction().unwrap();
        migration.upgrade(&tx).unwrap();
        tx.commit().unwrap();

        let tx = conn.transaction().unwrap();
        migration.downgrade(&tx).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn action_downgrade_defaults_to_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migration = ActionMigration::new(5, |_tx| Ok(()));

        let tx = conn.transaction().unwrap();
        let err = migration.downgrade(&tx).unwrap_err();
        assert!(matches!(err, MigrateError::NoDowngrade { version: 5 }));
    }
}
