//! The persisted version store.
//!
//! A single-row table `stratum` holds the database's current schema
//! version.  All SQL touching that table lives here; the update statement
//! is parameterized.

use rusqlite::{params, Connection, Transaction};

use crate::error::{MigrateError, Result};

/// Creates the version-store table.
pub const CREATE_TABLE_SQL: &str = "CREATE TABLE stratum (version INTEGER)";

/// Seeds the single row at version 0.
pub const INSERT_VERSION_SQL: &str = "INSERT INTO stratum (version) VALUES (0)";

/// Reads the stored version.
pub const SELECT_VERSION_SQL: &str = "SELECT version FROM stratum LIMIT 1";

/// Updates the stored version.  Takes the new version as `?1`.
pub const UPDATE_VERSION_SQL: &str = "UPDATE stratum SET version = ?1";

const TABLE_EXISTS_SQL: &str =
    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'stratum'";

/// Probe whether the version store exists in this database yet.
pub fn exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(TABLE_EXISTS_SQL, [], |row| row.get(0))?;
    Ok(count > 0)
}

/// Read the current schema version.
///
/// Fails with [`MigrateError::Uninitialized`] when the store is missing or
/// holds no row; any other query failure propagates verbatim.
pub fn current_version(conn: &Connection) -> Result<i64> {
    if !exists(conn)? {
        return Err(MigrateError::Uninitialized);
    }
    match conn.query_row(SELECT_VERSION_SQL, [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(MigrateError::Uninitialized),
        Err(e) => Err(e.into()),
    }
}

/// Set the stored version inside the caller's transaction.  Does not
/// commit.
pub fn set_version(tx: &Transaction<'_>, version: i64) -> Result<()> {
    tx.execute(UPDATE_VERSION_SQL, params![version])?;
    Ok(())
}

/// Ensure the version store exists, creating it at version 0 if needed.
/// Idempotent: an already-initialized store is left untouched.
pub fn initialize(conn: &mut Connection) -> Result<()> {
    match current_version(conn) {
        Ok(_) => return Ok(()),
        Err(MigrateError::Uninitialized) => {}
        Err(e) => return Err(e),
    }

    tracing::info!("initializing version store");

    let tx = conn.transaction()?;
    tx.execute(CREATE_TABLE_SQL, [])?;
    tx.execute(INSERT_VERSION_SQL, [])?;
    tx.commit()?;

    match current_version(conn)? {
        0 => Ok(()),
        found => Err(MigrateError::InitVersionMismatch { found }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_uninitialized() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!exists(&conn).unwrap());
        assert!(matches!(
            current_version(&conn).unwrap_err(),
            MigrateError::Uninitialized
        ));
    }

    #[test]
    fn initialize_round_trips_to_zero() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn).unwrap();

        assert!(exists(&conn).unwrap());
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn).unwrap();

        let tx = conn.transaction().unwrap();
        set_version(&tx, 7).unwrap();
        tx.commit().unwrap();

        // A second initialize must not reset the stored version.
        initialize(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 7);
    }

    #[test]
    fn set_version_stays_inside_the_transaction() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn).unwrap();

        let tx = conn.transaction().unwrap();
        set_version(&tx, 3).unwrap();
        drop(tx);

        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn empty_table_reads_as_uninitialized() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn).unwrap();
        conn.execute("DELETE FROM stratum", []).unwrap();

        assert!(matches!(
            current_version(&conn).unwrap_err(),
            MigrateError::Uninitialized
        ));
    }
}
