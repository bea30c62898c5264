//! Migration discovery.
//!
//! Turns a directory of `NNN_up.sql` / `NNN_down.sql` files into an ordered
//! list of [`ScriptMigration`]s.  Names that do not match the pattern are
//! ignored as unrelated files; names that match but form an inconsistent
//! set (duplicate direction, missing up file, mixed extensions) abort the
//! whole call.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MigrateError, Result};
use crate::migration::ScriptMigration;

/// File name pattern recognized as a migration artifact.  Direction keyword
/// and extension are case-insensitive.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([0-9]+)[-_](up|down)\.(sql)$").expect("static pattern"));

/// Whether an artifact upgrades or downgrades its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Narrow filesystem capability consumed by [`discover`].
///
/// Production code uses [`DirSource`]; tests substitute an in-memory
/// implementation.
pub trait MigrationSource {
    /// Entry names in the source.  Non-recursive, files only.
    fn list_entries(&self) -> io::Result<Vec<String>>;

    /// Contents of a named entry.
    fn read_entry(&self, name: &str) -> io::Result<String>;
}

/// A [`MigrationSource`] over a directory on disk.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MigrationSource for DirSource {
    fn list_entries(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // A name that is not valid UTF-8 cannot match the pattern.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn read_entry(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(name))
    }
}

/// Metadata parsed from one artifact name.
#[derive(Debug)]
struct NameInfo {
    name: String,
    version: i64,
    direction: Direction,
    ext: String,
}

/// Parse an entry name.  `None` means the name is not a migration artifact.
fn parse_name(name: &str) -> Result<Option<NameInfo>> {
    let Some(caps) = NAME_PATTERN.captures(name) else {
        return Ok(None);
    };

    // Versions start at 1; a parse failure here means the digit run
    // overflows an i64.
    let version = caps[1]
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| MigrateError::InvalidVersion {
            name: name.to_string(),
        })?;

    let direction = if caps[2].eq_ignore_ascii_case("up") {
        Direction::Up
    } else {
        Direction::Down
    };

    Ok(Some(NameInfo {
        name: name.to_string(),
        version,
        direction,
        ext: caps[3].to_string(),
    }))
}

/// Group artifact metadata by version.  Leading zeros collapse, so
/// `01_up.sql` and `1_up.sql` land in the same group.
fn group_by_version(source: &dyn MigrationSource) -> Result<BTreeMap<i64, Vec<NameInfo>>> {
    let mut groups: BTreeMap<i64, Vec<NameInfo>> = BTreeMap::new();
    for name in source.list_entries()? {
        match parse_name(&name)? {
            Some(info) => groups.entry(info.version).or_default().push(info),
            None => tracing::debug!(name = %name, "ignoring non-migration entry"),
        }
    }
    Ok(groups)
}

/// Build one migration from a version group, validating as the artifacts
/// are read.
fn migration_from_group(
    source: &dyn MigrationSource,
    version: i64,
    infos: &[NameInfo],
) -> Result<ScriptMigration> {
    let mut up: Option<String> = None;
    let mut down: Option<String> = None;
    let mut ext: Option<&str> = None;

    for info in infos {
        let contents = source.read_entry(&info.name)?;

        // Extensions must agree within one version, compared verbatim.
        if let Some(seen) = ext {
            if seen != info.ext.as_str() {
                return Err(MigrateError::MixedExtensions { version });
            }
        }
        ext = Some(info.ext.as_str());

        let slot = match info.direction {
            Direction::Up => &mut up,
            Direction::Down => &mut down,
        };
        if slot.is_some() {
            return Err(MigrateError::DuplicateMigration {
                direction: info.direction,
                version,
            });
        }
        *slot = Some(contents);
    }

    let up = up.ok_or(MigrateError::MissingMigration { version })?;
    Ok(ScriptMigration::new(version, up, down.unwrap_or_default()))
}

/// Discover migrations in a source, ascending by version.
///
/// No gap check happens here; gaps are detected at apply time relative to
/// the database's current version.
pub fn discover(source: &dyn MigrationSource) -> Result<Vec<ScriptMigration>> {
    let groups = group_by_version(source)?;

    let mut migrations = Vec::with_capacity(groups.len());
    for (version, infos) in &groups {
        migrations.push(migration_from_group(source, *version, infos)?);
    }

    tracing::debug!(count = migrations.len(), "discovered migrations");
    Ok(migrations)
}

/// Discover migrations in a directory on disk.
pub fn migrations_from_dir(dir: impl AsRef<Path>) -> Result<Vec<ScriptMigration>> {
    discover(&DirSource::new(dir.as_ref()))
}
