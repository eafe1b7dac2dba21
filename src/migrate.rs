//! Versioned schema migrations read from a directory of SQL scripts.
//!
//! Each version `N` has an `N.up.sql` script and, to be reversible, an `N.down.sql` script.
//! Applied steps are recorded in a `migrations (id, version)` history table; the row with the
//! highest id holds the current version, `0` being the empty database.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::args;
use crate::db::Db;
use crate::error::SqlKitError;
use crate::query_builder::raw;
use crate::transaction::Scope;

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (id INT PRIMARY KEY, version INT)";

/// Which scripts a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    Up,
    Down,
}

impl Direction {
    fn suffix(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up | Direction::None => "up",
        }
    }
}

/// One row of the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Migration {
    pub id: i64,
    pub version: i64,
}

/// Compute the direction and the ordered versions whose scripts move `current` to `desired`.
///
/// `versions` must be sorted ascending. Migrating down to `v` leaves `v` applied, so the
/// path runs from `current` down to the version just after `desired`.
///
/// # Errors
/// [`SqlKitError::Migration`] for a zero entry in `versions`, or a current or desired version
/// that is neither `0` nor listed.
pub fn solve(current: i64, desired: i64, versions: &[i64]) -> Result<(Direction, Vec<i64>), SqlKitError> {
    if let Some(idx) = versions.iter().position(|&v| v == 0) {
        return Err(SqlKitError::Migration(format!(
            "invalid version at index ({idx}) must be non-zero"
        )));
    }
    let position = |version: i64| -> Option<usize> {
        if version == 0 {
            Some(0)
        } else {
            versions.iter().position(|&v| v == version).map(|idx| idx + 1)
        }
    };
    let current_idx = position(current)
        .ok_or_else(|| SqlKitError::Migration(format!("could not find current version: {current}")))?;
    let desired_idx = position(desired)
        .ok_or_else(|| SqlKitError::Migration(format!("could not find desired version: {desired}")))?;

    Ok(match desired_idx.cmp(&current_idx) {
        std::cmp::Ordering::Equal => (Direction::None, Vec::new()),
        std::cmp::Ordering::Greater => (Direction::Up, versions[current_idx..desired_idx].to_vec()),
        std::cmp::Ordering::Less => {
            let mut path = versions[desired_idx..current_idx].to_vec();
            path.reverse();
            (Direction::Down, path)
        }
    })
}

/// Applies migration scripts from `dir` to `db`.
#[derive(Debug, Clone)]
pub struct Migrator {
    db: Db,
    dir: PathBuf,
}

impl Migrator {
    pub fn new(db: Db, dir: impl Into<PathBuf>) -> Self {
        Migrator { db, dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Versions that have an `up` script, ascending.
    ///
    /// # Errors
    /// I/O errors reading the directory, or a script whose name does not start with a number.
    pub async fn versions(&self) -> Result<Vec<i64>, SqlKitError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, &e))?;
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.dir, &e))? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.contains(".up.") {
                continue;
            }
            let head = name.split('.').next().unwrap_or_default();
            let version = head.parse::<i64>().map_err(|e| {
                SqlKitError::Migration(format!("failed to parse version from ({name}): {e}"))
            })?;
            versions.push(version);
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// History rows, newest first. Creates the history table when missing.
    ///
    /// # Errors
    /// Database errors.
    pub async fn history(&self) -> Result<Vec<Migration>, SqlKitError> {
        self.db.exec(Scope::background(), &raw(HISTORY_TABLE, Vec::new())).await?;
        let stmt = self
            .db
            .select(["id", "version"])
            .from("migrations")
            .order_by(["id DESC"]);
        self.db.query(Scope::background(), &stmt).await?.decode_all()
    }

    /// The version recorded by the newest history row, `0` when nothing was applied.
    ///
    /// # Errors
    /// Database errors.
    pub async fn current_version(&self) -> Result<i64, SqlKitError> {
        Ok(self.history().await?.first().map_or(0, |m| m.version))
    }

    /// Migrate to `desired`; `0` runs every down script.
    ///
    /// Each step runs its script and records the resulting version in one transaction, so a
    /// failing step leaves the database at the previous version. Returns the direction taken.
    ///
    /// # Errors
    /// [`solve`] errors, missing scripts, or the first failing step's error.
    pub async fn migrate(&self, desired: i64) -> Result<Direction, SqlKitError> {
        let history = self.history().await?;
        let (mut next_id, current) = history
            .first()
            .map_or((1, 0), |m| (m.id + 1, m.version));
        let versions = self.versions().await?;
        let (direction, path) = solve(current, desired, &versions)?;

        for version in path {
            let script = self.read_script(version, direction).await?;
            let reached = match direction {
                Direction::Down => previous_version(&versions, version),
                Direction::Up | Direction::None => version,
            };
            tracing::info!(target: "sqlkit", version, ?direction, "applying migration");

            let db = self.db.clone();
            let id = next_id;
            self.db
                .transact(Scope::background(), |tx| async move {
                    tx.execute_batch(&script).await?;
                    let record = db
                        .insert()
                        .into("migrations")
                        .columns(["id", "version"])
                        .values(args![id, reached]);
                    db.exec(&tx, &record).await?;
                    Ok(())
                })
                .await?;
            next_id += 1;
        }
        Ok(direction)
    }

    async fn read_script(&self, version: i64, direction: Direction) -> Result<String, SqlKitError> {
        let path = self.dir.join(format!("{version}.{}.sql", direction.suffix()));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(&path, &e))
    }
}

fn previous_version(versions: &[i64], version: i64) -> i64 {
    versions
        .iter()
        .take_while(|&&v| v < version)
        .last()
        .copied()
        .unwrap_or(0)
}

fn io_error(path: &Path, err: &std::io::Error) -> SqlKitError {
    SqlKitError::Migration(format!("{}: {err}", path.display()))
}
