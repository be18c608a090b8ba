//! SQLite-backed staging store.
//!
//! Both namespaces share one `WITHOUT ROWID` table keyed by the encoded
//! staging key. SQLite compares BLOBs with `memcmp`, so the table order is
//! the byte order the namespace bounds rely on.

use std::cell::Cell;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, params};
use sieve_core::{Namespace, StagedRecord, StagingError, StagingKey, StagingStore};
use thiserror::Error;

/// Errors raised while opening a staging database.
#[derive(Debug, Error)]
pub enum SqliteStagingError {
    /// The directory holding the database could not be created.
    #[error("failed to create staging directory {path}: {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open staging database at {path}: {source}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Applying connection pragmas failed.
    #[error("failed to configure staging database: {source}")]
    Configure {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the staging table failed.
    #[error("failed to create staging table: {source}")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Derive the staging database path for a list of input files.
///
/// The file name is the MD5 digest of the input path strings concatenated
/// in order, so the same input list always maps to the same database.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use sieve_data::staging_path_for;
///
/// let path = staging_path_for(Utf8Path::new("/tmp"), &["a.osm.pbf", "b.osm.pbf"]);
/// assert_eq!(path, staging_path_for(Utf8Path::new("/tmp"), &["a.osm.pbfb.osm.pbf"]));
/// assert_eq!(path.extension(), Some("db"));
/// ```
pub fn staging_path_for<P>(staging_dir: &Utf8Path, inputs: &[P]) -> Utf8PathBuf
where
    P: AsRef<str>,
{
    let mut joined = String::new();
    for input in inputs {
        joined.push_str(input.as_ref());
    }
    staging_dir.join(format!("{:x}.db", md5::compute(joined.as_bytes())))
}

/// Writes grouped into one SQLite transaction before it is committed.
const WRITE_BATCH_SIZE: u32 = 10_000;

/// Staging store persisted in a single SQLite table.
///
/// Writes run inside a transaction that is committed every
/// [`WRITE_BATCH_SIZE`] writes, on [`StagingStore::commit`], and when the
/// store is dropped. Reads on the same connection always see pending writes.
#[derive(Debug)]
pub struct SqliteStagingStore {
    connection: Connection,
    path: Option<Utf8PathBuf>,
    pending_writes: Cell<u32>,
}

impl SqliteStagingStore {
    /// Open or create the staging database at `path`.
    ///
    /// Missing parent directories are created. Existing content is kept;
    /// callers clear the store before a run.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteStagingError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            sieve_fs::ensure_dir(parent).map_err(|source| {
                SqliteStagingError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteStagingError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Opened staging database at {path}");
        Self::initialise(connection, Some(path.to_path_buf()))
    }

    /// Open a private in-memory staging database.
    pub fn open_in_memory() -> Result<Self, SqliteStagingError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteStagingError::Open {
                path: Utf8PathBuf::from(":memory:"),
                source,
            })?;
        Self::initialise(connection, None)
    }

    /// Location of the database file, or `None` when held in memory.
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    fn initialise(
        connection: Connection,
        path: Option<Utf8PathBuf>,
    ) -> Result<Self, SqliteStagingError> {
        // A failed run leaves a store that the next run clears, so durability
        // is not needed.
        connection
            .pragma_update_and_check(None, "journal_mode", "MEMORY", |row| {
                row.get::<_, String>(0)
            })
            .map_err(|source| SqliteStagingError::Configure { source })?;
        connection
            .pragma_update(None, "synchronous", "OFF")
            .map_err(|source| SqliteStagingError::Configure { source })?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS staging (
                    key BLOB PRIMARY KEY,
                    value BLOB NOT NULL
                ) WITHOUT ROWID",
                [],
            )
            .map_err(|source| SqliteStagingError::CreateSchema { source })?;
        Ok(Self {
            connection,
            path,
            pending_writes: Cell::new(0),
        })
    }

    /// Run one write inside the open batch, starting a new one if needed.
    fn write_batched<F>(&self, write: F) -> Result<(), SqliteError>
    where
        F: FnOnce(&Connection) -> Result<(), SqliteError>,
    {
        if self.connection.is_autocommit() {
            self.connection.execute_batch("BEGIN")?;
        }
        write(&self.connection)?;
        let pending = self.pending_writes.get() + 1;
        if pending >= WRITE_BATCH_SIZE {
            self.commit_pending()?;
        } else {
            self.pending_writes.set(pending);
        }
        Ok(())
    }

    fn commit_pending(&self) -> Result<(), SqliteError> {
        if !self.connection.is_autocommit() {
            self.connection.execute_batch("COMMIT")?;
        }
        self.pending_writes.set(0);
        Ok(())
    }
}

impl Drop for SqliteStagingStore {
    fn drop(&mut self) {
        if let Err(err) = self.commit_pending() {
            warn!("Failed to commit pending staging writes: {err}");
        }
    }
}

impl StagingStore for SqliteStagingStore {
    fn put(&self, namespace: Namespace, key: StagingKey, value: &[u8]) -> Result<(), StagingError> {
        self.write_batched(|connection| {
            connection
                .prepare_cached("INSERT OR REPLACE INTO staging (key, value) VALUES (?1, ?2)")?
                .execute(params![namespace.encode_key(key), value])
                .map(|_| ())
        })
        .map_err(|err| StagingError::backend("put", err))
    }

    fn get(&self, namespace: Namespace, key: StagingKey) -> Result<Option<Vec<u8>>, StagingError> {
        self.connection
            .prepare_cached("SELECT value FROM staging WHERE key = ?1")
            .and_then(|mut statement| {
                statement
                    .query_row([namespace.encode_key(key)], |row| row.get(0))
                    .optional()
            })
            .map_err(|err| StagingError::backend("get", err))
    }

    fn delete(&self, namespace: Namespace, key: StagingKey) -> Result<(), StagingError> {
        self.write_batched(|connection| {
            connection
                .prepare_cached("DELETE FROM staging WHERE key = ?1")?
                .execute([namespace.encode_key(key)])
                .map(|_| ())
        })
        .map_err(|err| StagingError::backend("delete", err))
    }

    fn scan(
        &self,
        namespace: Namespace,
        after: Option<StagingKey>,
        limit: usize,
    ) -> Result<Vec<StagedRecord>, StagingError> {
        let (lower, upper) = namespace.key_bounds();
        let cursor = after.map_or_else(|| lower.to_vec(), |key| namespace.encode_key(key));
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(Vec<u8>, Vec<u8>)> = self
            .connection
            .prepare_cached(
                "SELECT key, value FROM staging
                 WHERE key > ?1 AND key < ?2
                 ORDER BY key
                 LIMIT ?3",
            )
            .and_then(|mut statement| {
                let rows = statement.query_map(params![cursor, upper, limit], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                rows.collect()
            })
            .map_err(|err| StagingError::backend("scan", err))?;
        rows.into_iter()
            .map(|(raw, value)| {
                namespace
                    .decode_key(&raw)
                    .map(|key| (key, value))
                    .ok_or(StagingError::CorruptKey {
                        namespace,
                        key: raw,
                    })
            })
            .collect()
    }

    fn clear(&self) -> Result<(), StagingError> {
        self.write_batched(|connection| connection.execute("DELETE FROM staging", []).map(|_| ()))
            .map_err(|err| StagingError::backend("clear", err))
    }

    fn commit(&self) -> Result<(), StagingError> {
        self.commit_pending()
            .map_err(|err| StagingError::backend("commit", err))
    }
}
