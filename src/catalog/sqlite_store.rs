//! SQLite implementation of CatalogStore trait

use crate::catalog::{CatalogStore, Track};
use crate::error::CatalogError;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use rusqlite::{params, Connection, Row};
use log::{debug, info};

/// SQLite implementation of CatalogStore. The collection is a single table;
/// `filename` is indexed but deliberately not unique.
pub struct SQLiteCatalogStore {
    conn: Mutex<Connection>,
    collection: String,
}

fn validate_collection(collection: &str) -> Result<(), CatalogError> {
    let valid = !collection.is_empty()
        && collection.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidCollection(collection.to_string()))
    }
}

// Type mismatches in a stored row are a decoding problem, not a query failure.
fn decode_error(e: rusqlite::Error) -> CatalogError {
    match e {
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => CatalogError::Decode(e.to_string()),
        other => CatalogError::Sqlite(other),
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        filename: row.get(0)?,
        path: row.get(1)?,
        uploaded: row.get(2)?,
    })
}

impl SQLiteCatalogStore {
    /// Open (or create) the catalog database file
    pub fn open(db_path: impl AsRef<Path>, collection: &str, wal_mode: bool) -> Result<Self, CatalogError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CatalogError::Unavailable(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(db_path)?;
        if wal_mode {
            let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("SQLite journal mode: {}", mode);
        }
        info!("Opened catalog database at {}", db_path.display());
        Self::with_connection(conn, collection)
    }

    /// Open a private in-memory catalog
    pub fn open_in_memory(collection: &str) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, collection)
    }

    fn with_connection(conn: Connection, collection: &str) -> Result<Self, CatalogError> {
        validate_collection(collection)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {c} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                path TEXT NOT NULL,
                uploaded INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {c}_filename_idx ON {c} (filename);",
            c = collection
        ))?;
        info!("Catalog collection ready: {}", collection);
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    /// Name of the backing collection
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog connection lock poisoned".to_string()))
    }
}

impl CatalogStore for SQLiteCatalogStore {
    fn count_by_filename(&self, filename: &str) -> Result<u64, CatalogError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE filename = ?1", self.collection),
            params![filename],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn insert_many(&self, tracks: &[Track]) -> Result<(), CatalogError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (filename, path, uploaded) VALUES (?1, ?2, ?3)",
                self.collection
            ))?;
            for track in tracks {
                stmt.execute(params![track.filename, track.path, track.uploaded])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} records into {}", tracks.len(), self.collection);
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<Track>, CatalogError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT filename, path, uploaded FROM {}", self.collection))?;
        let rows = stmt.query_map([], track_from_row)?;

        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row.map_err(decode_error)?);
        }
        Ok(tracks)
    }

    fn delete_one(&self, filename: &str) -> Result<u64, CatalogError> {
        let conn = self.connection()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {c} WHERE id = (SELECT id FROM {c} WHERE filename = ?1 LIMIT 1)",
                c = self.collection
            ),
            params![filename],
        )?;
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_catalog_store_basic_operations() {
        let store = SQLiteCatalogStore::open_in_memory("mix_tape_songs").unwrap();

        assert_eq!(store.count_by_filename("track1.mp3").unwrap(), 0);
        store
            .insert_many(&[Track::new("track1.mp3", 100), Track::new("track2.mp3", 101)])
            .unwrap();
        assert_eq!(store.count_by_filename("track1.mp3").unwrap(), 1);

        let tracks = store.find_all().unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.contains(&Track::new("track2.mp3", 101)));

        assert_eq!(store.delete_one("track1.mp3").unwrap(), 1);
        assert_eq!(store.delete_one("track1.mp3").unwrap(), 0);
        assert_eq!(store.find_all().unwrap(), vec![Track::new("track2.mp3", 101)]);
    }

    #[test]
    fn test_sqlite_catalog_store_allows_duplicate_filenames() {
        let store = SQLiteCatalogStore::open_in_memory("mix_tape_songs").unwrap();
        store.insert_many(&[Track::new("dup.mp3", 1)]).unwrap();
        store.insert_many(&[Track::new("dup.mp3", 2)]).unwrap();
        assert_eq!(store.count_by_filename("dup.mp3").unwrap(), 2);

        // delete removes one record at a time
        assert_eq!(store.delete_one("dup.mp3").unwrap(), 1);
        assert_eq!(store.count_by_filename("dup.mp3").unwrap(), 1);
    }

    #[test]
    fn test_sqlite_catalog_store_reports_decode_errors() {
        let store = SQLiteCatalogStore::open_in_memory("mix_tape_songs").unwrap();
        store
            .connection()
            .unwrap()
            .execute(
                "INSERT INTO mix_tape_songs (filename, path, uploaded) VALUES ('x.mp3', '/songs/x.mp3', 'yesterday')",
                [],
            )
            .unwrap();
        assert!(matches!(store.find_all(), Err(CatalogError::Decode(_))));
    }

    #[test]
    fn test_sqlite_catalog_store_rejects_bad_collection_names() {
        assert!(matches!(
            SQLiteCatalogStore::open_in_memory("songs; DROP TABLE x"),
            Err(CatalogError::InvalidCollection(_))
        ));
        assert!(SQLiteCatalogStore::open_in_memory("").is_err());
    }

    #[test]
    fn test_sqlite_catalog_store_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db").join("catalog.sqlite");
        {
            let store = SQLiteCatalogStore::open(&db_path, "mix_tape_songs", true).unwrap();
            store.insert_many(&[Track::new("kept.mp3", 7)]).unwrap();
        }
        let reopened = SQLiteCatalogStore::open(&db_path, "mix_tape_songs", true).unwrap();
        assert_eq!(reopened.collection(), "mix_tape_songs");
        assert_eq!(reopened.find_all().unwrap(), vec![Track::new("kept.mp3", 7)]);
    }
}
