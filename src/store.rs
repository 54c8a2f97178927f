// Generic store implementation using JSONL + SQLite

use crate::jsonl;
use crate::record::Record;
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CURRENT_VERSION: u32 = 1;
const STORE_DIR: &str = ".meshek";
const DB_FILE: &str = "meshek.db";

/// Persistent store with JSONL files as source of truth and SQLite as read cache
pub struct Store {
    base_path: PathBuf,
    db: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store lives in a `.meshek` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self { base_path, db };

        store.create_schema()?;
        store.create_gitignore()?;
        store.write_version()?;

        if store.is_stale()? {
            info!("Database is stale, syncing from JSONL files");
            store.sync()?;
        }

        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);

            -- Sync metadata for staleness detection
            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "meshek.db\nmeshek.db-shm\nmeshek.db-wal\n")?;
        }
        Ok(())
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    fn jsonl_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Check if the database needs syncing from JSONL
    ///
    /// Returns true if any JSONL file was modified since the last sync or
    /// write through this store, or has never been synced.
    pub fn is_stale(&self) -> Result<bool> {
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            let collection = match path.file_stem().and_then(|s| s.to_str()) {
                Some(c) => c,
                None => continue,
            };

            let file_mtime = file_mtime(&path)?;

            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored_mtime {
                None => return Ok(true),                              // Never synced
                Some(mtime) if file_mtime > mtime => return Ok(true), // File modified
                _ => continue,
            }
        }

        Ok(false)
    }

    // ========================================================================
    // CRUD API
    // ========================================================================

    /// Create a new record, or write a new version of an existing one
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let collection = T::collection_name();
        Self::validate_collection_name(collection)?;

        let id = record.id().to_string();
        Self::validate_id(&id)?;

        // 1. Append to JSONL
        jsonl::append_jsonl(&self.jsonl_path(collection), &record)?;

        // 2. Mirror into SQLite
        let data_json = serde_json::to_string(&record).context("Failed to serialize record")?;
        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![collection, &id, data_json, record.updated_at()],
        )?;
        tx.commit()?;

        self.mark_synced(collection)?;
        debug!(collection, id = %id, "Record written");

        Ok(id)
    }

    /// Get a record by ID
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let collection = T::collection_name();

        let json: Option<String> = self
            .db
            .query_row(
                "SELECT data_json FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let record: T = serde_json::from_str(&json).context("Failed to deserialize record from database")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Update a record (same as create)
    pub fn update<T: Record>(&mut self, record: T) -> Result<()> {
        self.create(record)?;
        Ok(())
    }

    /// Delete a record, returning false if it did not exist
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        let collection = T::collection_name();

        let current: Option<i64> = self
            .db
            .query_row(
                "SELECT updated_at FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(false);
        };

        // 1. Append tombstone to JSONL, newer than the record it replaces
        let tombstone = serde_json::json!({
            "id": id,
            "deleted": true,
            "updated_at": now_ms().max(current + 1),
        });
        jsonl::append_jsonl(&self.jsonl_path(collection), &tombstone)?;

        // 2. Delete from SQLite
        self.db.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;

        self.mark_synced(collection)?;
        debug!(collection, id, "Record deleted");

        Ok(true)
    }

    /// List all records of a collection, most recently updated first
    pub fn list<T: Record>(&self) -> Result<Vec<T>> {
        let collection = T::collection_name();

        let mut stmt = self
            .db
            .prepare("SELECT data_json FROM records WHERE collection = ?1 ORDER BY updated_at DESC")?;

        let rows = stmt.query_map([collection], |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for row_result in rows {
            let data_json = row_result?;
            let record: T = serde_json::from_str(&data_json).context("Failed to deserialize record")?;
            results.push(record);
        }

        Ok(results)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Record the current JSONL mtime so our own writes don't look like external changes
    fn mark_synced(&self, collection: &str) -> Result<()> {
        let mtime = file_mtime(&self.jsonl_path(collection))?;
        self.db.execute(
            "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![collection, now_ms(), mtime],
        )?;
        Ok(())
    }

    fn validate_collection_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(eyre!("Collection name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Collection name too long: {} (max 64 chars)", name));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!(
                "Invalid collection name: {} (must be alphanumeric with _/-)",
                name
            ));
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(eyre!("Record ID cannot be empty or whitespace-only"));
        }

        if id.len() > 256 {
            return Err(eyre!("Record ID too long: {} chars (max 256)", id.len()));
        }

        Ok(())
    }

    // ========================================================================
    // Sync operations
    // ========================================================================

    /// Rebuild the SQLite cache from the JSONL files
    pub fn sync(&mut self) -> Result<()> {
        info!("Syncing database from JSONL files");

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM sync_metadata", [])?;

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            let collection = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre!("Invalid JSONL filename: {:?}", path))?;

            debug!("Syncing collection: {}", collection);

            let mtime = file_mtime(&path)?;
            let records = jsonl::read_jsonl_latest(&path)?;

            for (id, record) in records {
                if jsonl::is_tombstone(&record) {
                    continue;
                }

                let data_json = serde_json::to_string(&record)?;
                tx.execute(
                    "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![collection, &id, data_json, jsonl::updated_at_of(&record)],
                )?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, now_ms(), mtime],
            )?;
        }

        tx.commit()?;
        info!("Sync complete");
        Ok(())
    }
}

fn file_mtime(path: &Path) -> Result<i64> {
    if !path.exists() {
        return Ok(0);
    }
    let mtime = fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(mtime)
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
