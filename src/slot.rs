// Durable key-value slots backing the task store

use eyre::{Context, Result};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// String-keyed, string-valued durable storage
///
/// Writes must be durable by the time `write` returns: a fresh `read` of
/// the same key (from this or another handle) sees the new value.
pub trait KeyValueSlot {
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl<S: KeyValueSlot + ?Sized> KeyValueSlot for Box<S> {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).write(key, value)
    }
}

/// Validate a slot key
///
/// Keys double as file names for [`FileSlot`], so they are restricted to
/// alphanumerics, `_` and `-`.
pub fn validate_key(key: &str) -> std::result::Result<(), String> {
    if key.is_empty() {
        return Err("Slot key cannot be empty".to_string());
    }
    if key.len() > 64 {
        return Err(format!("Slot key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("Invalid slot key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

fn check_key(key: &str) -> io::Result<()> {
    validate_key(key).map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))
}

// ============================================================================
// File-backed slot
// ============================================================================

/// One JSON file per key inside a directory
///
/// Writers hold an exclusive lock on `<dir>/.lock` and replace the file via
/// rename, so a concurrent reader never sees a half-written value.
#[derive(Debug)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Open or create a slot directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create slot directory")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_file(&self) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(".lock"))
    }
}

impl KeyValueSlot for FileSlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        check_key(key)?;
        let lock = self.lock_file()?;
        lock.lock_shared()?;

        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        check_key(key)?;
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));

        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &target)?;

        debug!(path = ?target, bytes = value.len(), "FileSlot::write: replaced");

        // Lock is released when `lock` is dropped
        Ok(())
    }
}

// ============================================================================
// SQLite-backed slot
// ============================================================================

/// Key-value table in a SQLite database
pub struct SqliteSlot {
    db: Connection,
}

impl SqliteSlot {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        debug!("Creating slot schema");
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .context("Failed to create slot schema")?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Connection {
        &self.db
    }
}

impl KeyValueSlot for SqliteSlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        check_key(key)?;
        self.db
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(io::Error::other)
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        check_key(key)?;
        self.db
            .execute(
                "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now_ms()],
            )
            .map_err(io::Error::other)?;
        debug!(key, bytes = value.len(), "SqliteSlot::write: replaced");
        Ok(())
    }
}

// ============================================================================
// In-memory slot
// ============================================================================

/// Non-durable slot for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    entries: HashMap<String, String>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueSlot for MemorySlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
