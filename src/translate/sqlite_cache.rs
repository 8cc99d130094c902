//! Persistent local translation cache backed by SQLite.
//! Keyed by (target language, source text) as a composite primary key.
//! Survives restarts on the same client; not shared across clients.
//! No TTL: entries are never expired.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::{CacheEntry, LangCode, TranslateError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS translation_cache (
        tgt_lang TEXT NOT NULL,
        source_text TEXT NOT NULL,
        translated_text TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (tgt_lang, source_text)
    );";

/// SQLite-backed translation cache.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, TranslateError> {
        let conn = Connection::open(db_path)
            .map_err(|e| TranslateError::Storage(format!("failed to open SQLite cache: {e}")))?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TranslateError::Storage(format!("PRAGMA failed: {e}")))?;

        let cache = Self::with_connection(conn)?;
        info!(path = %db_path.display(), "SQLite translation cache opened");
        Ok(cache)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, TranslateError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TranslateError::Storage(format!("failed to open SQLite cache: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, TranslateError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| TranslateError::Storage(format!("create table failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up a cached translation. Read errors are logged and treated as a miss.
    pub fn get(&self, lang: LangCode, source_text: &str) -> Option<String> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                "SELECT translated_text FROM translation_cache
                 WHERE tgt_lang = ?1 AND source_text = ?2",
                params![lang.as_str(), source_text],
                |row| row.get(0),
            )
            .optional();

        match result {
            Ok(hit) => {
                if hit.is_some() {
                    debug!(lang = %lang, "persistent cache hit");
                }
                hit
            }
            Err(e) => {
                warn!(error = %e, "persistent cache read failed");
                None
            }
        }
    }

    /// Insert or replace one translation.
    pub fn insert(
        &self,
        lang: LangCode,
        source_text: &str,
        translated_text: &str,
    ) -> Result<(), TranslateError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO translation_cache
             (tgt_lang, source_text, translated_text, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![lang.as_str(), source_text, translated_text, now_unix()],
        )
        .map_err(|e| TranslateError::Storage(format!("insert failed: {e}")))?;
        Ok(())
    }

    /// Insert many translations for one language in a single transaction.
    pub fn insert_many(&self, entries: &[CacheEntry]) -> Result<usize, TranslateError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| TranslateError::Storage(format!("begin failed: {e}")))?;
        let now = now_unix();
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO translation_cache
                     (tgt_lang, source_text, translated_text, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| TranslateError::Storage(format!("prepare failed: {e}")))?;
            for entry in entries {
                stmt.execute(params![
                    entry.target_lang.as_str(),
                    entry.source_text,
                    entry.translated_text,
                    now
                ])
                    .map_err(|e| TranslateError::Storage(format!("insert failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| TranslateError::Storage(format!("commit failed: {e}")))?;
        Ok(entries.len())
    }

    /// Number of persisted entries for a language.
    pub fn count(&self, lang: LangCode) -> usize {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM translation_cache WHERE tgt_lang = ?1",
            params![lang.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .unwrap_or_else(|e| {
            warn!(error = %e, "persistent cache count failed");
            0
        })
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
