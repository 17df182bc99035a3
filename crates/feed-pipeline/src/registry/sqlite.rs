//! SQLite 레지스트리 백엔드
//!
//! 단일 연결을 `Mutex`로 공유하고, 모든 호출은 `spawn_blocking`에서 실행합니다.
//! 다른 프로세스가 같은 파일을 열어도 유일 인덱스와 IMMEDIATE 트랜잭션이
//! 이름당 한 행을 보장합니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info};
use warden_core::error::StorageError;
use warden_core::pipeline::{BoxFuture, SystemRegistry};
use warden_core::types::{Registration, SystemId, SystemRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS systems (
    system_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS systems_name_key ON systems (name);
"#;

const IN_MEMORY: &str = ":memory:";

/// SQLite 기반 [`SystemRegistry`]
///
/// `AUTOINCREMENT`로 삭제된 ID도 재사용하지 않습니다.
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteRegistry {
    /// 파일을 열고 스키마를 생성합니다. `":memory:"`는 인메모리 DB로 엽니다.
    ///
    /// 블로킹 호출입니다. 비동기 컨텍스트에서는 [`super::connect`]를 사용합니다.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path).map_err(map_open_error)?;
        conn.busy_timeout(busy_timeout).map_err(map_open_error)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(map_open_error)?;
        debug!(path = %path.display(), journal_mode = %mode, "sqlite connection opened");

        Self::init(conn, path.to_path_buf())
    }

    /// 인메모리 DB를 엽니다. 연결이 닫히면 내용도 사라집니다.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(map_open_error)?;
        Self::init(conn, PathBuf::from(IN_MEMORY))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        info!(path = %path.display(), "sqlite registry ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Connection("sqlite connection lock poisoned".to_owned()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Query(format!("blocking task failed: {e}")))?
    }
}

fn insert_or_fetch(conn: &mut Connection, name: &str) -> Result<Registration, StorageError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(map_error)?;

    let inserted: Option<i64> = tx
        .query_row(
            "INSERT INTO systems (name) VALUES (?1) ON CONFLICT (name) DO NOTHING RETURNING system_id",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_error)?;

    let registration = match inserted {
        Some(id) => Registration::created(SystemId(id)),
        None => {
            let id: i64 = tx
                .query_row(
                    "SELECT system_id FROM systems WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .map_err(map_error)?;
            Registration::existing(SystemId(id))
        }
    };

    tx.commit().map_err(map_error)?;
    Ok(registration)
}

impl SystemRegistry for SqliteRegistry {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn lookup<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<SystemId>, StorageError>> {
        let name = name.to_owned();
        Box::pin(self.with_conn(move |conn| {
            conn.query_row(
                "SELECT system_id FROM systems WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(SystemId))
            .map_err(map_error)
        }))
    }

    fn register_if_absent<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Registration, StorageError>> {
        let name = name.to_owned();
        Box::pin(self.with_conn(move |conn| insert_or_fetch(conn, &name)))
    }

    fn get(&self, id: SystemId) -> BoxFuture<'_, Result<Option<SystemRecord>, StorageError>> {
        Box::pin(self.with_conn(move |conn| {
            conn.query_row(
                "SELECT system_id, name FROM systems WHERE system_id = ?1",
                params![id.get()],
                |row| {
                    Ok(SystemRecord {
                        system_id: SystemId(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(map_error)
        }))
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StorageError>> {
        Box::pin(self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM systems", [], |row| row.get(0))
                .map_err(map_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        }))
    }
}

fn map_open_error(err: rusqlite::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn map_error(err: rusqlite::Error) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StorageError::Constraint(err.to_string()),
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase,
        ) => StorageError::Connection(err.to_string()),
        _ => StorageError::Query(err.to_string()),
    }
}
