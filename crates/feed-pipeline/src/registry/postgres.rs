//! PostgreSQL 레지스트리 백엔드
//!
//! `deadpool-postgres` 풀을 공유합니다. 등록은 `ON CONFLICT DO NOTHING` 삽입과
//! 기존 행 조회를 묶은 단일 문으로 수행하므로 기존 행을 다시 쓰지 않습니다.
//! 풀 대기, 연결 생성, 재활용에는 모두 제한 시간이 걸립니다.

use std::time::Duration;

use deadpool_postgres::{
    Config as DeadpoolConfig, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod,
    Runtime, Timeouts,
};
use tokio_postgres::NoTls;
use tracing::info;
use warden_core::error::StorageError;
use warden_core::pipeline::{BoxFuture, SystemRegistry};
use warden_core::types::{Registration, SystemId, SystemRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS systems (
    system_id BIGSERIAL PRIMARY KEY,
    name      TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS systems_name_key ON systems (name);
"#;

/// 새 행이면 `(id, TRUE)`, 기존 행이면 `(id, FALSE)`.
///
/// 동시에 커밋된 행은 문 스냅샷에 보이지 않아 0행이 될 수 있습니다.
const INSERT_OR_SELECT: &str = "\
WITH ins AS (
    INSERT INTO systems (name) VALUES ($1)
    ON CONFLICT (name) DO NOTHING
    RETURNING system_id
)
SELECT system_id, TRUE FROM ins
UNION ALL
SELECT system_id, FALSE FROM systems
WHERE name = $1 AND NOT EXISTS (SELECT 1 FROM ins)";

const SELECT_ID: &str = "SELECT system_id FROM systems WHERE name = $1";

/// PostgreSQL 기반 [`SystemRegistry`]
pub struct PostgresRegistry {
    pool: Pool,
}

impl PostgresRegistry {
    /// 풀을 생성하고 스키마를 준비합니다.
    ///
    /// `timeout`은 연결 수립과 풀의 대기/생성/재활용에 각각 적용됩니다.
    pub async fn connect(
        url: &str,
        pool_size: usize,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let mut cfg = DeadpoolConfig::new();
        cfg.url = Some(url.to_owned());
        cfg.connect_timeout = Some(timeout);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool = PoolConfig::new(pool_size);
        pool.timeouts = Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        };
        cfg.pool = Some(pool);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Connection(format!("failed to create pool: {e}")))?;

        let registry = Self { pool };
        registry.migrate().await?;
        info!(
            pool_size,
            timeout_ms = timeout.as_millis() as u64,
            "postgres registry ready"
        );
        Ok(registry)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))
    }
}

impl SystemRegistry for PostgresRegistry {
    fn backend(&self) -> &str {
        "postgres"
    }

    fn lookup<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<SystemId>, StorageError>> {
        Box::pin(async move {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            let row = client
                .query_opt(SELECT_ID, &[&name])
                .await
                .map_err(map_error)?;
            Ok(row.map(|r| SystemId(r.get(0))))
        })
    }

    fn register_if_absent<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Registration, StorageError>> {
        Box::pin(async move {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            let row = client
                .query_opt(INSERT_OR_SELECT, &[&name])
                .await
                .map_err(map_error)?;
            if let Some(row) = row {
                let system_id = SystemId(row.get(0));
                let created: bool = row.get(1);
                return Ok(if created {
                    Registration::created(system_id)
                } else {
                    Registration::existing(system_id)
                });
            }

            // 충돌한 행이 문 실행 중에 커밋됨. 새 스냅샷으로 다시 읽음
            let row = client
                .query_opt(SELECT_ID, &[&name])
                .await
                .map_err(map_error)?
                .ok_or_else(|| {
                    StorageError::Query(format!("system '{name}' conflicted but is not visible"))
                })?;
            Ok(Registration::existing(SystemId(row.get(0))))
        })
    }

    fn get(&self, id: SystemId) -> BoxFuture<'_, Result<Option<SystemRecord>, StorageError>> {
        Box::pin(async move {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            let row = client
                .query_opt(
                    "SELECT system_id, name FROM systems WHERE system_id = $1",
                    &[&id.get()],
                )
                .await
                .map_err(map_error)?;
            Ok(row.map(|r| SystemRecord {
                system_id: SystemId(r.get(0)),
                name: r.get(1),
            }))
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StorageError>> {
        Box::pin(async move {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            let row = client
                .query_one("SELECT COUNT(*) FROM systems", &[])
                .await
                .map_err(map_error)?;
            let count: i64 = row.get(0);
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }
}

fn map_pool_error(err: PoolError) -> StorageError {
    StorageError::Connection(err.to_string())
}

/// SQLSTATE 클래스 08(연결), 23(무결성 제약)을 구분합니다.
/// 서버 응답이 없는 에러(SQLSTATE 없음)는 연결 장애로 취급합니다.
fn map_error(err: tokio_postgres::Error) -> StorageError {
    if err.is_closed() {
        return StorageError::Connection(err.to_string());
    }
    match err.code().map(|c| c.code()) {
        Some(code) if code.starts_with("08") => StorageError::Connection(err.to_string()),
        Some(code) if code.starts_with("23") => StorageError::Constraint(err.to_string()),
        Some(_) => StorageError::Query(err.to_string()),
        None => StorageError::Connection(err.to_string()),
    }
}
