//! 성계 레지스트리 -- 성계 이름 → 대리 키 저장소
//!
//! # 백엔드
//! - [`SqliteRegistry`]: 단일 파일, 기본값
//! - [`PostgresRegistry`]: 연결 풀 기반
//!
//! 두 백엔드 모두 `systems(system_id, name)` 테이블과 `name` 유일 인덱스를 만들고,
//! 등록은 충돌 시 기존 ID를 돌려주는 단일 조건부 INSERT로 수행합니다.
//! 모든 쿼리는 바인드 파라미터를 사용합니다.

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresRegistry;
pub use sqlite::SqliteRegistry;

use std::sync::Arc;
use std::time::Duration;

use warden_core::config::RegistryConfig;
use warden_core::error::StorageError;
use warden_core::pipeline::SystemRegistry;

/// 설정에 따라 레지스트리 백엔드를 연결합니다.
pub async fn connect(config: &RegistryConfig) -> Result<Arc<dyn SystemRegistry>, StorageError> {
    match config.backend.as_str() {
        "sqlite" => {
            let path = config.sqlite_path.clone();
            let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
            let registry = tokio::task::spawn_blocking(move || {
                SqliteRegistry::open(path, busy_timeout)
            })
            .await
            .map_err(|e| StorageError::Connection(format!("blocking task failed: {e}")))??;
            Ok(Arc::new(registry))
        }
        "postgres" => {
            let registry = PostgresRegistry::connect(
                &config.postgres_url,
                config.pool_size,
                Duration::from_millis(config.query_timeout_ms),
            )
            .await?;
            Ok(Arc::new(registry))
        }
        other => Err(StorageError::Connection(format!(
            "unknown registry backend '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_sqlite_in_memory() {
        let config = RegistryConfig {
            sqlite_path: ":memory:".to_owned(),
            ..Default::default()
        };
        let registry = connect(&config).await.unwrap();
        assert_eq!(registry.backend(), "sqlite");
        assert_eq!(registry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn connect_sqlite_file_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig {
            sqlite_path: dir.path().join("warden.db").to_string_lossy().into_owned(),
            ..Default::default()
        };

        let registry = connect(&config).await.unwrap();
        registry.register_if_absent("Sol").await.unwrap();
        drop(registry);

        let reopened = connect(&config).await.unwrap();
        assert!(reopened.lookup("Sol").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = RegistryConfig {
            backend: "mongodb".to_owned(),
            ..Default::default()
        };
        let err = connect(&config).await.err().unwrap();
        assert!(err.to_string().contains("mongodb"));
    }
}
