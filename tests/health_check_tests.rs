use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use kg_memory_manager::{http::router, MemoryConfig, ResourceManager};

fn manager(dir: &std::path::Path) -> Result<Arc<ResourceManager>> {
    let config = MemoryConfig {
        output_directory: dir.to_path_buf(),
        ..MemoryConfig::default()
    };
    Ok(Arc::new(ResourceManager::new(config)?))
}

async fn call(manager: Arc<ResourceManager>, method: &str, uri: &str) -> Result<(StatusCode, Value)> {
    let response = router(manager)
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

/// Test the health and memory endpoints
#[cfg(test)]
mod health_check_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_basic() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (status, body) = call(manager(dir.path())?, "GET", "/health").await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server"], "kg-memory-manager");
        assert!(body["status"] == "ok" || body["status"] == "degraded");
        assert_eq!(body["sampling"], false);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_stats_endpoint() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = manager(dir.path())?;
        manager.cache_set("node", "n1", serde_json::json!({"name": "alpha"}), None);

        let (status, body) = call(manager, "GET", "/memory/stats").await?;
        assert_eq!(status, StatusCode::OK);

        let pools: Vec<&str> = body["pools"]
            .as_array()
            .map(|p| p.iter().filter_map(|s| s["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(pools, vec!["array", "buffer", "string"]);

        let node = body["caches"]
            .as_array()
            .and_then(|c| c.iter().find(|s| s["name"] == "node"))
            .cloned()
            .unwrap_or(Value::Null);
        assert_eq!(node["entries"], 1);
        assert_eq!(body["collector"]["status"], "unavailable");
        Ok(())
    }

    #[tokio::test]
    async fn test_report_endpoint_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (status, body) = call(manager(dir.path())?, "POST", "/memory/report").await?;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["session_id"].is_string());
        assert_eq!(body["capabilities"]["collector"], "unavailable");
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_optimize_endpoint() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (status, body) = call(manager(dir.path())?, "POST", "/memory/optimize").await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["runs"][0]["kind"], "normal");
        assert_eq!(body["runs"][0]["trigger"], "manual");
        Ok(())
    }
}
