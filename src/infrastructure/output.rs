//! Run output files

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::DomainError;

/// Writes the single JSON record a run produces
#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pretty-printed JSON, replacing any previous file
    pub async fn write<T: Serialize>(&self, value: &T) -> Result<(), DomainError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| DomainError::internal(format!("Failed to serialize output: {}", e)))?;
        write_text(&self.path, &json).await?;
        info!(path = %self.path.display(), "Output written");
        Ok(())
    }
}

/// Write a file, creating missing parent directories
pub async fn write_text(path: &Path, contents: &str) -> Result<(), DomainError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DomainError::internal(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DomainError::internal(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProvisioningResult;

    #[tokio::test]
    async fn test_writes_result_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("output").join("kb_output.json"));
        let result = ProvisioningResult::new("support", false).finish();

        writer.write(&result).await.unwrap();

        let written = tokio::fs::read_to_string(writer.path()).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["enabled"], false);
        assert_eq!(json["agent_name"], "support");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["ingestion"]["status"], "skipped");
        assert!(written.contains('\n'), "output should be pretty-printed");
    }

    #[tokio::test]
    async fn test_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb_output.json");
        write_text(&path, "stale").await.unwrap();

        ResultWriter::new(&path)
            .write(&serde_json::json!({ "status": "created" }))
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!written.contains("stale"));
    }
}
