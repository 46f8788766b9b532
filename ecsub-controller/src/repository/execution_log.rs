//! Execution log reader

use ecsub_core::dto::execution_log::ExecutionLog;
use std::path::Path;

use crate::error::ExecutionLogError;

/// Reads the execution log a job's external tooling left behind
pub fn read_execution_log(path: &Path) -> Result<ExecutionLog, ExecutionLogError> {
    let bytes = std::fs::read(path).map_err(|source| ExecutionLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&bytes).map_err(|source| ExecutionLogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_execution_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-tasks.0.log");
        std::fs::write(
            &path,
            r#"{
                "appendex": {"instance_id": "i-7", "subnet_id": "subnet-2"},
                "tasks": [{"overrides": {"containerOverrides": [{"memory": 300, "cpu": 1024}]}}]
            }"#,
        )
        .unwrap();

        let facts = read_execution_log(&path).unwrap().instance_facts().unwrap();
        assert_eq!(facts.instance_id, "i-7");
        assert_eq!(facts.vcpu, 1024);
    }

    #[test]
    fn test_missing_and_malformed_logs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.log");
        assert!(matches!(
            read_execution_log(&missing),
            Err(ExecutionLogError::Io { .. })
        ));

        let broken = dir.path().join("broken.log");
        std::fs::write(&broken, "{not json").unwrap();
        assert!(matches!(
            read_execution_log(&broken),
            Err(ExecutionLogError::Parse { .. })
        ));
    }
}
