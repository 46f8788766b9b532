//! Execution log document
//!
//! Written by the task runner once a container task has been placed on an
//! instance: the ECS `run-task` response plus an `appendex` section with the
//! instance it landed on. Only the fields ecsub reads are modeled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub appendex: Appendex,
    pub tasks: Vec<EcsTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appendex {
    pub instance_id: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcsTask {
    pub overrides: TaskOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverrides {
    pub container_overrides: Vec<ContainerOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerOverride {
    #[serde(default)]
    pub memory: u32,
    #[serde(default)]
    pub cpu: u32,
}

/// Cloud-side facts recovered from an execution log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFacts {
    pub instance_id: String,
    pub subnet_id: String,
    pub memory: u32,
    pub vcpu: u32,
}

impl ExecutionLog {
    /// Facts of the first container of the first task
    ///
    /// Returns `None` when the document has no task or container override.
    pub fn instance_facts(&self) -> Option<InstanceFacts> {
        let container = self.tasks.first()?.overrides.container_overrides.first()?;

        Some(InstanceFacts {
            instance_id: self.appendex.instance_id.clone(),
            subnet_id: self.appendex.subnet_id.clone(),
            memory: container.memory,
            vcpu: container.cpu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_facts() {
        let log: ExecutionLog = serde_json::from_str(
            r#"{
                "appendex": {"instance_id": "i-0abc", "subnet_id": "subnet-1"},
                "tasks": [{
                    "taskArn": "arn:aws:ecs:::task/1",
                    "overrides": {"containerOverrides": [{"name": "main", "memory": 4096, "cpu": 2048}]}
                }],
                "failures": []
            }"#,
        )
        .unwrap();

        assert_eq!(
            log.instance_facts(),
            Some(InstanceFacts {
                instance_id: "i-0abc".to_string(),
                subnet_id: "subnet-1".to_string(),
                memory: 4096,
                vcpu: 2048,
            })
        );
    }

    #[test]
    fn test_no_tasks_yields_no_facts() {
        let log: ExecutionLog = serde_json::from_str(
            r#"{"appendex": {"instance_id": "i-0abc", "subnet_id": "subnet-1"}, "tasks": []}"#,
        )
        .unwrap();

        assert_eq!(log.instance_facts(), None);
    }

    #[test]
    fn test_missing_appendex_is_rejected() {
        let parsed = serde_json::from_str::<ExecutionLog>(r#"{"tasks": []}"#);
        assert!(parsed.is_err());
    }
}
