use crate::backend::{ClusterBackend, ContainerInstanceRecord, Ec2Details, TaskRecord};
use crate::error::{EcsctlError, Result};
use chrono::{DateTime, Local, TimeZone};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::debug;

/// ECS rejects describe calls with more identifiers than this.
pub const DESCRIBE_BATCH_SIZE: usize = 100;

const NOT_AVAILABLE: &str = "N/A";
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct Ec2InstanceRow {
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    pub status: String,
    pub running_tasks: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRow {
    pub name: String,
    pub status: String,
    pub task_id: String,
    pub cpu: String,
    pub memory: String,
    pub created: String,
}

/// Queries over a cluster, each chaining several backend calls.
pub struct EcsController<B> {
    backend: B,
}

impl<B: ClusterBackend> EcsController<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Names of all clusters in the account and region.
    pub async fn get_clusters(&self) -> Result<Vec<String>> {
        let arns = self
            .backend
            .list_cluster_arns()
            .await
            .map_err(|e| EcsctlError::Clusters(e.to_string()))?;
        Ok(arns.iter().map(|arn| last_segment(arn).to_string()).collect())
    }

    pub async fn get_ec2_instances(&self, cluster_name: &str) -> Result<Vec<Ec2InstanceRow>> {
        self.ec2_instances(cluster_name)
            .await
            .map_err(|e| EcsctlError::Ec2Instances(e.to_string()))
    }

    async fn ec2_instances(
        &self,
        cluster_name: &str,
    ) -> std::result::Result<Vec<Ec2InstanceRow>, crate::backend::BackendError> {
        let arns = self
            .backend
            .list_container_instance_arns(cluster_name)
            .await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let mut container_instances: Vec<ContainerInstanceRecord> = Vec::new();
        for batch in arns.chunks(DESCRIBE_BATCH_SIZE) {
            container_instances.extend(
                self.backend
                    .describe_container_instances(cluster_name, batch)
                    .await?,
            );
        }

        // External (ECS Anywhere) instances carry `mi-` ids EC2 knows nothing about.
        let mut ec2_ids: Vec<String> = Vec::new();
        for id in container_instances
            .iter()
            .filter_map(|c| c.ec2_instance_id.as_deref())
            .filter(|id| id.starts_with("i-"))
        {
            if !ec2_ids.iter().any(|seen| seen == id) {
                ec2_ids.push(id.to_string());
            }
        }

        let mut details: HashMap<String, Ec2Details> = HashMap::new();
        for batch in ec2_ids.chunks(DESCRIBE_BATCH_SIZE) {
            for detail in self.backend.describe_ec2_instances(batch).await? {
                details.insert(detail.instance_id.clone(), detail);
            }
        }
        debug!(
            "Joined {} container instances with {} EC2 instances",
            container_instances.len(),
            details.len()
        );

        Ok(container_instances
            .into_iter()
            .map(|instance| {
                let instance_id = instance
                    .ec2_instance_id
                    .unwrap_or_else(|| UNKNOWN.to_string());
                let ec2 = details.get(&instance_id);
                Ec2InstanceRow {
                    instance_type: ec2
                        .map(|d| d.instance_type.clone())
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    state: ec2
                        .map(|d| d.state.clone())
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    status: instance.status.unwrap_or_else(|| UNKNOWN.to_string()),
                    running_tasks: instance.running_tasks,
                    instance_id,
                }
            })
            .collect())
    }

    pub async fn get_containers(&self, cluster_name: &str) -> Result<Vec<ContainerRow>> {
        self.containers(cluster_name)
            .await
            .map_err(|e| EcsctlError::Containers(e.to_string()))
    }

    async fn containers(
        &self,
        cluster_name: &str,
    ) -> std::result::Result<Vec<ContainerRow>, crate::backend::BackendError> {
        let arns = self.backend.list_task_arns(cluster_name).await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks: Vec<TaskRecord> = Vec::new();
        for batch in arns.chunks(DESCRIBE_BATCH_SIZE) {
            tasks.extend(self.backend.describe_tasks(cluster_name, batch).await?);
        }

        let mut rows = Vec::new();
        for task in tasks {
            let task_id = task
                .task_arn
                .as_deref()
                .map(last_segment)
                .unwrap_or(UNKNOWN)
                .to_string();
            let created = task
                .created_at
                .map(|secs| format_timestamp(secs, &Local))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            for container in task.containers {
                rows.push(ContainerRow {
                    name: container.name.unwrap_or_else(|| UNKNOWN.to_string()),
                    status: container
                        .last_status
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    task_id: task_id.clone(),
                    cpu: container.cpu.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    memory: container
                        .memory
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    created: created.clone(),
                });
            }
        }
        Ok(rows)
    }

    /// The row for `instance_id`, if that instance belongs to the cluster.
    pub async fn get_instance_details(
        &self,
        cluster_name: &str,
        instance_id: &str,
    ) -> Result<Option<Ec2InstanceRow>> {
        let instances = self
            .get_ec2_instances(cluster_name)
            .await
            .map_err(|e| EcsctlError::InstanceDetails(e.to_string()))?;
        Ok(instances
            .into_iter()
            .find(|instance| instance.instance_id == instance_id))
    }

    /// Whether SSM knows the instance. Lookup failures count as unavailable.
    pub async fn check_ssm_status(&self, instance_id: &str) -> bool {
        match self.backend.ssm_instance_count(instance_id).await {
            Ok(count) => count > 0,
            Err(e) => {
                debug!("SSM lookup for {} failed: {}", instance_id, e);
                false
            }
        }
    }
}

fn last_segment(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

fn format_timestamp<Tz>(secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ContainerRecord, MockClusterBackend};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn container_instance(id: &str, status: &str, tasks: i32) -> ContainerInstanceRecord {
        ContainerInstanceRecord {
            ec2_instance_id: Some(id.to_string()),
            status: Some(status.to_string()),
            running_tasks: tasks,
        }
    }

    fn ec2(id: &str, instance_type: &str, state: &str) -> Ec2Details {
        Ec2Details {
            instance_id: id.to_string(),
            instance_type: instance_type.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(
            last_segment("arn:aws:ecs:ap-southeast-1:123:cluster/prod"),
            "prod"
        );
        assert_eq!(
            last_segment("arn:aws:ecs:us-east-1:123:task/prod/abc123"),
            "abc123"
        );
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn test_format_timestamp_utc() {
        assert_eq!(format_timestamp(0, &Utc), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000, &Utc), "2023-11-14 22:13:20");
    }

    #[tokio::test]
    async fn test_get_clusters_strips_arn_prefix() {
        let mut backend = MockClusterBackend::new();
        backend.expect_list_cluster_arns().times(1).returning(|| {
            Ok(vec![
                "arn:aws:ecs:ap-southeast-1:123:cluster/prod".to_string(),
                "arn:aws:ecs:ap-southeast-1:123:cluster/staging".to_string(),
            ])
        });

        let controller = EcsController::new(backend);
        assert_eq!(
            controller.get_clusters().await.unwrap(),
            vec!["prod".to_string(), "staging".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_clusters_error_is_wrapped() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_cluster_arns()
            .returning(|| Err(BackendError("AccessDenied".to_string())));

        let err = EcsController::new(backend).get_clusters().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to get clusters: AccessDenied");
    }

    #[tokio::test]
    async fn test_ec2_instances_empty_cluster_skips_describe() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(|_| Ok(vec![]));
        backend.expect_describe_container_instances().never();
        backend.expect_describe_ec2_instances().never();

        let rows = EcsController::new(backend)
            .get_ec2_instances("prod")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_ec2_instances_join_in_ecs_order() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .withf(|cluster| cluster == "prod")
            .returning(|_| Ok(vec!["ci/1".to_string(), "ci/2".to_string()]));
        backend
            .expect_describe_container_instances()
            .withf(|cluster, arns| cluster == "prod" && arns.len() == 2)
            .returning(|_, _| {
                Ok(vec![
                    container_instance("i-bbb", "ACTIVE", 3),
                    container_instance("i-aaa", "DRAINING", 0),
                ])
            });
        backend
            .expect_describe_ec2_instances()
            .withf(|ids| ids == ["i-bbb".to_string(), "i-aaa".to_string()])
            .times(1)
            .returning(|_| {
                Ok(vec![
                    ec2("i-aaa", "t3.small", "stopped"),
                    ec2("i-bbb", "m5.large", "running"),
                ])
            });

        let rows = EcsController::new(backend)
            .get_ec2_instances("prod")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                Ec2InstanceRow {
                    instance_id: "i-bbb".to_string(),
                    instance_type: "m5.large".to_string(),
                    state: "running".to_string(),
                    status: "ACTIVE".to_string(),
                    running_tasks: 3,
                },
                Ec2InstanceRow {
                    instance_id: "i-aaa".to_string(),
                    instance_type: "t3.small".to_string(),
                    state: "stopped".to_string(),
                    status: "DRAINING".to_string(),
                    running_tasks: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_ec2_instances_external_instance_is_unknown() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(|_| Ok(vec!["ci/1".to_string()]));
        backend
            .expect_describe_container_instances()
            .returning(|_, _| Ok(vec![container_instance("mi-0abc", "ACTIVE", 1)]));
        backend.expect_describe_ec2_instances().never();

        let rows = EcsController::new(backend)
            .get_ec2_instances("edge")
            .await
            .unwrap();
        assert_eq!(rows[0].instance_id, "mi-0abc");
        assert_eq!(rows[0].instance_type, "Unknown");
        assert_eq!(rows[0].state, "Unknown");
    }

    #[tokio::test]
    async fn test_describe_calls_are_batched() {
        let arns: Vec<String> = (0..250).map(|i| format!("ci/{}", i)).collect();
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(move |_| Ok(arns.clone()));
        backend
            .expect_describe_container_instances()
            .times(3)
            .withf(|_, batch| batch.len() <= DESCRIBE_BATCH_SIZE)
            .returning(|_, batch| {
                Ok(batch
                    .iter()
                    .map(|arn| {
                        let n = last_segment(arn);
                        container_instance(&format!("i-{}", n), "ACTIVE", 0)
                    })
                    .collect())
            });
        backend
            .expect_describe_ec2_instances()
            .times(3)
            .withf(|ids| ids.len() <= DESCRIBE_BATCH_SIZE)
            .returning(|ids| Ok(ids.iter().map(|id| ec2(id, "t3.micro", "running")).collect()));

        let rows = EcsController::new(backend)
            .get_ec2_instances("big")
            .await
            .unwrap();
        assert_eq!(rows.len(), 250);
        assert_eq!(rows[249].instance_id, "i-249");
        assert!(rows.iter().all(|r| r.instance_type == "t3.micro"));
    }

    #[tokio::test]
    async fn test_ec2_instances_error_is_wrapped() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(|_| Err(BackendError("ClusterNotFoundException".to_string())));

        let err = EcsController::new(backend)
            .get_ec2_instances("gone")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get EC2 instances: ClusterNotFoundException"
        );
    }

    #[tokio::test]
    async fn test_containers_one_row_per_container() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_task_arns()
            .returning(|_| Ok(vec!["arn:aws:ecs:r:1:task/prod/abc".to_string()]));
        backend.expect_describe_tasks().returning(|_, _| {
            Ok(vec![TaskRecord {
                task_arn: Some("arn:aws:ecs:r:1:task/prod/abc".to_string()),
                created_at: None,
                containers: vec![
                    ContainerRecord {
                        name: Some("web".to_string()),
                        last_status: Some("RUNNING".to_string()),
                        cpu: Some("256".to_string()),
                        memory: Some("512".to_string()),
                    },
                    ContainerRecord {
                        name: Some("sidecar".to_string()),
                        last_status: Some("PENDING".to_string()),
                        cpu: None,
                        memory: None,
                    },
                ],
            }])
        });

        let rows = EcsController::new(backend)
            .get_containers("prod")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                ContainerRow {
                    name: "web".to_string(),
                    status: "RUNNING".to_string(),
                    task_id: "abc".to_string(),
                    cpu: "256".to_string(),
                    memory: "512".to_string(),
                    created: "N/A".to_string(),
                },
                ContainerRow {
                    name: "sidecar".to_string(),
                    status: "PENDING".to_string(),
                    task_id: "abc".to_string(),
                    cpu: "N/A".to_string(),
                    memory: "N/A".to_string(),
                    created: "N/A".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_containers_without_tasks() {
        let mut backend = MockClusterBackend::new();
        backend.expect_list_task_arns().returning(|_| Ok(vec![]));
        backend.expect_describe_tasks().never();

        let rows = EcsController::new(backend)
            .get_containers("idle")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_containers_error_is_wrapped() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_task_arns()
            .returning(|_| Ok(vec!["t/1".to_string()]));
        backend
            .expect_describe_tasks()
            .returning(|_, _| Err(BackendError("Throttling".to_string())));

        let err = EcsController::new(backend)
            .get_containers("prod")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get containers: Throttling");
    }

    #[tokio::test]
    async fn test_instance_details_finds_matching_row() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(|_| Ok(vec!["ci/1".to_string(), "ci/2".to_string()]));
        backend.expect_describe_container_instances().returning(|_, _| {
            Ok(vec![
                container_instance("i-1", "ACTIVE", 1),
                container_instance("i-2", "ACTIVE", 2),
            ])
        });
        backend
            .expect_describe_ec2_instances()
            .returning(|ids| Ok(ids.iter().map(|id| ec2(id, "c5.xlarge", "running")).collect()));

        let controller = EcsController::new(backend);
        let found = controller.get_instance_details("prod", "i-2").await.unwrap();
        assert_eq!(found.map(|r| r.running_tasks), Some(2));

        let missing = controller.get_instance_details("prod", "i-9").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_instance_details_error_prefix() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_list_container_instance_arns()
            .returning(|_| Err(BackendError("boom".to_string())));

        let err = EcsController::new(backend)
            .get_instance_details("prod", "i-1")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get instance details: Failed to get EC2 instances: boom"
        );
    }

    #[test]
    fn test_check_ssm_status() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_ssm_instance_count()
            .withf(|id| id == "i-online")
            .returning(|_| Ok(1));
        backend
            .expect_ssm_instance_count()
            .withf(|id| id == "i-offline")
            .returning(|_| Ok(0));
        backend
            .expect_ssm_instance_count()
            .withf(|id| id == "i-denied")
            .returning(|_| Err(BackendError("AccessDenied".to_string())));

        let controller = EcsController::new(backend);
        assert!(tokio_test::block_on(controller.check_ssm_status("i-online")));
        assert!(!tokio_test::block_on(controller.check_ssm_status("i-offline")));
        assert!(!tokio_test::block_on(controller.check_ssm_status("i-denied")));
    }
}
