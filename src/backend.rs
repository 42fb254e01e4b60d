use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::types::Instance;
use aws_sdk_ecs::types::{ContainerInstance, Task};
use aws_sdk_ssm::types::InstanceInformationStringFilter;
use thiserror::Error;
use tracing::debug;

/// A failed AWS call, rendered with the full SDK error chain.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    fn sdk<E: std::error::Error>(err: E) -> Self {
        BackendError(aws_sdk_ecs::error::DisplayErrorContext(err).to_string())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One ECS container instance, as returned by `DescribeContainerInstances`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInstanceRecord {
    pub ec2_instance_id: Option<String>,
    pub status: Option<String>,
    pub running_tasks: i32,
}

/// The EC2 side of a container instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Ec2Details {
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub name: Option<String>,
    pub last_status: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub task_arn: Option<String>,
    /// Seconds since the Unix epoch.
    pub created_at: Option<i64>,
    pub containers: Vec<ContainerRecord>,
}

/// The AWS calls the controller chains together. Describe calls receive
/// at most [`crate::controller::DESCRIBE_BATCH_SIZE`] identifiers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    async fn list_cluster_arns(&self) -> BackendResult<Vec<String>>;

    async fn list_container_instance_arns(&self, cluster: &str) -> BackendResult<Vec<String>>;

    async fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> BackendResult<Vec<ContainerInstanceRecord>>;

    async fn describe_ec2_instances(&self, instance_ids: &[String])
        -> BackendResult<Vec<Ec2Details>>;

    async fn list_task_arns(&self, cluster: &str) -> BackendResult<Vec<String>>;

    async fn describe_tasks(&self, cluster: &str, arns: &[String])
        -> BackendResult<Vec<TaskRecord>>;

    /// Number of SSM managed-instance entries matching `instance_id`.
    async fn ssm_instance_count(&self, instance_id: &str) -> BackendResult<usize>;
}

fn container_instance_record(instance: &ContainerInstance) -> ContainerInstanceRecord {
    ContainerInstanceRecord {
        ec2_instance_id: instance.ec2_instance_id().map(str::to_string),
        status: instance.status().map(str::to_string),
        running_tasks: instance.running_tasks_count(),
    }
}

/// Instances without an id cannot be joined and are skipped.
fn ec2_details(instance: &Instance) -> Option<Ec2Details> {
    let instance_id = instance.instance_id()?;
    Some(Ec2Details {
        instance_id: instance_id.to_string(),
        instance_type: instance
            .instance_type()
            .map(|t| t.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        state: instance
            .state()
            .and_then(|s| s.name())
            .map(|n| n.as_str())
            .unwrap_or("Unknown")
            .to_string(),
    })
}

fn task_record(task: &Task) -> TaskRecord {
    TaskRecord {
        task_arn: task.task_arn().map(str::to_string),
        created_at: task.created_at().map(|t| t.secs()),
        containers: task
            .containers()
            .iter()
            .map(|container| ContainerRecord {
                name: container.name().map(str::to_string),
                last_status: container.last_status().map(str::to_string),
                cpu: container.cpu().map(str::to_string),
                memory: container.memory().map(str::to_string),
            })
            .collect(),
    }
}

/// [`ClusterBackend`] over the ECS, EC2 and SSM SDK clients.
#[derive(Debug, Clone)]
pub struct SdkBackend {
    ecs_client: aws_sdk_ecs::Client,
    ec2_client: aws_sdk_ec2::Client,
    ssm_client: aws_sdk_ssm::Client,
}

impl SdkBackend {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ecs_client: aws_sdk_ecs::Client::new(config),
            ec2_client: aws_sdk_ec2::Client::new(config),
            ssm_client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait]
impl ClusterBackend for SdkBackend {
    async fn list_cluster_arns(&self) -> BackendResult<Vec<String>> {
        let mut pages = self.ecs_client.list_clusters().into_paginator().send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(BackendError::sdk)?;
            arns.extend(page.cluster_arns().iter().cloned());
        }
        debug!("ListClusters returned {} clusters", arns.len());
        Ok(arns)
    }

    async fn list_container_instance_arns(&self, cluster: &str) -> BackendResult<Vec<String>> {
        let mut pages = self
            .ecs_client
            .list_container_instances()
            .cluster(cluster)
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(BackendError::sdk)?;
            arns.extend(page.container_instance_arns().iter().cloned());
        }
        debug!("Cluster {} has {} container instances", cluster, arns.len());
        Ok(arns)
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> BackendResult<Vec<ContainerInstanceRecord>> {
        let response = self
            .ecs_client
            .describe_container_instances()
            .cluster(cluster)
            .set_container_instances(Some(arns.to_vec()))
            .send()
            .await
            .map_err(BackendError::sdk)?;

        for failure in response.failures() {
            debug!(
                "DescribeContainerInstances failure for {:?}: {:?}",
                failure.arn(),
                failure.reason()
            );
        }

        Ok(response
            .container_instances()
            .iter()
            .map(container_instance_record)
            .collect())
    }

    async fn describe_ec2_instances(
        &self,
        instance_ids: &[String],
    ) -> BackendResult<Vec<Ec2Details>> {
        let response = self
            .ec2_client
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(BackendError::sdk)?;

        Ok(response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(ec2_details)
            .collect())
    }

    async fn list_task_arns(&self, cluster: &str) -> BackendResult<Vec<String>> {
        let mut pages = self
            .ecs_client
            .list_tasks()
            .cluster(cluster)
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(BackendError::sdk)?;
            arns.extend(page.task_arns().iter().cloned());
        }
        debug!("Cluster {} has {} tasks", cluster, arns.len());
        Ok(arns)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> BackendResult<Vec<TaskRecord>> {
        let response = self
            .ecs_client
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(arns.to_vec()))
            .send()
            .await
            .map_err(BackendError::sdk)?;

        for failure in response.failures() {
            debug!(
                "DescribeTasks failure for {:?}: {:?}",
                failure.arn(),
                failure.reason()
            );
        }

        Ok(response.tasks().iter().map(task_record).collect())
    }

    async fn ssm_instance_count(&self, instance_id: &str) -> BackendResult<usize> {
        let filter = InstanceInformationStringFilter::builder()
            .key("InstanceIds")
            .values(instance_id)
            .build()
            .map_err(BackendError::sdk)?;

        let response = self
            .ssm_client
            .describe_instance_information()
            .filters(filter)
            .send()
            .await
            .map_err(BackendError::sdk)?;

        Ok(response.instance_information_list().len())
    }
}
