use crate::auth::AwsSession;
use crate::backend::ClusterBackend;
use crate::config::ClusterConfig;
use crate::controller::{ContainerRow, Ec2InstanceRow, EcsController};
use crate::error::{EcsctlError, Result};
use crate::output::{print_success, print_warning};
use crate::session;
use crate::table::Table;
use dialoguer::Select;

/// Persist `cluster_name` after checking it exists; with no name and a
/// terminal on stdin, let the user pick one.
pub async fn use_cluster<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
    cluster_name: Option<String>,
) -> Result<String> {
    let clusters = ecs.get_clusters().await?;

    let cluster_name = match cluster_name {
        Some(name) => name,
        None => pick_cluster(&clusters, config.get_current_cluster()?.as_deref())?,
    };

    if !clusters.contains(&cluster_name) {
        return Err(EcsctlError::ClusterNotFound {
            name: cluster_name,
            available: clusters,
        });
    }

    config.set_current_cluster(&cluster_name)?;
    println!("{}", switched_message(&cluster_name));
    Ok(cluster_name)
}

pub fn switched_message(cluster_name: &str) -> String {
    format!("Switched to cluster '{}'", cluster_name)
}

/// Lines listed on stdout under the `Cluster ... not found` error.
pub fn cluster_not_found_lines(available: &[String]) -> Vec<String> {
    available
        .iter()
        .map(|cluster| format!("  - {}", cluster))
        .collect()
}

fn pick_cluster(clusters: &[String], current: Option<&str>) -> Result<String> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(EcsctlError::ClusterNameRequired);
    }
    if clusters.is_empty() {
        return Err(EcsctlError::NoClusters);
    }

    let default = current
        .and_then(|c| clusters.iter().position(|name| name == c))
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Select a cluster")
        .items(clusters)
        .default(default)
        .interact()
        .map_err(|e| EcsctlError::Prompt(e.to_string()))?;

    Ok(clusters[selection].clone())
}

pub fn clusters_table(clusters: &[String], current: Option<&str>) -> Table {
    let mut table = Table::new(["Cluster Name", "Current"]);
    for cluster in clusters {
        let marker = if Some(cluster.as_str()) == current { "*" } else { "" };
        table.add_row([cluster.as_str(), marker]);
    }
    table
}

pub async fn get_clusters<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
) -> Result<()> {
    let clusters = ecs.get_clusters().await?;
    let current = config.get_current_cluster()?;

    if clusters.is_empty() {
        print_warning("No ECS clusters found");
    }
    println!("{}", clusters_table(&clusters, current.as_deref()));
    Ok(())
}

pub fn current_cluster(config: &ClusterConfig) -> Result<()> {
    let cluster = config.require_current_cluster()?;
    println!("{}", cluster);
    Ok(())
}

pub fn unset_cluster(config: &ClusterConfig) -> Result<()> {
    config.clear_current_cluster()?;
    print_success("Cleared the current cluster selection");
    Ok(())
}

pub fn ec2_table(instances: &[Ec2InstanceRow]) -> Table {
    let mut table = Table::new(["Instance ID", "Type", "State", "Status", "Running Tasks"]);
    for instance in instances {
        table.add_row([
            instance.instance_id.clone(),
            instance.instance_type.clone(),
            instance.state.clone(),
            instance.status.clone(),
            instance.running_tasks.to_string(),
        ]);
    }
    table
}

pub async fn get_ec2<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
) -> Result<()> {
    let cluster = config.require_current_cluster()?;
    let instances = ecs.get_ec2_instances(&cluster).await?;

    if instances.is_empty() {
        print_warning(&format!("No container instances in cluster '{}'", cluster));
    }
    println!("{}", ec2_table(&instances));
    Ok(())
}

pub fn containers_table(containers: &[ContainerRow]) -> Table {
    let mut table = Table::new(["Name", "Status", "Task ID", "CPU", "Memory", "Created"]);
    for container in containers {
        table.add_row([
            container.name.as_str(),
            container.status.as_str(),
            container.task_id.as_str(),
            container.cpu.as_str(),
            container.memory.as_str(),
            container.created.as_str(),
        ]);
    }
    table
}

pub async fn get_containers<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
) -> Result<()> {
    let cluster = config.require_current_cluster()?;
    let containers = ecs.get_containers(&cluster).await?;

    if containers.is_empty() {
        print_warning(&format!("No running tasks in cluster '{}'", cluster));
    }
    println!("{}", containers_table(&containers));
    Ok(())
}

pub fn starting_session_message(instance_id: &str) -> String {
    format!("Starting session with instance '{}'...", instance_id)
}

/// Checks that `instance_id` is in the current cluster and reachable
/// through SSM, returning the cluster name.
pub async fn verify_exec_target<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
    instance_id: &str,
) -> Result<String> {
    let cluster = config.require_current_cluster()?;

    if ecs
        .get_instance_details(&cluster, instance_id)
        .await?
        .is_none()
    {
        return Err(EcsctlError::InstanceNotInCluster {
            instance_id: instance_id.to_string(),
            cluster,
        });
    }

    if !ecs.check_ssm_status(instance_id).await {
        return Err(EcsctlError::SsmUnavailable(instance_id.to_string()));
    }

    Ok(cluster)
}

pub async fn exec<B: ClusterBackend>(
    ecs: &EcsController<B>,
    config: &ClusterConfig,
    aws: &AwsSession,
    instance_id: &str,
) -> Result<()> {
    verify_exec_target(ecs, config, instance_id).await?;

    println!("{}", starting_session_message(instance_id));
    let cmd = session::start_session_command(instance_id, &aws.settings, aws.assumed.as_ref());
    let duration = session::run_session(cmd)?;

    print_success(&format!(
        "SSM session completed ({})",
        session::format_duration(duration)
    ));
    Ok(())
}
