use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by ecsctl commands. Every variant renders as the
/// message printed after `Error: `.
#[derive(Error, Debug)]
pub enum EcsctlError {
    #[error("Failed to initialize AWS clients: {0}")]
    ClientInit(String),

    #[error("Failed to authenticate with AWS: {0}")]
    Authentication(String),

    #[error("Failed to get clusters: {0}")]
    Clusters(String),

    #[error("Failed to get EC2 instances: {0}")]
    Ec2Instances(String),

    #[error("Failed to get containers: {0}")]
    Containers(String),

    #[error("Failed to get instance details: {0}")]
    InstanceDetails(String),

    #[error("No cluster selected. Use 'ecsctl use-cluster' first.")]
    NoClusterSelected,

    #[error("Cluster '{name}' not found. Available clusters:")]
    ClusterNotFound { name: String, available: Vec<String> },

    #[error("No ECS clusters found")]
    NoClusters,

    #[error("A cluster name is required when stdin is not a terminal")]
    ClusterNameRequired,

    #[error("Cluster selection failed: {0}")]
    Prompt(String),

    #[error("Instance '{instance_id}' not found in cluster '{cluster}'")]
    InstanceNotInCluster { instance_id: String, cluster: String },

    #[error("SSM is not available on instance '{0}'")]
    SsmUnavailable(String),

    #[error(
        "AWS CLI not found. Install the AWS CLI and the Session Manager plugin to use 'exec'"
    )]
    AwsCliMissing,

    #[error("SSM session failed with exit code: {0:?}")]
    SessionFailed(Option<i32>),

    #[error("Config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Could not determine home directory for the config file")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EcsctlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_cli_output() {
        assert_eq!(
            EcsctlError::NoClusterSelected.to_string(),
            "No cluster selected. Use 'ecsctl use-cluster' first."
        );
        assert_eq!(
            EcsctlError::Clusters("denied".into()).to_string(),
            "Failed to get clusters: denied"
        );
        assert_eq!(
            EcsctlError::InstanceNotInCluster {
                instance_id: "i-1".into(),
                cluster: "prod".into()
            }
            .to_string(),
            "Instance 'i-1' not found in cluster 'prod'"
        );
    }
}
