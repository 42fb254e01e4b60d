mod auth;
mod backend;
mod commands;
mod config;
mod controller;
mod error;
mod logging;
mod output;
mod session;
mod table;

use crate::auth::{AuthSettings, DEFAULT_REGION, DEFAULT_SESSION_NAME};
use crate::backend::SdkBackend;
use crate::config::ClusterConfig;
use crate::controller::EcsController;
use crate::error::EcsctlError;
use crate::output::print_error;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "ecsctl")]
#[command(about = "ECS command line tool that mimics kubectl")]
#[command(version)]
struct Cli {
    /// AWS profile to use (defaults to AWS_PROFILE env var)
    #[arg(short = 'p', long = "profile", env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// AWS region to use
    #[arg(
        short = 'r',
        long = "region",
        env = "AWS_REGION",
        default_value = DEFAULT_REGION,
        global = true
    )]
    region: String,

    /// Role to assume before calling AWS
    #[arg(long = "role-arn", env = "AWS_ROLE_ARN", global = true)]
    role_arn: Option<String>,

    /// Session name for the assumed role
    #[arg(long = "session-name", default_value = DEFAULT_SESSION_NAME, global = true)]
    session_name: String,

    /// Directory holding config.json (defaults to ~/.ecsctl)
    #[arg(long = "config-dir", env = "ECSCTL_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select ECS cluster to use
    #[command(name = "use-cluster")]
    UseCluster {
        /// Cluster name; prompts for one when omitted
        cluster_name: Option<String>,
    },

    /// List available ECS clusters
    #[command(name = "get-clusters")]
    GetClusters,

    /// Show the selected cluster
    #[command(name = "current-cluster")]
    CurrentCluster,

    /// Forget the selected cluster
    #[command(name = "unset-cluster")]
    UnsetCluster,

    /// Get ECS resources
    #[command(subcommand)]
    Get(GetCommands),

    /// Execute interactive shell on EC2 instance using SSM
    Exec {
        /// EC2 instance id in the current cluster
        instance_id: String,
    },
}

#[derive(Subcommand)]
enum GetCommands {
    /// Get EC2 instances in current cluster
    Ec2,

    /// Get containers in current cluster
    Containers,
}

impl Cli {
    fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            profile: self.profile.clone().filter(|p| !p.is_empty()),
            region: self.region.clone(),
            role_arn: self.role_arn.clone().filter(|r| !r.is_empty()),
            session_name: self.session_name.clone(),
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClusterConfig::open(cli.config_dir.as_deref())
        .context("Failed to open the ecsctl config")?;
    debug!("Using config file {}", config.path().display());
    let settings = cli.auth_settings();

    match cli.command {
        // Local config only; no AWS credentials needed.
        Commands::CurrentCluster => commands::current_cluster(&config)?,
        Commands::UnsetCluster => commands::unset_cluster(&config)?,
        command => run_aws_command(command, settings, &config).await?,
    }
    Ok(())
}

async fn run_aws_command(
    command: Commands,
    settings: AuthSettings,
    config: &ClusterConfig,
) -> error::Result<()> {
    let aws = auth::authenticate(settings).await?;
    let ecs = EcsController::new(SdkBackend::new(&aws.sdk_config));

    match command {
        Commands::UseCluster { cluster_name } => {
            commands::use_cluster(&ecs, config, cluster_name).await?;
        }
        Commands::GetClusters => commands::get_clusters(&ecs, config).await?,
        Commands::Get(GetCommands::Ec2) => commands::get_ec2(&ecs, config).await?,
        Commands::Get(GetCommands::Containers) => {
            commands::get_containers(&ecs, config).await?
        }
        Commands::Exec { instance_id } => {
            commands::exec(&ecs, config, &aws, &instance_id).await?
        }
        Commands::CurrentCluster => commands::current_cluster(config)?,
        Commands::UnsetCluster => commands::unset_cluster(config)?,
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    print_error(&format!("{:#}", err));
    if let Some(EcsctlError::ClusterNotFound { available, .. }) = err.downcast_ref::<EcsctlError>() {
        for line in commands::cluster_not_found_lines(available) {
            println!("{}", line);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    debug!(
        "Profile: {}, region: {}, role: {}",
        cli.profile.as_deref().unwrap_or("default"),
        cli.region,
        cli.role_arn.as_deref().unwrap_or("none")
    );

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
    Ok(())
}
