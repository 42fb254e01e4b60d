use crate::auth::AuthSettings;
use crate::error::{EcsctlError, Result};
use aws_sdk_sts::config::Credentials;
use std::io::ErrorKind;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::debug;

/// Build `aws ssm start-session` for `instance_id`.
///
/// With an assumed role the child gets the temporary credentials through
/// the environment and no `--profile`, which would otherwise take precedence.
pub fn start_session_command(
    instance_id: &str,
    settings: &AuthSettings,
    assumed: Option<&Credentials>,
) -> Command {
    let mut cmd = Command::new("aws");
    cmd.args(["ssm", "start-session", "--target", instance_id]);

    match assumed {
        Some(credentials) => {
            cmd.env("AWS_ACCESS_KEY_ID", credentials.access_key_id())
                .env("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key());
            match credentials.session_token() {
                Some(token) => cmd.env("AWS_SESSION_TOKEN", token),
                None => cmd.env_remove("AWS_SESSION_TOKEN"),
            };
            cmd.env_remove("AWS_PROFILE");
        }
        None => {
            if let Some(profile) = settings.profile.as_ref() {
                cmd.args(["--profile", profile]);
            }
        }
    }

    cmd.args(["--region", &settings.region]);
    cmd
}

/// Run the session with the terminal attached and return how long it lasted.
pub fn run_session(mut cmd: Command) -> Result<Duration> {
    debug!("Running {:?}", cmd.get_args().collect::<Vec<_>>());
    let started = Instant::now();

    let status = cmd.status().map_err(|e| match e.kind() {
        ErrorKind::NotFound => EcsctlError::AwsCliMissing,
        _ => EcsctlError::Io(e),
    })?;

    if !status.success() {
        return Err(EcsctlError::SessionFailed(status.code()));
    }

    Ok(started.elapsed())
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
