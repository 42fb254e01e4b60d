use crate::error::{EcsctlError, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::Credentials;
use std::time::SystemTime;
use tracing::debug;

pub const DEFAULT_REGION: &str = "ap-southeast-1";
pub const DEFAULT_SESSION_NAME: &str = "AssumeRoleSession";

/// Inputs to credential resolution after flags and environment are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub profile: Option<String>,
    pub region: String,
    pub role_arn: Option<String>,
    pub session_name: String,
}

/// Where the credentials for AWS calls come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// A named profile from `~/.aws/config` and `~/.aws/credentials`.
    Profile(String),
    /// The SDK default chain: environment, web identity, instance metadata.
    Environment,
    /// Temporary credentials from STS, obtained with the base source.
    AssumedRole {
        role_arn: String,
        session_name: String,
        base: Box<CredentialSource>,
    },
}

impl AuthSettings {
    pub fn credential_source(&self) -> CredentialSource {
        let base = match &self.profile {
            Some(profile) => CredentialSource::Profile(profile.clone()),
            None => CredentialSource::Environment,
        };

        match &self.role_arn {
            Some(role_arn) => CredentialSource::AssumedRole {
                role_arn: role_arn.clone(),
                session_name: self.session_name.clone(),
                base: Box::new(base),
            },
            None => base,
        }
    }
}

/// An authenticated SDK configuration plus what produced it.
#[derive(Debug, Clone)]
pub struct AwsSession {
    pub sdk_config: SdkConfig,
    pub settings: AuthSettings,
    /// Set when a role was assumed; the SSM shell needs the same identity.
    pub assumed: Option<Credentials>,
}

async fn base_config(settings: &AuthSettings) -> SdkConfig {
    let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()));

    if let Some(profile) = &settings.profile {
        config_loader = config_loader.profile_name(profile);
    }

    config_loader.load().await
}

async fn assume_role(
    base: &SdkConfig,
    role_arn: &str,
    session_name: &str,
) -> std::result::Result<Credentials, String> {
    let sts_client = aws_sdk_sts::Client::new(base);

    let response = sts_client
        .assume_role()
        .role_arn(role_arn)
        .role_session_name(session_name)
        .send()
        .await
        .map_err(|e| aws_sdk_sts::error::DisplayErrorContext(e).to_string())?;

    let credentials = response
        .credentials()
        .ok_or_else(|| "AssumeRole response carried no credentials".to_string())?;

    let expiry = SystemTime::try_from(*credentials.expiration()).ok();

    Ok(Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        expiry,
        "AssumeRole",
    ))
}

fn authentication_failure(cause: String) -> EcsctlError {
    EcsctlError::ClientInit(EcsctlError::Authentication(cause).to_string())
}

/// Build the SDK configuration the ECS, EC2 and SSM clients share.
pub async fn authenticate(settings: AuthSettings) -> Result<AwsSession> {
    let source = settings.credential_source();
    debug!("Credential source: {:?}, region: {}", source, settings.region);

    let base = base_config(&settings).await;

    let CredentialSource::AssumedRole {
        role_arn,
        session_name,
        base: base_source,
    } = source
    else {
        return Ok(AwsSession {
            sdk_config: base,
            settings,
            assumed: None,
        });
    };

    debug!("Assuming {} with {:?} credentials", role_arn, base_source);
    let credentials = assume_role(&base, &role_arn, &session_name)
        .await
        .map_err(authentication_failure)?;
    debug!("Assumed role {} as session {}", role_arn, session_name);

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(credentials.clone())
        .load()
        .await;

    Ok(AwsSession {
        sdk_config,
        settings,
        assumed: Some(credentials),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(profile: Option<&str>, role_arn: Option<&str>) -> AuthSettings {
        AuthSettings {
            profile: profile.map(String::from),
            region: DEFAULT_REGION.to_string(),
            role_arn: role_arn.map(String::from),
            session_name: DEFAULT_SESSION_NAME.to_string(),
        }
    }

    #[test]
    fn test_profile_without_role() {
        assert_eq!(
            settings(Some("dev"), None).credential_source(),
            CredentialSource::Profile("dev".to_string())
        );
    }

    #[test]
    fn test_environment_without_profile_or_role() {
        assert_eq!(
            settings(None, None).credential_source(),
            CredentialSource::Environment
        );
    }

    #[test]
    fn test_role_on_top_of_profile() {
        let arn = "arn:aws:iam::123456789012:role/Ops";
        assert_eq!(
            settings(Some("dev"), Some(arn)).credential_source(),
            CredentialSource::AssumedRole {
                role_arn: arn.to_string(),
                session_name: "AssumeRoleSession".to_string(),
                base: Box::new(CredentialSource::Profile("dev".to_string())),
            }
        );
    }

    #[test]
    fn test_role_on_top_of_environment() {
        let source = settings(None, Some("arn:aws:iam::1:role/R")).credential_source();
        match source {
            CredentialSource::AssumedRole { base, .. } => {
                assert_eq!(*base, CredentialSource::Environment)
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_authentication_failure_message() {
        let err = authentication_failure("ExpiredToken: token expired".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to initialize AWS clients: Failed to authenticate with AWS: \
             ExpiredToken: token expired"
        );
    }

    #[tokio::test]
    async fn test_authenticate_without_role_keeps_region() {
        let mut settings = settings(None, None);
        settings.region = "eu-west-1".to_string();

        let session = authenticate(settings).await.unwrap();
        assert!(session.assumed.is_none());
        assert_eq!(
            session.sdk_config.region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
    }
}
