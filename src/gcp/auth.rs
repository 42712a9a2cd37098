//! GCP Authentication
//!
//! Builds credentials from exactly one configured source: a gcloud
//! configuration profile (Application Default Credentials), a service account
//! key file, or a static access token.

use anyhow::{Context, Result};
use gcp_auth::TokenProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where credentials come from. Exactly one source is allowed per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Named gcloud configuration. It only selects project and region
    /// defaults; tokens come from Application Default Credentials.
    Profile(String),
    /// Service account JSON key
    KeyFile(PathBuf),
    /// Pre-issued OAuth access token
    AccessToken(String),
}

impl CredentialSource {
    /// Pick the single configured source
    pub fn from_parts(
        profile: Option<String>,
        key_file: Option<PathBuf>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        if let Some(profile) = profile {
            sources.push(Self::Profile(profile));
        }
        if let Some(path) = key_file {
            sources.push(Self::KeyFile(path));
        }
        if let Some(token) = access_token {
            sources.push(Self::AccessToken(token));
        }

        match sources.len() {
            0 => Err(anyhow::anyhow!(
                "You have to specify a profile, a service account key file or an access token."
            )),
            1 => Ok(sources.remove(0)),
            _ => Err(anyhow::anyhow!(
                "Only one of profile, service account key file and access token may be specified."
            )),
        }
    }

    /// Profile name, if this source is a gcloud configuration
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::Profile(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(name) => write!(f, "profile '{}' (application default credentials)", name),
            Self::KeyFile(path) => write!(f, "key file '{}'", path.display()),
            // Security: never print the token itself
            Self::AccessToken(_) => f.write_str("static access token"),
        }
    }
}

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

/// GCP credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Create credentials from the configured source
    pub async fn new(source: &CredentialSource) -> Result<Self> {
        let source = match source {
            CredentialSource::Profile(name) => {
                tracing::debug!("Profile '{}' authenticates with Application Default Credentials", name);
                let provider = gcp_auth::provider().await.context(
                    "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
                )?;
                TokenSource::Provider(provider)
            },
            CredentialSource::KeyFile(path) => {
                let account = gcp_auth::CustomServiceAccount::from_file(path).with_context(|| {
                    format!("Unable to load service account key '{}'", path.display())
                })?;
                TokenSource::Provider(Arc::new(account))
            },
            CredentialSource::AccessToken(token) => {
                if token.trim().is_empty() {
                    return Err(anyhow::anyhow!("Access token is empty"));
                }
                TokenSource::Static(token.trim().to_string())
            },
        };

        Ok(Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Credentials that always present the given token
    pub fn from_access_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Project the credentials belong to, when the source knows one
    pub async fn project_id(&self) -> Option<String> {
        match &self.source {
            TokenSource::Provider(provider) => provider
                .project_id()
                .await
                .ok()
                .map(|id| id.to_string())
                .filter(|id| validate_project_id(id)),
            TokenSource::Static(_) => None,
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        // Check cache first - but only return if token is still valid
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;

        let token_str = token.as_str().to_string();
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    // Check CLOUDSDK_CONFIG environment variable first
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    // Default to ~/.config/gcloud on Linux/macOS
    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {},
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Values read from one gcloud configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcloudConfiguration {
    pub project: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
}

impl GcloudConfiguration {
    /// Parse the INI-style content of a gcloud configuration
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut section = String::new();

        for line in content.lines() {
            let line = line.trim();
            // Security: Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();

            match (section.as_str(), key.trim()) {
                ("core", "project") if validate_project_id(&value) => config.project = Some(value),
                ("compute", "region") => config.region = Some(value),
                ("compute", "zone") => config.zone = Some(value),
                _ => {},
            }
        }

        config
    }

    /// Region, falling back to the region of the configured zone
    pub fn effective_region(&self) -> Option<String> {
        self.region
            .clone()
            .or_else(|| self.zone.as_deref().map(region_of_zone))
    }
}

/// Read a named gcloud configuration, or the active one when no name is given
pub fn read_configuration(profile: Option<&str>) -> Option<GcloudConfiguration> {
    let config_dir = get_gcloud_config_dir()?;
    read_configuration_from(&config_dir, profile)
}

fn read_configuration_from(config_dir: &Path, profile: Option<&str>) -> Option<GcloudConfiguration> {
    let name = match profile {
        Some(name) => name.to_string(),
        None => std::fs::read_to_string(config_dir.join("active_config"))
            .ok()?
            .trim()
            .to_string(),
    };

    // Security: Validate config name to prevent path traversal
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        tracing::warn!("Invalid characters in gcloud configuration name");
        return None;
    }

    let path = config_dir
        .join("configurations")
        .join(format!("config_{}", name));
    let content = std::fs::read_to_string(path).ok()?;
    Some(GcloudConfiguration::parse(&content))
}

/// Read the default project from the environment or a gcloud configuration
/// Security: Validates project ID format before returning
pub fn get_default_project(profile: Option<&str>) -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    read_configuration(profile)?.project
}

/// Get the default region from the environment or a gcloud configuration
pub fn get_default_region(profile: Option<&str>) -> Option<String> {
    if let Ok(region) = std::env::var("CLOUDSDK_COMPUTE_REGION") {
        return Some(region);
    }
    if let Ok(zone) = std::env::var("CLOUDSDK_COMPUTE_ZONE") {
        return Some(region_of_zone(&zone));
    }

    read_configuration(profile)?.effective_region()
}

/// `us-central1-a` -> `us-central1`
pub fn region_of_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) => region.to_string(),
        None => zone.to_string(),
    }
}
