//! GCP Client
//!
//! The session context of a run: credentials, HTTP client and the project and
//! region every lister and resource works against. Built once, then shared
//! read-only behind an `Arc`.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::Result;
use serde_json::Value;

/// Region value that selects every location of the project
pub const ALL_REGIONS: &str = "all";

const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";
const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const CONTAINER_ENDPOINT: &str = "https://container.googleapis.com";
const RESOURCEMANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

#[derive(Debug, Clone)]
struct Endpoints {
    compute: String,
    storage: String,
    container: String,
    resourcemanager: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: COMPUTE_ENDPOINT.to_string(),
            storage: STORAGE_ENDPOINT.to_string(),
            container: CONTAINER_ENDPOINT.to_string(),
            resourcemanager: RESOURCEMANAGER_ENDPOINT.to_string(),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub region: String,
    endpoints: Endpoints,
}

impl GcpClient {
    /// Create a client around already built credentials
    pub fn from_credentials(credentials: GcpCredentials, project_id: &str, region: &str) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            project_id: project_id.to_string(),
            region: region.to_string(),
            endpoints: Endpoints::default(),
        })
    }

    /// Send every API call to `base_url` instead of the Google endpoints
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        self.endpoints = Endpoints {
            compute: base.clone(),
            storage: base.clone(),
            container: base.clone(),
            resourcemanager: base,
        };
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    /// Whether the session covers every region
    pub fn all_regions(&self) -> bool {
        self.region == ALL_REGIONS
    }

    /// Whether `location` (a region or a zone) belongs to the session region
    pub fn in_region(&self, location: &str) -> bool {
        if self.all_regions() {
            return true;
        }
        location == self.region
            || location
                .strip_prefix(self.region.as_str())
                .map(|rest| rest.starts_with('-'))
                .unwrap_or(false)
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, region: &str, resource: &str) -> String {
        self.compute_url(&format!("regions/{}/{}", region, resource))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.compute_url(&format!("global/{}", resource))
    }

    /// Build aggregated Compute Engine API URL (all zones and regions)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.compute_url(&format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.endpoints.storage, path)
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage object URL, or the object collection URL when
    /// `object` is `None`
    pub fn storage_object_url(&self, bucket: &str, object: Option<&str>) -> String {
        let objects = format!("{}/o", self.storage_bucket_url(bucket));
        match object {
            Some(object) => format!("{}/{}", objects, urlencoding::encode(object)),
            None => objects,
        }
    }

    // =========================================================================
    // GKE API helpers
    // =========================================================================

    /// Build GKE API URL
    pub fn container_url(&self, path: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.endpoints.container, self.project_id, path
        )
    }

    /// Build GKE location URL (region, zone or `-` for all)
    pub fn container_location_url(&self, location: &str, resource: &str) -> String {
        self.container_url(&format!("locations/{}/{}", location, resource))
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.resourcemanager, path)
    }
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}
