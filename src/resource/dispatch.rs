//! Dispatch
//!
//! Maps resource definitions to concrete GCP REST calls: list, delete and the
//! operation URL a delete has to be polled on.

use super::registry::{ResourceDef, Scope, Service};
use crate::gcp::client::GcpClient;
use crate::gcp::http::is_not_found;
use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Fetch one page of a resource collection
pub async fn invoke_list(def: &ResourceDef, client: &GcpClient, page_token: Option<&str>) -> Result<Value> {
    tracing::debug!("invoke_list: resource={}", def.key);

    let mut params = serde_json::Map::new();
    if def.service == Service::Storage {
        params.insert("project".to_string(), Value::String(client.project_id.clone()));
    }
    if let Some(token) = page_token {
        params.insert("pageToken".to_string(), Value::String(token.to_string()));
    }

    let url = add_query_params(&list_url(def, client), &Value::Object(params));
    let response = client.get(&url).await?;

    if is_aggregated(def) {
        Ok(flatten_aggregated_response(response))
    } else {
        Ok(response)
    }
}

/// Delete one resource. Returns the operation for asynchronous deletes.
pub async fn execute_delete(
    def: &ResourceDef,
    client: &GcpClient,
    name: &str,
    location: Option<&str>,
) -> Result<Value> {
    let url = delete_url(def, client, name, location)?;
    if def.service == Service::Storage {
        empty_bucket(client, name).await?;
    }
    tracing::info!("execute_delete: resource={}, name={}", def.key, name);
    client.delete(&url).await
}

/// Delete every object generation in a bucket. A bucket only goes away once
/// it is empty. Objects under a retention policy fail the delete.
pub async fn empty_bucket(client: &GcpClient, bucket: &str) -> Result<usize> {
    let objects_url = client.storage_object_url(bucket, None);
    let mut page_token: Option<String> = None;
    let mut deleted = 0;

    loop {
        let mut params = serde_json::Map::new();
        params.insert("versions".to_string(), Value::String("true".to_string()));
        params.insert("fields".to_string(), Value::String("items(name,generation),nextPageToken".to_string()));
        if let Some(token) = &page_token {
            params.insert("pageToken".to_string(), Value::String(token.clone()));
        }

        let response = client.get(&add_query_params(&objects_url, &Value::Object(params))).await?;
        let objects = response
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for object in &objects {
            let Some(name) = object.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let mut url = client.storage_object_url(bucket, Some(name));
            if let Some(generation) = object.get("generation").and_then(|v| v.as_str()) {
                url = add_query_params(&url, &json!({ "generation": generation }));
            }

            match client.delete(&url).await {
                Ok(_) => deleted += 1,
                Err(e) if is_not_found(&e) => {},
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to delete gs://{}/{}", bucket, name));
                },
            }
        }

        page_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        if page_token.is_none() {
            break;
        }
    }

    if deleted > 0 {
        tracing::info!("Deleted {} objects from bucket {}", deleted, bucket);
    }
    Ok(deleted)
}

fn is_aggregated(def: &ResourceDef) -> bool {
    def.service == Service::Compute && matches!(def.scope, Scope::Zonal | Scope::Regional)
}

/// URL listing every resource of the type in the project
pub fn list_url(def: &ResourceDef, client: &GcpClient) -> String {
    match (def.service, def.scope) {
        (Service::Compute, Scope::Zonal | Scope::Regional) => {
            client.compute_aggregated_url(&def.collection)
        },
        (Service::Compute, _) => client.compute_global_url(&def.collection),
        (Service::Storage, _) => client.storage_url(&def.collection),
        (Service::Container, _) => client.container_location_url("-", &def.collection),
    }
}

/// URL addressing a single resource
pub fn delete_url(def: &ResourceDef, client: &GcpClient, name: &str, location: Option<&str>) -> Result<String> {
    let url = match (def.service, def.scope) {
        (Service::Compute, Scope::Zonal) => {
            let zone = require_location(def, name, location)?;
            client.compute_zonal_url(zone, &format!("{}/{}", def.collection, name))
        },
        (Service::Compute, Scope::Regional) => {
            let region = require_location(def, name, location)?;
            client.compute_regional_url(region, &format!("{}/{}", def.collection, name))
        },
        (Service::Compute, _) => client.compute_global_url(&format!("{}/{}", def.collection, name)),
        (Service::Storage, _) => client.storage_bucket_url(name),
        (Service::Container, _) => {
            let location = require_location(def, name, location)?;
            client.container_location_url(location, &format!("{}/{}", def.collection, name))
        },
    };

    Ok(url)
}

/// URL to poll for the operation `operation` started on a resource
pub fn operation_url(
    def: &ResourceDef,
    client: &GcpClient,
    location: Option<&str>,
    operation: &str,
) -> Result<String> {
    let path = format!("operations/{}", operation);
    let url = match (def.service, def.scope) {
        (Service::Compute, Scope::Zonal) => {
            client.compute_zonal_url(require_location(def, operation, location)?, &path)
        },
        (Service::Compute, Scope::Regional) => {
            client.compute_regional_url(require_location(def, operation, location)?, &path)
        },
        (Service::Compute, _) => client.compute_global_url(&path),
        (Service::Container, _) => {
            client.container_location_url(require_location(def, operation, location)?, &path)
        },
        (Service::Storage, _) => {
            return Err(anyhow::anyhow!("{} has no long-running operations", def.key));
        },
    };

    Ok(url)
}

fn require_location<'a>(def: &ResourceDef, name: &str, location: Option<&'a str>) -> Result<&'a str> {
    location.with_context(|| format!("{} '{}' has no location", def.key, name))
}

fn add_query_params(url: &str, params: &Value) -> String {
    let Value::Object(map) = params else {
        return url.to_string();
    };

    let mut query_parts: Vec<String> = Vec::new();

    for (key, value) in map {
        match value {
            Value::String(s) => {
                query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
            },
            Value::Array(arr) => {
                for item in arr {
                    if let Value::String(s) = item {
                        query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
                    }
                }
            },
            _ => {},
        }
    }

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

/// Flatten an aggregated API response into a standard list response.
/// Aggregated responses have format: { "items": { "zones/us-central1-a": { "instances": [...] }, ... } }
/// We flatten to: { "items": [...all instances...], "nextPageToken": ... }
fn flatten_aggregated_response(response: Value) -> Value {
    let next_page_token = response.get("nextPageToken").cloned();
    let mut all_items: Vec<Value> = Vec::new();

    if let Some(items) = response.get("items").and_then(|v| v.as_object()) {
        for (_scope_key, scope_data) in items {
            let Some(obj) = scope_data.as_object() else {
                continue;
            };
            for (key, value) in obj {
                // Skip warning field and other metadata
                if key == "warning" {
                    continue;
                }
                if let Some(arr) = value.as_array() {
                    all_items.extend(arr.iter().cloned());
                }
            }
        }
    }

    let mut flattened = json!({ "items": all_items });
    if let Some(token) = next_page_token {
        flattened["nextPageToken"] = token;
    }
    flattened
}
