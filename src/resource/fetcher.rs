//! Resource Fetcher
//!
//! Fetches every item of a resource type, following pagination, and keeps
//! only the items located in the session region.

use super::dispatch;
use super::registry::{ResourceDef, Scope};
use crate::gcp::client::GcpClient;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
}

/// Fetch all resources of a type (auto-paginate)
pub async fn fetch_resources(def: &ResourceDef, client: &GcpClient) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let result = fetch_resources_paginated(def, client, page_token.as_deref()).await?;
        all_items.extend(result.items);

        if result.next_token.is_none() {
            break;
        }
        page_token = result.next_token;
    }

    if def.scope.is_located() {
        retain_located(def, client, &mut all_items);
    }

    Ok(all_items)
}

/// Keep items located in the session region. Aggregated lists also carry
/// global items (e.g. global addresses); those have no location and are
/// listed by their own global type.
fn retain_located(def: &ResourceDef, client: &GcpClient, items: &mut Vec<Value>) {
    items.retain(|item| {
        item_location(def, item)
            .map(|location| client.in_region(&location))
            .unwrap_or(false)
    });
}

/// Fetch one page of resources
pub async fn fetch_resources_paginated(
    def: &ResourceDef,
    client: &GcpClient,
    page_token: Option<&str>,
) -> Result<PaginatedResult> {
    let response = dispatch::invoke_list(def, client, page_token).await?;

    let items = extract_items(&response, &def.response_path);
    let next_token = response
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Ok(PaginatedResult { items, next_token })
}

/// Extract items from response using the response_path
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}

/// Zone, region or GKE location of an item, short form
pub fn item_location(def: &ResourceDef, item: &Value) -> Option<String> {
    let field = match def.scope {
        Scope::Zonal => "zone",
        Scope::Regional => "region",
        Scope::Location => "location",
        Scope::Global | Scope::Project => return None,
    };

    item.get(field)
        .and_then(|v| v.as_str())
        .map(extract_short_name)
}

/// Labels of an item as plain strings
pub fn item_labels(item: &Value) -> BTreeMap<String, String> {
    // GKE calls them resourceLabels
    let labels = item.get("labels").or_else(|| item.get("resourceLabels"));

    labels
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract short name from GCP resource URL
/// e.g., "https://www.googleapis.com/compute/v1/projects/my-project/zones/us-central1-a" -> "us-central1-a"
fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Extract a value from JSON using a dot-notation path
pub fn extract_json_value(item: &Value, path: &str) -> Option<String> {
    let mut current = item;

    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
