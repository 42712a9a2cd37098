//! Integration tests against mocked GCP endpoints using wiremock
//!
//! These tests drive listers, resource handles and the whole nuke pipeline
//! through the real HTTP client, with every Google endpoint replaced by a
//! local mock server.

use gnuke::gcp::auth::GcpCredentials;
use gnuke::gcp::client::GcpClient;
use gnuke::gcp::projects::describe_project;
use gnuke::nuke::{ConsoleSink, Lister, Nuke, NukeParameters, Resource, Stage};
use gnuke::resource::{get_resource, listers, DefinitionLister, FilterRule, GcpResource, ResourceSelection};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPUTE: &str = "/compute/v1/projects/test-project";
const POLL: Duration = Duration::from_millis(5);

fn session(server: &MockServer, region: &str) -> Arc<GcpClient> {
    let client = GcpClient::from_credentials(
        GcpCredentials::from_access_token("test-token"),
        "test-project",
        region,
    )
    .expect("client should build")
    .with_base_url(&server.uri());
    Arc::new(client)
}

fn handle(session: &Arc<GcpClient>, key: &str, name: &str, location: Option<&str>) -> GcpResource {
    GcpResource::new(
        get_resource(key).expect("registered type"),
        Arc::clone(session),
        name.to_string(),
        location.map(str::to_string),
        BTreeMap::new(),
        Arc::new(Vec::new()),
        POLL,
    )
}

async fn mount_empty_bucket(server: &MockServer, bucket: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{bucket}/o")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "storage#objects"})))
        .mount(server)
        .await;
}

mod listing_tests {
    use super::*;

    /// Aggregated pages are followed and items outside the region are dropped
    #[tokio::test]
    async fn test_list_follows_pages_and_filters_region() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/aggregated/instances")))
            .and(bearer_token("test-token"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "zones/us-central1-a": {"instances": [
                        {"name": "vm-1", "zone": "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a"}
                    ]},
                    "zones/europe-west1-b": {"instances": [
                        {"name": "vm-eu", "zone": "https://www.googleapis.com/compute/v1/projects/test-project/zones/europe-west1-b"}
                    ]}
                },
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/aggregated/instances")))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "zones/us-central1-f": {"instances": [
                        {"name": "vm-2", "zone": "zones/us-central1-f", "labels": {"env": "dev"}}
                    ]},
                    "zones/us-east1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let lister = DefinitionLister::new(
            get_resource("compute-instances").unwrap(),
            Arc::new(Vec::new()),
            POLL,
        );
        let resources = lister.list(&session(&server, "us-central1")).await.unwrap();

        let names: Vec<String> = resources.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, vec!["us-central1-a/vm-1", "us-central1-f/vm-2"]);
        assert!(resources.iter().all(|r| r.resource_type() == "compute-instances"));
    }

    /// Storage buckets are listed per project and have no location
    #[tokio::test]
    async fn test_list_storage_buckets() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "storage#buckets",
                "items": [{"name": "logs"}, {"name": "artifacts"}]
            })))
            .mount(&server)
            .await;

        let lister = DefinitionLister::new(
            get_resource("storage-buckets").unwrap(),
            Arc::new(Vec::new()),
            POLL,
        );
        let resources = lister.list(&session(&server, "us-central1")).await.unwrap();

        let names: Vec<String> = resources.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, vec!["logs", "artifacts"]);
    }

    /// A list error surfaces as an API error
    #[tokio::test]
    async fn test_list_permission_denied() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/global/networks")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Required 'compute.networks.list' permission"}
            })))
            .mount(&server)
            .await;

        let lister = DefinitionLister::new(
            get_resource("compute-networks").unwrap(),
            Arc::new(Vec::new()),
            POLL,
        );
        let err = lister.list(&session(&server, "all")).await.err().unwrap();
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("compute.networks.list"));
    }

    #[tokio::test]
    async fn test_describe_project() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/test-project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projectId": "test-project",
                "name": "Test Project",
                "projectNumber": "1234",
                "lifecycleState": "ACTIVE"
            })))
            .mount(&server)
            .await;

        let project = describe_project(&session(&server, "all")).await.unwrap();
        assert_eq!(project.name, "Test Project");
    }
}

mod removal_tests {
    use super::*;

    /// A zonal delete is polled on its zone operation until DONE
    #[tokio::test]
    async fn test_remove_then_wait_for_operation() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{COMPUTE}/zones/us-central1-a/instances/vm-1")))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/zones/us-central1-a/operations/operation-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "RUNNING"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/zones/us-central1-a/operations/operation-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "DONE"
            })))
            .mount(&server)
            .await;

        let vm = handle(&session(&server, "us-central1"), "compute-instances", "vm-1", Some("us-central1-a"));
        vm.remove().await.unwrap();
        vm.as_waitable().expect("instances are waitable").wait().await.unwrap();
    }

    /// Deleting something that is already gone counts as removed
    #[tokio::test]
    async fn test_remove_not_found_is_success() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{COMPUTE}/global/firewalls/allow-ssh")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The resource was not found"}
            })))
            .mount(&server)
            .await;

        let firewall = handle(&session(&server, "all"), "compute-firewalls", "allow-ssh", None);
        firewall.remove().await.unwrap();
        firewall.as_waitable().unwrap().wait().await.unwrap();
    }

    /// A failed operation fails the wait with the operation's message
    #[tokio::test]
    async fn test_wait_reports_operation_error() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{COMPUTE}/global/networks/default")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-2",
                "status": "PENDING"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/global/operations/operation-2")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-2",
                "status": "DONE",
                "error": {"errors": [{
                    "code": "RESOURCE_IN_USE_BY_ANOTHER_RESOURCE",
                    "message": "The network resource 'default' is already being used by 'fw-1'"
                }]}
            })))
            .mount(&server)
            .await;

        let network = handle(&session(&server, "all"), "compute-networks", "default", None);
        network.remove().await.unwrap();
        let err = network.as_waitable().unwrap().wait().await.unwrap_err();
        assert!(err.to_string().contains("already being used"));
    }

    /// Bucket deletes are synchronous: an empty 204 and nothing to wait on
    #[tokio::test]
    async fn test_storage_delete_is_synchronous() {
        let server = MockServer::start().await;
        mount_empty_bucket(&server, "logs").await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let bucket = handle(&session(&server, "all"), "storage-buckets", "logs", None);
        bucket.remove().await.unwrap();
        assert!(bucket.as_waitable().is_none());
    }

    #[tokio::test]
    async fn test_remove_conflict_is_error() {
        let server = MockServer::start().await;
        mount_empty_bucket(&server, "logs").await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "The bucket you tried to delete is not empty."}
            })))
            .mount(&server)
            .await;

        let bucket = handle(&session(&server, "all"), "storage-buckets", "logs", None);
        let err = bucket.remove().await.unwrap_err();
        assert!(err.to_string().contains("409"));
    }

    /// Every object generation goes before the bucket, across pages
    #[tokio::test]
    async fn test_bucket_is_emptied_before_delete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/logs/o"))
            .and(query_param("versions", "true"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "app.log", "generation": "1700000000000001"},
                    {"name": "app.log", "generation": "1700000000000002"}
                ],
                "nextPageToken": "objects-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/logs/o"))
            .and(query_param("pageToken", "objects-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "old.log", "generation": "1600000000000000"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs/o/app.log"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        // Already removed by someone else
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs/o/old.log"))
            .and(query_param("generation", "1600000000000000"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let bucket = handle(&session(&server, "all"), "storage-buckets", "logs", None);
        bucket.remove().await.unwrap();
    }

    /// An object under retention fails the bucket removal
    #[tokio::test]
    async fn test_locked_object_fails_bucket_delete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b/audit/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "ledger.csv", "generation": "1"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/audit/o/ledger.csv"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Object is subject to bucket's retention policy"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/audit"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let bucket = handle(&session(&server, "all"), "storage-buckets", "audit", None);
        let err = bucket.remove().await.unwrap_err();
        assert!(format!("{err:#}").contains("gs://audit/ledger.csv"));
        assert!(format!("{err:#}").contains("retention policy"));
    }
}

mod nuke_tests {
    use super::*;

    async fn mount_inventory(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/aggregated/disks")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "zones/us-central1-a": {"disks": [
                        {"name": "scratch", "zone": "zones/us-central1-a"},
                        {"name": "keep-me", "zone": "zones/us-central1-a"}
                    ]}
                }
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "logs"}]
            })))
            .mount(server)
            .await;

        mount_empty_bucket(server, "logs").await;
    }

    fn disk_and_bucket_listers() -> Vec<Box<dyn Lister>> {
        let selection = ResourceSelection {
            targets: vec!["storage-buckets".to_string(), "compute-disks".to_string()],
            excludes: vec![],
        };
        let mut filters = HashMap::new();
        filters.insert(
            "compute-disks".to_string(),
            vec![FilterRule::Name("keep-me".to_string())],
        );
        listers(&selection, &filters, POLL).unwrap()
    }

    /// Full run: one filtered disk, one async disk delete and a bucket that
    /// only goes away on the second pass.
    #[tokio::test]
    async fn test_nuke_run_retries_until_clean() {
        let server = MockServer::start().await;
        mount_inventory(&server).await;

        Mock::given(method("DELETE"))
            .and(path(format!("{COMPUTE}/zones/us-central1-a/disks/scratch")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-disk",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/zones/us-central1-a/operations/operation-disk")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-disk",
                "status": "DONE"
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "message": "The bucket you tried to delete is not empty."}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/logs"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let sink = Arc::new(ConsoleSink::new(Vec::<u8>::new()));
        let params = NukeParameters {
            no_dry_run: true,
            ..NukeParameters::default()
        };
        let mut nuke = Nuke::new(
            params,
            session(&server, "us-central1"),
            disk_and_bucket_listers(),
            sink.clone(),
        );

        let summary = nuke.run().await.unwrap();
        assert_eq!(nuke.stage(), Stage::Done);
        assert_eq!(summary.finished, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.passes, 2);
        assert!(summary.is_success());
        drop(nuke);

        let output = Arc::try_unwrap(sink)
            .ok()
            .expect("nuke dropped its sink")
            .into_inner();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("compute-disks - us-central1-a/keep-me - [skip] filtered by config"));
        assert!(output.contains("compute-disks - us-central1-a/scratch - [remove-triggered] triggered remove"));
        assert!(output.contains("compute-disks - us-central1-a/scratch - [success] removed"));
        assert!(output.contains("storage-buckets - logs - [error]"));
        assert!(output.contains("Retrying: 1 finished, 1 failed, 1 skipped."));
        assert!(output.contains("storage-buckets - logs - [remove-triggered] triggered remove"));
    }

    /// Without --no-dry-run nothing is deleted
    #[tokio::test]
    async fn test_nuke_dry_run_deletes_nothing() {
        let server = MockServer::start().await;
        mount_inventory(&server).await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let sink = Arc::new(ConsoleSink::new(Vec::<u8>::new()));
        let mut nuke = Nuke::new(
            NukeParameters::default(),
            session(&server, "us-central1"),
            disk_and_bucket_listers(),
            sink,
        );

        let summary = nuke.run().await.unwrap();
        assert_eq!(summary.finished, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.passes, 1);
    }

    /// A listing failure aborts the run before anything is removed
    #[tokio::test]
    async fn test_nuke_aborts_on_scan_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{COMPUTE}/aggregated/disks")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let params = NukeParameters {
            no_dry_run: true,
            ..NukeParameters::default()
        };
        let mut nuke = Nuke::new(
            params,
            session(&server, "us-central1"),
            disk_and_bucket_listers(),
            Arc::new(ConsoleSink::new(Vec::<u8>::new())),
        );

        let err = nuke.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to list compute-disks"));
        assert_eq!(nuke.buckets().total(), 0);
    }
}
