//! Safety, fail-safe and idempotence guarantees across whole runs

use preflight::aws::error::AwsError;
use preflight::{Orchestrator, Reason};
use preflight_common::ResourceKind;
use preflight_test_utils::fixtures::{
    auth_domain, certificate, certificate_arn, distribution, edge_identity, graph_api,
    stack_tags, validation_record,
};
use preflight_test_utils::{FakeCloud, Op, test_config};
use std::collections::HashMap;

const ZONE_ID: &str = "Z0EXAMPLE";
const STACK: &str = "kernelworx-ue1-dev";
const STATIC_BUCKET: &str = "kernelworx-static-ue1-dev";

/// A deployment with one resource of every kind, none owned by the stack
fn seeded() -> FakeCloud {
    let cloud = FakeCloud::new();
    let login_cert = certificate_arn("login");
    cloud.add_certificate(certificate("api", "api.dev.example.com"));
    cloud.add_certificate(certificate("login", "login.dev.example.com"));
    cloud.add_auth_domain(auth_domain("login.dev.example.com", "us-east-1_pool", &login_cert));
    cloud.add_zone(ZONE_ID, "example.com");
    cloud.add_record(ZONE_ID, validation_record("api", "api.dev.example.com"));
    cloud.add_graph_api(graph_api("api123", "kernelworx-api-ue1-dev"));
    let mut site = distribution("ESITE", "dev.example.com", STATIC_BUCKET);
    site.edge_identity_ids = vec!["E1OAI".to_string()];
    cloud.add_distribution(site);
    cloud.add_edge_identity(edge_identity("E1OAI", "access-identity-kernelworx-static-ue1-dev"));
    cloud.add_table("kernelworx-accounts-ue1-dev", HashMap::new());
    cloud
}

/// An unreadable stack inventory must never look like an empty one
#[tokio::test]
async fn test_membership_failure_blocks_every_delete() {
    let cloud = seeded();
    cloud.fail_always(
        Op::ListStackResources,
        AwsError::AccessDenied {
            message: "not authorized to perform cloudformation:ListStackResources".to_string(),
        },
    );

    let orchestrator = Orchestrator::new(cloud, test_config());
    let report = orchestrator.cleanup().await;

    assert!(orchestrator.cloud().mutations().is_empty());
    assert_eq!(report.total_deleted(), 0);
    assert!(orchestrator.cloud().has_distribution("ESITE"));
    assert_eq!(report.get(ResourceKind::CdnDistribution).managed, 1);
}

#[tokio::test]
async fn test_membership_failure_skips_import() {
    let cloud = seeded();
    cloud.fail_always(
        Op::ListStackResources,
        AwsError::Throttled,
    );

    let orchestrator = Orchestrator::new(cloud, test_config());
    assert!(orchestrator.import_records().await.is_none());
}

#[tokio::test]
async fn test_membership_failure_classifies_everything_managed() {
    let cloud = seeded();
    cloud.fail_always(
        Op::ListStackResources,
        AwsError::Sdk {
            code: Some("InternalFailure".to_string()),
            message: "boom".to_string(),
        },
    );

    let orchestrator = Orchestrator::new(cloud, test_config());
    let entries = orchestrator.scan().await;

    assert!(!entries.is_empty());
    for entry in entries {
        assert!(entry.classification.managed, "{entry:?}");
        assert_eq!(entry.classification.reason, Reason::LookupFailed);
    }
}

#[tokio::test]
async fn test_owned_resources_are_never_touched() {
    let cloud = FakeCloud::new();
    let login_cert = certificate_arn("login");
    // Untagged but listed in the stack inventory
    cloud.add_certificate(certificate("api", "api.dev.example.com"));
    cloud.add_stack_resource(ResourceKind::Certificate, &certificate_arn("api"));
    // Tagged by the stack
    cloud.add_tagged_certificate(certificate("login", "login.dev.example.com"), stack_tags(STACK));
    cloud.add_auth_domain(auth_domain("login.dev.example.com", "us-east-1_pool", &login_cert));
    cloud.add_stack_resource(ResourceKind::AuthDomain, "login.dev.example.com");
    let mut site = distribution("ESITE", "dev.example.com", STATIC_BUCKET);
    site.edge_identity_ids = vec!["E1OAI".to_string()];
    cloud.add_distribution(site);
    cloud.add_stack_resource(ResourceKind::CdnDistribution, "ESITE");
    cloud.add_edge_identity(edge_identity("E1OAI", "access-identity-kernelworx-static-ue1-dev"));
    cloud.add_stack_resource(ResourceKind::EdgeIdentity, "E1OAI");
    cloud.add_graph_api(graph_api("api123", "kernelworx-api-ue1-dev"));
    cloud.add_stack_resource(
        ResourceKind::GraphApi,
        "arn:aws:appsync:us-east-1:123456789012:apis/api123",
    );

    let orchestrator = Orchestrator::new(cloud, test_config());
    orchestrator.cleanup().await;

    assert!(
        orchestrator.cloud().mutations().is_empty(),
        "{:?}",
        orchestrator.cloud().mutations()
    );
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let orchestrator = Orchestrator::new(seeded(), test_config());

    let first = orchestrator.cleanup().await;
    assert!(first.total_deleted() > 0);
    assert!(!orchestrator.cloud().has_distribution("ESITE"));

    orchestrator.cloud().clear_calls();
    let second = orchestrator.cleanup().await;
    assert!(orchestrator.cloud().mutations().is_empty());
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(second.total_failed(), 0);
}

#[tokio::test]
async fn test_import_is_stable_across_runs() {
    let orchestrator = Orchestrator::new(seeded(), test_config());

    let first = orchestrator.import_records().await;
    let second = orchestrator.import_records().await;
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_scan_reports_orphans_and_members() {
    let cloud = seeded();
    cloud.add_stack_resource(ResourceKind::Table, "kernelworx-accounts-ue1-dev");

    let orchestrator = Orchestrator::new(cloud, test_config());
    let entries = orchestrator.scan().await;

    let table = entries
        .iter()
        .find(|e| e.descriptor.kind == ResourceKind::Table)
        .expect("table scanned");
    assert_eq!(table.classification.reason, Reason::InStack);

    let api = entries
        .iter()
        .find(|e| e.descriptor.kind == ResourceKind::GraphApi)
        .expect("api scanned");
    assert!(!api.classification.managed);
    assert_eq!(api.classification.reason, Reason::NotFound);

    // Scanning never mutates
    assert!(orchestrator.cloud().mutations().is_empty());

    let json = serde_json::to_value(&entries).expect("scan serializes");
    assert_eq!(json.as_array().map(Vec::len), Some(entries.len()));
}
