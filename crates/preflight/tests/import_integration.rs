//! Import manifest generation against the in-memory cloud

use preflight::{DistributionPolicy, Orchestrator};
use preflight_common::{ImportRecord, ResourceKind};
use preflight_test_utils::fixtures::{
    auth_domain, certificate_arn, distribution, edge_identity, graph_domain, stack_tags, user_pool,
};
use preflight_test_utils::{FakeCloud, test_config};
use std::collections::HashMap;

const STACK: &str = "kernelworx-ue1-dev";
const ACCOUNTS_TABLE: &str = "kernelworx-accounts-ue1-dev";

fn orchestrator(cloud: FakeCloud) -> Orchestrator<FakeCloud> {
    Orchestrator::new(cloud, test_config())
}

fn of_type<'a>(records: &'a [ImportRecord], resource_type: &str) -> Vec<&'a ImportRecord> {
    records
        .iter()
        .filter(|r| r.resource_type == resource_type)
        .collect()
}

/// A table left behind by a deleted stack is adopted under its CDK id
#[tokio::test]
async fn test_unowned_table_is_imported() {
    let cloud = FakeCloud::new();
    cloud.add_table(ACCOUNTS_TABLE, HashMap::new());

    let records = orchestrator(cloud)
        .import_records()
        .await
        .expect("one record");

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.resource_type, "AWS::DynamoDB::Table");
    assert_eq!(record.logical_resource_id, "AccountsTable81C15AE5");
    assert_eq!(
        record.resource_identifier.get("TableName").map(String::as_str),
        Some(ACCOUNTS_TABLE)
    );
}

#[tokio::test]
async fn test_nothing_to_import() {
    let cloud = FakeCloud::new();
    cloud.add_table(ACCOUNTS_TABLE, stack_tags(STACK));

    assert!(orchestrator(cloud).import_records().await.is_none());
}

/// Importable kinds present outside the stack, each exactly once
#[tokio::test]
async fn test_import_completeness() {
    let cloud = FakeCloud::new();
    cloud.add_table(ACCOUNTS_TABLE, HashMap::new());
    cloud.add_table("kernelworx-orders-ue1-dev", HashMap::new());
    cloud.add_bucket("kernelworx-static-ue1-dev", HashMap::new());
    cloud.add_bucket("kernelworx-exports-ue1-dev", HashMap::new());
    cloud.add_user_pool(user_pool("us-east-1_abc", "kernelworx-users-ue1-dev"));
    cloud.add_auth_domain(auth_domain(
        "login.dev.example.com",
        "us-east-1_abc",
        &certificate_arn("l1"),
    ));
    cloud.add_graph_domain(graph_domain("api.dev.example.com", None, &certificate_arn("g1")));

    let orchestrator = orchestrator(cloud);
    let records = orchestrator.import_records().await.expect("records");

    assert_eq!(records.len(), 7);
    assert_eq!(of_type(&records, "AWS::DynamoDB::Table").len(), 2);
    assert_eq!(of_type(&records, "AWS::S3::Bucket").len(), 2);
    assert_eq!(of_type(&records, "AWS::Cognito::UserPool").len(), 1);

    let domain = of_type(&records, "AWS::Cognito::UserPoolDomain");
    assert_eq!(domain.len(), 1);
    assert_eq!(
        domain[0].resource_identifier.get("UserPoolId").map(String::as_str),
        Some("us-east-1_abc")
    );
    assert_eq!(
        domain[0].resource_identifier.get("Domain").map(String::as_str),
        Some("login.dev.example.com")
    );
    assert_eq!(of_type(&records, "AWS::AppSync::DomainName").len(), 1);

    // Logical ids are unique
    let mut ids: Vec<&str> = records
        .iter()
        .map(|r| r.logical_resource_id.as_str())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), records.len());

    // Distributions are not adopted under the default policy
    assert!(of_type(&records, "AWS::CloudFront::Distribution").is_empty());
}

#[tokio::test]
async fn test_member_is_not_imported_again() {
    let cloud = FakeCloud::new();
    cloud.add_table(ACCOUNTS_TABLE, HashMap::new());

    let orchestrator = orchestrator(cloud);
    let first = orchestrator.import_records().await.expect("records");
    assert_eq!(first.len(), 1);

    orchestrator
        .cloud()
        .add_stack_resource(ResourceKind::Table, ACCOUNTS_TABLE);
    assert!(orchestrator.import_records().await.is_none());
}

#[tokio::test]
async fn test_pinned_pool_is_never_imported() {
    let cloud = FakeCloud::new();
    cloud.add_user_pool(user_pool("us-east-1_keep", "kernelworx-users-ue1-dev"));
    cloud.add_auth_domain(auth_domain(
        "login.dev.example.com",
        "us-east-1_keep",
        &certificate_arn("l1"),
    ));

    let mut config = test_config();
    config.pinned.user_pool_id = Some("us-east-1_keep".to_string());
    let orchestrator = Orchestrator::new(cloud, config);

    assert!(orchestrator.import_records().await.is_none());
}

#[tokio::test]
async fn test_adopt_policy_imports_distribution_and_identity() {
    let cloud = FakeCloud::new();
    let mut site = distribution("EADOPT", "dev.example.com", "kernelworx-static-ue1-dev");
    site.edge_identity_ids = vec!["E1OAI".to_string()];
    cloud.add_distribution(site);
    cloud.add_edge_identity(edge_identity("E1OAI", "access-identity-kernelworx-static-ue1-dev"));

    let mut config = test_config();
    config.cleanup.distribution_policy = DistributionPolicy::Adopt;
    let orchestrator = Orchestrator::new(cloud, config);
    let records = orchestrator.import_records().await.expect("records");

    let distribution = of_type(&records, "AWS::CloudFront::Distribution");
    assert_eq!(distribution.len(), 1);
    assert_eq!(
        distribution[0].resource_identifier.get("Id").map(String::as_str),
        Some("EADOPT")
    );
    let identity = of_type(&records, "AWS::CloudFront::CloudFrontOriginAccessIdentity");
    assert_eq!(identity.len(), 1);
    assert_eq!(
        identity[0].resource_identifier.get("Id").map(String::as_str),
        Some("E1OAI")
    );
}

#[tokio::test]
async fn test_manifest_written_to_configured_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("cdk.out").join("import-existing-resources.json");

    let cloud = FakeCloud::new();
    cloud.add_table(ACCOUNTS_TABLE, HashMap::new());
    let mut config = test_config();
    config.manifest_path = path.to_string_lossy().into_owned();
    let orchestrator = Orchestrator::new(cloud, config);

    let written = orchestrator
        .import_manifest()
        .await
        .expect("manifest written")
        .expect("something to import");
    assert_eq!(written, path);

    let body = std::fs::read_to_string(&path).expect("manifest readable");
    let manifest: HashMap<String, ImportRecord> =
        serde_json::from_str(&body).expect("manifest is a map of records");
    assert_eq!(manifest.len(), 1);
    let record = &manifest["AccountsTable81C15AE5"];
    assert_eq!(record.logical_resource_id, "AccountsTable81C15AE5");
    assert_eq!(record.resource_type, "AWS::DynamoDB::Table");
}

#[tokio::test]
async fn test_no_manifest_when_nothing_to_import() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("import.json");

    let mut config = test_config();
    config.manifest_path = path.to_string_lossy().into_owned();
    let orchestrator = Orchestrator::new(FakeCloud::new(), config);

    assert!(orchestrator.import_manifest().await.expect("no error").is_none());
    assert!(!path.exists());
}
