//! Fixture builders
//!
//! Everything is named for the `kernelworx` app in `us-east-1`, environment
//! `dev`, under [`TEST_BASE_DOMAIN`].

use preflight::aws::models::{
    AuthDomainInfo, CertificateDetail, DISTRIBUTION_DEPLOYED, DistributionInfo, DnsRecord,
    EdgeIdentityInfo, GraphApiInfo, GraphDomainInfo, UserPoolInfo,
};
use preflight::config::ReconcileConfig;
use preflight::wait::WaitConfig;
use preflight_common::Naming;
use preflight_common::tags::TAG_STACK_NAME;
use std::collections::HashMap;
use std::time::Duration;

pub const TEST_BASE_DOMAIN: &str = "example.com";
pub const TEST_ACCOUNT: &str = "123456789012";

pub fn test_naming(environment: &str) -> Naming {
    Naming::new("kernelworx", environment, "us-east-1", TEST_BASE_DOMAIN)
        .expect("test naming is valid")
}

/// Config for the `dev` environment with millisecond waits
pub fn test_config() -> ReconcileConfig {
    let mut config = ReconcileConfig::new(test_naming("dev"));
    config.cleanup.wait = fast_wait();
    config
}

pub fn fast_wait() -> WaitConfig {
    WaitConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
        jitter: 0.0,
    }
}

/// Tags CloudFormation puts on resources it created
pub fn stack_tags(stack_name: &str) -> HashMap<String, String> {
    HashMap::from([(TAG_STACK_NAME.to_string(), stack_name.to_string())])
}

pub fn certificate_arn(id: &str) -> String {
    format!("arn:aws:acm:us-east-1:{TEST_ACCOUNT}:certificate/{id}")
}

/// Issued certificate for `domain`, validated by `_{id}.{domain}.`
pub fn certificate(id: &str, domain: &str) -> CertificateDetail {
    CertificateDetail {
        arn: certificate_arn(id),
        domain_name: domain.to_string(),
        subject_alternative_names: vec![domain.to_string()],
        in_use_by: Vec::new(),
        validation_records: vec![validation_record_name(id, domain)],
        created_at: None,
    }
}

pub fn validation_record_name(id: &str, domain: &str) -> String {
    format!("_{id}.{domain}.")
}

/// ACM validation CNAME as Route 53 lists it
pub fn validation_record(id: &str, domain: &str) -> DnsRecord {
    DnsRecord {
        name: validation_record_name(id, domain),
        record_type: "CNAME".to_string(),
        ttl: Some(300),
        values: vec![format!("_{id}.xlfgrmvvlj.acm-validations.aws.")],
    }
}

pub fn distribution_arn(id: &str) -> String {
    format!("arn:aws:cloudfront::{TEST_ACCOUNT}:distribution/{id}")
}

/// Enabled, deployed distribution serving `alias` from `origin_bucket`
pub fn distribution(id: &str, alias: &str, origin_bucket: &str) -> DistributionInfo {
    DistributionInfo {
        id: id.to_string(),
        arn: distribution_arn(id),
        status: DISTRIBUTION_DEPLOYED.to_string(),
        enabled: true,
        aliases: vec![alias.to_string()],
        origin_domains: vec![format!("{origin_bucket}.s3.us-east-1.amazonaws.com")],
        edge_identity_ids: Vec::new(),
        certificate_arn: None,
    }
}

pub fn edge_identity(id: &str, comment: &str) -> EdgeIdentityInfo {
    EdgeIdentityInfo {
        id: id.to_string(),
        comment: comment.to_string(),
    }
}

pub fn auth_domain(domain: &str, user_pool_id: &str, certificate_arn: &str) -> AuthDomainInfo {
    AuthDomainInfo {
        domain: domain.to_string(),
        user_pool_id: user_pool_id.to_string(),
        certificate_arn: Some(certificate_arn.to_string()),
    }
}

pub fn user_pool(id: &str, name: &str) -> UserPoolInfo {
    UserPoolInfo {
        id: id.to_string(),
        name: name.to_string(),
        arn: Some(format!(
            "arn:aws:cognito-idp:us-east-1:{TEST_ACCOUNT}:userpool/{id}"
        )),
        tags: HashMap::new(),
        created_at: None,
    }
}

pub fn graph_api(api_id: &str, name: &str) -> GraphApiInfo {
    GraphApiInfo {
        api_id: api_id.to_string(),
        arn: format!("arn:aws:appsync:us-east-1:{TEST_ACCOUNT}:apis/{api_id}"),
        name: name.to_string(),
        tags: HashMap::new(),
    }
}

pub fn graph_domain(domain: &str, api_id: Option<&str>, certificate_arn: &str) -> GraphDomainInfo {
    GraphDomainInfo {
        domain_name: domain.to_string(),
        certificate_arn: Some(certificate_arn.to_string()),
        associated_api_id: api_id.map(str::to_string),
    }
}
