//! AWS provider clients
//!
//! One client per service, each behind an `*Operations` trait so the engine
//! runs unchanged against the real account or an in-memory fake:
//! - ACM: certificates (always read in `us-east-1`)
//! - Route 53: hosted zones and validation records
//! - Cognito: user pools and their hosted domains
//! - CloudFront: distributions and origin access identities
//! - AppSync: GraphQL APIs and custom domains
//! - DynamoDB / S3: existence checks for importable resources
//! - CloudFormation: stack inventory

pub mod acm;
pub mod appsync;
pub mod clients;
pub mod cloudformation;
pub mod cloudfront;
pub mod cognito;
pub mod context;
pub mod dynamodb;
pub mod error;
pub mod models;
pub mod route53;
pub mod s3;
pub mod tags;

pub use acm::{AcmClient, CertificateOperations};
pub use appsync::{AppSyncClient, GraphOperations};
pub use clients::ProviderClients;
pub use cloudformation::{CloudFormationClient, StackOperations};
pub use cloudfront::{CdnOperations, CloudFrontClient};
pub use cognito::{AuthOperations, CognitoClient};
pub use context::{AwsContext, FromAwsContext};
pub use dynamodb::{DynamoDbClient, TableOperations};
pub use route53::{DnsOperations, Route53Client};
pub use s3::{BucketOperations, S3Client};

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, ignore_not_found};

/// Every provider the engine talks to, one accessor per service.
///
/// Implemented by [`ProviderClients`] for real AWS and by the test fake.
pub trait CloudApi: Send + Sync {
    type Certificates: CertificateOperations;
    type Dns: DnsOperations;
    type Auth: AuthOperations;
    type Cdn: CdnOperations;
    type Graph: GraphOperations;
    type Tables: TableOperations;
    type Buckets: BucketOperations;
    type Stacks: StackOperations;

    fn certificates(&self) -> &Self::Certificates;
    fn dns(&self) -> &Self::Dns;
    fn auth(&self) -> &Self::Auth;
    fn cdn(&self) -> &Self::Cdn;
    fn graph(&self) -> &Self::Graph;
    fn tables(&self) -> &Self::Tables;
    fn buckets(&self) -> &Self::Buckets;
    fn stacks(&self) -> &Self::Stacks;
}
