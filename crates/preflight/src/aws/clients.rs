//! Explicit registry of provider clients
//!
//! Built once per process from a single loaded [`AwsContext`] and passed to
//! the orchestrator, so no module keeps a hidden client cache.

use super::CloudApi;
use super::acm::AcmClient;
use super::appsync::AppSyncClient;
use super::cloudformation::CloudFormationClient;
use super::cloudfront::CloudFrontClient;
use super::cognito::CognitoClient;
use super::context::{AwsContext, FromAwsContext};
use super::dynamodb::DynamoDbClient;
use super::route53::Route53Client;
use super::s3::S3Client;

pub struct ProviderClients {
    acm: AcmClient,
    route53: Route53Client,
    cognito: CognitoClient,
    cloudfront: CloudFrontClient,
    appsync: AppSyncClient,
    dynamodb: DynamoDbClient,
    s3: S3Client,
    cloudformation: CloudFormationClient,
}

impl FromAwsContext for ProviderClients {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            acm: AcmClient::from_context(ctx),
            route53: Route53Client::from_context(ctx),
            cognito: CognitoClient::from_context(ctx),
            cloudfront: CloudFrontClient::from_context(ctx),
            appsync: AppSyncClient::from_context(ctx),
            dynamodb: DynamoDbClient::from_context(ctx),
            s3: S3Client::from_context(ctx),
            cloudformation: CloudFormationClient::from_context(ctx),
        }
    }
}

impl CloudApi for ProviderClients {
    type Certificates = AcmClient;
    type Dns = Route53Client;
    type Auth = CognitoClient;
    type Cdn = CloudFrontClient;
    type Graph = AppSyncClient;
    type Tables = DynamoDbClient;
    type Buckets = S3Client;
    type Stacks = CloudFormationClient;

    fn certificates(&self) -> &AcmClient {
        &self.acm
    }

    fn dns(&self) -> &Route53Client {
        &self.route53
    }

    fn auth(&self) -> &CognitoClient {
        &self.cognito
    }

    fn cdn(&self) -> &CloudFrontClient {
        &self.cloudfront
    }

    fn graph(&self) -> &AppSyncClient {
        &self.appsync
    }

    fn tables(&self) -> &DynamoDbClient {
        &self.dynamodb
    }

    fn buckets(&self) -> &S3Client {
        &self.s3
    }

    fn stacks(&self) -> &CloudFormationClient {
        &self.cloudformation
    }
}
