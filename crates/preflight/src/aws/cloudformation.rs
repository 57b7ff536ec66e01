//! CloudFormation stack inventory

use super::context::{AwsContext, FromAwsContext};
use super::error::sdk_error;
use super::models::StackResource;
use anyhow::{Context, Result};
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::types::ResourceStatus;
use std::future::Future;
use tracing::debug;

pub trait StackOperations: Send + Sync {
    /// List the live resources of a stack.
    ///
    /// A stack that does not exist fails with a not-found error, which the
    /// caller reads as an empty inventory.
    fn list_stack_resources(
        &self,
        stack_name: &str,
    ) -> impl Future<Output = Result<Vec<StackResource>>> + Send;
}

pub struct CloudFormationClient {
    client: Client,
}

impl FromAwsContext for CloudFormationClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudformation_client(),
        }
    }
}

impl StackOperations for CloudFormationClient {
    async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<StackResource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_stack_resources()
                .stack_name(stack_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
                .with_context(|| format!("Failed to list resources of stack {stack_name}"))?;

            for summary in response.stack_resource_summaries() {
                if summary.resource_status() == Some(&ResourceStatus::DeleteComplete) {
                    continue;
                }
                let (Some(resource_type), Some(logical_id)) =
                    (summary.resource_type(), summary.logical_resource_id())
                else {
                    continue;
                };
                resources.push(StackResource {
                    resource_type: resource_type.to_string(),
                    physical_id: summary.physical_resource_id().unwrap_or_default().to_string(),
                    logical_id: logical_id.to_string(),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(stack = %stack_name, count = resources.len(), "Listed stack resources");
        Ok(resources)
    }
}
