//! AppSync GraphQL API and custom domain operations

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::{GraphApiInfo, GraphDomainInfo};
use anyhow::{Context, Result};
use aws_sdk_appsync::Client;
use std::future::Future;
use tracing::debug;

pub trait GraphOperations: Send + Sync {
    fn list_graph_apis(&self) -> impl Future<Output = Result<Vec<GraphApiInfo>>> + Send;

    /// Describe a custom domain together with the API it is associated with
    fn get_domain_name(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Option<GraphDomainInfo>>> + Send;

    fn disassociate_api(&self, domain: &str) -> impl Future<Output = Result<()>> + Send;

    fn delete_domain_name(&self, domain: &str) -> impl Future<Output = Result<()>> + Send;

    fn delete_graph_api(&self, api_id: &str) -> impl Future<Output = Result<()>> + Send;
}

pub struct AppSyncClient {
    client: Client,
}

impl FromAwsContext for AppSyncClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.appsync_client(),
        }
    }
}

impl GraphOperations for AppSyncClient {
    async fn list_graph_apis(&self) -> Result<Vec<GraphApiInfo>> {
        let mut apis = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_graphql_apis()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list GraphQL APIs")?;

            for api in response.graphql_apis() {
                let (Some(api_id), Some(name)) = (api.api_id(), api.name()) else {
                    continue;
                };
                apis.push(GraphApiInfo {
                    api_id: api_id.to_string(),
                    arn: api.arn().unwrap_or_default().to_string(),
                    name: name.to_string(),
                    tags: api.tags().cloned().unwrap_or_default(),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(apis)
    }

    async fn get_domain_name(&self, domain: &str) -> Result<Option<GraphDomainInfo>> {
        let result = retry_throttled("appsync:GetDomainName", || async move {
            self.client
                .get_domain_name()
                .domain_name(domain)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) = ignore_not_found(result).context("Failed to get domain name")?
        else {
            return Ok(None);
        };
        let Some(config) = response.domain_name_config() else {
            return Ok(None);
        };

        let association = self
            .client
            .get_api_association()
            .domain_name(domain)
            .send()
            .await
            .map_err(sdk_error);
        let associated_api_id = ignore_not_found(association)
            .context("Failed to get API association")?
            .and_then(|r| r.api_association().and_then(|a| a.api_id()).map(str::to_string));

        Ok(Some(GraphDomainInfo {
            domain_name: config.domain_name().unwrap_or(domain).to_string(),
            certificate_arn: config.certificate_arn().map(str::to_string),
            associated_api_id,
        }))
    }

    async fn disassociate_api(&self, domain: &str) -> Result<()> {
        let result = retry_throttled("appsync:DisassociateApi", || async move {
            self.client
                .disassociate_api()
                .domain_name(domain)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        if ignore_not_found(result)
            .context("Failed to disassociate API")?
            .is_none()
        {
            debug!(domain = %domain, "Domain had no API association");
        }
        Ok(())
    }

    async fn delete_domain_name(&self, domain: &str) -> Result<()> {
        let result = retry_throttled("appsync:DeleteDomainName", || async move {
            self.client
                .delete_domain_name()
                .domain_name(domain)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        ignore_not_found(result).context("Failed to delete domain name")?;
        Ok(())
    }

    async fn delete_graph_api(&self, api_id: &str) -> Result<()> {
        let result = retry_throttled("appsync:DeleteGraphqlApi", || async move {
            self.client
                .delete_graphql_api()
                .api_id(api_id)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        ignore_not_found(result).context("Failed to delete GraphQL API")?;
        Ok(())
    }
}
