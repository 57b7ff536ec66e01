//! Cognito user pool and hosted-domain operations

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::{AuthDomainInfo, UserPoolInfo};
use anyhow::{Context, Result};
use aws_sdk_cognitoidentityprovider::Client;
use aws_sdk_cognitoidentityprovider::primitives::DateTime as SdkDateTime;
use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::debug;

pub trait AuthOperations: Send + Sync {
    /// Describe a hosted (custom) domain, `None` if no pool owns it
    fn describe_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Option<AuthDomainInfo>>> + Send;

    /// Remove a hosted domain from its user pool
    fn delete_domain(
        &self,
        domain: &str,
        user_pool_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// List user pools (tags are not part of the listing)
    fn list_user_pools(&self) -> impl Future<Output = Result<Vec<UserPoolInfo>>> + Send;

    /// Describe one pool including its tags
    fn describe_user_pool(
        &self,
        user_pool_id: &str,
    ) -> impl Future<Output = Result<Option<UserPoolInfo>>> + Send;
}

pub struct CognitoClient {
    client: Client,
}

impl FromAwsContext for CognitoClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cognito_client(),
        }
    }
}

fn to_utc(dt: Option<&SdkDateTime>) -> Option<DateTime<Utc>> {
    dt.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

impl AuthOperations for CognitoClient {
    async fn describe_domain(&self, domain: &str) -> Result<Option<AuthDomainInfo>> {
        let result = retry_throttled("cognito:DescribeUserPoolDomain", || async move {
            self.client
                .describe_user_pool_domain()
                .domain(domain)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) =
            ignore_not_found(result).context("Failed to describe user pool domain")?
        else {
            return Ok(None);
        };

        // An unclaimed domain comes back as an empty description
        let Some(description) = response.domain_description() else {
            return Ok(None);
        };
        let (Some(name), Some(pool_id)) = (description.domain(), description.user_pool_id())
        else {
            return Ok(None);
        };

        Ok(Some(AuthDomainInfo {
            domain: name.to_string(),
            user_pool_id: pool_id.to_string(),
            certificate_arn: description
                .custom_domain_config()
                .map(|c| c.certificate_arn().to_string()),
        }))
    }

    async fn delete_domain(&self, domain: &str, user_pool_id: &str) -> Result<()> {
        let result = retry_throttled("cognito:DeleteUserPoolDomain", || async move {
            self.client
                .delete_user_pool_domain()
                .domain(domain)
                .user_pool_id(user_pool_id)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        if ignore_not_found(result)
            .context("Failed to delete user pool domain")?
            .is_none()
        {
            debug!(domain = %domain, "User pool domain already deleted");
        }
        Ok(())
    }

    async fn list_user_pools(&self) -> Result<Vec<UserPoolInfo>> {
        let mut pools = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_user_pools()
                .max_results(60)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list user pools")?;

            for pool in response.user_pools() {
                let (Some(id), Some(name)) = (pool.id(), pool.name()) else {
                    continue;
                };
                pools.push(UserPoolInfo {
                    id: id.to_string(),
                    name: name.to_string(),
                    arn: None,
                    tags: Default::default(),
                    created_at: to_utc(pool.creation_date()),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(pools)
    }

    async fn describe_user_pool(&self, user_pool_id: &str) -> Result<Option<UserPoolInfo>> {
        let result = retry_throttled("cognito:DescribeUserPool", || async move {
            self.client
                .describe_user_pool()
                .user_pool_id(user_pool_id)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) = ignore_not_found(result).context("Failed to describe user pool")?
        else {
            return Ok(None);
        };
        let Some(pool) = response.user_pool() else {
            return Ok(None);
        };

        Ok(Some(UserPoolInfo {
            id: pool.id().unwrap_or(user_pool_id).to_string(),
            name: pool.name().unwrap_or_default().to_string(),
            arn: pool.arn().map(str::to_string),
            tags: pool.user_pool_tags().cloned().unwrap_or_default(),
            created_at: to_utc(pool.creation_date()),
        }))
    }
}
