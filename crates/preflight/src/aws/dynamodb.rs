//! DynamoDB table lookups

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::TableInfo;
use super::tags::extract_tags;
use anyhow::{Context, Result};
use aws_sdk_dynamodb::Client;
use chrono::DateTime;
use std::collections::HashMap;
use std::future::Future;

pub trait TableOperations: Send + Sync {
    /// Describe a table, `None` if it does not exist
    fn describe_table(&self, name: &str)
    -> impl Future<Output = Result<Option<TableInfo>>> + Send;

    fn table_tags(&self, arn: &str)
    -> impl Future<Output = Result<HashMap<String, String>>> + Send;
}

pub struct DynamoDbClient {
    client: Client,
}

impl FromAwsContext for DynamoDbClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.dynamodb_client(),
        }
    }
}

impl TableOperations for DynamoDbClient {
    async fn describe_table(&self, name: &str) -> Result<Option<TableInfo>> {
        let result = retry_throttled("dynamodb:DescribeTable", || async move {
            self.client
                .describe_table()
                .table_name(name)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) = ignore_not_found(result).context("Failed to describe table")? else {
            return Ok(None);
        };
        let Some(table) = response.table() else {
            return Ok(None);
        };

        Ok(Some(TableInfo {
            name: table.table_name().unwrap_or(name).to_string(),
            arn: table.table_arn().unwrap_or_default().to_string(),
            created_at: table
                .creation_date_time()
                .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
        }))
    }

    async fn table_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        let mut tags = HashMap::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_tags_of_resource()
                .resource_arn(arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list table tags")?;

            tags.extend(extract_tags(
                response.tags(),
                |t| Some(t.key()),
                |t| Some(t.value()),
            ));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(tags)
    }
}
