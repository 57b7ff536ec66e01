//! Import records and the construct paths they are keyed by
//!
//! Construct paths mirror the declarative layer's construct tree. They must
//! change in lock-step with it or CloudFormation rejects the import.

use crate::logical_id::make_unique_id;
use crate::resource_kind::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Construct path of the static site bucket
pub const STATIC_BUCKET_PATH: &[&str] = &["StaticSiteBucket", "Resource"];

/// Construct path of the exports bucket
pub const EXPORTS_BUCKET_PATH: &[&str] = &["ExportsBucket", "Resource"];

/// Construct path of the user pool
pub const USER_POOL_PATH: &[&str] = &["UserPool", "Resource"];

/// Construct path of the hosted-login domain added to the user pool
pub const USER_POOL_DOMAIN_PATH: &[&str] = &["UserPool", "Domain", "Resource"];

/// Construct path of the GraphQL API's custom domain (an L1 child of the API)
pub const API_DOMAIN_PATH: &[&str] = &["Api", "DomainName"];

/// Construct path of the site distribution
pub const DISTRIBUTION_PATH: &[&str] = &["Distribution", "Resource"];

/// Construct path of the identity created for the distribution's S3 origin
pub const EDGE_IDENTITY_PATH: &[&str] = &["Distribution", "Origin1", "S3Origin", "Resource"];

/// Construct id of a table: `accounts` -> `AccountsTable`
pub fn table_construct_id(purpose: &str) -> String {
    let mut id: String = purpose
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    id.push_str("Table");
    id
}

/// One resource for CloudFormation's "import existing resources" workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportRecord {
    pub resource_type: String,
    pub logical_resource_id: String,
    pub resource_identifier: BTreeMap<String, String>,
}

impl ImportRecord {
    /// Build a record for a construct path, computing its logical id.
    ///
    /// Returns `None` for an empty construct path.
    pub fn for_construct(
        kind: ResourceKind,
        construct_path: &[&str],
        identifier: impl IntoIterator<Item = (&'static str, String)>,
    ) -> Option<Self> {
        Some(Self {
            resource_type: kind.cloudformation_type().to_string(),
            logical_resource_id: make_unique_id(construct_path)?,
            resource_identifier: identifier
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }

    pub fn table(purpose: &str, table_name: &str) -> Self {
        let construct_id = table_construct_id(purpose);
        Self {
            resource_type: ResourceKind::Table.cloudformation_type().to_string(),
            logical_resource_id: make_unique_id(&[construct_id.as_str(), "Resource"])
                .unwrap_or(construct_id),
            resource_identifier: BTreeMap::from([(
                "TableName".to_string(),
                table_name.to_string(),
            )]),
        }
    }
}

/// Render records as the manifest file body: one JSON object keyed by
/// logical id. Later records with a duplicate id are dropped.
pub fn manifest_json(records: &[ImportRecord]) -> serde_json::Result<String> {
    let mut by_logical_id: BTreeMap<&str, &ImportRecord> = BTreeMap::new();
    for record in records {
        by_logical_id
            .entry(record.logical_resource_id.as_str())
            .or_insert(record);
    }
    serde_json::to_string_pretty(&by_logical_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_construct_ids() {
        assert_eq!(table_construct_id("accounts"), "AccountsTable");
        assert_eq!(table_construct_id("shared-campaigns"), "SharedCampaignsTable");
    }

    #[test]
    fn table_record_shape() {
        let record = ImportRecord::table("accounts", "kernelworx-accounts-ue1-dev");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ResourceType"], "AWS::DynamoDB::Table");
        assert_eq!(json["LogicalResourceId"], "AccountsTable81C15AE5");
        assert_eq!(
            json["ResourceIdentifier"]["TableName"],
            "kernelworx-accounts-ue1-dev"
        );
    }

    #[test]
    fn construct_record_with_compound_identifier() {
        let record = ImportRecord::for_construct(
            ResourceKind::AuthDomain,
            USER_POOL_DOMAIN_PATH,
            [
                ("UserPoolId", "us-east-1_abc".to_string()),
                ("Domain", "login.dev.example.com".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(record.resource_type, "AWS::Cognito::UserPoolDomain");
        assert_eq!(record.logical_resource_id, "UserPoolDomainD0EA232A");
        assert_eq!(record.resource_identifier.len(), 2);
    }

    #[test]
    fn manifest_is_keyed_by_logical_id() {
        let records = vec![
            ImportRecord::table("accounts", "kernelworx-accounts-ue1-dev"),
            ImportRecord::table("accounts", "duplicate"),
        ];
        let body: serde_json::Value =
            serde_json::from_str(&manifest_json(&records).unwrap()).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(
            object["AccountsTable81C15AE5"]["ResourceIdentifier"]["TableName"],
            "kernelworx-accounts-ue1-dev"
        );
    }
}
