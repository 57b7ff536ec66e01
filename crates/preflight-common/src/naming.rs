//! Deterministic resource naming
//!
//! The declarative layer names every resource `{app}-{purpose}-{region}-{env}`
//! and serves the site from an environment-scoped subdomain. The engine
//! derives the same names to find the resources it reconciles.

use crate::defaults::PRODUCTION_ENVIRONMENT;
use thiserror::Error;

/// Table purposes, in declaration order
pub const TABLE_PURPOSES: &[&str] = &["accounts", "catalogs", "profiles", "campaigns", "orders"];

/// Purpose of the bucket fronted by the CDN distribution
pub const STATIC_BUCKET_PURPOSE: &str = "static";

/// Purpose of the bucket holding report exports
pub const EXPORTS_BUCKET_PURPOSE: &str = "exports";

/// Purpose of the Cognito user pool
pub const USER_POOL_PURPOSE: &str = "users";

/// Purpose of the AppSync API
pub const API_PURPOSE: &str = "api";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("Invalid region '{0}': expected a form like 'us-east-1'")]
    InvalidRegion(String),

    #[error("Invalid {field} '{value}': only lowercase letters, digits and '-' are allowed")]
    InvalidComponent { field: &'static str, value: String },

    #[error("Base domain must not be empty")]
    EmptyBaseDomain,
}

/// Naming convention for one deployment target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    app: String,
    environment: String,
    region: String,
    region_marker: String,
    base_domain: String,
}

impl Naming {
    pub fn new(
        app: &str,
        environment: &str,
        region: &str,
        base_domain: &str,
    ) -> Result<Self, NamingError> {
        validate_component("app name", app)?;
        validate_component("environment", environment)?;
        let region_marker =
            region_marker(region).ok_or_else(|| NamingError::InvalidRegion(region.to_string()))?;
        let base_domain = base_domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if base_domain.is_empty() {
            return Err(NamingError::EmptyBaseDomain);
        }

        Ok(Self {
            app: app.to_string(),
            environment: environment.to_string(),
            region: region.to_string(),
            region_marker,
            base_domain,
        })
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Short region marker, e.g. `ue1` for `us-east-1`
    pub fn region_marker(&self) -> &str {
        &self.region_marker
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// `{app}-{purpose}-{region}-{env}`
    pub fn resource_name(&self, purpose: &str) -> String {
        format!(
            "{}-{}-{}-{}",
            self.app, purpose, self.region_marker, self.environment
        )
    }

    /// Default stack name: `{app}-{region}-{env}`
    pub fn stack_name(&self) -> String {
        format!("{}-{}-{}", self.app, self.region_marker, self.environment)
    }

    pub fn table_name(&self, purpose: &str) -> String {
        self.resource_name(purpose)
    }

    pub fn table_names(&self) -> Vec<String> {
        TABLE_PURPOSES
            .iter()
            .map(|purpose| self.table_name(purpose))
            .collect()
    }

    pub fn static_bucket(&self) -> String {
        self.resource_name(STATIC_BUCKET_PURPOSE)
    }

    pub fn exports_bucket(&self) -> String {
        self.resource_name(EXPORTS_BUCKET_PURPOSE)
    }

    pub fn user_pool_name(&self) -> String {
        self.resource_name(USER_POOL_PURPOSE)
    }

    pub fn api_name(&self) -> String {
        self.resource_name(API_PURPOSE)
    }

    /// Domain serving the static site
    pub fn site_domain(&self) -> String {
        if self.environment == PRODUCTION_ENVIRONMENT {
            self.base_domain.clone()
        } else {
            format!("{}.{}", self.environment, self.base_domain)
        }
    }

    /// Custom domain of the GraphQL API
    pub fn api_domain(&self) -> String {
        format!("api.{}", self.site_domain())
    }

    /// Custom domain of the hosted login pages
    pub fn login_domain(&self) -> String {
        format!("login.{}", self.site_domain())
    }

    /// Every domain a certificate of this deployment may cover
    pub fn deploy_domains(&self) -> Vec<String> {
        vec![self.site_domain(), self.api_domain(), self.login_domain()]
    }
}

/// Derive the short region marker: first letter of each word plus the
/// trailing number (`us-east-1` -> `ue1`, `ap-southeast-2` -> `as2`).
pub fn region_marker(region: &str) -> Option<String> {
    let parts: Vec<&str> = region.split('-').collect();
    let (number, words) = parts.split_last()?;
    if words.is_empty()
        || number.is_empty()
        || !number.chars().all(|c| c.is_ascii_digit())
        || words
            .iter()
            .any(|w| w.is_empty() || !w.chars().all(|c| c.is_ascii_lowercase()))
    {
        return None;
    }

    let mut marker: String = words.iter().filter_map(|w| w.chars().next()).collect();
    marker.push_str(number);
    Some(marker)
}

fn validate_component(field: &'static str, value: &str) -> Result<(), NamingError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(NamingError::InvalidComponent {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> Naming {
        Naming::new("kernelworx", "dev", "us-east-1", "example.com").unwrap()
    }

    #[test]
    fn region_markers() {
        assert_eq!(region_marker("us-east-1").as_deref(), Some("ue1"));
        assert_eq!(region_marker("us-west-2").as_deref(), Some("uw2"));
        assert_eq!(region_marker("eu-central-1").as_deref(), Some("ec1"));
        assert_eq!(region_marker("ap-southeast-2").as_deref(), Some("as2"));
        assert_eq!(region_marker("us-gov-west-1").as_deref(), Some("ugw1"));
        assert_eq!(region_marker("useast1"), None);
        assert_eq!(region_marker("us-east-x"), None);
        assert_eq!(region_marker(""), None);
    }

    #[test]
    fn resource_names_follow_convention() {
        let naming = dev();
        assert_eq!(naming.table_name("accounts"), "kernelworx-accounts-ue1-dev");
        assert_eq!(naming.static_bucket(), "kernelworx-static-ue1-dev");
        assert_eq!(naming.user_pool_name(), "kernelworx-users-ue1-dev");
        assert_eq!(naming.api_name(), "kernelworx-api-ue1-dev");
        assert_eq!(naming.stack_name(), "kernelworx-ue1-dev");
        assert_eq!(naming.table_names().len(), TABLE_PURPOSES.len());
    }

    #[test]
    fn domains_are_environment_scoped() {
        let naming = dev();
        assert_eq!(naming.site_domain(), "dev.example.com");
        assert_eq!(naming.api_domain(), "api.dev.example.com");
        assert_eq!(naming.login_domain(), "login.dev.example.com");

        let prod = Naming::new("kernelworx", "prod", "us-east-1", "Example.com.").unwrap();
        assert_eq!(prod.site_domain(), "example.com");
        assert_eq!(prod.api_domain(), "api.example.com");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Naming::new("kernelworx", "dev", "nowhere", "example.com"),
            Err(NamingError::InvalidRegion("nowhere".to_string()))
        );
        assert!(matches!(
            Naming::new("kernelworx", "Dev", "us-east-1", "example.com"),
            Err(NamingError::InvalidComponent { field: "environment", .. })
        ));
        assert_eq!(
            Naming::new("kernelworx", "dev", "us-east-1", "  "),
            Err(NamingError::EmptyBaseDomain)
        );
    }
}
