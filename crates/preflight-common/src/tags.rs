//! Ownership tags
//!
//! CloudFormation stamps every taggable resource it creates with these
//! provider-assigned tags. Their presence means some stack owns the
//! resource, whichever stack that is.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `aws:cloudformation:stack-name` | Name of the owning stack |
//! | `aws:cloudformation:stack-id` | ARN of the owning stack |
//! | `aws:cloudformation:logical-id` | Logical id inside the owning stack |

use std::collections::HashMap;

/// Tag key carrying the owning stack name
pub const TAG_STACK_NAME: &str = "aws:cloudformation:stack-name";

/// Tag key carrying the owning stack ARN
pub const TAG_STACK_ID: &str = "aws:cloudformation:stack-id";

/// Tag key carrying the logical id inside the owning stack
pub const TAG_LOGICAL_ID: &str = "aws:cloudformation:logical-id";

/// All tag keys that identify stack ownership
pub const OWNERSHIP_TAGS: &[&str] = &[TAG_STACK_NAME, TAG_STACK_ID, TAG_LOGICAL_ID];

/// Return the ownership tag found on a resource, if any.
pub fn ownership_tag(tags: &HashMap<String, String>) -> Option<(&str, &str)> {
    OWNERSHIP_TAGS
        .iter()
        .find_map(|key| tags.get_key_value(*key))
        .map(|(k, v)| (k.as_str(), v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_ownership_tag() {
        for key in OWNERSHIP_TAGS {
            let tags = HashMap::from([(key.to_string(), "kernelworx-ue1-dev".to_string())]);
            assert_eq!(ownership_tag(&tags).map(|(k, _)| k), Some(*key));
        }
    }

    #[test]
    fn ignores_user_tags() {
        let tags = HashMap::from([
            ("Name".to_string(), "kernelworx".to_string()),
            ("cloudformation".to_string(), "yes".to_string()),
        ]);
        assert!(ownership_tag(&tags).is_none());
    }
}
