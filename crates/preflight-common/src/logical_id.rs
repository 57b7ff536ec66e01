//! Logical resource ids
//!
//! CloudFormation only adopts an existing resource when the import record's
//! logical id matches the template. The declarative layer derives logical ids
//! from construct paths with CDK's unique-id rule, reproduced here exactly:
//!
//! - `Default` components are dropped everywhere.
//! - A single component is used as-is (alphanumerics only).
//! - Otherwise the id is a human part followed by an 8-character uppercase
//!   MD5 prefix of the full path joined with `/`. The human part skips
//!   `Resource` components and components that the previous one ends with.

use md5::{Digest, Md5};

const HIDDEN_ID: &str = "Default";
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";
const PATH_SEP: &str = "/";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;
const MAX_ID_LEN: usize = 255;

/// Compute the logical id for a construct path relative to its stack.
///
/// Returns `None` for an empty path.
pub fn make_unique_id(components: &[&str]) -> Option<String> {
    let components: Vec<&str> = components
        .iter()
        .copied()
        .filter(|c| *c != HIDDEN_ID)
        .collect();

    match components.as_slice() {
        [] => return None,
        [single] => {
            let candidate = remove_non_alphanumeric(single);
            if candidate.len() <= MAX_ID_LEN {
                return Some(candidate);
            }
        }
        _ => {}
    }

    let hash = path_hash(&components);
    let mut human: String = remove_dupes(&components)
        .into_iter()
        .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
        .map(remove_non_alphanumeric)
        .collect();
    human.truncate(MAX_HUMAN_LEN);

    Some(human + &hash)
}

fn path_hash(components: &[&str]) -> String {
    let digest = Md5::digest(components.join(PATH_SEP).as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(HASH_LEN);
    hex.to_ascii_uppercase()
}

fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut kept: Vec<&'a str> = Vec::with_capacity(components.len());
    for component in components {
        match kept.last() {
            Some(previous) if previous.ends_with(component) => {}
            _ => kept.push(component),
        }
    }
    kept
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
