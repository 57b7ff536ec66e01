//! preflight-common - Shared types and utilities
//!
//! SDK-free types shared by the engine, its CLI and the test fakes.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`import_record`]: Import records and construct paths
//! - [`logical_id`]: CDK-compatible logical id derivation
//! - [`naming`]: Resource naming convention
//! - [`resource_kind`]: Resource kinds and cleanup ordering
//! - [`tags`]: Stack ownership tags

pub mod defaults;
pub mod import_record;
pub mod logical_id;
pub mod naming;
pub mod resource_kind;
pub mod tags;

pub use import_record::ImportRecord;
pub use naming::{Naming, NamingError};
pub use resource_kind::ResourceKind;
