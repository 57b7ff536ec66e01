//! preflight - pre-deployment stack reconciliation
//!
//! Runs before each infrastructure deploy and brings live cloud state back
//! in line with the stack about to be applied:
//! - orphans CloudFormation cannot import (certificates, validation records,
//!   stray GraphQL APIs and distributions) are detached and deleted
//! - importable resources that exist outside the stack are written to an
//!   import manifest
//!
//! Anything the stack owns, or that cannot be proven unowned, is left alone.

pub mod aws;
pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod detacher;
pub mod import;
pub mod locator;
pub mod membership;
pub mod orchestrator;
pub mod resource;
pub mod teardown;
pub mod wait;

pub use classifier::{ClassificationResult, Reason, classify};
pub use cleaner::{CleanupReport, KindTally};
pub use config::{DistributionPolicy, ReconcileConfig};
pub use membership::{Membership, StackMembershipSet};
pub use orchestrator::{Orchestrator, ScanEntry};
pub use resource::ResourceDescriptor;
