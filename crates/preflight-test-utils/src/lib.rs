//! Shared test utilities for preflight
//!
//! This crate provides an in-memory stand-in for every provider preflight
//! talks to, plus fixture builders, so engine tests run without AWS.
//!
//! ## Modules
//!
//! - [`fake`]: [`FakeCloud`], a stateful fake with a call log and failure knobs
//! - [`fixtures`]: Builders for certificates, records and distributions

pub mod fake;
pub mod fixtures;

pub use fake::{Call, FakeCloud, Op};
pub use fixtures::{TEST_BASE_DOMAIN, test_config, test_naming};
