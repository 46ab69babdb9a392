//! Sentinel Testing Infrastructure
//!
//! Recording mocks for every collaborator of the secure resource manager and
//! a fixture that wires them together.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sentinel_testkit::*;
//! use sentinel_core::{Method, SubjectId};
//!
//! let fixture = SrmFixture::new();
//! let req = request(SubjectId::ANONYMOUS, Method::Get, "/a/light/0", 1);
//! fixture.srm.on_request(&endpoint(1), &req);
//! assert_eq!(fixture.app.requests().len(), 1);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a `tracing` subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
