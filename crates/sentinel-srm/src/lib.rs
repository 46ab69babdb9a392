#![deny(clippy::await_holding_lock)]
//! # Sentinel SRM - secure resource manager
//!
//! Access-control core of the device security stack. Every inbound request
//! is checked before it reaches the application layer:
//! - `svr`: classify the URI as a Secure Virtual Resource or an ordinary one
//! - `dispatch`: reject secure resources reached over unauthenticated channels
//! - `engine`: single-flight access decision against the ACL
//! - `ams`: park undecidable requests and delegate to an Access Management Service
//!
//! Collaborators (transport, ACL store, resource registry, AMS client) are
//! reached through the traits in `effects`.

pub mod ams;
pub mod dispatch;
pub mod effects;
pub mod engine;
pub mod errors;
pub mod response;
pub mod svr;

pub use ams::{AmsDecision, AmsQuery, PendingDelegation, ResumeAction};
pub use dispatch::{DispatchOutcome, ResponseRoute, SecureResourceManager, SrmCollaborators};
pub use effects::{
    AclResolver, AclVerdict, AmsClient, ErrorHandler, PersistentStorage,
    ProvisioningResponseHandler, RequestHandler, ResourceDirectory, ResponseHandler,
    ResponseSender,
};
pub use engine::{AccessDecision, DenyReason, PolicyEngine, PolicyEngineContext, PolicyEngineState};
pub use errors::{SrmError, SrmResult};
pub use svr::{classify, is_security_resource_uri, strip_query, SvrType};
