//! Sentinel Core - shared vocabulary of the secure resource manager
//!
//! Foundation types consumed by the access-control pipeline and by the
//! transport adapters that feed it:
//! - `SubjectId`: requester identity, all-zero when the channel is unauthenticated
//! - `Endpoint`: opaque transport handle a response is correlated to
//! - `Request` / `Response` / `TransportError`: messages crossing the transport boundary
//! - `Permission` / `ResourceProperties`: CRUDN bits and resource flags
//! - `SrmConfig`: runtime configuration
//! - `SentinelError`: unified error type

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Requester identities and transport endpoints
pub mod identifiers;

/// Transport messages, methods and permission bits
pub mod messages;

/// Runtime configuration
pub mod config;

pub use config::{BusyRequestPolicy, SrmConfig, MAX_URI_LENGTH};
pub use errors::{Result, SentinelError};
pub use identifiers::{Endpoint, EndpointId, SubjectId, TransportAdapter};
pub use messages::{
    MessageType, Method, Permission, Request, ResourceProperties, Response, ResponseResult, Token,
    TransportError,
};
