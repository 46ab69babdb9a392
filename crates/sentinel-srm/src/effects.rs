//! Collaborator interfaces consumed by the secure resource manager
//!
//! The access-decision pipeline owns none of the data it reasons about. ACL
//! matching, the resource registry, the Access Management Service and the
//! transport are reached through these traits, and the application layer is
//! reached through the handler traits registered on the facade.

use crate::ams::AmsQuery;
use crate::engine::DenyReason;
use crate::svr::SvrType;
use sentinel_core::{
    Endpoint, Permission, Request, ResourceProperties, Response, SubjectId, TransportError,
};

/// Verdict of a local ACL lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclVerdict {
    /// An ACE grants the requested permission.
    Granted,
    /// No ACE grants it.
    Denied(DenyReason),
    /// Access is group-mediated; an Access Management Service must decide.
    RequiresAms,
}

/// Resolved ACL lookup.
pub trait AclResolver: Send + Sync {
    /// Look up whether `subject` holds `permission` on `uri`.
    fn resolve(
        &self,
        subject: &SubjectId,
        uri: &str,
        permission: Permission,
        resource_type: SvrType,
    ) -> AclVerdict;
}

/// Registry of locally hosted resources.
pub trait ResourceDirectory: Send + Sync {
    /// Properties of the resource at `uri`, `None` if it is not hosted here.
    fn resource_properties(&self, uri: &str) -> Option<ResourceProperties>;
}

/// Outbound path to an Access Management Service.
pub trait AmsClient: Send + Sync {
    /// Issue an asynchronous access query. The answer arrives later through
    /// `SecureResourceManager::on_ams_decision`.
    fn request_decision(&self, query: &AmsQuery) -> sentinel_core::Result<()>;
}

/// Outbound path for responses.
pub trait ResponseSender: Send + Sync {
    /// Send `response` to `endpoint`.
    fn send_response(&self, endpoint: &Endpoint, response: &Response) -> sentinel_core::Result<()>;
}

/// Application-layer request handler.
pub trait RequestHandler: Send + Sync {
    /// Handle an authorized request. Must not call back into the facade.
    fn on_request(&self, endpoint: &Endpoint, request: &Request);
}

/// Application-layer response handler.
pub trait ResponseHandler: Send + Sync {
    /// Handle a response that no provisioning client claimed.
    fn on_response(&self, endpoint: &Endpoint, response: &Response);
}

/// Application-layer transport error handler.
pub trait ErrorHandler: Send + Sync {
    /// Handle a transport error.
    fn on_error(&self, endpoint: &Endpoint, error: &TransportError);
}

/// Provisioning client response matcher.
pub trait ProvisioningResponseHandler: Send + Sync {
    /// Returns `true` when the response answers one of the provisioning
    /// client's own requests (token match), in which case it is consumed.
    fn claim_response(&self, endpoint: &Endpoint, response: &Response) -> bool;
}

/// Persistence backend handed to the SVR storage layer.
pub trait PersistentStorage: Send + Sync {
    /// Read a named blob.
    fn read(&self, name: &str) -> sentinel_core::Result<Vec<u8>>;
    /// Replace a named blob.
    fn write(&self, name: &str, data: &[u8]) -> sentinel_core::Result<()>;
    /// Remove a named blob.
    fn unlink(&self, name: &str) -> sentinel_core::Result<()>;
}

impl<F> RequestHandler for F
where
    F: Fn(&Endpoint, &Request) + Send + Sync,
{
    fn on_request(&self, endpoint: &Endpoint, request: &Request) {
        self(endpoint, request);
    }
}

impl<F> ResponseHandler for F
where
    F: Fn(&Endpoint, &Response) + Send + Sync,
{
    fn on_response(&self, endpoint: &Endpoint, response: &Response) {
        self(endpoint, response);
    }
}

impl<F> ErrorHandler for F
where
    F: Fn(&Endpoint, &TransportError) + Send + Sync,
{
    fn on_error(&self, endpoint: &Endpoint, error: &TransportError) {
        self(endpoint, error);
    }
}
