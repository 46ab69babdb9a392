//! Request, response and error messages exchanged with the transport layer

use crate::identifiers::SubjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Retrieve a representation
    Get,
    /// Update (partial) or invoke
    Post,
    /// Create or replace
    Put,
    /// Remove
    Delete,
}

impl Method {
    /// Permission an ACL must grant for this method.
    ///
    /// POST is treated as an update, so it maps to WRITE like PUT.
    pub fn required_permission(self) -> Permission {
        match self {
            Method::Get => Permission::READ,
            Method::Post | Method::Put => Permission::WRITE,
            Method::Delete => Permission::DELETE,
        }
    }
}

/// CRUDN permission bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u16);

impl Permission {
    /// No permission
    pub const NONE: Permission = Permission(0);
    /// Create
    pub const CREATE: Permission = Permission(1 << 0);
    /// Read / retrieve
    pub const READ: Permission = Permission(1 << 1);
    /// Write / update
    pub const WRITE: Permission = Permission(1 << 2);
    /// Delete
    pub const DELETE: Permission = Permission(1 << 3);
    /// Notify (observe)
    pub const NOTIFY: Permission = Permission(1 << 4);
    /// Every permission bit
    pub const FULL: Permission = Permission(0x1f);

    /// Create from raw bits, discarding unknown ones.
    pub fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::FULL.0)
    }

    /// Raw bits
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Permission) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permission(self.0 | rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::CREATE, 'C'),
            (Self::READ, 'R'),
            (Self::WRITE, 'U'),
            (Self::DELETE, 'D'),
            (Self::NOTIFY, 'N'),
        ];
        for (flag, tag) in flags {
            let c = if self.contains(flag) { tag } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Properties a resource was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceProperties(u8);

impl ResourceProperties {
    /// No properties
    pub const NONE: ResourceProperties = ResourceProperties(0);
    /// Listed in discovery responses
    pub const DISCOVERABLE: ResourceProperties = ResourceProperties(1 << 0);
    /// Supports observation
    pub const OBSERVABLE: ResourceProperties = ResourceProperties(1 << 1);
    /// Active
    pub const ACTIVE: ResourceProperties = ResourceProperties(1 << 2);
    /// Responds slowly (separate responses)
    pub const SLOW: ResourceProperties = ResourceProperties(1 << 3);
    /// Must only be reached over an authenticated, encrypted channel
    pub const SECURE: ResourceProperties = ResourceProperties(1 << 4);
    /// Only discoverable by explicit query
    pub const EXPLICIT_DISCOVERABLE: ResourceProperties = ResourceProperties(1 << 5);

    /// Create from raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: ResourceProperties) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the resource carries the `SECURE` bit.
    pub fn is_secure(self) -> bool {
        self.contains(Self::SECURE)
    }
}

impl std::ops::BitOr for ResourceProperties {
    type Output = ResourceProperties;

    fn bitor(self, rhs: Self) -> Self::Output {
        ResourceProperties(self.0 | rhs.0)
    }
}

/// Message type of the underlying constrained protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Requires acknowledgement
    Confirmable,
    /// Fire and forget
    NonConfirmable,
    /// Acknowledgement of a confirmable message
    Acknowledge,
    /// Rejection of a message
    Reset,
}

/// Opaque correlation token chosen by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Token(pub Vec<u8>);

impl Token {
    /// Create a token from bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Token bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Inbound resource request handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Requester identity; all-zero when the channel was not authenticated.
    pub identity: SubjectId,
    /// Requested method
    pub method: Method,
    /// Resource URI, possibly with a `?query` suffix.
    pub resource_uri: String,
    /// Request body
    pub payload: Vec<u8>,
    /// Correlation token
    pub token: Token,
    /// Protocol message id
    pub message_id: u16,
    /// Protocol message type
    pub message_type: MessageType,
}

impl Request {
    /// Create a confirmable request with an empty body.
    pub fn new(identity: SubjectId, method: Method, resource_uri: impl Into<String>) -> Self {
        Self {
            identity,
            method,
            resource_uri: resource_uri.into(),
            payload: Vec::new(),
            token: Token::default(),
            message_id: 0,
            message_type: MessageType::Confirmable,
        }
    }

    /// Attach a body
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Attach a correlation token
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// Set the protocol message id
    pub fn with_message_id(mut self, message_id: u16) -> Self {
        self.message_id = message_id;
        self
    }
}

/// Response code of an outbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseResult {
    /// Success
    Ok,
    /// Secure resource requested over an unauthenticated channel
    Forbidden,
    /// ACL denied the request
    Unauthorized,
    /// Request could not be evaluated
    InternalServerError,
    /// Engine is busy with a pending delegation
    ServiceUnavailable,
    /// Empty message (acknowledgement / slow response marker)
    Empty,
}

impl fmt::Display for ResponseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ResponseResult::Ok => "2.05",
            ResponseResult::Forbidden => "4.03",
            ResponseResult::Unauthorized => "4.01",
            ResponseResult::InternalServerError => "5.00",
            ResponseResult::ServiceUnavailable => "5.03",
            ResponseResult::Empty => "0.00",
        };
        write!(f, "{code}")
    }
}

/// Outbound (or inbound, in the reverse direction) response message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Response code
    pub result: ResponseResult,
    /// Protocol message type
    pub message_type: MessageType,
    /// Token of the request this response answers
    pub token: Token,
    /// Message id of the request this response answers
    pub message_id: u16,
    /// URI of the resource the request addressed
    pub resource_uri: String,
    /// Body, absent for every synthesized rejection
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create a response with the given code and token.
    pub fn new(result: ResponseResult, token: Token) -> Self {
        Self {
            result,
            message_type: MessageType::NonConfirmable,
            token,
            message_id: 0,
            resource_uri: String::new(),
            payload: None,
        }
    }
}

/// Transport-level error report for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    /// Adapter-specific failure description
    pub reason: String,
    /// Token of the failed message
    pub token: Token,
    /// URI of the failed message
    pub resource_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_maps_to_crudn_permission() {
        assert_eq!(Method::Get.required_permission(), Permission::READ);
        assert_eq!(Method::Post.required_permission(), Permission::WRITE);
        assert_eq!(Method::Put.required_permission(), Permission::WRITE);
        assert_eq!(Method::Delete.required_permission(), Permission::DELETE);
    }

    #[test]
    fn permission_display_lists_bits() {
        let perm = Permission::READ | Permission::WRITE;
        assert_eq!(perm.to_string(), "-RU--");
        assert_eq!(Permission::FULL.to_string(), "CRUDN");
        assert_eq!(Permission::from_bits_truncate(0xffff), Permission::FULL);
    }

    #[test]
    fn secure_property_bit() {
        let props = ResourceProperties::DISCOVERABLE | ResourceProperties::SECURE;
        assert!(props.is_secure());
        assert!(!ResourceProperties::DISCOVERABLE.is_secure());
        assert_eq!(ResourceProperties::SECURE.bits(), 16);
    }

    #[test]
    fn request_serializes_to_json() {
        let request = Request::new(SubjectId::ANONYMOUS, Method::Get, "/a/light/0")
            .with_token(Token::new(vec![1, 2]));
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
