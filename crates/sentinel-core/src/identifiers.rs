//! Requester identities and transport endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of the peer that issued a request.
///
/// The transport fills this in from the authenticated session. An all-zero
/// value is the sentinel for "no cryptographic identity presented": the
/// request arrived over a plain, unauthenticated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// The unauthenticated-channel sentinel.
    pub const ANONYMOUS: SubjectId = SubjectId(Uuid::nil());

    /// Create from the raw 16-byte identity carried by the transport.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Returns `true` when no identity was presented (all-zero sentinel).
    pub fn is_anonymous(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns `true` when the request arrived over an authenticated channel.
    pub fn is_secure_channel(&self) -> bool {
        !self.is_anonymous()
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::ANONYMOUS
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SubjectId(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for SubjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<[u8; 16]> for SubjectId {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Opaque transport handle for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

/// Transport adapter that carried a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportAdapter {
    /// IP (UDP/TCP) adapter
    Ip,
    /// Bluetooth LE GATT adapter
    BleGatt,
    /// Remote access (cloud relay) adapter
    RemoteAccess,
}

/// Remote endpoint a request came from and a response goes back to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Transport handle used to correlate responses.
    pub id: EndpointId,
    /// Adapter the endpoint is reachable through.
    pub adapter: TransportAdapter,
    /// Adapter-specific address string.
    pub address: String,
    /// Port, zero for adapters without ports.
    pub port: u16,
}

impl Endpoint {
    /// Create an IP endpoint.
    pub fn ip(id: u64, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: EndpointId(id),
            adapter: TransportAdapter::Ip,
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{} ({})", self.adapter_tag(), self.address, self.port, self.id)
    }
}

impl Endpoint {
    fn adapter_tag(&self) -> &'static str {
        match self.adapter {
            TransportAdapter::Ip => "ip",
            TransportAdapter::BleGatt => "gatt",
            TransportAdapter::RemoteAccess => "ra",
        }
    }
}
