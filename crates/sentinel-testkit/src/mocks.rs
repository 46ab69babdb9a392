//! Recording collaborators for driving the secure resource manager in tests

use parking_lot::Mutex;
use sentinel_core::{
    Endpoint, Permission, Request, ResourceProperties, Response, SentinelError, SubjectId, Token,
    TransportError,
};
use sentinel_srm::{
    AclResolver, AclVerdict, AmsClient, AmsQuery, DenyReason, ErrorHandler, PersistentStorage,
    ProvisioningResponseHandler, RequestHandler, ResourceDirectory, ResponseHandler,
    ResponseSender, SvrType,
};
use std::collections::HashMap;

/// Transport that records every response it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Endpoint, Response)>>,
    fail_sends: Mutex<bool>,
}

impl RecordingTransport {
    /// Make subsequent sends fail (they are still recorded).
    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }

    /// Every response sent so far.
    pub fn sent(&self) -> Vec<(Endpoint, Response)> {
        self.sent.lock().clone()
    }

    /// Number of responses sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// The most recent response.
    pub fn last(&self) -> Option<(Endpoint, Response)> {
        self.sent.lock().last().cloned()
    }
}

impl ResponseSender for RecordingTransport {
    fn send_response(&self, endpoint: &Endpoint, response: &Response) -> sentinel_core::Result<()> {
        self.sent.lock().push((endpoint.clone(), response.clone()));
        if *self.fail_sends.lock() {
            return Err(SentinelError::transport("simulated send failure"));
        }
        Ok(())
    }
}

/// One recorded ACL lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclCall {
    /// Subject looked up
    pub subject: SubjectId,
    /// URI looked up
    pub uri: String,
    /// Permission requested
    pub permission: Permission,
    /// Classification passed by the engine
    pub resource_type: SvrType,
}

/// ACL with per-URI verdicts and a fallback.
pub struct ScriptedAcl {
    verdicts: Mutex<HashMap<String, AclVerdict>>,
    fallback: Mutex<AclVerdict>,
    calls: Mutex<Vec<AclCall>>,
}

impl ScriptedAcl {
    /// ACL answering `fallback` for every URI without an explicit verdict.
    pub fn new(fallback: AclVerdict) -> Self {
        Self {
            verdicts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// ACL that denies everything.
    pub fn deny_all() -> Self {
        Self::new(AclVerdict::Denied(DenyReason::NoAclFound))
    }

    /// Set the verdict for one URI.
    pub fn set(&self, uri: &str, verdict: AclVerdict) {
        self.verdicts.lock().insert(uri.to_string(), verdict);
    }

    /// Change the fallback verdict.
    pub fn set_fallback(&self, verdict: AclVerdict) {
        *self.fallback.lock() = verdict;
    }

    /// Every lookup so far.
    pub fn calls(&self) -> Vec<AclCall> {
        self.calls.lock().clone()
    }

    /// Number of lookups so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl AclResolver for ScriptedAcl {
    fn resolve(
        &self,
        subject: &SubjectId,
        uri: &str,
        permission: Permission,
        resource_type: SvrType,
    ) -> AclVerdict {
        self.calls.lock().push(AclCall {
            subject: *subject,
            uri: uri.to_string(),
            permission,
            resource_type,
        });
        let fallback = *self.fallback.lock();
        self.verdicts.lock().get(uri).copied().unwrap_or(fallback)
    }
}

/// Resource registry backed by a map.
#[derive(Default)]
pub struct InMemoryResources {
    resources: Mutex<HashMap<String, ResourceProperties>>,
}

impl InMemoryResources {
    /// Host a resource with the given properties.
    pub fn host(&self, uri: &str, properties: ResourceProperties) {
        self.resources.lock().insert(uri.to_string(), properties);
    }

    /// Host a discoverable resource carrying the `SECURE` bit.
    pub fn host_secure(&self, uri: &str) {
        self.host(
            uri,
            ResourceProperties::DISCOVERABLE | ResourceProperties::SECURE,
        );
    }
}

impl ResourceDirectory for InMemoryResources {
    fn resource_properties(&self, uri: &str) -> Option<ResourceProperties> {
        self.resources.lock().get(uri).copied()
    }
}

/// AMS client that records queries and optionally fails.
#[derive(Default)]
pub struct RecordingAms {
    queries: Mutex<Vec<AmsQuery>>,
    unreachable: Mutex<bool>,
}

impl RecordingAms {
    /// Make subsequent queries fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    /// Every query issued so far.
    pub fn queries(&self) -> Vec<AmsQuery> {
        self.queries.lock().clone()
    }
}

impl AmsClient for RecordingAms {
    fn request_decision(&self, query: &AmsQuery) -> sentinel_core::Result<()> {
        if *self.unreachable.lock() {
            return Err(SentinelError::transport("access management service unreachable"));
        }
        self.queries.lock().push(query.clone());
        Ok(())
    }
}

/// Application layer that records everything delivered to it.
#[derive(Default)]
pub struct RecordingApplication {
    requests: Mutex<Vec<(Endpoint, Request)>>,
    responses: Mutex<Vec<(Endpoint, Response)>>,
    errors: Mutex<Vec<(Endpoint, TransportError)>>,
}

impl RecordingApplication {
    /// Requests delivered so far.
    pub fn requests(&self) -> Vec<(Endpoint, Request)> {
        self.requests.lock().clone()
    }

    /// Responses delivered so far.
    pub fn responses(&self) -> Vec<(Endpoint, Response)> {
        self.responses.lock().clone()
    }

    /// Errors delivered so far.
    pub fn errors(&self) -> Vec<(Endpoint, TransportError)> {
        self.errors.lock().clone()
    }
}

impl RequestHandler for RecordingApplication {
    fn on_request(&self, endpoint: &Endpoint, request: &Request) {
        self.requests.lock().push((endpoint.clone(), request.clone()));
    }
}

impl ResponseHandler for RecordingApplication {
    fn on_response(&self, endpoint: &Endpoint, response: &Response) {
        self.responses.lock().push((endpoint.clone(), response.clone()));
    }
}

impl ErrorHandler for RecordingApplication {
    fn on_error(&self, endpoint: &Endpoint, error: &TransportError) {
        self.errors.lock().push((endpoint.clone(), error.clone()));
    }
}

/// Provisioning matcher that claims responses carrying known tokens.
#[derive(Default)]
pub struct TokenMatcher {
    tokens: Mutex<Vec<Token>>,
    claimed: Mutex<Vec<Response>>,
}

impl TokenMatcher {
    /// Track an outstanding provisioning request token.
    pub fn expect(&self, token: Token) {
        self.tokens.lock().push(token);
    }

    /// Responses claimed so far.
    pub fn claimed(&self) -> Vec<Response> {
        self.claimed.lock().clone()
    }
}

impl ProvisioningResponseHandler for TokenMatcher {
    fn claim_response(&self, _endpoint: &Endpoint, response: &Response) -> bool {
        let mut tokens = self.tokens.lock();
        match tokens.iter().position(|t| *t == response.token) {
            Some(index) => {
                tokens.remove(index);
                self.claimed.lock().push(response.clone());
                true
            }
            None => false,
        }
    }
}

/// Blob store kept in memory.
#[derive(Default)]
pub struct InMemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl PersistentStorage for InMemoryStorage {
    fn read(&self, name: &str) -> sentinel_core::Result<Vec<u8>> {
        self.blobs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SentinelError::not_found(name.to_string()))
    }

    fn write(&self, name: &str, data: &[u8]) -> sentinel_core::Result<()> {
        self.blobs.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn unlink(&self, name: &str) -> sentinel_core::Result<()> {
        self.blobs
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SentinelError::not_found(name.to_string()))
    }
}
