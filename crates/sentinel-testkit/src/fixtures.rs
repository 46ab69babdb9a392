//! Fully wired secure resource manager fixtures

use crate::mocks::{
    InMemoryResources, RecordingAms, RecordingApplication, RecordingTransport, ScriptedAcl,
};
use sentinel_core::{Endpoint, Method, Request, SrmConfig, SubjectId, Token};
use sentinel_srm::{
    AclVerdict, AmsClient, ErrorHandler, RequestHandler, ResponseHandler, SecureResourceManager,
    SrmCollaborators,
};
use std::sync::Arc;

/// A secure resource manager plus handles on every mock it talks to.
pub struct SrmFixture {
    /// The facade under test
    pub srm: SecureResourceManager,
    /// Outbound responses
    pub transport: Arc<RecordingTransport>,
    /// ACL lookups
    pub acl: Arc<ScriptedAcl>,
    /// Hosted resources
    pub resources: Arc<InMemoryResources>,
    /// AMS queries
    pub ams: Arc<RecordingAms>,
    /// Application-layer deliveries
    pub app: Arc<RecordingApplication>,
}

impl SrmFixture {
    /// Default configuration, ACL granting everything, handlers registered.
    pub fn new() -> Self {
        Self::with_config(SrmConfig::default())
    }

    /// Handlers registered, ACL granting everything.
    pub fn with_config(config: SrmConfig) -> Self {
        let fixture = Self::unregistered(config);
        fixture.register_application();
        fixture
    }

    /// Nothing registered on the facade yet.
    pub fn unregistered(config: SrmConfig) -> Self {
        let transport = Arc::new(RecordingTransport::default());
        let acl = Arc::new(ScriptedAcl::new(AclVerdict::Granted));
        let resources = Arc::new(InMemoryResources::default());
        let ams = Arc::new(RecordingAms::default());
        let ams_client: Arc<dyn AmsClient> = ams.clone();
        let srm = SecureResourceManager::new(
            config,
            SrmCollaborators {
                transport: transport.clone(),
                acl: acl.clone(),
                resources: resources.clone(),
                ams: Some(ams_client),
            },
        );
        Self {
            srm,
            transport,
            acl,
            resources,
            ams,
            app: Arc::new(RecordingApplication::default()),
        }
    }

    /// Register the recording application as the handler triple.
    pub fn register_application(&self) {
        let request: Arc<dyn RequestHandler> = self.app.clone();
        let response: Arc<dyn ResponseHandler> = self.app.clone();
        let error: Arc<dyn ErrorHandler> = self.app.clone();
        self.srm
            .register_handlers(Some(request), Some(response), Some(error))
            .expect("complete handler triple registers");
    }
}

impl Default for SrmFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a peer on an authenticated channel.
pub fn secure_subject(seed: u8) -> SubjectId {
    SubjectId::from_bytes([seed.max(1); 16])
}

/// IP endpoint with a distinct handle.
pub fn endpoint(id: u64) -> Endpoint {
    Endpoint::ip(id, format!("192.168.1.{}", id % 250 + 1), 5683)
}

/// Request with a token derived from `seed`.
pub fn request(identity: SubjectId, method: Method, uri: &str, seed: u8) -> Request {
    Request::new(identity, method, uri)
        .with_token(Token::new(vec![seed, seed.wrapping_add(1)]))
        .with_message_id(u16::from(seed))
}
