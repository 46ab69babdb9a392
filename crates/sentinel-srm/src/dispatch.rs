//! Secure resource manager dispatch facade
//!
//! The single entry point transports call with inbound requests, responses and
//! errors. A request runs the pipeline
//! length check → secure-channel check → policy engine → (AMS delegation) →
//! pass-through or synthesized response.
//!
//! ## Lock Usage
//!
//! The policy engine sits behind one `parking_lot::Mutex`, held from the
//! busy-state check through the response send and the state reset, so every
//! decision runs alone and in arrival order. Registered handlers are invoked
//! under that lock and must not call back into the facade.

use crate::ams::{AmsDecision, ResumeAction};
use crate::effects::{
    AclResolver, AmsClient, ErrorHandler, PersistentStorage, ProvisioningResponseHandler,
    RequestHandler, ResourceDirectory, ResponseHandler, ResponseSender,
};
use crate::engine::{AccessDecision, PolicyEngine, PolicyEngineState};
use crate::errors::{SrmError, SrmResult};
use crate::response::{self, Delivery};
use crate::svr::{self, SvrType};
use parking_lot::{Mutex, RwLock};
use sentinel_core::{
    BusyRequestPolicy, Endpoint, Request, Response, ResponseResult, SrmConfig, TransportError,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Final outcome of one pass through the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the application request handler.
    PassedThrough,
    /// A rejection with this code was sent.
    Rejected(ResponseResult),
    /// A slow response was sent; a delegation is pending.
    Acknowledged,
    /// No response could be built.
    Failed(SrmError),
}

/// Where an inbound response was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRoute {
    /// Claimed by the provisioning response matcher.
    Provisioning,
    /// Forwarded to the application response handler.
    Application,
    /// No handler was registered.
    Dropped,
}

/// External collaborators the facade is wired to at construction.
#[derive(Clone)]
pub struct SrmCollaborators {
    /// Outbound response path
    pub transport: Arc<dyn ResponseSender>,
    /// ACL lookup
    pub acl: Arc<dyn AclResolver>,
    /// Registry of hosted resources
    pub resources: Arc<dyn ResourceDirectory>,
    /// Access Management Service client, if delegation is supported
    pub ams: Option<Arc<dyn AmsClient>>,
}

#[derive(Clone)]
struct ApplicationHandlers {
    request: Arc<dyn RequestHandler>,
    response: Arc<dyn ResponseHandler>,
    error: Arc<dyn ErrorHandler>,
}

/// Secure resource manager.
pub struct SecureResourceManager {
    config: SrmConfig,
    engine: Mutex<PolicyEngine>,
    transport: Arc<dyn ResponseSender>,
    resources: Arc<dyn ResourceDirectory>,
    handlers: RwLock<Option<ApplicationHandlers>>,
    provisioning: RwLock<Option<Arc<dyn ProvisioningResponseHandler>>>,
    storage: RwLock<Option<Arc<dyn PersistentStorage>>>,
}

impl SecureResourceManager {
    /// Initialise the policy engine and wire the collaborators.
    pub fn new(config: SrmConfig, collaborators: SrmCollaborators) -> Self {
        let engine = PolicyEngine::new(
            collaborators.acl,
            collaborators.ams,
            config.max_uri_length,
        );
        debug!(?config, "Policy engine initialised");
        Self {
            config,
            engine: Mutex::new(engine),
            transport: collaborators.transport,
            resources: collaborators.resources,
            handlers: RwLock::new(None),
            provisioning: RwLock::new(None),
            storage: RwLock::new(None),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SrmConfig {
        &self.config
    }

    /// Register the application handler triple.
    ///
    /// All three are required; if any is missing the call fails with
    /// `InvalidParam` and the existing registration is kept.
    pub fn register_handlers(
        &self,
        request: Option<Arc<dyn RequestHandler>>,
        response: Option<Arc<dyn ResponseHandler>>,
        error: Option<Arc<dyn ErrorHandler>>,
    ) -> SrmResult<()> {
        let (Some(request), Some(response), Some(error)) = (request, response, error) else {
            error!("Callback handlers are invalid");
            return Err(SrmError::invalid_param(
                "request, response and error handlers are all required",
            ));
        };
        *self.handlers.write() = Some(ApplicationHandlers {
            request,
            response,
            error,
        });
        debug!("Application handlers registered");
        Ok(())
    }

    /// Drop the application handler triple.
    ///
    /// Subsequent requests are answered with `InternalServerError`; a
    /// delegation already pending resolves fail-closed.
    pub fn unregister_handlers(&self) {
        if self.handlers.write().take().is_some() {
            debug!("Application handlers unregistered");
        }
    }

    /// Install (or clear, with `None`) the provisioning response matcher.
    pub fn register_provisioning_response_handler(
        &self,
        handler: Option<Arc<dyn ProvisioningResponseHandler>>,
    ) {
        *self.provisioning.write() = handler;
    }

    /// Register the persistence backend used by the SVR storage layer.
    pub fn register_persistent_storage(
        &self,
        storage: Option<Arc<dyn PersistentStorage>>,
    ) -> SrmResult<()> {
        let Some(storage) = storage else {
            error!("The persistent storage handler is invalid");
            return Err(SrmError::invalid_param("persistent storage handler is required"));
        };
        *self.storage.write() = Some(storage);
        Ok(())
    }

    /// The registered persistence backend.
    pub fn persistent_storage(&self) -> Option<Arc<dyn PersistentStorage>> {
        self.storage.read().clone()
    }

    /// Current engine state.
    pub fn state(&self) -> PolicyEngineState {
        self.engine.lock().state()
    }

    /// Returns `true` if a delegation is parked.
    pub fn has_pending_delegation(&self) -> bool {
        self.engine.lock().has_pending_delegation()
    }

    /// Classification of the request most recently evaluated.
    pub fn resource_type(&self) -> SvrType {
        self.engine.lock().context().resource_type()
    }

    /// Drop any pending delegation and return the engine to idle.
    pub fn shutdown(&self) {
        self.engine.lock().reset();
        debug!("Policy engine shut down");
    }

    /// Handle an inbound request.
    #[instrument(skip_all, fields(uri = %request.resource_uri, method = ?request.method, endpoint = %endpoint.id))]
    pub fn on_request(&self, endpoint: &Endpoint, request: &Request) -> DispatchOutcome {
        debug!("Received request from remote device");

        let path = svr::strip_query(&request.resource_uri);
        if path.len() > self.config.max_uri_length {
            error!(
                length = path.len(),
                max = self.config.max_uri_length,
                "Incorrect URI length"
            );
            return self.reject(endpoint, request, ResponseResult::InternalServerError);
        }

        let secure_channel = request.identity.is_secure_channel();
        if secure_channel {
            debug!("Request over secure channel");
        }
        if !secure_channel && self.requires_secure_channel(path) {
            info!("Rejecting request for secure resource over unauthenticated channel");
            return self.reject(endpoint, request, ResponseResult::Forbidden);
        }

        let Some(request_handler) = self.request_handler() else {
            error!("No request handler registered");
            return self.reject(endpoint, request, ResponseResult::InternalServerError);
        };

        let mut engine = self.engine.lock();
        if engine.state() != PolicyEngineState::AwaitingRequest {
            info!(state = ?engine.state(), "Ignoring request while a delegation is pending");
            let result = match self.config.busy_request_policy {
                BusyRequestPolicy::RejectUnauthorized => ResponseResult::Unauthorized,
                BusyRequestPolicy::RejectUnavailable => ResponseResult::ServiceUnavailable,
            };
            return self.reject(endpoint, request, result);
        }

        let decision = engine.check_permission(
            &request.identity,
            path,
            request.method.required_permission(),
        );
        let outcome = match decision {
            AccessDecision::Granted => {
                debug!("Access granted, passing request to application layer");
                request_handler.on_request(endpoint, request);
                DispatchOutcome::PassedThrough
            }
            AccessDecision::Denied(reason) => {
                info!(?reason, "Access denied");
                self.reject(endpoint, request, ResponseResult::Unauthorized)
            }
            AccessDecision::Error => {
                self.reject(endpoint, request, ResponseResult::InternalServerError)
            }
            AccessDecision::WaitingForAms => match engine.begin_delegation(endpoint, request) {
                Ok(()) => {
                    info!("Sending slow response");
                    self.acknowledge(endpoint, request)
                }
                Err(err) => {
                    error!(%err, "Could not start delegation");
                    self.reject(endpoint, request, err.response_result())
                }
            },
        };

        if outcome != DispatchOutcome::Acknowledged {
            engine.reset();
        }
        outcome
    }

    /// Resume the pipeline with the Access Management Service's answer.
    ///
    /// Fails with `InternalServerError`, leaving the state untouched, when no
    /// delegation is pending.
    pub fn on_ams_decision(&self, decision: AmsDecision) -> SrmResult<DispatchOutcome> {
        let mut engine = self.engine.lock();
        let action = engine.resume(decision).map_err(|err| {
            error!(%err, ?decision, "AMS decision without pending delegation");
            err
        })?;

        let outcome = match action {
            ResumeAction::Replay { endpoint, request } => match self.request_handler() {
                Some(handler) => {
                    info!(uri = %request.resource_uri, "Access granted. Passing request to application layer");
                    handler.on_request(&endpoint, &request);
                    DispatchOutcome::PassedThrough
                }
                None => {
                    error!("No request handler registered for granted delegation");
                    self.reject_separate(&endpoint, &request, ResponseResult::Unauthorized)
                }
            },
            ResumeAction::Reject { endpoint, request } => {
                info!(uri = %request.resource_uri, "Access denied by access management service");
                self.reject_separate(&endpoint, &request, ResponseResult::Unauthorized)
            }
        };

        engine.reset();
        Ok(outcome)
    }

    /// Handle a response travelling back from a peer.
    pub fn on_response(&self, endpoint: &Endpoint, response: &Response) -> ResponseRoute {
        debug!(endpoint = %endpoint.id, result = %response.result, "Received response from remote device");

        let provisioning = self.provisioning.read().clone();
        if let Some(matcher) = provisioning {
            if matcher.claim_response(endpoint, response) {
                debug!("Response claimed by provisioning client");
                return ResponseRoute::Provisioning;
            }
        }

        let handler = self.handlers.read().as_ref().map(|h| h.response.clone());
        match handler {
            Some(handler) => {
                handler.on_response(endpoint, response);
                ResponseRoute::Application
            }
            None => {
                warn!("No response handler registered, dropping response");
                ResponseRoute::Dropped
            }
        }
    }

    /// Handle a transport error. Always forwarded unmodified.
    pub fn on_error(&self, endpoint: &Endpoint, error: &TransportError) {
        info!(
            endpoint = %endpoint.id,
            reason = %error.reason,
            uri = %error.resource_uri,
            "Received error from remote device"
        );
        let handler = self.handlers.read().as_ref().map(|h| h.error.clone());
        if let Some(handler) = handler {
            handler.on_error(endpoint, error);
        }
    }

    fn request_handler(&self) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.read().as_ref().map(|h| h.request.clone())
    }

    /// Non-SVR resources flagged `SECURE` may only be reached over an
    /// authenticated channel. SVRs are left to the ACL.
    fn requires_secure_channel(&self, path: &str) -> bool {
        if svr::classify(path).is_svr() {
            return false;
        }
        self.resources
            .resource_properties(path)
            .is_some_and(|props| props.is_secure())
    }

    fn reject(
        &self,
        endpoint: &Endpoint,
        request: &Request,
        result: ResponseResult,
    ) -> DispatchOutcome {
        match response::synthesize(request, result, Delivery::Piggybacked) {
            Ok(response) => {
                self.send(endpoint, &response);
                DispatchOutcome::Rejected(result)
            }
            Err(err) => self.build_failed(err),
        }
    }

    fn reject_separate(
        &self,
        endpoint: &Endpoint,
        request: &Request,
        result: ResponseResult,
    ) -> DispatchOutcome {
        match response::synthesize(request, result, Delivery::Separate) {
            Ok(response) => {
                self.send(endpoint, &response);
                DispatchOutcome::Rejected(result)
            }
            Err(err) => self.build_failed(err),
        }
    }

    fn acknowledge(&self, endpoint: &Endpoint, request: &Request) -> DispatchOutcome {
        match response::slow_response(request) {
            Ok(response) => {
                self.send(endpoint, &response);
                DispatchOutcome::Acknowledged
            }
            Err(err) => self.build_failed(err),
        }
    }

    fn build_failed(&self, err: SrmError) -> DispatchOutcome {
        error!(%err, "Could not build response");
        DispatchOutcome::Failed(err)
    }

    fn send(&self, endpoint: &Endpoint, response: &Response) {
        match self.transport.send_response(endpoint, response) {
            Ok(()) => debug!(result = %response.result, "Response sent"),
            Err(err) => error!(%err, result = %response.result, "Failed in sending response"),
        }
    }
}

impl std::fmt::Debug for SecureResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureResourceManager")
            .field("config", &self.config)
            .field("engine", &*self.engine.lock())
            .finish_non_exhaustive()
    }
}
