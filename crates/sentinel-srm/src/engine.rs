//! Policy engine: single-flight access decision state machine
//!
//! One `PolicyEngine` holds the only in-flight decision. While it is in
//! `ProcessingDelegation` no new request is evaluated, and at most one
//! `PendingDelegation` exists. The engine is owned by the dispatch facade,
//! which serializes every call behind one lock.

use crate::ams::{AmsDecision, DelegationNegotiator, PendingDelegation, ResumeAction};
use crate::effects::{AclResolver, AclVerdict, AmsClient};
use crate::errors::{SrmError, SrmResult};
use crate::svr::{self, SvrType};
use sentinel_core::{Endpoint, Permission, Request, SubjectId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyEngineState {
    /// Idle, ready to evaluate a request.
    #[default]
    AwaitingRequest,
    /// A delegation to the Access Management Service is outstanding.
    ProcessingDelegation,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No ACL covers the resource.
    NoAclFound,
    /// The subject appears in no ACE.
    SubjectNotFound,
    /// An ACE matched but lacks the requested permission.
    InsufficientPermission,
    /// The resource is not covered by the matching ACE.
    ResourceNotFound,
    /// Delegation was needed but no Access Management Service is reachable.
    AmsUnavailable,
}

/// Outcome of `check_permission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access granted.
    Granted,
    /// Access denied.
    Denied(DenyReason),
    /// Deferred to the Access Management Service.
    WaitingForAms,
    /// The request could not be evaluated.
    Error,
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// State of the single in-flight decision.
#[derive(Debug, Default)]
pub struct PolicyEngineContext {
    pub(crate) state: PolicyEngineState,
    pub(crate) resource_type: SvrType,
    pub(crate) subject: SubjectId,
    pub(crate) permission: Permission,
    pub(crate) pending: Option<PendingDelegation>,
}

impl PolicyEngineContext {
    /// Current state
    pub fn state(&self) -> PolicyEngineState {
        self.state
    }

    /// Classification of the request most recently evaluated.
    pub fn resource_type(&self) -> SvrType {
        self.resource_type
    }

    /// Subject of the request most recently evaluated.
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Permission requested by the request most recently evaluated.
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// The parked delegation, if any.
    pub fn pending_delegation(&self) -> Option<&PendingDelegation> {
        self.pending.as_ref()
    }
}

/// Access decision core plus its delegation negotiator.
pub struct PolicyEngine {
    context: PolicyEngineContext,
    acl: Arc<dyn AclResolver>,
    negotiator: DelegationNegotiator,
    max_uri_length: usize,
}

impl PolicyEngine {
    /// Create an engine in `AwaitingRequest`.
    pub fn new(
        acl: Arc<dyn AclResolver>,
        ams: Option<Arc<dyn AmsClient>>,
        max_uri_length: usize,
    ) -> Self {
        Self {
            context: PolicyEngineContext::default(),
            acl,
            negotiator: DelegationNegotiator::new(ams),
            max_uri_length,
        }
    }

    /// Current state
    pub fn state(&self) -> PolicyEngineState {
        self.context.state
    }

    /// Read-only view of the decision context.
    pub fn context(&self) -> &PolicyEngineContext {
        &self.context
    }

    /// Returns `true` if a delegation is parked.
    pub fn has_pending_delegation(&self) -> bool {
        self.context.pending.is_some()
    }

    /// Decide whether `subject` may perform `permission` on `uri`.
    ///
    /// `uri` must already be query-stripped. Only evaluates while
    /// `AwaitingRequest`; otherwise returns `Error` without consulting the ACL.
    /// On `WaitingForAms` the engine moves to `ProcessingDelegation` and the
    /// caller must park the request with `begin_delegation`.
    pub fn check_permission(
        &mut self,
        subject: &SubjectId,
        uri: &str,
        permission: Permission,
    ) -> AccessDecision {
        if self.context.state != PolicyEngineState::AwaitingRequest {
            warn!(state = ?self.context.state, uri, "check_permission called while busy");
            return AccessDecision::Error;
        }
        if uri.len() > self.max_uri_length {
            error!(
                length = uri.len(),
                max = self.max_uri_length,
                "Incorrect URI length"
            );
            return AccessDecision::Error;
        }

        self.context.resource_type = svr::classify(uri);
        self.context.subject = *subject;
        self.context.permission = permission;

        let verdict = self
            .acl
            .resolve(subject, uri, permission, self.context.resource_type);
        debug!(
            %subject,
            uri,
            %permission,
            resource_type = %self.context.resource_type,
            ?verdict,
            "ACL lookup complete"
        );

        match verdict {
            AclVerdict::Granted => AccessDecision::Granted,
            AclVerdict::Denied(reason) => AccessDecision::Denied(reason),
            AclVerdict::RequiresAms => {
                info!(uri, "Access decision deferred to access management service");
                self.context.state = PolicyEngineState::ProcessingDelegation;
                AccessDecision::WaitingForAms
            }
        }
    }

    /// Park the request that produced `WaitingForAms` and issue the AMS query.
    pub fn begin_delegation(&mut self, endpoint: &Endpoint, request: &Request) -> SrmResult<()> {
        if self.context.state != PolicyEngineState::ProcessingDelegation {
            return Err(SrmError::internal("no deferred decision to delegate"));
        }
        if self.context.pending.is_some() {
            return Err(SrmError::internal("delegation already pending"));
        }
        let pending = PendingDelegation::capture(endpoint, request)?;
        self.negotiator.begin(&mut self.context, pending)
    }

    /// Resolve the parked delegation with the AMS decision.
    ///
    /// Fails with `InternalServerError` and leaves the state untouched when
    /// nothing is pending.
    pub fn resume(&mut self, decision: AmsDecision) -> SrmResult<ResumeAction> {
        self.negotiator.resume(&mut self.context, decision)
    }

    /// Return to `AwaitingRequest`, dropping any parked delegation.
    pub fn reset(&mut self) {
        if let Some(abandoned) = self.context.pending.take() {
            warn!(
                endpoint = %abandoned.endpoint().id,
                uri = %abandoned.request().resource_uri,
                "Abandoning pending delegation"
            );
        }
        self.context.state = PolicyEngineState::AwaitingRequest;
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("context", &self.context)
            .field("max_uri_length", &self.max_uri_length)
            .finish_non_exhaustive()
    }
}
