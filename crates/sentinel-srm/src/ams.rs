//! Delegation to an Access Management Service
//!
//! When the local ACL cannot settle a decision, the original endpoint and
//! request are parked in a `PendingDelegation` and a query goes out to the
//! Access Management Service. The pipeline resumes when the service answers.
//! There is no timeout and no cancellation: `resume` is the only way out.

use crate::effects::AmsClient;
use crate::engine::{PolicyEngineContext, PolicyEngineState};
use crate::errors::{SrmError, SrmResult};
use crate::svr::{self, SvrType};
use sentinel_core::{Endpoint, Permission, Request, SubjectId, Token};
use std::sync::Arc;
use tracing::{debug, info};

/// Answer from the Access Management Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmsDecision {
    /// The service granted access.
    Granted,
    /// The service denied access.
    Denied,
}

/// Query sent to the Access Management Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmsQuery {
    /// Requester
    pub subject: SubjectId,
    /// Query-stripped resource URI
    pub resource_uri: String,
    /// Requested permission
    pub permission: Permission,
    /// Classification of the resource
    pub resource_type: SvrType,
}

/// The request parked while a delegation is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelegation {
    endpoint: Endpoint,
    request: Request,
}

impl PendingDelegation {
    /// Copy the endpoint and request. Fails with `NoMemory` if the request
    /// body cannot be copied.
    pub(crate) fn capture(endpoint: &Endpoint, request: &Request) -> SrmResult<Self> {
        let mut payload = Vec::new();
        payload.try_reserve_exact(request.payload.len())?;
        payload.extend_from_slice(&request.payload);

        let mut token = Vec::new();
        token.try_reserve_exact(request.token.as_bytes().len())?;
        token.extend_from_slice(request.token.as_bytes());

        let mut resource_uri = String::new();
        resource_uri.try_reserve_exact(request.resource_uri.len())?;
        resource_uri.push_str(&request.resource_uri);

        Ok(Self {
            endpoint: endpoint.clone(),
            request: Request {
                identity: request.identity,
                method: request.method,
                resource_uri,
                payload,
                token: Token(token),
                message_id: request.message_id,
                message_type: request.message_type,
            },
        })
    }

    /// Endpoint the request arrived from
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The original request
    pub fn request(&self) -> &Request {
        &self.request
    }

    fn query(&self) -> AmsQuery {
        let resource_uri = svr::strip_query(&self.request.resource_uri).to_string();
        AmsQuery {
            subject: self.request.identity,
            resource_type: svr::classify(&resource_uri),
            resource_uri,
            permission: self.request.method.required_permission(),
        }
    }
}

/// What the dispatch facade must do once a delegation resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    /// Replay the original request to the application handler.
    Replay {
        /// Original endpoint
        endpoint: Endpoint,
        /// Original request
        request: Request,
    },
    /// Answer the original requester with `Unauthorized`.
    Reject {
        /// Original endpoint
        endpoint: Endpoint,
        /// Original request
        request: Request,
    },
}

/// Bookkeeping for the single outstanding delegation.
pub(crate) struct DelegationNegotiator {
    client: Option<Arc<dyn AmsClient>>,
}

impl DelegationNegotiator {
    pub(crate) fn new(client: Option<Arc<dyn AmsClient>>) -> Self {
        Self { client }
    }

    /// Send the AMS query, then park the delegation.
    pub(crate) fn begin(
        &self,
        context: &mut PolicyEngineContext,
        pending: PendingDelegation,
    ) -> SrmResult<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SrmError::internal("no access management service configured"))?;

        let query = pending.query();
        client
            .request_decision(&query)
            .map_err(|err| SrmError::internal(format!("AMS query failed: {err}")))?;

        debug!(
            subject = %query.subject,
            uri = %query.resource_uri,
            endpoint = %pending.endpoint.id,
            "Delegation parked"
        );
        context.pending = Some(pending);
        Ok(())
    }

    /// Consume the parked delegation.
    pub(crate) fn resume(
        &self,
        context: &mut PolicyEngineContext,
        decision: AmsDecision,
    ) -> SrmResult<ResumeAction> {
        let PendingDelegation { endpoint, request } = context
            .pending
            .take()
            .ok_or_else(|| SrmError::internal("no pending delegation"))?;
        context.state = PolicyEngineState::AwaitingRequest;

        info!(?decision, uri = %request.resource_uri, "Delegation resolved");
        Ok(match decision {
            AmsDecision::Granted => ResumeAction::Replay { endpoint, request },
            AmsDecision::Denied => ResumeAction::Reject { endpoint, request },
        })
    }
}
