//! Request pipeline tests driving the facade through recording collaborators

use assert_matches::assert_matches;
use sentinel_core::{
    BusyRequestPolicy, Endpoint, MessageType, Method, Permission, Request, ResourceProperties,
    Response, ResponseResult, SrmConfig, SubjectId, Token, TransportError,
};
use sentinel_srm::{
    AclVerdict, AmsDecision, DenyReason, DispatchOutcome, ErrorHandler, PersistentStorage,
    PolicyEngineState, ProvisioningResponseHandler, RequestHandler, ResponseHandler,
    ResponseRoute, SrmError, SvrType,
};
use sentinel_testkit::*;
use std::sync::Arc;

// ============================================================================
// Secure-channel enforcement
// ============================================================================

#[test]
fn scenario_a_anonymous_request_to_secure_resource_is_forbidden() {
    init_test_tracing();
    let fixture = SrmFixture::new();
    fixture.resources.host_secure("/a/lock");

    let req = request(SubjectId::ANONYMOUS, Method::Get, "/a/lock?if=oic.if.baseline", 1);
    let outcome = fixture.srm.on_request(&endpoint(1), &req);

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Forbidden));
    assert_eq!(fixture.acl.call_count(), 0);
    assert!(fixture.app.requests().is_empty());
    let (_, response) = fixture.transport.last().unwrap();
    assert_eq!(response.result, ResponseResult::Forbidden);
    assert_eq!(response.payload, None);
}

#[test]
fn scenario_a_svr_uri_with_secure_bit_goes_to_acl() {
    // SVRs are outside the secure-bit rule; the ACL decides.
    let fixture = SrmFixture::new();
    fixture.resources.host_secure("/oic/sec/acl");
    fixture
        .acl
        .set("/oic/sec/acl", AclVerdict::Denied(DenyReason::SubjectNotFound));

    let req = request(
        SubjectId::ANONYMOUS,
        Method::Get,
        "/oic/sec/acl?if=oic.if.baseline",
        1,
    );
    let outcome = fixture.srm.on_request(&endpoint(1), &req);

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    assert_eq!(fixture.acl.call_count(), 1);
    assert_eq!(fixture.acl.calls()[0].resource_type, SvrType::Acl);
    assert_eq!(fixture.acl.calls()[0].uri, "/oic/sec/acl");
}

#[test]
fn authenticated_request_to_secure_resource_is_evaluated() {
    let fixture = SrmFixture::new();
    fixture.resources.host_secure("/a/lock");

    let req = request(secure_subject(3), Method::Post, "/a/lock", 2);
    let outcome = fixture.srm.on_request(&endpoint(2), &req);

    assert_eq!(outcome, DispatchOutcome::PassedThrough);
    assert_eq!(fixture.acl.calls()[0].permission, Permission::WRITE);
    assert_eq!(fixture.app.requests()[0].1, req);
    assert_eq!(fixture.transport.sent_count(), 0);
}

#[test]
fn scenario_b_non_secure_resource_skips_channel_check() {
    let fixture = SrmFixture::new();
    fixture
        .resources
        .host("/a/light/0", ResourceProperties::DISCOVERABLE);

    let req = request(SubjectId::ANONYMOUS, Method::Get, "/a/light/0", 3);
    let outcome = fixture.srm.on_request(&endpoint(3), &req);

    assert_eq!(outcome, DispatchOutcome::PassedThrough);
    assert_eq!(fixture.acl.call_count(), 1);
    assert_eq!(fixture.acl.calls()[0].resource_type, SvrType::NotAnSvr);
}

#[test]
fn unknown_resource_skips_channel_check() {
    let fixture = SrmFixture::new();
    let req = request(SubjectId::ANONYMOUS, Method::Delete, "/a/unknown", 4);

    assert_eq!(
        fixture.srm.on_request(&endpoint(4), &req),
        DispatchOutcome::PassedThrough
    );
}

// ============================================================================
// Decisions and rejections
// ============================================================================

#[test]
fn denied_request_gets_unauthorized_without_payload() {
    let fixture = SrmFixture::new();
    fixture
        .acl
        .set_fallback(AclVerdict::Denied(DenyReason::InsufficientPermission));

    let req = request(secure_subject(1), Method::Put, "/a/fan?speed=3", 5)
        .with_payload(b"{\"speed\":3}".to_vec());
    let outcome = fixture.srm.on_request(&endpoint(5), &req);

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    let (to, response) = fixture.transport.last().unwrap();
    assert_eq!(to, endpoint(5));
    assert_eq!(response.payload, None);
    assert_eq!(response.token, req.token);
    assert_eq!(response.message_id, req.message_id);
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
}

#[test]
fn scenario_d_overlong_uri_is_internal_error_without_state_change() {
    let fixture = SrmFixture::with_config(SrmConfig {
        max_uri_length: 16,
        ..SrmConfig::default()
    });
    // Prime the classification so a mutation would be visible.
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/cred", 1));
    assert_eq!(fixture.srm.resource_type(), SvrType::Cred);

    let long_uri = format!("/a/{}", "x".repeat(32));
    let outcome = fixture
        .srm
        .on_request(&endpoint(2), &request(secure_subject(1), Method::Get, &long_uri, 2));

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(ResponseResult::InternalServerError)
    );
    assert_eq!(fixture.acl.call_count(), 1);
    assert_eq!(fixture.srm.resource_type(), SvrType::Cred);
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
}

#[test]
fn query_does_not_count_towards_uri_length() {
    let fixture = SrmFixture::with_config(SrmConfig {
        max_uri_length: 12,
        ..SrmConfig::default()
    });
    let uri = format!("/oic/sec/acl?{}", "q".repeat(200));

    let outcome = fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, &uri, 1));
    assert_eq!(outcome, DispatchOutcome::PassedThrough);
}

#[test]
fn failed_send_keeps_outcome() {
    let fixture = SrmFixture::new();
    fixture.acl.set_fallback(AclVerdict::Denied(DenyReason::NoAclFound));
    fixture.transport.fail_sends(true);

    let outcome = fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/a/x", 1));

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    assert_eq!(fixture.transport.sent_count(), 1);
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn request_before_registration_is_internal_error() {
    let fixture = SrmFixture::unregistered(SrmConfig::default());

    let outcome = fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/a/x", 1));

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(ResponseResult::InternalServerError)
    );
    assert_eq!(fixture.acl.call_count(), 0);
}

#[test]
fn partial_registration_is_rejected_and_keeps_existing_handlers() {
    let fixture = SrmFixture::new();
    let replacement: Arc<dyn RequestHandler> = Arc::new(|_: &Endpoint, _: &Request| {});
    let response: Arc<dyn ResponseHandler> = Arc::new(|_: &Endpoint, _: &Response| {});

    let err = fixture
        .srm
        .register_handlers(Some(replacement), Some(response), None)
        .unwrap_err();
    assert_matches!(err, SrmError::InvalidParam { .. });

    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/a/x", 1));
    assert_eq!(fixture.app.requests().len(), 1);
}

#[test]
fn closures_can_be_registered() {
    let fixture = SrmFixture::unregistered(SrmConfig::default());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let request_handler: Arc<dyn RequestHandler> =
        Arc::new(move |_: &Endpoint, req: &Request| sink.lock().push(req.resource_uri.clone()));
    let response_handler: Arc<dyn ResponseHandler> = Arc::new(|_: &Endpoint, _: &Response| {});
    let error_handler: Arc<dyn ErrorHandler> =
        Arc::new(|_: &Endpoint, _: &TransportError| {});

    fixture
        .srm
        .register_handlers(
            Some(request_handler),
            Some(response_handler),
            Some(error_handler),
        )
        .unwrap();
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/a/x?y", 1));

    assert_eq!(*seen.lock(), vec!["/a/x?y".to_string()]);
}

#[test]
fn persistent_storage_registration() {
    let fixture = SrmFixture::new();
    assert!(fixture.srm.persistent_storage().is_none());
    assert_matches!(
        fixture.srm.register_persistent_storage(None),
        Err(SrmError::InvalidParam { .. })
    );

    let storage: Arc<dyn PersistentStorage> = Arc::new(InMemoryStorage::default());
    fixture
        .srm
        .register_persistent_storage(Some(storage))
        .unwrap();

    let registered = fixture.srm.persistent_storage().unwrap();
    registered.write("svr.dat", b"acl").unwrap();
    assert_eq!(registered.read("svr.dat").unwrap(), b"acl".to_vec());
    registered.unlink("svr.dat").unwrap();
    assert!(registered.read("svr.dat").is_err());
}

// ============================================================================
// Delegation to the access management service
// ============================================================================

fn delegating_fixture(config: SrmConfig) -> SrmFixture {
    let fixture = SrmFixture::with_config(config);
    fixture.acl.set("/oic/sec/acl", AclVerdict::RequiresAms);
    fixture
}

#[test]
fn scenario_c_delegation_grant_replays_original_request() {
    let fixture = delegating_fixture(SrmConfig::default());
    let subject = secure_subject(0x55);
    let original = request(subject, Method::Get, "/oic/sec/acl", 10).with_payload(vec![1, 2]);

    let outcome = fixture.srm.on_request(&endpoint(10), &original);
    assert_eq!(outcome, DispatchOutcome::Acknowledged);
    assert_eq!(fixture.srm.state(), PolicyEngineState::ProcessingDelegation);
    assert!(fixture.srm.has_pending_delegation());

    let (_, ack) = fixture.transport.last().unwrap();
    assert_eq!(ack.result, ResponseResult::Empty);
    assert_eq!(ack.message_type, MessageType::Acknowledge);

    let query = &fixture.ams.queries()[0];
    assert_eq!(query.subject, subject);
    assert_eq!(query.resource_type, SvrType::Acl);
    assert_eq!(query.permission, Permission::READ);

    // Not evaluated while the delegation is outstanding, but still answered.
    let second = request(secure_subject(2), Method::Get, "/a/light/0", 11);
    assert_eq!(
        fixture.srm.on_request(&endpoint(11), &second),
        DispatchOutcome::Rejected(ResponseResult::Unauthorized)
    );
    assert_eq!(fixture.acl.call_count(), 1);
    assert_eq!(fixture.transport.sent_count(), 2);
    assert!(fixture.app.requests().is_empty());
    assert!(fixture.srm.has_pending_delegation());

    let resumed = fixture.srm.on_ams_decision(AmsDecision::Granted).unwrap();
    assert_eq!(resumed, DispatchOutcome::PassedThrough);
    assert_eq!(fixture.app.requests(), vec![(endpoint(10), original)]);
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
    assert!(!fixture.srm.has_pending_delegation());

    // Engine accepts new requests again.
    assert_eq!(
        fixture.srm.on_request(&endpoint(11), &second),
        DispatchOutcome::PassedThrough
    );
}

#[test]
fn delegation_denial_answers_original_endpoint() {
    let fixture = delegating_fixture(SrmConfig::default());
    let original = request(secure_subject(9), Method::Post, "/oic/sec/acl", 20);
    fixture.srm.on_request(&endpoint(20), &original);

    let resumed = fixture.srm.on_ams_decision(AmsDecision::Denied).unwrap();

    assert_eq!(resumed, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    let (to, response) = fixture.transport.last().unwrap();
    assert_eq!(to, endpoint(20));
    assert_eq!(response.token, original.token);
    assert_eq!(response.message_type, MessageType::Confirmable);
    assert!(fixture.app.requests().is_empty());
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
}

#[test]
fn resume_without_pending_delegation_is_internal_error() {
    let fixture = SrmFixture::new();

    let err = fixture.srm.on_ams_decision(AmsDecision::Granted).unwrap_err();

    assert_eq!(err.response_result(), ResponseResult::InternalServerError);
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
    assert_eq!(fixture.transport.sent_count(), 0);
}

#[test]
fn unreachable_ams_fails_closed_and_resets() {
    let fixture = delegating_fixture(SrmConfig::default());
    fixture.ams.set_unreachable(true);

    let outcome = fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/acl", 1));

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(ResponseResult::InternalServerError)
    );
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
    assert!(!fixture.srm.has_pending_delegation());
}

#[test]
fn busy_request_is_answered_once_without_evaluation() {
    let fixture = delegating_fixture(SrmConfig::default());
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/acl", 1));
    let busy = request(secure_subject(2), Method::Put, "/a/light/0", 2);

    let outcome = fixture.srm.on_request(&endpoint(2), &busy);

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    assert_eq!(fixture.acl.call_count(), 1);
    assert!(fixture.app.requests().is_empty());
    assert_eq!(fixture.transport.sent_count(), 2);
    let (to, response) = fixture.transport.last().unwrap();
    assert_eq!(to, endpoint(2));
    assert_eq!(response.token, busy.token);
    assert_eq!(response.payload, None);
    assert_eq!(fixture.srm.state(), PolicyEngineState::ProcessingDelegation);
    assert!(fixture.srm.has_pending_delegation());
}

#[test]
fn granted_delegation_without_handler_fails_closed() {
    let fixture = delegating_fixture(SrmConfig::default());
    let parked = request(secure_subject(3), Method::Get, "/oic/sec/acl", 30);
    fixture.srm.on_request(&endpoint(30), &parked);

    fixture.srm.unregister_handlers();
    let resumed = fixture.srm.on_ams_decision(AmsDecision::Granted).unwrap();

    assert_eq!(resumed, DispatchOutcome::Rejected(ResponseResult::Unauthorized));
    assert!(fixture.app.requests().is_empty());
    let (to, response) = fixture.transport.last().unwrap();
    assert_eq!(to, endpoint(30));
    assert_eq!(response.token, parked.token);
    assert_eq!(response.message_type, MessageType::Confirmable);
    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
    assert!(!fixture.srm.has_pending_delegation());
}

#[test]
fn unregistered_handlers_reject_new_requests() {
    let fixture = SrmFixture::new();
    fixture.srm.unregister_handlers();

    let outcome = fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/a/light/0", 1));

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(ResponseResult::InternalServerError)
    );
    assert_eq!(fixture.acl.call_count(), 0);
}

#[test]
fn busy_engine_can_reject_with_service_unavailable() {
    let fixture = delegating_fixture(SrmConfig {
        busy_request_policy: BusyRequestPolicy::RejectUnavailable,
        ..SrmConfig::default()
    });
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/acl", 1));

    let outcome = fixture
        .srm
        .on_request(&endpoint(2), &request(secure_subject(2), Method::Get, "/a/x", 2));

    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(ResponseResult::ServiceUnavailable)
    );
    assert_eq!(fixture.acl.call_count(), 1);
    assert_eq!(fixture.srm.state(), PolicyEngineState::ProcessingDelegation);
    assert!(fixture.srm.has_pending_delegation());
}

#[test]
fn secure_channel_check_still_runs_while_busy() {
    let fixture = delegating_fixture(SrmConfig::default());
    fixture.resources.host_secure("/a/lock");
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/acl", 1));

    let outcome = fixture
        .srm
        .on_request(&endpoint(2), &request(SubjectId::ANONYMOUS, Method::Get, "/a/lock", 2));

    assert_eq!(outcome, DispatchOutcome::Rejected(ResponseResult::Forbidden));
    assert!(fixture.srm.has_pending_delegation());
}

#[test]
fn shutdown_abandons_pending_delegation() {
    let fixture = delegating_fixture(SrmConfig::default());
    fixture
        .srm
        .on_request(&endpoint(1), &request(secure_subject(1), Method::Get, "/oic/sec/acl", 1));

    fixture.srm.shutdown();

    assert_eq!(fixture.srm.state(), PolicyEngineState::AwaitingRequest);
    assert!(fixture.srm.on_ams_decision(AmsDecision::Granted).is_err());
}

// ============================================================================
// Responses and errors from peers
// ============================================================================

#[test]
fn provisioning_matcher_claims_its_responses() {
    let fixture = SrmFixture::new();
    let matcher = Arc::new(TokenMatcher::default());
    matcher.expect(Token::new(vec![0xbe, 0xef]));
    let handler: Arc<dyn ProvisioningResponseHandler> = matcher.clone();
    fixture
        .srm
        .register_provisioning_response_handler(Some(handler));

    let provisioning = Response::new(ResponseResult::Ok, Token::new(vec![0xbe, 0xef]));
    let ordinary = Response::new(ResponseResult::Ok, Token::new(vec![1]));

    assert_eq!(
        fixture.srm.on_response(&endpoint(1), &provisioning),
        ResponseRoute::Provisioning
    );
    assert_eq!(
        fixture.srm.on_response(&endpoint(1), &ordinary),
        ResponseRoute::Application
    );
    assert_eq!(matcher.claimed(), vec![provisioning]);
    assert_eq!(fixture.app.responses(), vec![(endpoint(1), ordinary)]);
}

#[test]
fn responses_without_handlers_are_dropped() {
    let fixture = SrmFixture::unregistered(SrmConfig::default());
    let response = Response::new(ResponseResult::Ok, Token::default());

    assert_eq!(
        fixture.srm.on_response(&endpoint(1), &response),
        ResponseRoute::Dropped
    );
}

#[test]
fn transport_errors_pass_through_unmodified() {
    let fixture = SrmFixture::new();
    let error = TransportError {
        reason: "retransmission limit".to_string(),
        token: Token::new(vec![4]),
        resource_uri: "/oic/sec/doxm".to_string(),
    };

    fixture.srm.on_error(&endpoint(3), &error);

    assert_eq!(fixture.app.errors(), vec![(endpoint(3), error)]);
    assert_eq!(fixture.acl.call_count(), 0);
    assert_eq!(fixture.transport.sent_count(), 0);
}
