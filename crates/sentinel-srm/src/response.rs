//! Response synthesis for rejected and deferred requests

use crate::errors::SrmResult;
use sentinel_core::{MessageType, Request, Response, ResponseResult, Token};

/// How a synthesized response relates to the request exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Answer within the request exchange.
    Piggybacked,
    /// Answer after the exchange was already acknowledged.
    Separate,
}

/// Build a payload-less response that correlates to `request`.
///
/// Token, message id and URI are copied from the request. Fails with
/// `NoMemory` if they cannot be copied.
pub fn synthesize(
    request: &Request,
    result: ResponseResult,
    delivery: Delivery,
) -> SrmResult<Response> {
    let mut token = Vec::new();
    token.try_reserve_exact(request.token.as_bytes().len())?;
    token.extend_from_slice(request.token.as_bytes());

    let mut resource_uri = String::new();
    resource_uri.try_reserve_exact(request.resource_uri.len())?;
    resource_uri.push_str(&request.resource_uri);

    Ok(Response {
        result,
        message_type: message_type_for(request.message_type, delivery),
        token: Token(token),
        message_id: request.message_id,
        resource_uri,
        payload: None,
    })
}

/// Empty acknowledgement telling the peer the real answer comes later.
pub fn slow_response(request: &Request) -> SrmResult<Response> {
    let mut response = synthesize(request, ResponseResult::Empty, Delivery::Piggybacked)?;
    response.message_type = MessageType::Acknowledge;
    Ok(response)
}

fn message_type_for(request_type: MessageType, delivery: Delivery) -> MessageType {
    match (request_type, delivery) {
        (MessageType::Confirmable, Delivery::Piggybacked) => MessageType::Acknowledge,
        (MessageType::Confirmable, Delivery::Separate) => MessageType::Confirmable,
        _ => MessageType::NonConfirmable,
    }
}
