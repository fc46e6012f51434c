//! DNS Request Handler
//!
//! Decodes a datagram, answers it from the registry and encodes the reply.
//! Anything that fails to parse is dropped without a reply so the seed
//! cannot be used to reflect traffic.

use hickory_proto::op::{Edns, Message, MessageType, OpCode, ResponseCode};
use hickory_proto::ProtoError;
use std::sync::Arc;
use tracing::debug;

use crate::api::Metrics;
use crate::dns::request::{parse_request, RequestError};
use crate::dns::response::ResponseBuilder;
use crate::registry::PeerRegistry;

/// Smallest reply size every resolver must accept
const MIN_UDP_PAYLOAD: u16 = 512;

/// Payload size we advertise back to EDNS clients
const SERVER_UDP_PAYLOAD: u16 = 1232;

/// DNS handler for Lightning peer discovery
pub struct SeedDnsHandler {
    /// Peer registry
    registry: Arc<PeerRegistry>,

    builder: ResponseBuilder,

    /// Root domain without trailing dot
    root_domain: String,

    metrics: Arc<Metrics>,
}

impl SeedDnsHandler {
    /// Create a new DNS handler
    pub fn new(
        registry: Arc<PeerRegistry>,
        root_domain: &str,
        max_results: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            builder: ResponseBuilder::new(root_domain, max_results),
            root_domain: root_domain.trim_end_matches('.').to_ascii_lowercase(),
            metrics,
        }
    }

    /// Get domain name
    pub fn domain(&self) -> &str {
        &self.root_domain
    }

    /// Answer a decoded request
    pub fn handle(&self, request: &Message) -> Result<Message, RequestError> {
        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            return Err(RequestError::NotAQuery);
        }

        let [question] = request.queries() else {
            return Err(RequestError::QuestionCount(request.queries().len()));
        };

        let parsed = parse_request(
            &question.name().to_ascii(),
            question.query_type(),
            &self.root_domain,
        )?;
        let answers = self.builder.build(&parsed, question.name(), &self.registry);

        debug!(
            "DNS query {} {} realm={} -> {} answers",
            question.name(),
            question.query_type(),
            parsed.realm,
            answers.len()
        );

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_authoritative(true)
            .set_recursion_desired(request.recursion_desired())
            .set_response_code(ResponseCode::NoError)
            .add_query(question.clone())
            .insert_answers(answers);

        if request.extensions().is_some() {
            let mut edns = Edns::new();
            edns.set_max_payload(SERVER_UDP_PAYLOAD);
            edns.set_version(0);
            response.set_edns(edns);
        }

        Ok(response)
    }

    /// Handle a raw datagram, returning the encoded reply if there is one
    pub fn handle_datagram(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let request = match Message::from_vec(datagram) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping undecodable DNS datagram: {}", e);
                self.metrics.inc_dns_dropped();
                return None;
            }
        };

        let response = match self.handle(&request) {
            Ok(response) => response,
            Err(e) => {
                debug!("Dropping DNS request {}: {}", request.id(), e);
                self.metrics.inc_dns_dropped();
                return None;
            }
        };

        // Never more than we advertise, to keep replies unfragmented
        let limit = request
            .max_payload()
            .min(SERVER_UDP_PAYLOAD)
            .max(MIN_UDP_PAYLOAD) as usize;
        match encode_within(response, limit) {
            Ok((bytes, answers)) => {
                self.metrics.inc_dns_answered(answers);
                Some(bytes)
            }
            Err(e) => {
                debug!("Failed to encode DNS response {}: {}", request.id(), e);
                self.metrics.inc_dns_dropped();
                None
            }
        }
    }
}

/// Encode `response`, dropping trailing answers and setting TC until it
/// fits in `limit` bytes. Returns the bytes and the answers kept.
fn encode_within(mut response: Message, limit: usize) -> Result<(Vec<u8>, usize), ProtoError> {
    loop {
        let bytes = response.to_vec()?;
        if bytes.len() <= limit || response.answers().is_empty() {
            return Ok((bytes, response.answers().len()));
        }

        let mut answers = response.take_answers();
        answers.pop();
        response.insert_answers(answers);
        response.set_truncated(true);
    }
}
