//! DNS Request Parsing
//!
//! Turns a question name and type into a [`ParsedQuery`]. The subdomain
//! under the root domain is a set of tagged labels, in any order:
//!
//! ```text
//! [l<bech32 node id>.][a<address types>.][r<realm>.]<root domain>.
//! ```
//!
//! The first character of a label is its tag and the rest its value.
//! Unknown tags are ignored so new ones can be introduced without breaking
//! older seeds.

use hickory_proto::rr::RecordType;
use std::str::FromStr;

use crate::crypto::{self, CryptoError};
use crate::types::{NodeClass, NodeId};

/// Query types the seed answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    A,
    Aaaa,
    Srv,
}

impl QueryType {
    pub fn from_record_type(record_type: RecordType) -> Option<Self> {
        match record_type {
            RecordType::A => Some(QueryType::A),
            RecordType::AAAA => Some(QueryType::Aaaa),
            RecordType::SRV => Some(QueryType::Srv),
            _ => None,
        }
    }
}

/// A validated request against the seed's subdomain grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Non-empty labels left of the root domain, lowercased
    pub labels: Vec<String>,

    pub query_type: QueryType,

    /// Realm tag; carried, not interpreted
    pub realm: u32,

    /// Address families of interest (SRV only)
    pub address_types: NodeClass,

    /// Set when the query names a specific node
    pub node_id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("not a standard query")]
    NotAQuery,

    #[error("expected exactly one question, got {0}")]
    QuestionCount(usize),

    #[error("{0} is not under the root domain")]
    BadSuffix(String),

    #[error("refusing to handle query type {0}")]
    UnsupportedQueryType(RecordType),

    #[error("malformed label {0:?}")]
    MalformedLabel(String),

    #[error("invalid node id label {label:?}: {source}")]
    InvalidIdentity {
        label: String,
        #[source]
        source: CryptoError,
    },
}

/// Parse a question against `root_domain` (with or without trailing dot)
pub fn parse_request(
    name: &str,
    record_type: RecordType,
    root_domain: &str,
) -> Result<ParsedQuery, RequestError> {
    let lower = name.to_ascii_lowercase();
    let suffix = format!("{}.", root_domain.trim_end_matches('.').to_ascii_lowercase());

    let remainder = lower
        .strip_suffix(&suffix)
        .filter(|rest| rest.is_empty() || rest.ends_with('.'))
        .ok_or_else(|| RequestError::BadSuffix(name.to_string()))?;

    let query_type = QueryType::from_record_type(record_type)
        .ok_or(RequestError::UnsupportedQueryType(record_type))?;

    let mut query = ParsedQuery {
        labels: Vec::new(),
        query_type,
        realm: 0,
        address_types: NodeClass::BOTH_FAMILIES,
        node_id: None,
    };

    for label in remainder.split('.').filter(|l| !l.is_empty()) {
        let mut chars = label.chars();
        let tag = chars.next();
        let value = chars.as_str();

        match tag {
            Some('r') => query.realm = parse_decimal(label, value)?,
            Some('a') if query_type == QueryType::Srv => {
                query.address_types = NodeClass::from_bits(parse_decimal(label, value)?);
            }
            Some('l') => {
                let id = crypto::decode_node_id(label).map_err(|source| {
                    RequestError::InvalidIdentity {
                        label: label.to_string(),
                        source,
                    }
                })?;
                query.node_id = Some(id);
            }
            _ => {}
        }

        query.labels.push(label.to_string());
    }

    Ok(query)
}

fn parse_decimal<T: FromStr>(label: &str, value: &str) -> Result<T, RequestError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::MalformedLabel(label.to_string()));
    }
    value
        .parse()
        .map_err(|_| RequestError::MalformedLabel(label.to_string()))
}
