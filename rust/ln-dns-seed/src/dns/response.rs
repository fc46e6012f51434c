//! DNS Response Synthesis
//!
//! Turns a parsed query plus registry contents into answer records.
//! Never fails: missing data is an empty answer.

use hickory_proto::rr::rdata::{A, AAAA, SRV};
use hickory_proto::rr::{Name, RData, Record};
use tracing::debug;

use crate::crypto;
use crate::dns::request::{ParsedQuery, QueryType};
use crate::registry::PeerRegistry;
use crate::types::{NodeClass, PeerRecord};

/// TTL for every record we hand out (seconds)
pub const RECORD_TTL: u32 = 60;

/// Peers sampled for a wildcard A query
pub const A_FANOUT: usize = 2;

/// Peers sampled for a wildcard AAAA query
pub const AAAA_FANOUT: usize = 3;

pub const SRV_PRIORITY: u16 = 10;
pub const SRV_WEIGHT: u16 = 10;

/// Builds answer sections for the seed's zone
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    /// Root domain without trailing dot
    root_domain: String,

    /// Peers sampled for a wildcard SRV query
    max_results: usize,
}

impl ResponseBuilder {
    pub fn new(root_domain: &str, max_results: usize) -> Self {
        Self {
            root_domain: root_domain.trim_end_matches('.').to_ascii_lowercase(),
            max_results,
        }
    }

    /// Answer records for `query`, owned by the question name `name`
    pub fn build(&self, query: &ParsedQuery, name: &Name, registry: &PeerRegistry) -> Vec<Record> {
        match query.node_id {
            None => self.wildcard(query.query_type, name, registry),
            Some(id) => {
                let Some(peer) = registry.lookup(&id) else {
                    debug!("Unable to find node with id {}", id);
                    return Vec::new();
                };
                match query.query_type {
                    QueryType::A => a_records(&peer, name).collect(),
                    QueryType::Aaaa => aaaa_records(&peer, name).collect(),
                    QueryType::Srv => Vec::new(),
                }
            }
        }
    }

    fn wildcard(&self, query_type: QueryType, name: &Name, registry: &PeerRegistry) -> Vec<Record> {
        match query_type {
            QueryType::A => registry
                .sample(NodeClass::IPV4, A_FANOUT)
                .iter()
                .flat_map(|peer| a_records(peer, name).collect::<Vec<_>>())
                .collect(),
            QueryType::Aaaa => registry
                .sample(NodeClass::IPV6, AAAA_FANOUT)
                .iter()
                .flat_map(|peer| aaaa_records(peer, name).collect::<Vec<_>>())
                .collect(),
            // The client picks the address family, so SRV answers draw from
            // every peer regardless of the requested address types.
            QueryType::Srv => registry
                .sample(NodeClass::ANY, self.max_results)
                .iter()
                .filter_map(|peer| self.srv_record(peer, name))
                .collect(),
        }
    }

    /// SRV record pointing at `<bech32 id>.<root domain>.`
    fn srv_record(&self, peer: &PeerRecord, name: &Name) -> Option<Record> {
        let port = peer.first_port()?;

        let target = crypto::encode_node_id(&peer.id)
            .ok()
            .and_then(|label| Name::from_ascii(format!("{}.{}.", label, self.root_domain)).ok());
        let Some(target) = target else {
            debug!("Cannot build SRV target for {}", peer.id);
            return None;
        };

        Some(Record::from_rdata(
            name.clone(),
            RECORD_TTL,
            RData::SRV(SRV::new(SRV_PRIORITY, SRV_WEIGHT, port, target)),
        ))
    }
}

fn a_records<'a>(peer: &'a PeerRecord, name: &'a Name) -> impl Iterator<Item = Record> + 'a {
    peer.ipv4_addrs()
        .map(move |ip| Record::from_rdata(name.clone(), RECORD_TTL, RData::A(A::from(ip))))
}

fn aaaa_records<'a>(peer: &'a PeerRecord, name: &'a Name) -> impl Iterator<Item = Record> + 'a {
    peer.ipv6_addrs()
        .map(move |ip| Record::from_rdata(name.clone(), RECORD_TTL, RData::AAAA(AAAA::from(ip))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::request::parse_request;
    use crate::types::tests::{addr, test_node_id};
    use crate::types::{NodeId, DEFAULT_PORT};
    use hickory_proto::rr::RecordType;
    use std::collections::HashSet;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const ROOT: &str = "seed.example";

    fn registry() -> PeerRegistry {
        let registry = PeerRegistry::new(DEFAULT_PORT);
        registry.upsert(test_node_id(1), vec![addr("10.0.0.1:9735")]);
        registry.upsert(test_node_id(2), vec![addr("10.0.0.2:9735")]);
        registry.upsert(test_node_id(3), vec![addr("10.0.0.3:9736")]);
        registry.upsert(test_node_id(4), vec![addr("[2001:db8::4]:9735")]);
        registry.upsert(test_node_id(5), vec![addr("[2001:db8::5]:9735")]);
        registry.upsert(test_node_id(6), vec![addr("[2001:db8::6]:9735")]);
        registry.upsert(test_node_id(7), vec![addr("[2001:db8::7]:1234"), addr("10.0.0.7:9735")]);
        registry
    }

    fn answer(name: &str, record_type: RecordType, registry: &PeerRegistry) -> Vec<Record> {
        let query = parse_request(name, record_type, ROOT).unwrap();
        let name = Name::from_ascii(name).unwrap();
        ResponseBuilder::new(ROOT, 25).build(&query, &name, registry)
    }

    fn node_name(id: &NodeId) -> String {
        format!("{}.{}.", crypto::encode_node_id(id).unwrap(), ROOT)
    }

    #[test]
    fn test_wildcard_a() {
        let registry = registry();
        let records = answer("seed.example.", RecordType::A, &registry);

        // Two sampled peers, each with exactly one IPv4 address
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.record_type(), RecordType::A);
            assert_eq!(record.ttl(), RECORD_TTL);
            assert_eq!(record.name().to_ascii(), "seed.example.");
        }
    }

    #[test]
    fn test_wildcard_aaaa() {
        let registry = registry();
        let records = answer("seed.example.", RecordType::AAAA, &registry);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.record_type() == RecordType::AAAA));
    }

    #[test]
    fn test_wildcard_srv() {
        let registry = registry();
        let records = answer("r0.seed.example.", RecordType::SRV, &registry);

        assert_eq!(records.len(), 7);
        let mut targets = HashSet::new();
        for record in &records {
            let RData::SRV(srv) = record.data() else {
                panic!("expected SRV, got {:?}", record.data());
            };
            assert_eq!(srv.priority(), SRV_PRIORITY);
            assert_eq!(srv.weight(), SRV_WEIGHT);
            assert_eq!(record.name().to_ascii(), "r0.seed.example.");
            targets.insert(srv.target().to_ascii());
        }

        assert_eq!(targets.len(), 7);
        assert!(targets.contains(&node_name(&test_node_id(7))));
    }

    #[test]
    fn test_srv_uses_first_address_port() {
        let registry = PeerRegistry::new(DEFAULT_PORT);
        registry.upsert(test_node_id(7), vec![addr("[2001:db8::7]:1234"), addr("10.0.0.7:9735")]);

        let records = answer("seed.example.", RecordType::SRV, &registry);
        let RData::SRV(srv) = records[0].data() else {
            panic!("expected SRV");
        };
        assert_eq!(srv.port(), 1234);
    }

    #[test]
    fn test_srv_respects_result_cap() {
        let registry = registry();
        let query = parse_request("seed.example.", RecordType::SRV, ROOT).unwrap();
        let name = Name::from_ascii("seed.example.").unwrap();

        let records = ResponseBuilder::new(ROOT, 3).build(&query, &name, &registry);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_node_query_a() {
        let registry = PeerRegistry::new(DEFAULT_PORT);
        let id = test_node_id(1);
        registry.upsert(id, vec![addr("10.0.0.1:9735")]);

        let records = answer(&node_name(&id), RecordType::A, &registry);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data(), &RData::A(A(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(records[0].ttl(), 60);
    }

    #[test]
    fn test_node_query_filters_family() {
        let registry = registry();
        let id = test_node_id(7);

        let v6 = answer(&node_name(&id), RecordType::AAAA, &registry);
        assert_eq!(v6.len(), 1);
        assert_eq!(
            v6[0].data(),
            &RData::AAAA(AAAA("2001:db8::7".parse::<Ipv6Addr>().unwrap()))
        );

        // A node with only IPv6 has nothing for an A query
        let only_v6 = answer(&node_name(&test_node_id(4)), RecordType::A, &registry);
        assert!(only_v6.is_empty());
    }

    #[test]
    fn test_node_query_unknown_is_empty() {
        let registry = registry();
        let records = answer(&node_name(&test_node_id(99)), RecordType::A, &registry);
        assert!(records.is_empty());
    }

    #[test]
    fn test_node_query_srv_is_empty() {
        let registry = registry();
        let records = answer(&node_name(&test_node_id(1)), RecordType::SRV, &registry);
        assert!(records.is_empty());
    }

    #[test]
    fn test_empty_registry() {
        let registry = PeerRegistry::new(DEFAULT_PORT);
        for record_type in [RecordType::A, RecordType::AAAA, RecordType::SRV] {
            assert!(answer("seed.example.", record_type, &registry).is_empty());
        }
    }
}
