//! DNS Server Module
//!
//! Answers bootstrap queries for the seed's root domain from the peer
//! registry.
//!
//! ## DNS Records
//!
//! - A records: IPv4 addresses of sampled peers, or of one named node
//! - AAAA records: IPv6 addresses, same rules
//! - SRV records: sampled peers as `<bech32 id>.<root domain>` with port

pub mod request;
pub mod response;
mod handler;
mod server;

pub use handler::SeedDnsHandler;
pub use server::DnsServer;
