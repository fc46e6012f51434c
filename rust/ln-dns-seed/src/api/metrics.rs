//! Metrics Collection
//!
//! Collects and exposes metrics for monitoring the DNS Seed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::registry::RegistryStats;

/// Metrics collector for the DNS Seed
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// DNS queries that received a reply
    pub dns_queries_answered: AtomicU64,

    /// DNS datagrams dropped without a reply
    pub dns_queries_dropped: AtomicU64,

    /// Answer records sent
    pub dns_answers_sent: AtomicU64,

    /// Announcements that passed verification
    pub announcements_accepted: AtomicU64,

    /// Announcements that failed verification
    pub announcements_rejected: AtomicU64,

    /// Completed lightningd polls
    pub feed_polls: AtomicU64,

    /// Failed lightningd polls
    pub feed_failures: AtomicU64,

    /// IRC connections established
    pub irc_connects: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Record an answered query and its answer count
    pub fn inc_dns_answered(&self, answers: usize) {
        self.dns_queries_answered.fetch_add(1, Ordering::Relaxed);
        self.dns_answers_sent.fetch_add(answers as u64, Ordering::Relaxed);
    }

    pub fn inc_dns_dropped(&self) {
        self.dns_queries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_announcements_accepted(&self) {
        self.announcements_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_announcements_rejected(&self) {
        self.announcements_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_feed_polls(&self) {
        self.feed_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_feed_failures(&self) {
        self.feed_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_irc_connects(&self) {
        self.irc_connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self, stats: &RegistryStats) -> String {
        let mut output = String::new();

        let mut push = |name: &str, kind: &str, help: &str, value: u64| {
            output.push_str(&format!(
                "# HELP ln_dns_seed_{name} {help}\n\
                 # TYPE ln_dns_seed_{name} {kind}\n\
                 ln_dns_seed_{name} {value}\n\n"
            ));
        };

        push("uptime_seconds", "gauge", "DNS Seed uptime in seconds", self.uptime_secs());

        // DNS
        push(
            "dns_queries_answered",
            "counter",
            "DNS queries answered",
            self.dns_queries_answered.load(Ordering::Relaxed),
        );
        push(
            "dns_queries_dropped",
            "counter",
            "DNS datagrams dropped without reply",
            self.dns_queries_dropped.load(Ordering::Relaxed),
        );
        push(
            "dns_answers_sent",
            "counter",
            "Answer records sent",
            self.dns_answers_sent.load(Ordering::Relaxed),
        );

        // Announcements
        push(
            "announcements_accepted",
            "counter",
            "Verified node announcements",
            self.announcements_accepted.load(Ordering::Relaxed),
        );
        push(
            "announcements_rejected",
            "counter",
            "Rejected node announcements",
            self.announcements_rejected.load(Ordering::Relaxed),
        );
        push(
            "irc_connects",
            "counter",
            "IRC connections established",
            self.irc_connects.load(Ordering::Relaxed),
        );

        // Feed
        push(
            "feed_polls",
            "counter",
            "Successful lightningd polls",
            self.feed_polls.load(Ordering::Relaxed),
        );
        push(
            "feed_failures",
            "counter",
            "Failed lightningd polls",
            self.feed_failures.load(Ordering::Relaxed),
        );

        // Registry
        push("peers", "gauge", "Known peers", stats.total_peers as u64);
        push("peers_ipv4", "gauge", "Peers with an IPv4 address", stats.ipv4_peers as u64);
        push("peers_ipv6", "gauge", "Peers with an IPv6 address", stats.ipv6_peers as u64);
        push(
            "peers_default_port",
            "gauge",
            "Peers on the default port",
            stats.default_port_peers as u64,
        );

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self, stats: &RegistryStats) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "dns": {
                "answered": self.dns_queries_answered.load(Ordering::Relaxed),
                "dropped": self.dns_queries_dropped.load(Ordering::Relaxed),
                "answers_sent": self.dns_answers_sent.load(Ordering::Relaxed),
            },
            "announcements": {
                "accepted": self.announcements_accepted.load(Ordering::Relaxed),
                "rejected": self.announcements_rejected.load(Ordering::Relaxed),
                "irc_connects": self.irc_connects.load(Ordering::Relaxed),
            },
            "feed": {
                "polls": self.feed_polls.load(Ordering::Relaxed),
                "failures": self.feed_failures.load(Ordering::Relaxed),
            },
            "registry": stats,
        })
    }
}
