//! IRC Announcement Tailer
//!
//! Minimal client: registers, joins one channel, answers PINGs and hands
//! channel messages to the verifier. Reconnects after a fixed delay.

use std::sync::Arc;
use std::time::Duration;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, trace, warn};

use super::AnnouncementVerifier;
use crate::api::Metrics;
use crate::config::IrcConfig;

/// Registration complete
const RPL_WELCOME: &str = "001";

/// Nickname already taken
const ERR_NICKNAMEINUSE: &str = "433";

/// Longest line accepted from the server (512 bytes plus IRCv3 tags)
const MAX_LINE_LENGTH: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum IrcError {
    #[error("IRC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IRC line error: {0}")]
    Line(#[from] LinesCodecError),

    #[error("IRC server closed the connection")]
    Disconnected,
}

/// One parsed IRC protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse `[:prefix] COMMAND params... [:trailing]`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (prefix, rest) = match line.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, rest) = stripped.split_once(' ')?;
                (Some(prefix.to_string()), rest)
            }
            None => (None, line),
        };

        let (middle, trailing) = match rest.split_once(" :") {
            Some((middle, trailing)) => (middle, Some(trailing)),
            None => (rest, None),
        };

        let mut words = middle.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }
}

/// Follows the announcement channel
pub struct IrcTailer {
    config: IrcConfig,
    verifier: Arc<AnnouncementVerifier>,
    metrics: Arc<Metrics>,
}

impl IrcTailer {
    pub fn new(config: IrcConfig, verifier: Arc<AnnouncementVerifier>, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            verifier,
            metrics,
        }
    }

    /// Connect, tail, reconnect; never returns
    pub async fn run(self) {
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);

        loop {
            info!("💬 Connecting to IRC {}", self.config.server);
            match TcpStream::connect(self.config.server.as_str()).await {
                Ok(stream) => {
                    self.metrics.inc_irc_connects();
                    if let Err(e) = self.session(stream).await {
                        warn!("IRC session ended: {}", e);
                    }
                }
                Err(e) => warn!("IRC connect to {} failed: {}", self.config.server, e),
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// Drive one connection until it fails
    pub async fn session<S>(&self, stream: S) -> Result<(), IrcError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        let mut nick = self.config.nick.clone();
        let mut collisions = 0u32;

        send(&mut writer, &format!("NICK {}", nick)).await?;
        send(&mut writer, &format!("USER {} 0 * :{}", self.config.nick, self.config.nick)).await?;

        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(message) = IrcMessage::parse(&line) else {
                continue;
            };
            trace!("IRC <- {:?}", message);

            match message.command.as_str() {
                "PING" => {
                    let token = message.params.last().map(String::as_str).unwrap_or_default();
                    send(&mut writer, &format!("PONG :{}", token)).await?;
                }
                RPL_WELCOME => {
                    info!("💬 Registered as {}, joining {}", nick, self.config.channel);
                    send(&mut writer, &format!("JOIN {}", self.config.channel)).await?;
                }
                ERR_NICKNAMEINUSE => {
                    collisions += 1;
                    nick = format!("{}{}", self.config.nick, collisions);
                    debug!("Nick in use, retrying as {}", nick);
                    send(&mut writer, &format!("NICK {}", nick)).await?;
                }
                "PRIVMSG" => {
                    if let [target, body] = message.params.as_slice() {
                        if target.eq_ignore_ascii_case(&self.config.channel) {
                            self.verifier.handle_message(body);
                        }
                    }
                }
                _ => {}
            }
        }

        Err(IrcError::Disconnected)
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), IrcError> {
    trace!("IRC -> {}", line);
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::sign_double_sha256_hex;
    use crate::registry::PeerRegistry;
    use crate::types::tests::test_signing_key;
    use crate::types::{NodeId, DEFAULT_PORT};
    use k256::PublicKey;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[test]
    fn test_parse_lines() {
        assert_eq!(
            IrcMessage::parse(":alice!a@host PRIVMSG #lightning-nodes :hello there\r\n"),
            Some(IrcMessage {
                prefix: Some("alice!a@host".to_string()),
                command: "PRIVMSG".to_string(),
                params: vec!["#lightning-nodes".to_string(), "hello there".to_string()],
            })
        );

        let ping = IrcMessage::parse("PING :irc.lfnet.org").unwrap();
        assert_eq!(ping.prefix, None);
        assert_eq!(ping.command, "PING");
        assert_eq!(ping.params, vec!["irc.lfnet.org"]);

        let welcome = IrcMessage::parse(":srv 001 lseed :Welcome").unwrap();
        assert_eq!(welcome.command, RPL_WELCOME);
        assert_eq!(welcome.params, vec!["lseed", "Welcome"]);

        assert_eq!(IrcMessage::parse(""), None);
        assert_eq!(IrcMessage::parse(":prefixonly"), None);
    }

    #[tokio::test]
    async fn test_session_flow() {
        let registry = Arc::new(PeerRegistry::new(DEFAULT_PORT));
        let metrics = Arc::new(Metrics::new());
        let verifier = Arc::new(AnnouncementVerifier::new(registry.clone(), metrics.clone()));
        let tailer = IrcTailer::new(IrcConfig::default(), verifier, metrics);

        let (client, server) = tokio::io::duplex(8192);
        let session = tokio::spawn(async move { tailer.session(client).await });

        let (server_read, mut server_write) = tokio::io::split(server);
        let mut lines = BufReader::new(server_read).lines();

        assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK lseed");
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("USER lseed"));

        server_write
            .write_all(b":srv 433 * lseed :Nickname is already in use\r\n")
            .await
            .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK lseed1");

        server_write.write_all(b":srv 001 lseed1 :Welcome\r\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "JOIN #lightning-nodes");

        server_write.write_all(b"PING :token123\r\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG :token123");

        let key = test_signing_key(8);
        let id = NodeId::from_public_key(&PublicKey::from(key.verifying_key()));
        let message = format!("NODE {} 203.0.113.5 9735", id.to_hex());
        let announcement = format!("{} {}", sign_double_sha256_hex(&key, message.as_bytes()), message);

        // Private messages to us are not announcements
        let other = format!(":bob!b@h PRIVMSG lseed1 :{}\r\n", announcement);
        server_write.write_all(other.as_bytes()).await.unwrap();

        let line = format!(":alice!a@h PRIVMSG #lightning-nodes :{}\r\n", announcement);
        server_write.write_all(line.as_bytes()).await.unwrap();
        drop(server_write);
        drop(lines);

        let result = session.await.unwrap();
        assert!(matches!(result, Err(IrcError::Disconnected)));

        let record = registry.lookup(&id).unwrap();
        assert_eq!(record.addresses[0].to_string(), "203.0.113.5:9735");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_overlong_line_ends_session() {
        let registry = Arc::new(PeerRegistry::new(DEFAULT_PORT));
        let metrics = Arc::new(Metrics::new());
        let verifier = Arc::new(AnnouncementVerifier::new(registry, metrics.clone()));
        let tailer = IrcTailer::new(IrcConfig::default(), verifier, metrics);

        let (client, server) = tokio::io::duplex(8192);
        let session = tokio::spawn(async move { tailer.session(client).await });

        let (server_read, mut server_write) = tokio::io::split(server);
        let mut lines = BufReader::new(server_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK lseed");

        // The session hangs up mid-write, so the write itself may fail
        let endless = vec![b'x'; 4 * MAX_LINE_LENGTH];
        let _ = server_write.write_all(&endless).await;

        let result = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(IrcError::Line(LinesCodecError::MaxLineLengthExceeded))
        ));

        drop(server_write);
    }
}
