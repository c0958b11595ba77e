use std::collections::HashMap;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::domain::entities::ChatMessage;

use super::codec::{nick_from_prefix, parse_line};
use super::error::{IrcError, IrcResult};
use super::events::IrcEvent;
use super::state::IrcState;

pub const TMI_HOST: &str = "irc.chat.twitch.tv";
pub const TMI_PORT: u16 = 6667;

/// Twitch accepts any password for justinfan nicks; this is the
/// conventional placeholder.
pub const ANONYMOUS_PASS: &str = "SCHMOOPIIE";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(15);
pub const KEEPALIVE_IDLE: Duration = Duration::from_secs(240);

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Where to connect; overridable for tests.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub host: String,
    pub port: u16,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: TMI_HOST.to_string(),
            port: TMI_PORT,
        }
    }
}

enum IrcCommand {
    Join(Vec<String>),
    Quit,
}

/// Handle to a running IRC client task.
///
/// Dropping the handle makes the task quit. The task never reconnects on
/// its own: every exit path emits [`IrcEvent::Disconnected`] and the
/// controller decides what happens next.
pub struct IrcClient {
    cmd_tx: mpsc::Sender<IrcCommand>,
}

impl IrcClient {
    /// Requests JOINs for already-normalized `#channel` names.
    pub async fn join(&self, channels: Vec<String>) {
        let _ = self.cmd_tx.send(IrcCommand::Join(channels)).await;
    }

    /// Asks the task to send QUIT and exit.
    pub async fn quit(&self) {
        let _ = self.cmd_tx.send(IrcCommand::Quit).await;
    }
}

/// Spawns the client task and returns its handle and event stream.
#[must_use]
pub fn connect(config: IrcConfig) -> (IrcClient, mpsc::UnboundedReceiver<IrcEvent>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let task = std::panic::AssertUnwindSafe(run_session(config, event_tx.clone(), cmd_rx));
        if let Err(panic_info) = task.catch_unwind().await {
            let msg = panic_info
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic_info.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            error!(panic = %msg, "IRC task panicked");
            let _ = event_tx.send(IrcEvent::Disconnected {
                reason: format!("task panicked: {msg}"),
            });
        }
    });

    (IrcClient { cmd_tx }, event_rx)
}

struct Session {
    writer: OwnedWriteHalf,
    event_tx: mpsc::UnboundedSender<IrcEvent>,
    state: IrcState,
    nick: String,
    pending_joins: HashMap<String, Instant>,
    queued_joins: Vec<String>,
    last_activity: Instant,
    registration_deadline: Instant,
}

impl Session {
    fn emit(&self, event: IrcEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn send_line(&mut self, line: &str) -> IrcResult<()> {
        trace!(line = %line, "irc >");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    async fn register(&mut self) -> IrcResult<()> {
        self.send_line("CAP REQ :twitch.tv/tags twitch.tv/commands")
            .await?;
        self.send_line(&format!("PASS {ANONYMOUS_PASS}")).await?;
        let nick = self.nick.clone();
        self.send_line(&format!("NICK {nick}")).await?;
        Ok(())
    }

    async fn handle_line(&mut self, raw: &str) -> IrcResult<()> {
        trace!(line = %raw, "irc <");
        self.last_activity = Instant::now();

        let line = match parse_line(raw) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Dropping malformed IRC line");
                return Ok(());
            }
        };

        match line.command.as_str() {
            "PING" => {
                let reply = match line.trailing() {
                    Some(token) => format!("PONG :{token}"),
                    None => "PONG".to_string(),
                };
                self.send_line(&reply).await?;
            }
            "001" => {
                self.state = IrcState::Ready;
                info!(nick = %self.nick, "Registered with TMI");
                self.emit(IrcEvent::Ready {
                    nick: self.nick.clone(),
                });
                let queued = std::mem::take(&mut self.queued_joins);
                if !queued.is_empty() {
                    self.do_join(queued).await?;
                }
            }
            "JOIN" => {
                let from_self = line
                    .prefix
                    .as_deref()
                    .is_some_and(|p| nick_from_prefix(p) == self.nick);
                if from_self && let Some(channel) = line.params.first() {
                    self.pending_joins.remove(channel);
                    info!(channel = %channel, "Joined channel");
                    self.emit(IrcEvent::Joined {
                        channel: channel.clone(),
                    });
                }
            }
            "PRIVMSG" => {
                if line.params.len() < 2 {
                    warn!("Dropping PRIVMSG without text");
                    return Ok(());
                }
                let sender = line
                    .prefix
                    .as_deref()
                    .map(nick_from_prefix)
                    .unwrap_or_default()
                    .to_lowercase();
                self.emit(IrcEvent::Message(ChatMessage {
                    channel: line.params[0].clone(),
                    sender,
                    tags: line.tags,
                    text: line.params[1].clone(),
                }));
            }
            other => {
                debug!(command = %other, "Unhandled IRC command");
            }
        }

        Ok(())
    }

    async fn do_join(&mut self, channels: Vec<String>) -> IrcResult<()> {
        if !self.state.is_ready() {
            self.queued_joins.extend(channels);
            return Ok(());
        }
        for channel in channels {
            self.send_line(&format!("JOIN {channel}")).await?;
            self.pending_joins
                .insert(channel, Instant::now() + JOIN_TIMEOUT);
        }
        Ok(())
    }

    async fn sweep(&mut self) -> IrcResult<()> {
        let now = Instant::now();

        if self.state == IrcState::Registering && now >= self.registration_deadline {
            return Err(IrcError::Timeout("registration"));
        }

        let expired: Vec<String> = self
            .pending_joins
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(channel, _)| channel.clone())
            .collect();
        for channel in expired {
            self.pending_joins.remove(&channel);
            warn!(channel = %channel, "Join was not confirmed in time");
            self.emit(IrcEvent::JoinFailed { channel });
        }

        if self.state.is_ready() && self.last_activity.elapsed() >= KEEPALIVE_IDLE {
            self.send_line("PING :keepalive").await?;
            self.last_activity = Instant::now();
        }

        Ok(())
    }
}

async fn run_session(
    config: IrcConfig,
    event_tx: mpsc::UnboundedSender<IrcEvent>,
    mut cmd_rx: mpsc::Receiver<IrcCommand>,
) {
    let nick = anonymous_nick();
    info!(host = %config.host, port = config.port, nick = %nick, "Connecting to TMI");

    let disconnect = |reason: String| {
        let _ = event_tx.send(IrcEvent::Disconnected { reason });
    };

    let connection = timeout(
        CONNECT_TIMEOUT,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await;
    let stream = match connection {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            disconnect(format!("connect failed: {e}"));
            return;
        }
        Err(_) => {
            disconnect("connect timed out".to_string());
            return;
        }
    };

    let (read_half, writer) = stream.into_split();
    let mut lines: Lines<BufReader<OwnedReadHalf>> = BufReader::new(read_half).lines();

    let mut session = Session {
        writer,
        event_tx: event_tx.clone(),
        state: IrcState::Registering,
        nick,
        pending_joins: HashMap::new(),
        queued_joins: Vec::new(),
        last_activity: Instant::now(),
        registration_deadline: Instant::now() + REGISTRATION_TIMEOUT,
    };

    if let Err(e) = session.register().await {
        disconnect(format!("registration failed: {e}"));
        return;
    }

    let mut sweep = interval(SWEEP_INTERVAL);
    sweep.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(raw)) => {
                    if let Err(e) = session.handle_line(&raw).await {
                        disconnect(e.to_string());
                        return;
                    }
                }
                Ok(None) => {
                    disconnect("stream ended".to_string());
                    return;
                }
                Err(e) => {
                    disconnect(format!("read error: {e}"));
                    return;
                }
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(IrcCommand::Join(channels)) => {
                    if let Err(e) = session.do_join(channels).await {
                        disconnect(e.to_string());
                        return;
                    }
                }
                Some(IrcCommand::Quit) | None => {
                    session.state = IrcState::Closing;
                    let _ = session.send_line("QUIT").await;
                    disconnect("client quit".to_string());
                    return;
                }
            },

            _ = sweep.tick() => {
                if let Err(e) = session.sweep().await {
                    disconnect(e.to_string());
                    return;
                }
            }
        }
    }
}

/// Derives a `justinfan<digits>` nick from sub-second clock noise.
fn anonymous_nick() -> String {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);

    format!("justinfan{}", 10_000 + nanos % 90_000)
}
