//! Top-level state machine wiring chat ingest to display uploads.
//!
//! The controller is the single owner of all shared mutable state: the
//! operation state, the channel set, the ranking buffer and the display
//! port. Every other task talks to it through typed events and requests,
//! so none of that state needs a lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};

use crate::domain::entities::{ChatMessage, ImageKey};
use crate::domain::ports::{DisplayPort, ImageResolverPort, SendOutcome};
use crate::infrastructure::command::{CommandRequest, ControlCommand, ControlReply};
use crate::infrastructure::display::PROBE_INTERVAL;
use crate::infrastructure::irc::{self, IrcClient, IrcConfig, IrcEvent};

use super::services::{MessageAnalyzer, RankingBuffer};
use super::state::{ChannelSet, OperationState};

/// IRC reconnect backoff: initial delay, cap, and ~10% jitter.
pub const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(1);
pub const RECONNECT_DELAY_CAP: Duration = Duration::from_secs(30);

/// Controller construction parameters.
pub struct ControllerConfig {
    /// Channels joined when operation starts.
    pub startup_channels: Vec<String>,
    /// Lowercased senders whose messages are ignored entirely.
    pub forbidden_users: HashSet<String>,
    /// Where the IRC client connects.
    pub irc: IrcConfig,
    /// Start operation immediately instead of waiting for an `ON` command.
    pub auto_start: bool,
}

/// The controller task.
pub struct Controller {
    config: ControllerConfig,
    analyzer: MessageAnalyzer,
    display: Box<dyn DisplayPort>,
    resolver: Arc<dyn ImageResolverPort>,
    command_rx: mpsc::Receiver<CommandRequest>,
    commands_closed: bool,

    state: OperationState,
    channels: ChannelSet,
    ranking: RankingBuffer,
    irc: Option<IrcClient>,
    irc_events: Option<mpsc::UnboundedReceiver<IrcEvent>>,
    reconnect_attempts: u32,
    retry_at: Option<Instant>,
}

impl Controller {
    /// Creates a controller in the `Off` state.
    #[must_use]
    pub fn new(
        config: ControllerConfig,
        analyzer: MessageAnalyzer,
        display: Box<dyn DisplayPort>,
        resolver: Arc<dyn ImageResolverPort>,
        command_rx: mpsc::Receiver<CommandRequest>,
    ) -> Self {
        Self {
            config,
            analyzer,
            display,
            resolver,
            command_rx,
            commands_closed: false,
            state: OperationState::Off,
            channels: ChannelSet::new(),
            ranking: RankingBuffer::new(),
            irc: None,
            irc_events: None,
            reconnect_attempts: 0,
            retry_at: None,
        }
    }

    /// Event loop. Returns once `shutdown` fires and teardown finished.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if self.config.auto_start
            && let Err(reason) = self.cmd_on()
        {
            warn!(reason = %reason, "Auto-start failed");
        }

        let mut probe_tick = interval(PROBE_INTERVAL);
        probe_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Guards are snapshotted up front so the select arms only borrow
            // the fields their futures need.
            let commands_open = !self.commands_closed;
            let irc_active = self.irc_events.is_some();
            let retry_armed = self.retry_at.is_some();
            let retry_deadline = self.retry_at.unwrap_or_else(Instant::now);
            let probe_wanted = self.should_probe();

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    self.state = OperationState::Stopping;
                    info!("Shutting down");
                    self.stop().await;
                    return;
                }

                request = self.command_rx.recv(), if commands_open => {
                    match request {
                        Some(request) => self.handle_command(request).await,
                        None => self.commands_closed = true,
                    }
                }

                event = next_irc_event(&mut self.irc_events), if irc_active => {
                    match event {
                        Some(event) => self.handle_irc_event(event).await,
                        None => self.irc_events = None,
                    }
                }

                () = sleep_until(retry_deadline), if retry_armed => {
                    self.retry_connect();
                }

                _ = probe_tick.tick(), if probe_wanted => {
                    self.probe_and_drain().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, request: CommandRequest) {
        let reply = match request.command {
            ControlCommand::On => self.cmd_on(),
            ControlCommand::Off => self.cmd_off().await,
            ControlCommand::Clear => self.cmd_clear().await,
            ControlCommand::Pause => self.cmd_pause(),
            ControlCommand::Resume => self.cmd_resume().await,
            ControlCommand::Join(channels) => self.cmd_join(channels).await,
        };
        let _ = request.reply.send(reply);
    }

    fn cmd_on(&mut self) -> ControlReply {
        if self.state != OperationState::Off {
            return Err("Already running".to_string());
        }

        self.state = OperationState::Starting;
        self.channels.clear();
        let startup = self.config.startup_channels.clone();
        for channel in &startup {
            self.channels.insert(channel);
        }
        self.reconnect_attempts = 0;
        self.connect_irc();
        info!(channels = self.channels.len(), "Operation starting");
        Ok("Operation started".to_string())
    }

    async fn cmd_off(&mut self) -> ControlReply {
        self.stop().await;
        info!("Operation stopped");
        Ok("Operation stopped".to_string())
    }

    async fn cmd_clear(&mut self) -> ControlReply {
        match self.state {
            OperationState::On | OperationState::Paused | OperationState::Off => {}
            _ => return Err("Not ready".to_string()),
        }

        self.ranking.clear();
        if self.state != OperationState::Off
            && let Err(e) = self.display.clear().await
        {
            warn!(error = %e, "Display clear failed");
            return Err(format!("Display clear failed: {e}"));
        }
        Ok("Cleared".to_string())
    }

    fn cmd_pause(&mut self) -> ControlReply {
        if self.state != OperationState::On {
            return Err("Not running".to_string());
        }
        self.state = OperationState::Paused;
        info!("Uploads paused");
        Ok("Paused".to_string())
    }

    async fn cmd_resume(&mut self) -> ControlReply {
        if self.state != OperationState::Paused {
            return Err("Not paused".to_string());
        }
        self.state = OperationState::On;
        info!("Uploads resumed");
        self.drain().await;
        Ok("Resumed".to_string())
    }

    async fn cmd_join(&mut self, channels: Vec<String>) -> ControlReply {
        if !self.state.is_running() {
            return Err("Not running".to_string());
        }

        let mut fresh = Vec::new();
        let mut names = Vec::new();
        for raw in &channels {
            let normalized = ChannelSet::normalize(raw);
            names.push(normalized.trim_start_matches('#').to_string());
            if self.channels.insert(raw) {
                fresh.push(normalized);
            }
        }

        if !fresh.is_empty()
            && let Some(irc) = &self.irc
        {
            irc.join(fresh).await;
        }
        Ok(format!("Joining {}", names.join(",")))
    }

    fn connect_irc(&mut self) {
        let (client, events) = irc::connect(self.config.irc.clone());
        self.irc = Some(client);
        self.irc_events = Some(events);
    }

    async fn handle_irc_event(&mut self, event: IrcEvent) {
        match event {
            IrcEvent::Ready { nick } => {
                if !matches!(
                    self.state,
                    OperationState::Starting | OperationState::On | OperationState::Paused
                ) {
                    return;
                }
                self.reconnect_attempts = 0;
                debug!(nick = %nick, "IRC ready");
                let channels = self.channels.to_vec();
                if let Some(irc) = &self.irc {
                    irc.join(channels).await;
                }
                if self.state == OperationState::Starting {
                    self.state = OperationState::On;
                    info!("Operation is on");
                }
            }
            IrcEvent::Joined { channel } => {
                info!(channel = %channel, "Channel joined");
            }
            IrcEvent::JoinFailed { channel } => {
                warn!(channel = %channel, "Channel join failed");
            }
            IrcEvent::Message(message) => {
                self.handle_chat_message(message).await;
            }
            IrcEvent::Disconnected { reason } => {
                self.irc = None;
                self.irc_events = None;
                if matches!(
                    self.state,
                    OperationState::Starting | OperationState::On | OperationState::Paused
                ) {
                    warn!(reason = %reason, "IRC disconnected");
                    self.schedule_reconnect();
                }
            }
        }
    }

    async fn handle_chat_message(&mut self, message: ChatMessage) {
        if !self.state.is_running() {
            return;
        }
        if self.config.forbidden_users.contains(&message.sender) {
            debug!(sender = %message.sender, "Ignoring forbidden user");
            return;
        }

        // Tokens of one message are ingested atomically, in reading order.
        for key in self.analyzer.analyze(&message) {
            self.ingest(key).await;
        }
    }

    /// Resolve first, then send or rank. A key only enters the backlog once
    /// its image is known to exist, so the drain path cannot race the cache.
    async fn ingest(&mut self, key: ImageKey) {
        let image = match self.resolver.resolve(&key).await {
            Ok(image) => image,
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping unresolvable token");
                return;
            }
        };

        if self.state.accepts_uploads()
            && self.display.is_reachable()
            && self.display.free_slots() > 0
        {
            match self.display.try_send(&image, false).await {
                SendOutcome::Accepted => {
                    debug!(key = %key, "Fast-path upload");
                    return;
                }
                SendOutcome::Busy | SendOutcome::Unreachable => {}
            }
        }

        self.ranking.bump(&key);
    }

    fn should_probe(&self) -> bool {
        self.state.is_running()
            && (self.display.capacity() == 0
                || self.display.in_flight() > 0
                || !self.ranking.is_empty()
                || !self.display.is_reachable())
    }

    async fn probe_and_drain(&mut self) {
        if self.display.probe().await.is_err() {
            return;
        }
        self.drain().await;
    }

    async fn drain(&mut self) {
        while self.state.accepts_uploads()
            && self.display.is_reachable()
            && self.display.free_slots() > 0
        {
            let Some(entry) = self.ranking.take() else {
                return;
            };

            let image = match self.resolver.resolve(&entry.key).await {
                Ok(image) => image,
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "Cache miss. This isn't supposed to happen!");
                    continue;
                }
            };

            match self.display.try_send(&image, false).await {
                SendOutcome::Accepted => {
                    debug!(key = %entry.key, count = entry.count, "Backlog upload");
                }
                SendOutcome::Busy | SendOutcome::Unreachable => {
                    self.ranking.restore(entry);
                    return;
                }
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_attempts += 1;
        let delay = backoff_delay(self.reconnect_attempts);
        info!(
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis(),
            "Reconnecting to TMI"
        );
        self.retry_at = Some(Instant::now() + delay);
    }

    fn retry_connect(&mut self) {
        self.retry_at = None;
        if matches!(
            self.state,
            OperationState::Starting | OperationState::On | OperationState::Paused
        ) {
            self.connect_irc();
        }
    }

    async fn stop(&mut self) {
        if let Some(irc) = self.irc.take() {
            irc.quit().await;
        }
        self.irc_events = None;
        self.ranking.clear();
        self.display.reset();
        self.retry_at = None;
        self.reconnect_attempts = 0;
        self.state = OperationState::Off;
    }
}

async fn next_irc_event(
    events: &mut Option<mpsc::UnboundedReceiver<IrcEvent>>,
) -> Option<IrcEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn backoff_delay(attempt: u32) -> Duration {
    let base = RECONNECT_DELAY_BASE.as_millis() as u64;
    let cap = RECONNECT_DELAY_CAP.as_millis() as u64;

    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1).min(5)));
    let capped = exponential.min(cap);
    let jitter = clock_jitter(capped / 10);

    Duration::from_millis(capped.saturating_add(jitter))
}

fn clock_jitter(max: u64) -> u64 {
    use std::time::SystemTime;

    if max == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    nanos % max
}
