//! Single-session TCP command interface.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::protocol::{
    Command, CommandParseError, HELP_LINES, apply_backspace, banner, parse_command,
};

/// A control action forwarded to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    On,
    Off,
    Clear,
    Pause,
    Resume,
    /// Channel names as written by the operator; normalization happens in
    /// the controller.
    Join(Vec<String>),
}

/// Reply payload: `Ok` text becomes `OK …`, `Err` text becomes `ERR …`.
pub type ControlReply = Result<String, String>;

/// One dispatched command awaiting its reply token.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Command interface server. At most one session is active; a new
/// connection preempts the previous one.
pub struct CommandServer {
    listener: TcpListener,
    control_tx: mpsc::Sender<CommandRequest>,
}

impl CommandServer {
    /// Binds the command port.
    ///
    /// # Errors
    /// Returns the bind error; the caller treats this as fatal.
    pub async fn bind(port: u16, control_tx: mpsc::Sender<CommandRequest>) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port = listener.local_addr()?.port(), "Command interface listening");
        Ok(Self {
            listener,
            control_tx,
        })
    }

    /// Actual bound address (useful with port 0).
    ///
    /// # Errors
    /// Propagates the socket error.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(self) {
        let mut active: Option<JoinHandle<()>> = None;

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Some(previous) = active.take() {
                        // Single-writer rule: the newcomer wins, the old
                        // session socket closes with pending writes dropped.
                        previous.abort();
                    }
                    info!(peer = %peer, "Command session opened");
                    active = Some(tokio::spawn(run_session(
                        stream,
                        peer,
                        self.control_tx.clone(),
                    )));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept command connection");
                }
            }
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str, telnet_mode: bool) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer
        .write_all(if telnet_mode { b"\r\n" } else { b"\n" })
        .await
}

async fn write_lines(
    writer: &mut OwnedWriteHalf,
    lines: &[String],
    telnet_mode: bool,
) -> io::Result<()> {
    for line in lines {
        write_line(writer, line, telnet_mode).await?;
    }
    Ok(())
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    control_tx: mpsc::Sender<CommandRequest>,
) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut telnet_mode = false;

    let greeting = banner(&peer.to_string());
    if write_lines(&mut writer, &greeting, telnet_mode).await.is_err() {
        return;
    }

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!(peer = %peer, "Command session closed by peer");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(peer = %peer, error = %e, "Command session read error");
                return;
            }
        }

        let raw = String::from_utf8_lossy(&buf);
        let mut line = raw.trim_end_matches(['\r', '\n']).to_string();
        if telnet_mode {
            line = apply_backspace(&line);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let write_result = match parse_command(line) {
            Err(CommandParseError::Unknown) => {
                write_line(&mut writer, "ERR Unknown command", telnet_mode).await
            }
            Err(CommandParseError::BadSyntax) => {
                write_line(&mut writer, "ERR Bad syntax", telnet_mode).await
            }
            Ok(Command::Help) => {
                let mut result = Ok(());
                for help_line in HELP_LINES {
                    result = write_line(&mut writer, help_line, telnet_mode).await;
                    if result.is_err() {
                        break;
                    }
                }
                result
            }
            Ok(Command::Telnet) => {
                telnet_mode = true;
                match write_line(&mut writer, "OK TELNET mode", telnet_mode).await {
                    Ok(()) => write_lines(&mut writer, &greeting, telnet_mode).await,
                    Err(e) => Err(e),
                }
            }
            Ok(command) => {
                let control = match command {
                    Command::On => ControlCommand::On,
                    Command::Off => ControlCommand::Off,
                    Command::Clear => ControlCommand::Clear,
                    Command::Pause => ControlCommand::Pause,
                    Command::Resume => ControlCommand::Resume,
                    Command::Join(channels) => ControlCommand::Join(channels),
                    Command::Telnet | Command::Help => unreachable!("handled above"),
                };

                let response = dispatch(&control_tx, control).await;
                write_line(&mut writer, &response, telnet_mode).await
            }
        };

        if write_result.is_err() {
            warn!(peer = %peer, "Command session write error");
            return;
        }
    }
}

async fn dispatch(
    control_tx: &mpsc::Sender<CommandRequest>,
    command: ControlCommand,
) -> String {
    let (reply_tx, reply_rx) = oneshot::channel();
    let request = CommandRequest {
        command,
        reply: reply_tx,
    };

    if control_tx.send(request).await.is_err() {
        return "ERR Shutting down".to_string();
    }

    match reply_rx.await {
        Ok(Ok(message)) => format!("OK {message}"),
        Ok(Err(message)) => format!("ERR {message}"),
        Err(_) => "ERR Shutting down".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::Lines;
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::time::timeout;

    /// Controller stub answering with canned per-command replies.
    fn spawn_controller_stub() -> mpsc::Sender<CommandRequest> {
        let (tx, mut rx) = mpsc::channel::<CommandRequest>(8);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let reply = match request.command {
                    ControlCommand::On => Ok("Operation started".to_string()),
                    ControlCommand::Off => Ok("Operation stopped".to_string()),
                    ControlCommand::Clear => Ok("Cleared".to_string()),
                    ControlCommand::Pause => Err("Not running".to_string()),
                    ControlCommand::Resume => Err("Not paused".to_string()),
                    ControlCommand::Join(channels) => Ok(format!(
                        "Joining {}",
                        channels
                            .iter()
                            .map(|c| c.trim_start_matches('#'))
                            .collect::<Vec<_>>()
                            .join(",")
                    )),
                };
                let _ = request.reply.send(reply);
            }
        });
        tx
    }

    async fn start_server() -> SocketAddr {
        let server = CommandServer::bind(0, spawn_controller_stub()).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn connect_session(
        addr: SocketAddr,
    ) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        (BufReader::new(read_half).lines(), writer)
    }

    async fn next_line(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Option<String> {
        timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("timed out reading command response")
            .expect("read error")
    }

    async fn read_banner(lines: &mut Lines<BufReader<OwnedReadHalf>>) {
        let product = next_line(lines).await.unwrap();
        assert!(product.starts_with(crate::NAME));
        let hint = next_line(lines).await.unwrap();
        assert_eq!(hint, "Type '?' to obtain available commands.");
        let hello = next_line(lines).await.unwrap();
        assert!(hello.starts_with("Hello "));
    }

    #[tokio::test]
    async fn test_banner_then_commands() {
        let addr = start_server().await;
        let (mut lines, mut writer) = connect_session(addr).await;
        read_banner(&mut lines).await;

        writer.write_all(b"on\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "OK Operation started");

        writer.write_all(b"PAUSE\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "ERR Not running");

        writer.write_all(b"JOIN :#a,#b\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "OK Joining a,b");

        writer.write_all(b"nonsense\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "ERR Unknown command");

        writer.write_all(b"JOIN oops\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "ERR Bad syntax");
    }

    #[tokio::test]
    async fn test_empty_lines_are_ignored() {
        let addr = start_server().await;
        let (mut lines, mut writer) = connect_session(addr).await;
        read_banner(&mut lines).await;

        writer.write_all(b"\n\n  \nOFF\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await.unwrap(), "OK Operation stopped");
    }

    #[tokio::test]
    async fn test_telnet_mode_rebanner_and_rubout() {
        let addr = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // Skip the plain banner.
        let mut line = String::new();
        for _ in 0..3 {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
        }

        writer.write_all(b"TELNET\n").await.unwrap();

        // The acknowledgement and re-banner are CRLF terminated.
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "OK TELNET mode\r\n");
        for _ in 0..3 {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            assert!(line.ends_with("\r\n"));
        }

        // Backspace rubs out the first two characters: OFF executes.
        writer.write_all(b"ON\x08\x08OFF\n").await.unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "OK Operation stopped\r\n");
    }

    #[tokio::test]
    async fn test_new_connection_preempts_previous_session() {
        let addr = start_server().await;

        let (mut first, _first_writer) = connect_session(addr).await;
        read_banner(&mut first).await;

        let (mut second, mut second_writer) = connect_session(addr).await;
        read_banner(&mut second).await;

        // The second session works normally.
        second_writer.write_all(b"ON\n").await.unwrap();
        assert_eq!(next_line(&mut second).await.unwrap(), "OK Operation started");

        // The first session's socket was shut down: EOF, not a banner.
        assert_eq!(next_line(&mut first).await, None);
    }
}
