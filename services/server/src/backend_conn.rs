//! Per-connection backend TCP handling: message framing (spec §4.H), the
//! one-shot REQ command table, and the long-lived DEALER worker loop with
//! heartbeat liveness (spec §4.I).

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use webrocket_core::{CoreError, Vhost, WorkerSink};
use webrocket_protocol::backend::{self, commands, BackendCommand, DecodeError, IncomingMessage};
use webrocket_protocol::frontend;
use webrocket_protocol::identity::{self, Role};
use webrocket_protocol::status::{error_codes, ok_codes};

use crate::state::AppState;

/// Read one logical message: repeatedly `read_line` (which keeps the
/// trailing `\n`), watching for a raw line of exactly `"\r\n"` — the
/// legitimate identity/command separator line is `"\n"` alone, so a
/// literal `"\r\n"` line can only be half of the `\r\n\r\n` sentinel.
/// Two such lines in a row close out the message.
async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<Vec<String>>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let n = reader.read_line(&mut raw).await?;
        if n == 0 {
            return Ok(None);
        }
        if raw == "\r\n" {
            let mut raw2 = String::new();
            let n2 = reader.read_line(&mut raw2).await?;
            if n2 > 0 && raw2 == "\r\n" {
                return Ok(Some(lines));
            }
            lines.push(strip_newline(&raw));
            if n2 == 0 {
                return Ok(Some(lines));
            }
            lines.push(strip_newline(&raw2));
            continue;
        }
        lines.push(strip_newline(&raw));
    }
}

fn strip_newline(raw: &str) -> String {
    raw.strip_suffix('\n').unwrap_or(raw).to_owned()
}

async fn write_frames(writer: &mut OwnedWriteHalf, command: &str, frames: &[String]) -> std::io::Result<()> {
    let message = format!("{command}\n{}\n{}", frames.join("\n"), backend::SENTINEL);
    writer.write_all(message.as_bytes()).await
}

pub async fn handle_connection(stream: TcpStream, state: AppState) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(lines) = read_message(&mut reader).await? else {
        return Ok(());
    };
    let Ok(incoming) = backend::split_message(&lines) else {
        write_frames(&mut write_half, commands::ERROR, &[error_codes::BAD_REQUEST.to_string()]).await?;
        return Ok(());
    };
    let Some(id) = identity::parse(&incoming.identity) else {
        write_frames(&mut write_half, commands::ERROR, &[error_codes::BAD_REQUEST.to_string()]).await?;
        return Ok(());
    };
    let Some(vhost) = state.context.vhost(&id.vhost_path) else {
        write_frames(&mut write_half, commands::ERROR, &[error_codes::UNAUTHORIZED.to_string()]).await?;
        return Ok(());
    };
    if !vhost.check_token(&id.token) {
        write_frames(&mut write_half, commands::ERROR, &[error_codes::UNAUTHORIZED.to_string()]).await?;
        return Ok(());
    }

    match id.role {
        Role::Request => handle_request(incoming, &vhost, &mut write_half).await,
        Role::Dealer => handle_dealer(id.worker_id, vhost, state, reader, write_half).await,
    }
}

/// `req` identities: one reply, then the connection closes (spec §4.J).
async fn handle_request(incoming: IncomingMessage, vhost: &Vhost, writer: &mut OwnedWriteHalf) -> std::io::Result<()> {
    let reply = match backend::decode_command(&incoming.command, &incoming.frames) {
        Ok(BackendCommand::OpenChannel { name }) => match vhost.open_channel(&name) {
            Ok(_) => (commands::OK, vec![ok_codes::CHANNEL_OPENED.to_string()]),
            Err(CoreError::InvalidChannelName(_)) => {
                (commands::ERROR, vec![error_codes::INVALID_CHANNEL_NAME.to_string()])
            }
            Err(_) => (commands::ERROR, vec![error_codes::INTERNAL.to_string()]),
        },
        Ok(BackendCommand::CloseChannel { name }) => match vhost.delete_channel(&name) {
            Ok(()) => (commands::OK, vec![ok_codes::CHANNEL_CLOSED.to_string()]),
            Err(_) => (commands::ERROR, vec![error_codes::INTERNAL.to_string()]),
        },
        Ok(BackendCommand::AccessToken { pattern }) => {
            match vhost.generate_single_access_token(pattern.as_deref().unwrap_or(".*")) {
                Ok(token) => (
                    commands::OK,
                    vec![ok_codes::SINGLE_ACCESS_TOKEN_GENERATED.to_string(), token],
                ),
                Err(_) => (commands::ERROR, vec![error_codes::BAD_REQUEST.to_string()]),
            }
        }
        Ok(BackendCommand::Broadcast { channel, event, data }) => match vhost.channel(&channel) {
            Some(ch) => {
                ch.broadcast(frontend::envelope(&event, data));
                (commands::OK, vec![ok_codes::BROADCAST_SENT.to_string()])
            }
            None => (commands::ERROR, vec![error_codes::CHANNEL_NOT_FOUND.to_string()]),
        },
        Ok(_) => (commands::ERROR, vec![error_codes::BAD_REQUEST.to_string()]),
        Err(DecodeError::UnknownCommand(_)) => (commands::ERROR, vec![error_codes::BAD_REQUEST.to_string()]),
        Err(_) => (commands::ERROR, vec![error_codes::BAD_REQUEST.to_string()]),
    };
    write_frames(writer, reply.0, &reply.1).await
}

struct BackendWorker {
    id: String,
    write_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl WorkerSink for BackendWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_trigger(&self, payload: serde_json::Value) -> bool {
        let wire = backend::encode_command(&BackendCommand::Trigger { payload });
        self.write_tx.send(wire.into_bytes()).is_ok()
    }
}

/// `dlr` identities: registers with the vhost's lobby and runs until
/// declared dead or it sends `QT` (spec §4.I).
async fn handle_dealer(
    worker_id: String,
    vhost: Arc<Vhost>,
    state: AppState,
    mut reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: OwnedWriteHalf,
) -> std::io::Result<()> {
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(bytes) = write_rx.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let Some(lobby) = state.lobbies.lobby(vhost.path()) else {
        drop(write_tx);
        let _ = writer_task.await;
        return Ok(());
    };

    let sink = Arc::new(BackendWorker {
        id: worker_id.clone(),
        write_tx: write_tx.clone(),
    });
    lobby.add_worker(sink);
    info!(worker = %worker_id, vhost = %vhost.path(), "worker ready");

    let heartbeat_interval = state.heartbeat_interval;
    let liveness_timeout = state.liveness_timeout;
    let mut last_heartbeat_sent = Instant::now();
    let mut last_heartbeat_received = Instant::now();

    loop {
        match tokio::time::timeout(heartbeat_interval, read_message(&mut reader)).await {
            Ok(Ok(Some(lines))) => {
                if let Ok(msg) = backend::split_message(&lines) {
                    match backend::decode_command(&msg.command, &msg.frames) {
                        Ok(BackendCommand::Heartbeat) => last_heartbeat_received = Instant::now(),
                        Ok(BackendCommand::Quit) => break,
                        Ok(other) => handle_worker_command(other, &vhost),
                        Err(err) => warn!(worker = %worker_id, %err, "malformed worker message"),
                    }
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => {
                warn!(worker = %worker_id, %err, "worker socket read error");
                break;
            }
            Err(_elapsed) => {}
        }

        if last_heartbeat_received.elapsed() > liveness_timeout {
            let _ = write_tx.send(backend::encode_command(&BackendCommand::Quit).into_bytes());
            break;
        }
        if last_heartbeat_sent.elapsed() >= heartbeat_interval {
            let _ = write_tx.send(backend::encode_command(&BackendCommand::Heartbeat).into_bytes());
            last_heartbeat_sent = Instant::now();
        }
    }

    lobby.remove_worker(&worker_id);
    drop(write_tx);
    let _ = writer_task.await;
    Ok(())
}

fn handle_worker_command(command: BackendCommand, vhost: &Vhost) {
    match command {
        BackendCommand::OpenChannel { name } => {
            let _ = vhost.open_channel(&name);
        }
        BackendCommand::CloseChannel { name } => {
            let _ = vhost.delete_channel(&name);
        }
        BackendCommand::Broadcast { channel, event, data } => {
            if let Some(ch) = vhost.channel(&channel) {
                ch.broadcast(frontend::envelope(&event, data));
            }
        }
        BackendCommand::AccessToken { .. } | BackendCommand::Ready | BackendCommand::Error { .. } | BackendCommand::Ok { .. } => {}
        BackendCommand::Heartbeat | BackendCommand::Quit | BackendCommand::Trigger { .. } => {}
    }
}
