use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::DetectorConfig;
use crate::inference::InferenceAdapter;
use crate::postprocessing::events::{CompletedNote, OutgoingMessage};
use crate::postprocessing::midi::generate_midi_file_data;
use crate::session::{AudioSession, Clock, MonotonicClock};

const CHANNEL_CAPACITY: usize = 64;
const EXPORT_BPM: u32 = 120;

/// Shared, read-only state handed to every connection.
pub struct ServerState {
    pub adapter: InferenceAdapter,
    pub config: DetectorConfig,
    pub export_dir: Option<PathBuf>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { Json(serde_json::json!({"status": "ok"})) }))
        .with_state(state)
}

pub async fn serve(state: Arc<ServerState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local listener address")?;

    info!(address = %actual_addr, hop_size = state.config.hop_size, "starting websocket server");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |ws| async move {
        if let Err(err) = handle_socket(state, ws, peer).await {
            error!(error = %err, %peer, "websocket handler failed");
        }
    })
}

async fn handle_socket(state: Arc<ServerState>, socket: WebSocket, peer: SocketAddr) -> Result<()> {
    info!(%peer, "client connected");
    let (mut sender, mut receiver) = socket.split();

    let (pcm_tx, pcm_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<OutgoingMessage>(CHANNEL_CAPACITY);
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let clock = MonotonicClock::start();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let processor = tokio::spawn(run_session(state.clone(), pcm_rx, out_tx, close_rx, clock));

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                if pcm_tx.send(data).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                warn!(payload = %text, "unexpected text frame received");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(error = %err, %peer, "websocket read failed");
                break;
            }
        }
    }

    // Anything still in flight belongs to a closed connection
    let _ = close_tx.send(());
    drop(pcm_tx);
    send_task.abort();

    let session = processor.await.context("session task join failed")?;
    let notes = session.finish(clock.now());
    info!(%peer, notes = notes.len(), "client disconnected");

    if let Some(dir) = &state.export_dir {
        export_session(dir, &notes).await?;
    }

    Ok(())
}

/// Owns the session for one connection. Hops are processed strictly in
/// order; the receive loop keeps queueing audio while the model runs.
async fn run_session(
    state: Arc<ServerState>,
    mut pcm_rx: mpsc::Receiver<Vec<u8>>,
    out_tx: mpsc::Sender<OutgoingMessage>,
    mut closed: oneshot::Receiver<()>,
    clock: MonotonicClock,
) -> AudioSession {
    let mut session = AudioSession::new(state.config.clone());

    'session: loop {
        let bytes = tokio::select! {
            _ = &mut closed => break,
            chunk = pcm_rx.recv() => match chunk {
                Some(bytes) => bytes,
                None => break,
            },
        };

        if !session.push_fragment(&bytes) {
            debug!(bytes = bytes.len(), "dropping malformed audio payload");
            continue;
        }

        while let Some(hop) = session.take_hop() {
            let messages = tokio::select! {
                biased;
                _ = &mut closed => break 'session,
                messages = session.process_hop(&hop, &state.adapter, &clock) => messages,
            };

            for message in messages {
                if out_tx.send(message).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    session
}

async fn export_session(dir: &std::path::Path, notes: &[CompletedNote]) -> Result<()> {
    if notes.is_empty() {
        return Ok(());
    }

    let data = generate_midi_file_data(notes, EXPORT_BPM).context("failed to encode MIDI")?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(format!("session-{}.mid", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), notes = notes.len(), "exported session");
    Ok(())
}
