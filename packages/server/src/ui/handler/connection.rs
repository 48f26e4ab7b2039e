//! Per-connection glue between the TCP socket and the chat session.

use std::{net::SocketAddr, sync::Arc};

use futures_util::SinkExt;
use tokio::{
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    infrastructure::ChatLineCodec,
    ui::state::AppState,
    usecase::{ChatSession, SessionOutcome},
};

/// Spawns a task that receives lines from the rx channel and writes them to the socket.
///
/// The task ends when every sender is dropped (the session and, once the
/// user has left, the registry) or when a write fails.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sink: FramedWrite<OwnedWriteHalf, ChatLineCodec>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = sink.send(line).await {
                tracing::debug!("Write failed, stopping pusher: {}", e);
                return;
            }
        }
        if let Err(e) = sink.close().await {
            tracing::debug!("Failed to shut down write half: {}", e);
        }
    })
}

/// Serve one accepted connection until its session ends.
///
/// Socket halves and the pusher task are released on every exit path.
pub async fn handle_connection(stream: TcpStream, address: SocketAddr, state: Arc<AppState>) {
    let connection = state.next_connection_id();
    tracing::info!("Accepted connection {} from {}", connection, address);

    let (read_half, write_half) = stream.into_split();
    let lines = FramedRead::new(read_half, ChatLineCodec::new(state.max_line_len));
    let sink = FramedWrite::new(write_half, ChatLineCodec::new(state.max_line_len));

    let (tx, rx) = mpsc::channel(state.outbound_buffer);
    let pusher = pusher_loop(rx, sink);

    let session = ChatSession::new(
        state.session_context.clone(),
        connection,
        address,
        lines,
        tx,
    );
    let report = session.run().await;

    match report.outcome {
        SessionOutcome::Abrupt => pusher.abort(),
        SessionOutcome::Graceful | SessionOutcome::Rejected => {
            // Let the last reply reach the peer before the socket closes
            if let Err(e) = pusher.await {
                tracing::warn!("Pusher task for connection {} failed: {}", connection, e);
            }
        }
    }

    match report.nickname {
        Some(nickname) => tracing::info!(
            "Connection {} ('{}') closed: {:?}",
            connection,
            nickname,
            report.outcome
        ),
        None => tracing::info!("Connection {} closed: {:?}", connection, report.outcome),
    }
}
