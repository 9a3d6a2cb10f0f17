//! Connection plumbing: WebSocket upgrade, the reader loop, and the
//! per-connection writer task.
//!
//! Each connection splits into two halves. The read half stays in the
//! handler loop below. The write half is owned by one spawned writer task
//! draining that connection's outbound channel, so every response to a
//! player goes through a single serialized writer — no interleaved frames,
//! regardless of which task produced the response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use morris_auth::CredentialGateway;
use morris_protocol::{Codec, Request, Response};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::ServerError;
use crate::handler::ConnectionHandler;
use crate::server::{EngineFactory, ServerState};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_socket<F, C, G>(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState<F, C, G>>,
) -> Result<(), ServerError>
where
    F: EngineFactory,
    C: CredentialGateway,
    G: Codec,
{
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(conn_id, %addr, "accepted WebSocket connection");

    let (mut sink, mut source) = ws.split();
    let (outbound, mut pending) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    // Writer task: the only owner of the write half. The registry may keep
    // sender clones alive past this connection, so the channel never closes
    // on its own; the shutdown signal tells the writer to flush whatever is
    // already queued and then close the socket.
    let writer_state = Arc::clone(&state);
    let writer = tokio::spawn(async move {
        'run: loop {
            tokio::select! {
                biased;
                msg = pending.recv() => {
                    let Some(response) = msg else { break 'run };
                    if write_frame(&mut sink, &writer_state.codec, conn_id, &response)
                        .await
                        .is_err()
                    {
                        break 'run;
                    }
                }
                _ = &mut shutdown_rx => {
                    while let Ok(response) = pending.try_recv() {
                        if write_frame(&mut sink, &writer_state.codec, conn_id, &response)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    break 'run;
                }
            }
        }
        let _ = sink.close().await;
    });

    let mut handler = ConnectionHandler::new(conn_id, outbound, Arc::clone(&state));

    loop {
        let data = match source.next().await {
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(conn_id, "connection closed");
                break;
            }
            Some(Ok(_)) => continue, // ping/pong/frame
            Some(Err(e)) => {
                tracing::debug!(conn_id, error = %e, "socket read failed");
                break;
            }
        };

        let request: Request = match state.codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(conn_id, error = %e, "failed to decode request, closing");
                break;
            }
        };

        if handler.handle(request).await {
            break;
        }
    }

    handler.teardown().await;
    let _ = shutdown_tx.send(());
    let _ = writer.await;

    Ok(())
}

/// Encodes one response and writes it as a binary frame. An encode failure
/// is logged and skipped; a socket failure ends the writer.
async fn write_frame<G: Codec>(
    sink: &mut WsSink,
    codec: &G,
    conn_id: u64,
    response: &Response,
) -> Result<(), ()> {
    let bytes = match codec.encode(response) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(conn_id, error = %e, "failed to encode response");
            return Ok(());
        }
    };
    sink.send(Message::Binary(bytes.into())).await.map_err(|e| {
        tracing::debug!(conn_id, error = %e, "socket write failed");
    })
}
