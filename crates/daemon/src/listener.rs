// SPDX-License-Identifier: MIT

//! Transport endpoint (C1): the WebSocket accept loop, the handshake gate in
//! front of it, and the per-connection receive loop once a connection has
//! authenticated.

use crate::error::ConnectionError;
use crate::rate_limit::ConnectionRateLimiter;
use crate::registry::{AgentRegistry, CloseReason, ConnectionHandle, OutboundMessage};
use fleetd_core::{generate_token, hash_token, AgentId, Clock, CoreError, PermissionSet};
use fleetd_protocol::{
    Authenticated, ClientHello, Frame, HandshakeError, MethodCall, MethodTable, Registered,
    RpcError, RpcResponse,
};
use fleetd_storage::AgentRepository;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a peer has, after the WebSocket upgrade, to send its first
/// (`register`/`authenticate`) frame before the connection is closed with
/// `auth_timeout`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared, cloneable context handed to every spawned connection task.
pub struct ListenCtx<C: Clock> {
    pub storage: AgentRepository,
    pub registry: AgentRegistry,
    pub methods: Arc<MethodTable>,
    pub rate_limiter: Arc<ConnectionRateLimiter>,
    pub clock: C,
    pub token_validity: chrono::Duration,
    pub max_consecutive_errors: u32,
}

/// Outcome of a handshake, independent of the transport it travels over —
/// kept separate from `handle_connection` so it can be exercised without a
/// real socket.
enum HandshakeOutcome {
    Registered(AgentId, Registered),
    Authenticated(AgentId, Authenticated),
    Rejected(HandshakeError),
}

async fn negotiate<C: Clock>(ctx: &ListenCtx<C>, hello: ClientHello) -> HandshakeOutcome {
    match hello {
        ClientHello::Register { code, version } => {
            match register_agent(ctx, &code, &version).await {
                Ok((agent_id, registered)) => HandshakeOutcome::Registered(agent_id, registered),
                Err(reason) => HandshakeOutcome::Rejected(HandshakeError::new(reason)),
            }
        }
        ClientHello::Authenticate { token, version } => {
            match authenticate_agent(ctx, &token, &version).await {
                Ok((agent_id, authenticated)) => {
                    HandshakeOutcome::Authenticated(agent_id, authenticated)
                }
                Err(reason) => HandshakeOutcome::Rejected(HandshakeError::new(reason)),
            }
        }
    }
}

async fn register_agent<C: Clock>(
    ctx: &ListenCtx<C>,
    code: &str,
    version: &str,
) -> Result<(AgentId, Registered), String> {
    let now = ctx.clock.now();
    let registration = ctx
        .storage
        .find_registration_code(code)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| CoreError::RegistrationCodeExpired.to_string())?;

    registration.check_redeemable(now).map_err(|e| e.to_string())?;

    if !ctx
        .storage
        .claim_registration_code(&registration.id)
        .await
        .map_err(|e| e.to_string())?
    {
        return Err(CoreError::RegistrationCodeUsed.to_string());
    }

    let agent = ctx
        .storage
        .find_by_id(&registration.agent_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| CoreError::AgentNotFound(registration.agent_id.to_string()).to_string())?;

    let token = generate_token();
    let token_hash = hash_token(&token);
    ctx.storage
        .complete_registration(&agent.id, &token_hash, version, now + ctx.token_validity, now)
        .await
        .map_err(|e| e.to_string())?;

    Ok((
        agent.id.clone(),
        Registered {
            agent_id: agent.id.to_string(),
            token,
            config: agent.config,
        },
    ))
}

async fn authenticate_agent<C: Clock>(
    ctx: &ListenCtx<C>,
    token: &str,
    version: &str,
) -> Result<(AgentId, Authenticated), String> {
    let now = ctx.clock.now();
    let token_hash = hash_token(token);
    let agent = ctx
        .storage
        .find_by_token_hash(&token_hash)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "invalid token".to_string())?;

    ctx.storage
        .mark_authenticated(&agent.id, version, now)
        .await
        .map_err(|e| e.to_string())?;

    Ok((
        agent.id.clone(),
        Authenticated {
            agent_id: agent.id.to_string(),
            config: agent.config,
        },
    ))
}

/// Accepts WebSocket connections on a single bound TCP socket.
pub struct Listener<C: Clock> {
    tcp: TcpListener,
    ctx: Arc<ListenCtx<C>>,
}

impl<C: Clock> Listener<C> {
    pub async fn bind(addr: &str, ctx: Arc<ListenCtx<C>>) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        Ok(Self { tcp, ctx })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Run the accept loop until `shutdown` fires. Each connection is
    /// handled on its own spawned task.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return;
                }
                result = self.tcp.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let ctx = Arc::clone(&self.ctx);
                            let conn_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, ctx, conn_shutdown).await;
                            });
                        }
                        Err(e) => warn!("accept error: {e}"),
                    }
                }
            }
        }
    }
}

async fn handle_connection<C: Clock>(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ListenCtx<C>>,
    shutdown: CancellationToken,
) {
    let now = ctx.clock.now();
    if !ctx.rate_limiter.is_allowed(peer.ip(), now) {
        debug!(%peer, "connection refused by rate limiter");
        return;
    }

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "websocket upgrade failed: {e}");
            return;
        }
    };

    let (mut write, mut read) = ws.split();

    let first = match tokio::time::timeout(HANDSHAKE_TIMEOUT, read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(_) => {
            ctx.rate_limiter.record_failure(peer.ip(), ctx.clock.now());
            return;
        }
        Err(_) => {
            let _ = send_close(&mut write, CloseReason::AuthTimeout).await;
            return;
        }
    };

    let hello: ClientHello = match serde_json::from_str(&first) {
        Ok(hello) => hello,
        Err(_) => {
            ctx.rate_limiter.record_failure(peer.ip(), ctx.clock.now());
            let _ = send_handshake_error(&mut write, "malformed handshake frame").await;
            let _ = send_close(&mut write, CloseReason::AuthFailed).await;
            return;
        }
    };

    let outcome = negotiate(&ctx, hello).await;
    let (agent_id, permissions) = match outcome {
        HandshakeOutcome::Registered(agent_id, registered) => {
            ctx.rate_limiter.record_success(peer.ip());
            if send_frame(&mut write, &registered).await.is_err() {
                return;
            }
            (agent_id, PermissionSet::all())
        }
        HandshakeOutcome::Authenticated(agent_id, authenticated) => {
            ctx.rate_limiter.record_success(peer.ip());
            if send_frame(&mut write, &authenticated).await.is_err() {
                return;
            }
            (agent_id, PermissionSet::all())
        }
        HandshakeOutcome::Rejected(error) => {
            ctx.rate_limiter.record_failure(peer.ip(), ctx.clock.now());
            let _ = send_frame(&mut write, &error).await;
            let _ = send_close(&mut write, CloseReason::AuthFailed).await;
            return;
        }
    };

    info!(%agent_id, %peer, "agent connection established");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let handle = Arc::new(ConnectionHandle::new(agent_id.clone(), outbound_tx));
    ctx.registry.register(handle.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match message {
                OutboundMessage::Frame(frame) => {
                    if write.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                OutboundMessage::Close(reason) => {
                    let _ = send_close(&mut write, reason).await;
                    break;
                }
            }
        }
        let _ = write.close().await;
    });

    run_receive_loop(&ctx, &handle, &permissions, &mut read, &shutdown).await;

    if shutdown.is_cancelled() {
        handle.close(CloseReason::ServerShutdown);
    }

    ctx.registry.unregister(&agent_id, &handle);
    handle.fail_all_pending();
    drop(handle);
    let _ = writer_task.await;

    if let Err(e) = ctx
        .storage
        .set_status(&agent_id, fleetd_core::AgentStatus::Disconnected, ctx.clock.now())
        .await
    {
        warn!(%agent_id, "failed to mark agent disconnected: {e}");
    }
    info!(%agent_id, %peer, "agent connection closed");
}

async fn run_receive_loop<C: Clock, S>(
    ctx: &Arc<ListenCtx<C>>,
    handle: &Arc<ConnectionHandle>,
    permissions: &PermissionSet,
    read: &mut futures_util::stream::SplitStream<WebSocketStream<S>>,
    shutdown: &CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut consecutive_errors: u32 = 0;

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => return,
            message = read.next() => message,
        };

        let Some(message) = message else {
            return;
        };

        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return,
            Ok(_) => continue,
            Err(_) => return,
        };

        if let Err(e) = handle_frame(ctx, handle, permissions, &text).await {
            warn!(agent_id = %handle.agent_id, "connection error: {e}");
            consecutive_errors += 1;
            if consecutive_errors >= ctx.max_consecutive_errors {
                warn!(agent_id = %handle.agent_id, "too many consecutive errors, closing");
                return;
            }
            continue;
        }
        consecutive_errors = 0;
    }
}

async fn handle_frame<C: Clock>(
    ctx: &Arc<ListenCtx<C>>,
    handle: &Arc<ConnectionHandle>,
    permissions: &PermissionSet,
    text: &str,
) -> Result<(), ConnectionError> {
    let frame: Frame = serde_json::from_str(text)?;

    ctx.storage
        .touch_last_seen(&handle.agent_id, ctx.clock.now())
        .await
        .map_err(|_| ConnectionError::Closed)
        .ok();

    match frame {
        Frame::Response(response) if response.result.is_none() && response.error.is_none() => {
            // A method-absent request (e.g. `{"jsonrpc":"2.0","id":5}`) has no
            // field the untagged `Frame` can use to recognize it as a
            // request, so it deserializes here instead. A genuine response
            // always carries `result` or `error`.
            if let Some(id) = response.id {
                send_response(
                    handle,
                    RpcResponse::failure(Some(id), RpcError::invalid_request("missing method")),
                )?;
            }
            Ok(())
        }
        Frame::Response(response) => {
            handle.complete(response);
            Ok(())
        }
        Frame::Request(request) => {
            let call = MethodCall {
                method: request.method,
                params: request.params,
                id: request.id,
            };
            if let Some(response) = ctx
                .methods
                .dispatch(handle.agent_id.as_str(), call, permissions)
                .await
            {
                send_response(handle, response)?;
            }
            Ok(())
        }
    }
}

fn send_response(
    handle: &Arc<ConnectionHandle>,
    response: RpcResponse,
) -> Result<(), ConnectionError> {
    let encoded = serde_json::to_string(&response)?;
    handle
        .send_raw(encoded)
        .map_err(|_| ConnectionError::Closed)
}

async fn send_frame<S, T>(
    write: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    frame: &T,
) -> Result<(), ConnectionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let encoded = serde_json::to_string(frame)?;
    write
        .send(Message::Text(encoded.into()))
        .await
        .map_err(ConnectionError::Transport)
}

async fn send_handshake_error<S>(
    write: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    reason: &str,
) -> Result<(), ConnectionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    send_frame(write, &HandshakeError::new(reason)).await
}

async fn send_close<S>(
    write: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    reason: CloseReason,
) -> Result<(), ConnectionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (code, text) = reason.code_and_text();
    write
        .send(Message::Close(Some(CloseFrame {
            code: code.into(),
            reason: text.into(),
        })))
        .await
        .map_err(ConnectionError::Transport)
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
