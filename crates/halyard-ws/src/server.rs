use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use halyard_bus::{Bus, BusMessageKind};

use crate::error::{Result, WsError};
use crate::frame::{self, Frame, MAX_FRAME_SIZE};
use crate::handshake;

enum Outbound {
    Text(String),
    Close,
}

/// A hand-rolled RFC 6455 WebSocket server built on raw `tokio::net`
/// sockets — no `axum`, no `tokio-tungstenite`. Text frames only, one
/// client slot per connection, messages routed onto the shared bus exactly
/// like any other channel adapter. One `tokio::select!`-driven task per
/// connection handles readiness multiplexing.
pub struct WsServer {
    port: u16,
    max_clients: usize,
    max_frame_bytes: usize,
    bus: Arc<Bus>,
    clients: DashMap<i64, mpsc::UnboundedSender<Outbound>>,
    next_chat_id: AtomicI64,
    total_connections: AtomicU64,
    total_messages: AtomicU64,
    running: AtomicBool,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsServer {
    pub fn new(port: u16, max_clients: usize, max_frame_bytes: usize, bus: Arc<Bus>) -> Arc<Self> {
        let port = if port > 0 { port } else { 18789 };
        info!(port, max_clients, "websocket server initialized");
        Arc::new(Self {
            port,
            max_clients,
            max_frame_bytes: max_frame_bytes.min(MAX_FRAME_SIZE),
            bus,
            clients: DashMap::new(),
            next_chat_id: AtomicI64::new(1),
            total_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
            running: AtomicBool::new(false),
            accept_task: Mutex::new(None),
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::SeqCst)
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind and start accepting connections in a background task. Returns
    /// the port actually bound — useful when `port == 0` asks the OS to
    /// pick an ephemeral one (e.g. in tests).
    pub async fn listen(self: &Arc<Self>) -> Result<u16> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        let bound_port = listener.local_addr()?.port();
        self.running.store(true, Ordering::SeqCst);
        info!(port = bound_port, "listening on ws://0.0.0.0:{}", bound_port);

        let server = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                if !server.running.load(Ordering::SeqCst) {
                    break;
                }
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if server.clients.len() >= server.max_clients {
                            warn!(%addr, "max clients reached, rejecting connection");
                            drop(stream);
                            continue;
                        }
                        let server = server.clone();
                        tokio::spawn(async move {
                            server.total_connections.fetch_add(1, Ordering::SeqCst);
                            if let Err(e) = server.handle_connection(stream, addr.to_string()).await {
                                debug!(%addr, error = %e, "connection ended");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept() failed");
                    }
                }
            }
        });
        *self.accept_task.lock().await = Some(handle);
        Ok(bound_port)
    }

    async fn handle_connection(self: &Arc<Self>, stream: tokio::net::TcpStream, addr: String) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request = String::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(WsError::Handshake("connection closed during handshake".into()));
            }
            request.push_str(&line);
            if line == "\r\n" || line == "\n" {
                break;
            }
        }

        let key = handshake::extract_key(&request)?;
        let response = handshake::build_response(&key);
        write_half.write_all(response.as_bytes()).await?;
        info!(%addr, "handshake complete");

        let chat_id = self.next_chat_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.clients.insert(chat_id, tx);

        let result = loop {
            tokio::select! {
                frame = frame::read_frame(&mut reader, self.max_frame_bytes) => {
                    match frame {
                        Ok(Frame::Text(text)) => {
                            self.total_messages.fetch_add(1, Ordering::SeqCst);
                            debug!(%addr, chat_id, "ws message received");
                            let _ = self
                                .bus
                                .publish_inbound(BusMessageKind::UserInput, "websocket", &addr, chat_id, text.as_bytes())
                                .await;
                        }
                        Ok(Frame::Ping(payload)) => {
                            if frame::write_pong(&mut write_half, &payload).await.is_err() {
                                break Ok(());
                            }
                        }
                        Ok(Frame::Pong) => {}
                        Ok(Frame::Close) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
                outbound = rx.recv() => {
                    match outbound {
                        Some(Outbound::Text(text)) => {
                            if frame::write_text(&mut write_half, &text).await.is_err() {
                                break Ok(());
                            }
                        }
                        Some(Outbound::Close) | None => {
                            let _ = frame::write_close(&mut write_half).await;
                            break Ok(());
                        }
                    }
                }
            }
        };

        self.clients.remove(&chat_id);
        info!(%addr, chat_id, "client disconnected");
        result
    }

    /// Send a text message to a specific client by `chat_id`.
    pub fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let sender = self.clients.get(&chat_id).ok_or(WsError::NotFound(chat_id))?;
        sender.send(Outbound::Text(text.to_string())).map_err(|_| WsError::NotFound(chat_id))
    }

    /// Broadcast a text message to every connected client, returning the
    /// number of clients the message was queued for.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut sent = 0;
        for entry in self.clients.iter() {
            if entry.value().send(Outbound::Text(text.to_string())).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub fn close_client(&self, chat_id: i64) {
        if let Some((_, sender)) = self.clients.remove(&chat_id) {
            let _ = sender.send(Outbound::Close);
        }
    }

    /// Compatibility hook for the Channel contract's `poll` method:
    /// incoming messages are already published onto the bus as they
    /// arrive (per-connection tasks drive this independently), so `poll`
    /// has nothing to pump. Always returns immediately, analogous to the
    /// webhook-only adapters whose `poll` always reports no work done.
    pub async fn poll(&self) -> Result<()> {
        Ok(())
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_task.lock().await.take() {
            handle.abort();
        }
        for entry in self.clients.iter() {
            let _ = entry.value().send(Outbound::Close);
        }
        info!("websocket server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn client_frame(text: &str) -> Vec<u8> {
        let mask = [0x12u8, 0x34, 0x56, 0x78];
        let bytes = text.as_bytes();
        let mut out = vec![0x81, 0x80 | (bytes.len() as u8)];
        out.extend_from_slice(&mask);
        for (i, b) in bytes.iter().enumerate() {
            out.push(b ^ mask[i % 4]);
        }
        out
    }

    #[tokio::test]
    async fn end_to_end_handshake_and_message_roundtrip() {
        let bus = Arc::new(Bus::new(16, 16, 4096));
        let server = WsServer::new(0, 4, MAX_FRAME_SIZE, bus.clone());
        let local_port = server.listen().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut stream = TcpStream::connect(("127.0.0.1", local_port)).await.unwrap();
        let request = "GET / HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.contains("101 Switching Protocols"));
        assert!(response.contains("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

        stream.write_all(&client_frame("hello from client")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let msg = bus.consume_inbound(0).await.unwrap();
        assert_eq!(msg.content, "hello from client");
        assert_eq!(msg.channel, "websocket");

        server.stop().await;
    }
}
