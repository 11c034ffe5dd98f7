//! Proxy server: connection dispatch and session lifecycle
//!
//! `ProxyServer::start` binds the transport listener and runs the accept
//! loop on its own task. Every accepted connection gets an independent
//! session task: SOCKS5 handshake, outbound connect, reply, relay. Sessions
//! never affect each other; only a listener failure stops the service.
//!
//! Stopping closes the listener but does not terminate in-flight sessions;
//! they relay to natural completion.

use crate::connector;
use crate::relay;
use crate::socks::{self, Reply};
use crate::transport::{Connection, Listener, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the status/log event channel
const EVENT_CHANNEL_SIZE: usize = 64;

/// Process-wide service state, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub running: bool,
    pub bind_addr: String,
    pub port: u16,
}

/// What the server reports to whoever is watching (UI, log pane, tests).
#[derive(Debug, Clone)]
pub enum Event {
    /// Free-text log line
    Log(String),
    /// Service state transition
    Status(Status),
}

/// A running SOCKS5 proxy service.
pub struct ProxyServer {
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    events: broadcast::Sender<Event>,
    local_addr: SocketAddr,
    dispatcher: JoinHandle<()>,
}

impl ProxyServer {
    /// Bind the transport listener and start accepting connections.
    pub async fn start(
        transport: Arc<dyn Transport>,
        listen_addr: &str,
    ) -> crate::Result<Self> {
        let listener = transport.bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());

        info!("SOCKS5 proxy listening on {}", local_addr);
        emit(&events, format!("listening on {}", local_addr));
        let _ = events.send(Event::Status(status_of(local_addr, true)));

        let dispatcher = tokio::spawn(dispatch_loop(
            listener,
            Arc::clone(&running),
            Arc::clone(&shutdown),
            events.clone(),
            local_addr,
        ));

        Ok(Self {
            running,
            shutdown,
            events,
            local_addr,
            dispatcher,
        })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current service state.
    pub fn status(&self) -> Status {
        status_of(self.local_addr, self.is_running())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to log lines and status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Stop accepting connections and close the listener.
    ///
    /// Sessions already relaying keep running until their streams close.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        let _ = self.dispatcher.await;
    }
}

fn status_of(addr: SocketAddr, running: bool) -> Status {
    Status {
        running,
        bind_addr: addr.ip().to_string(),
        port: addr.port(),
    }
}

fn emit(events: &broadcast::Sender<Event>, line: impl Into<String>) {
    // No subscribers is fine; tracing already has the line
    let _ = events.send(Event::Log(line.into()));
}

/// Accept loop. Exits on stop signal or on a listener failure, then runs
/// the stop sequence exactly once: flip `running`, close the listener,
/// report the stopped status.
async fn dispatch_loop(
    mut listener: Box<dyn Listener>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    events: broadcast::Sender<Event>,
    local_addr: SocketAddr,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => {
                    emit(&events, "accepted connection");
                    let events = events.clone();
                    tokio::spawn(handle_session(conn, events));
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        error!("accept failed: {}", e);
                        emit(&events, format!("error: {}", e));
                    } else {
                        debug!("listener closed during shutdown");
                    }
                    break;
                }
            },
        }
    }

    running.store(false, Ordering::SeqCst);
    drop(listener);
    info!("SOCKS5 proxy stopped");
    emit(&events, "stopped");
    let _ = events.send(Event::Status(status_of(local_addr, false)));
}

/// One client session, handshake through relay.
///
/// Owns the client connection for its whole life; every exit path drops it
/// (and the remote, once one exists) exactly once, then logs the close.
async fn handle_session(mut client: Box<dyn Connection>, events: broadcast::Sender<Event>) {
    match socks::negotiate(&mut client).await {
        Ok(request) => {
            emit(&events, format!("connecting to {}", request));

            match connector::connect(&request.host(), request.port).await {
                Ok(remote) => {
                    if let Err(e) = socks::send_reply(&mut client, Reply::Succeeded).await {
                        debug!("failed to send success reply: {}", e);
                    } else {
                        emit(&events, format!("connected to {}, relaying", request));
                        let stats = relay::relay(client, remote).await;
                        debug!(
                            "relay for {} done: {} bytes up, {} bytes down",
                            request, stats.client_to_remote, stats.remote_to_client
                        );
                        emit(&events, "connection closed");
                        return;
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    emit(&events, e.to_string());
                    if let Err(e) = socks::send_reply(&mut client, Reply::GeneralFailure).await {
                        debug!("failed to send failure reply: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            debug!("handshake failed: {}", e);
            emit(&events, format!("handshake failed: {}", e));
        }
    }

    emit(&events, "connection closed");
}
