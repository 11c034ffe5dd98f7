//! Integration tests for Murmur Proxy
//!
//! Exercises the full proxy path over real sockets: SOCKS5 greeting and
//! CONNECT request, outbound connect, bidirectional relay, and service
//! start/stop semantics.

use murmur_proxy::server::{Event, ProxyServer};
use murmur_proxy::transport::TcpTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Spawn a TCP echo server and return its address.
async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

async fn start_proxy() -> ProxyServer {
    ProxyServer::start(Arc::new(TcpTransport::new()), "127.0.0.1:0")
        .await
        .expect("Failed to start proxy")
}

/// Complete the SOCKS5 handshake for an IPv4 CONNECT to `target` and
/// return the stream, ready for relaying.
async fn socks_connect_ipv4(proxy: SocketAddr, target: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();

    stream.write_all(&[5, 1, 0]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [5, 0]);

    let mut request = vec![5, 1, 0, 1];
    let std::net::IpAddr::V4(ip) = target.ip() else {
        panic!("expected an IPv4 target");
    };
    request.extend_from_slice(&ip.octets());
    request.extend_from_slice(&target.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [5, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

    stream
}

#[tokio::test]
async fn test_end_to_end_ipv4_connect() {
    let echo_addr = spawn_echo_server().await;
    let server = start_proxy().await;

    let mut stream = socks_connect_ipv4(server.local_addr(), echo_addr).await;

    stream.write_all(b"hello through the proxy").await.unwrap();
    let mut buf = [0u8; 23];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello through the proxy");

    server.stop().await;
}

#[tokio::test]
async fn test_end_to_end_domain_connect() {
    let echo_addr = spawn_echo_server().await;
    let server = start_proxy().await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    stream.write_all(&[5, 1, 0]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [5, 0]);

    let domain = b"localhost";
    let mut request = vec![5, 1, 0, 3, domain.len() as u8];
    request.extend_from_slice(domain);
    request.extend_from_slice(&echo_addr.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [5, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

    stream.write_all(b"via domain").await.unwrap();
    let mut buf = [0u8; 10];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"via domain");

    server.stop().await;
}

#[tokio::test]
async fn test_greeting_without_no_auth_closes_silently() {
    let server = start_proxy().await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    // Offers only username/password auth
    stream.write_all(&[5, 1, 2]).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(buf.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_bad_version_closes_silently() {
    let server = start_proxy().await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(&[4, 1, 0]).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(buf.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_unsupported_command_closes_after_method_selection() {
    let server = start_proxy().await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(&[5, 1, 0]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [5, 0]);

    // BIND request
    stream
        .write_all(&[5, 2, 0, 1, 127, 0, 0, 1, 0, 80])
        .await
        .unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(buf.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_connect_failure_sends_general_failure_reply() {
    let server = start_proxy().await;

    // Bind then drop to get a port with no listener behind it
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = unused.local_addr().unwrap().port();
    drop(unused);

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(&[5, 1, 0]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();

    let mut request = vec![5, 1, 0, 1, 127, 0, 0, 1];
    request.extend_from_slice(&dead_port.to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [5, 1, 0, 1, 0, 0, 0, 0, 0, 0]);

    // Session is over; no relay follows
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_stop_reports_status_and_refuses_new_connections() {
    let server = start_proxy().await;
    let addr = server.local_addr();

    let status = server.status();
    assert!(status.running);
    assert_eq!(status.port, addr.port());

    let mut events = server.subscribe();
    server.stop().await;

    // The stop sequence publishes a final status transition
    let mut saw_stopped = false;
    while let Ok(event) = events.try_recv() {
        if let Event::Status(status) = event {
            assert!(!status.running);
            saw_stopped = true;
        }
    }
    assert!(saw_stopped);

    // Listener is gone
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_sessions_survive_service_stop() {
    let echo_addr = spawn_echo_server().await;
    let server = start_proxy().await;
    let proxy_addr = server.local_addr();

    let mut stream = socks_connect_ipv4(proxy_addr, echo_addr).await;

    // Prove the relay is live before stopping
    stream.write_all(b"before").await.unwrap();
    let mut buf = [0u8; 6];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"before");

    server.stop().await;

    // Existing session keeps relaying after stop
    stream.write_all(b"after!").await.unwrap();
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"after!");

    // But no new sessions are accepted
    assert!(TcpStream::connect(proxy_addr).await.is_err());
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let echo_addr = spawn_echo_server().await;
    let server = start_proxy().await;
    let proxy_addr = server.local_addr();

    let mut tasks = Vec::new();
    for i in 0u8..8 {
        tasks.push(tokio::spawn(async move {
            let mut stream = socks_connect_ipv4(proxy_addr, echo_addr).await;
            let payload = vec![i; 512];
            stream.write_all(&payload).await.unwrap();
            let mut buf = vec![0u8; 512];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, payload);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_remote_close_propagates_to_client() {
    // A remote that sends a banner and hangs up
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"bye").await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let server = start_proxy().await;
    let mut stream = socks_connect_ipv4(server.local_addr(), remote_addr).await;

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("relay did not close after remote EOF")
        .unwrap();
    assert_eq!(buf, b"bye");

    server.stop().await;
}
