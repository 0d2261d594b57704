//! Listener setup and the per-connection serve loop.
//!
//! `axum::serve` offers no header read timeout, so connections are driven by
//! hyper's HTTP/1.1 builder directly, one tokio task per connection.

use std::{future::Future, io, net::SocketAddr, time::Duration};

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::Config;

/// Pause after a failed `accept` (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Pending-connection queue length, same as `tokio::net::TcpListener::bind`.
const LISTEN_BACKLOG: i32 = 1024;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the listener on every interface at the configured port.
///
/// Listens on `[::]` with `IPV6_V6ONLY` cleared so IPv4 and IPv6 clients
/// share one socket. Hosts without an IPv6 stack fall back to `0.0.0.0`.
/// There is no retry and no fallback port; the caller treats a failure here
/// as fatal.
pub async fn bind(config: &Config) -> Result<TcpListener, ServerError> {
    // ---
    let addr = config.bind_addr();

    // Port is only validated here: service names like `http` are rejected.
    let resolved = tokio::net::lookup_host(addr.as_str())
        .await
        .and_then(|mut addrs| {
            addrs
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address to bind"))
        });
    let sock_addr = match resolved {
        Ok(sock_addr) => sock_addr,
        Err(source) => return Err(ServerError::Bind { addr, source }),
    };

    let socket = match dual_stack_socket() {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "IPv6 unavailable, listening on IPv4 only");
            return bind_v4(config).await;
        }
    };

    match listen_on(socket, sock_addr) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrNotAvailable => {
            warn!(error = %e, "Cannot bind {}, listening on IPv4 only", addr);
            bind_v4(config).await
        }
        Err(source) => Err(ServerError::Bind { addr, source }),
    }
}

async fn bind_v4(config: &Config) -> Result<TcpListener, ServerError> {
    // ---
    let addr = config.bind_addr_v4();
    TcpListener::bind(addr.as_str())
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

fn dual_stack_socket() -> io::Result<Socket> {
    // ---
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    Ok(socket)
}

fn listen_on(socket: Socket, addr: SocketAddr) -> io::Result<TcpListener> {
    // ---
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Accept connections until `shutdown` resolves.
///
/// Each connection gets its own task. Clients that take longer than
/// `header_read_timeout` to deliver request headers are disconnected.
/// Connection-level failures are logged and never stop the loop.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    header_read_timeout: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    // ---
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                return;
            }
        };

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        tokio::spawn(serve_connection(
            stream,
            peer,
            app.clone(),
            header_read_timeout,
        ));
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    header_read_timeout: Duration,
) {
    // ---
    let io = TokioIo::new(stream);
    let service = TowerToHyperService::new(app);

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);

    if let Err(e) = builder.serve_connection(io, service).await {
        if e.is_timeout() {
            debug!(%peer, "Client did not send request headers in time");
        } else if e.is_incomplete_message() {
            debug!(%peer, error = %e, "Client closed connection mid-message");
        } else if e.is_parse() {
            debug!(%peer, error = %e, "Malformed request");
        } else {
            warn!(%peer, error = %e, "Connection error");
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use std::net::Ipv6Addr;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::config::load_from;
    use crate::routes::{self, AppState};
    use crate::SystemHost;

    fn test_config(port: &str) -> Config {
        // ---
        load_from(|name| (name == "PORT").then(|| port.to_string())).unwrap()
    }

    fn app() -> Router {
        routes::router(AppState {
            host: Arc::new(SystemHost),
        })
    }

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        // ---
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_bind_failure_reports_address() {
        // ---
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port().to_string();

        let err = bind(&test_config(&port)).await.unwrap_err();
        let ServerError::Bind { addr, source } = &err;
        assert!(addr.ends_with(&format!(":{}", port)), "unexpected addr {}", addr);
        assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
        assert!(err.to_string().starts_with("Failed to bind "));
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_port() {
        // ---
        // Only numeric ports bind; service names are not resolved.
        assert!(bind(&test_config("not-a-port")).await.is_err());
        assert!(bind(&test_config("http")).await.is_err());
        assert!(bind(&test_config("70000")).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_accepts_ipv4_and_ipv6() {
        // ---
        let listener = bind(&test_config("0")).await.unwrap();
        let local = listener.local_addr().unwrap();
        let port = local.port();

        let v4 = TcpStream::connect(SocketAddr::from(([127, 0, 0, 1], port))).await;
        assert!(v4.is_ok(), "IPv4 connect failed: {:?}", v4.err());

        // Skipped where loopback has no IPv6 address or the IPv4 fallback was taken.
        let has_v6_loopback = std::net::TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).is_ok();
        if local.is_ipv6() && has_v6_loopback {
            let loopback_v6 = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
            let v6 = TcpStream::connect(loopback_v6).await;
            assert!(v6.is_ok(), "IPv6 connect failed: {:?}", v6.err());
        }
    }

    #[tokio::test]
    async fn test_serves_health_over_tcp() {
        // ---
        let listener = bind(&test_config("0")).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        let server = tokio::spawn(serve(listener, app(), Duration::from_secs(10), shutdown));

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let response = raw_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nOK"));

        stop_tx.send(()).unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_serving() {
        // ---
        let listener = bind(&test_config("0")).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve(
            listener,
            app(),
            Duration::from_secs(10),
            std::future::pending(),
        ));
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"NOT HTTP AT ALL\r\n\r\n").await.unwrap();
        let mut garbage_reply = Vec::new();
        let _ = stream.read_to_end(&mut garbage_reply).await;
        assert!(!String::from_utf8_lossy(&garbage_reply).contains("200 OK"));

        // Connection dropped mid-request.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /health HT").await.unwrap();
        drop(stream);

        let response = raw_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        server.abort();
    }

    #[tokio::test]
    async fn test_slow_headers_are_dropped() {
        // ---
        let listener = bind(&test_config("0")).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve(
            listener,
            app(),
            Duration::from_millis(200),
            std::future::pending(),
        ));

        let mut stream = TcpStream::connect(SocketAddr::from(([127, 0, 0, 1], port)))
            .await
            .unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\n").await.unwrap();

        // The server closes the connection without ever sending a 200.
        let mut response = Vec::new();
        let read = tokio::time::timeout(
            Duration::from_secs(5),
            stream.read_to_end(&mut response),
        )
        .await
            .expect("connection should be closed after the header timeout");
        assert!(read.is_ok() || response.is_empty());
        assert!(!String::from_utf8_lossy(&response).contains("200 OK"));

        server.abort();
    }
}
