// Connection handling module
// Accepts a single TCP connection and serves it over HTTP/1.1

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::app::Application;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing the connection cap.
///
/// Returns false when the connection was rejected.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: &Arc<Application>,
    conn_counter: &Arc<AtomicUsize>,
) -> bool {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = app.config().server.max_connections {
        if prev_count >= max_conn {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_connection_rejected(&peer_addr, max_conn);
            drop(stream);
            return false;
        }
    }

    handle_connection(stream, peer_addr, Arc::clone(app), Arc::clone(conn_counter));
    true
}

/// Serve one connection in a spawned task; the counter is released when it ends
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: Arc<Application>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let http = &app.config().http;
        let timeout_duration = Duration::from_secs(http.request_timeout);

        let mut builder = http1::Builder::new();
        builder.keep_alive(http.keep_alive);

        let service_app = Arc::clone(&app);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&service_app), peer_addr)),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
