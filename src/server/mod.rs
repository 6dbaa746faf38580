// Server module entry point
// Binds the listener and runs the accept loop until shutdown

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the file is mounted under another name
#[path = "loop.rs"]
pub mod server_loop;

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::app::Application;
use crate::logger;

// Re-export commonly used types
pub use listener::bind_listener;
pub use server_loop::start_server_loop;

/// Bind the configured address and serve until SIGINT/SIGTERM
pub async fn run(app: Arc<Application>) -> std::io::Result<()> {
    let addr = app
        .config()
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listener = bind_listener(addr, &app.config().server)?;

    let shutdown = Arc::new(Notify::new());
    signal::start_signal_handler(Arc::clone(&shutdown));
    serve(listener, app, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is notified
pub async fn serve(
    listener: TcpListener,
    app: Arc<Application>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let local: SocketAddr = listener.local_addr()?;
    logger::log_server_start(&local, app.config(), app.route_count());

    let active_connections = Arc::new(AtomicUsize::new(0));
    start_server_loop(listener, app, active_connections, shutdown).await;
    Ok(())
}
