// Listener module
// Binds the application's TCP socket from the server settings

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::config::ServerConfig;

/// Bind `addr` with the socket options of `server`.
///
/// `SO_REUSEADDR` is always set so a restarted application can bind while old
/// connections sit in `TIME_WAIT`. IPv6 listeners also accept IPv4 clients.
pub fn bind_listener(addr: SocketAddr, server: &ServerConfig) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    #[cfg(unix)]
    socket.set_reuse_port(server.reuse_port)?;
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .map_err(|e| io::Error::new(e.kind(), format!("cannot bind {addr}: {e}")))?;
    socket.listen(server.backlog.max(1))?;

    TcpListener::from_std(socket.into())
}
