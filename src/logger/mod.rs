//! Logger module
//!
//! Provides logging utilities for the framework including:
//! - Server lifecycle logging
//! - Boot-time wiring logs (debug level)
//! - Access logging with multiple formats
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
        config.level.eq_ignore_ascii_case("debug"),
    )
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, routes: usize) {
    write_info("======================================");
    write_info("Application started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    write_info(&format!("Routes mapped: {routes}"));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.server.max_connections {
        write_info(&format!("Connection limit: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

/// Boot-time wiring detail, only written when the level is `debug`
pub fn log_debug(message: &str) {
    if writer::get().is_some_and(writer::LogWriter::verbose) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_mapped_route(verb: &str, path: &str) {
    write_info(&format!("[Router] Mapped {{{verb} {path}}}"));
}

pub fn log_mapped_redirect(verb: &str, from: &str, to: &str, status: u16) {
    write_info(&format!("[Router] Redirect {{{verb} {from}}} -> {to} ({status})"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, limit: usize) {
    log_warning(&format!(
        "Connection from {peer_addr} rejected: limit of {limit} reached"
    ));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown() {
    write_info("\n[Shutdown] Signal received, no longer accepting connections");
}
