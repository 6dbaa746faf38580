//! Request handler module
//!
//! The HTTP front end: turns a hyper request into a response by way of the
//! route trie and the dispatcher.

mod router;

pub use router::handle_request;
