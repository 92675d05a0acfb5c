//! minirpc Server
//!
//! This crate provides the server half of minirpc: the service registry and
//! the per-connection dispatch pipeline.
//!
//! # Overview
//!
//! A [`Server`] holds named [`Service`]s, each a set of typed async method
//! handlers registered explicitly (no runtime reflection). Per connection,
//! the server validates the handshake preamble, selects the codec it names,
//! and pumps requests: every request runs on its own task while the pump
//! keeps reading, so one slow call never stalls the connection. Responses
//! are serialized through a per-session write mutex and correlated by
//! sequence number, not ordering.
//!
//! # Timeouts
//!
//! If the handshake carries a non-zero handle timeout, every call races a
//! timer. An expired call sends a timeout error frame and tears the whole
//! session down.
//!
//! # Transports
//!
//! Sessions run over anything that is `AsyncRead + AsyncWrite`; helpers are
//! provided for TCP ([`Server::accept`]), Unix-domain sockets
//! ([`Server::accept_unix`]) and HTTP CONNECT hijacking ([`serve_http`]).

pub mod http;
pub mod server;
pub mod service;

pub use http::{serve_http, serve_http_conn};
pub use server::Server;
pub use service::{HandlerFuture, Service};
