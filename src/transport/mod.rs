//! Transport module - TCP listener handling.

mod tcp;

pub use tcp::TcpTransport;
