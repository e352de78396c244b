//! # compile-service
//!
//! Line-protocol compile server. Editors connect over TCP, send the source
//! files and compiler options to use, and receive the compiler's diagnostics
//! as one framed response line per compile request.
//!
//! ## Architecture
//!
//! - **Control lines** (`START`, `END`, `STARTOPTIONS`, `ENDOPTIONS`, `Bye.`)
//!   switch a per-connection accumulator between file and option input.
//! - **Compile invoker** turns an accumulated request into diagnostics. The
//!   default invoker runs `javac` as a child process.
//! - **Framed responses** (`ERRORS:<len>:...` / `EXCEPTION:<len>:...`) carry
//!   the encoded diagnostics back on the same connection.
//!
//! ## Example
//!
//! ```ignore
//! use compile_service::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ServerBuilder::new().port(10007).bind().await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod control;
pub mod diagnostic;
pub mod error;
pub mod invoker;
pub mod protocol;
pub mod server;
pub mod service;
pub mod transport;
pub mod writer;

pub use client::CompileClient;
pub use diagnostic::{DiagnosticKind, DiagnosticRecord};
pub use error::CompileServiceError;
pub use invoker::{CompileInvoker, CompileRequest};
pub use protocol::FramedResponse;
pub use server::{Server, ServerBuilder};
