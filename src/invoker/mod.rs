//! Compile invoker: the seam between the protocol and the compiler engine.
//!
//! The server never compiles anything itself. Every `END` hands a
//! [`CompileRequest`] to a [`CompileInvoker`] and frames whatever
//! diagnostics (or error) comes back.
//!
//! Invokers must be callable repeatedly and from many connections at once.
//! An engine that is not safe to re-enter is wrapped in
//! [`SerializedInvoker`], which admits one call at a time process-wide.
//!
//! # Example
//!
//! ```ignore
//! use compile_service::invoker::{CompileInvoker, FnInvoker, SerializedInvoker};
//!
//! let invoker = FnInvoker::new(|request: CompileRequest| async move {
//!     Ok(Vec::new())
//! });
//! let gated = SerializedInvoker::new(Arc::new(invoker));
//! ```

mod javac;

pub use javac::{parse_javac_output, JavacInvoker, ParsedDiagnostic};

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::diagnostic::DiagnosticRecord;
use crate::error::Result;

/// Boxed future for invoker results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type returned by a compile call.
pub type CompileResult = Result<Vec<DiagnosticRecord>>;

/// Files and options for one compile call. Either list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub files: Vec<String>,
    pub options: Vec<String>,
}

impl CompileRequest {
    pub fn new(files: Vec<String>, options: Vec<String>) -> Self {
        Self { files, options }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Trait for compiler engines.
pub trait CompileInvoker: Send + Sync + 'static {
    /// Compile the request and return diagnostics in the order the engine
    /// reported them.
    ///
    /// An empty file list must yield zero diagnostics.
    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, CompileResult>;
}

/// Invoker backed by an async closure.
pub struct FnInvoker<F, Fut>
where
    F: Fn(CompileRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CompileResult> + Send + 'static,
{
    compile: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnInvoker<F, Fut>
where
    F: Fn(CompileRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CompileResult> + Send + 'static,
{
    pub fn new(compile: F) -> Self {
        Self {
            compile,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> CompileInvoker for FnInvoker<F, Fut>
where
    F: Fn(CompileRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CompileResult> + Send + 'static,
{
    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, CompileResult> {
        Box::pin((self.compile)(request))
    }
}

/// Admits one compile at a time across every connection sharing it.
///
/// Clones share the same gate.
#[derive(Clone)]
pub struct SerializedInvoker {
    inner: Arc<dyn CompileInvoker>,
    gate: Arc<Mutex<()>>,
}

impl SerializedInvoker {
    pub fn new(inner: Arc<dyn CompileInvoker>) -> Self {
        Self {
            inner,
            gate: Arc::new(Mutex::new(())),
        }
    }
}

impl CompileInvoker for SerializedInvoker {
    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, CompileResult> {
        let inner = self.inner.clone();
        let gate = self.gate.clone();
        Box::pin(async move {
            let _permit = gate.lock().await;
            inner.compile(request).await
        })
    }
}
