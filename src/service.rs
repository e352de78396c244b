//! The compile entry point shared by the server and the command line mode.
//!
//! [`compile`] never fails: engine errors and engine panics become
//! `EXCEPTION` responses, so a connection stays usable after a failed
//! compile.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::codec::DiagnosticCodec;
use crate::config::Delimiters;
use crate::invoker::{CompileInvoker, CompileRequest};
use crate::protocol::FramedResponse;

/// Run one compile and frame the outcome.
///
/// The compile runs as its own task. Dropping the returned future does not
/// cancel it; there is no cancel path once a compile has started.
pub async fn compile(
    invoker: &dyn CompileInvoker,
    request: CompileRequest,
    delimiters: &Delimiters,
) -> FramedResponse {
    let files = request.files.len();
    let options = request.options.len();

    // An engine may panic while building its future, before any task exists.
    let future = match catch_unwind(AssertUnwindSafe(|| invoker.compile(request))) {
        Ok(future) => future,
        Err(payload) => {
            let message = panic_message(payload);
            error!(files, options, %message, "compile call panicked");
            return FramedResponse::exception(&message, delimiters);
        }
    };

    match tokio::spawn(future).await {
        Ok(Ok(records)) => {
            debug!(files, options, diagnostics = records.len(), "compile finished");
            FramedResponse::errors(DiagnosticCodec::encode(&records, delimiters))
        }
        Ok(Err(e)) => {
            warn!(files, options, error = %e, "compile failed");
            FramedResponse::exception(&e.to_string(), delimiters)
        }
        Err(e) => {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                "compile task cancelled".to_string()
            };
            error!(files, options, %message, "compile task aborted");
            FramedResponse::exception(&message, delimiters)
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "compiler panicked".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::END_SENTINEL;
    use crate::diagnostic::{DiagnosticKind, DiagnosticRecord};
    use crate::error::CompileServiceError;
    use crate::invoker::FnInvoker;
    use crate::protocol::{wire_len, ResponseTag};

    fn request(files: &[&str]) -> CompileRequest {
        CompileRequest::new(files.iter().map(|s| s.to_string()).collect(), vec![])
    }

    #[tokio::test]
    async fn test_errors_response_for_diagnostics() {
        let d = Delimiters::new("<sep>").unwrap();
        let invoker = FnInvoker::new(|_r: CompileRequest| async {
            Ok(vec![DiagnosticRecord::new(DiagnosticKind::Error, "missing semicolon")
                .at("/tmp/A.java", 1)])
        });

        let response = compile(&invoker, request(&["/tmp/A.java"]), &d).await;

        assert_eq!(response.tag, ResponseTag::Errors);
        assert_eq!(response.declared_length, wire_len(&response.payload));
        assert!(response.payload.contains("KIND:ERROR<sep>"));
        assert!(response
            .payload
            .ends_with(&format!("MESSAGE:missing semicolon<sep>{END_SENTINEL}")));
    }

    #[tokio::test]
    async fn test_no_diagnostics_is_sentinel_only() {
        let d = Delimiters::default();
        let invoker = FnInvoker::new(|_r: CompileRequest| async { Ok(Vec::new()) });

        let response = compile(&invoker, request(&[]), &d).await;
        assert_eq!(response.payload, END_SENTINEL);
        assert_eq!(response.declared_length, END_SENTINEL.len());
    }

    #[tokio::test]
    async fn test_invoker_error_becomes_exception() {
        let d = Delimiters::default();
        let invoker = FnInvoker::new(|_r: CompileRequest| async {
            Err(CompileServiceError::Compiler("disk read error".to_string()))
        });

        let response = compile(&invoker, request(&["A.java"]), &d).await;
        assert_eq!(
            response.to_line(),
            format!(
                "EXCEPTION:{}:disk read error{}",
                "disk read error".len() + END_SENTINEL.len(),
                END_SENTINEL
            )
        );
    }

    #[tokio::test]
    async fn test_invoker_panic_becomes_exception() {
        let d = Delimiters::default();
        let invoker = FnInvoker::new(|_r: CompileRequest| async {
            if true {
                panic!("engine exploded");
            }
            Ok(Vec::new())
        });

        let response = compile(&invoker, request(&["A.java"]), &d).await;
        assert!(response.is_exception());
        assert_eq!(response.body(&d), "engine exploded");
    }

    struct EagerPanic;

    impl CompileInvoker for EagerPanic {
        fn compile(&self, _request: CompileRequest) -> crate::invoker::BoxFuture<'static, crate::invoker::CompileResult> {
            panic!("engine exploded before returning a future")
        }
    }

    #[tokio::test]
    async fn test_invoker_panic_before_future_becomes_exception() {
        let d = Delimiters::default();

        let response = compile(&EagerPanic, request(&["A.java"]), &d).await;
        assert!(response.is_exception());
        assert_eq!(response.body(&d), "engine exploded before returning a future");

        // The same call site keeps working afterwards.
        let invoker = FnInvoker::new(|_r: CompileRequest| async { Ok(Vec::new()) });
        let response = compile(&invoker, request(&["A.java"]), &d).await;
        assert_eq!(response.tag, ResponseTag::Errors);
    }
}
