//! compile-service - compile server and single-shot compiler front end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use compile_service::codec::JsonCodec;
use compile_service::config::{Delimiters, ServerConfig, DEFAULT_MAX_LINE_LENGTH, DEFAULT_PORT};
use compile_service::error::{CompileServiceError, Result};
use compile_service::invoker::{CompileInvoker, CompileRequest, JavacInvoker};
use compile_service::writer::write_stdout_line;
use compile_service::{service, ServerBuilder};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Option always passed in single-shot mode.
const SINGLE_SHOT_DEBUG_OPTION: &str = "-g";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Serve compile requests over TCP, or compile one file and print the framed response.",
    long_about = None
)]
struct Cli {
    /// Port to listen on, or a source file to compile once. Listens on 10007 when omitted.
    target: Option<String>,

    /// Separator written after every diagnostic field.
    separator: Option<String>,

    /// Compiler executable.
    #[arg(long, default_value = "javac")]
    javac: PathBuf,

    /// Close connections that send nothing for this many seconds.
    #[arg(long = "idle-timeout", value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Run one compile at a time across all connections.
    #[arg(long)]
    serialize_compiles: bool,

    /// Longest accepted input line in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,

    /// Extra compiler option for single-shot mode (repeatable).
    #[arg(long = "option", short = 'O', value_name = "OPT", allow_hyphen_values = true)]
    options: Vec<String>,

    /// Single-shot mode: print the diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

/// What the positional target asks for.
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Serve(u16),
    Compile(String),
}

impl Mode {
    fn from_target(target: Option<&str>) -> Result<Self> {
        match target {
            None => Ok(Mode::Serve(DEFAULT_PORT)),
            Some(t) if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) => t
                .parse()
                .map(Mode::Serve)
                .map_err(|_| CompileServiceError::Config(format!("Invalid port: {t}"))),
            Some(t) => Ok(Mode::Compile(t.to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let delimiters = match &cli.separator {
        Some(sep) => Delimiters::new(sep.clone())?,
        None => Delimiters::default(),
    };
    let javac = JavacInvoker::new(cli.javac.clone());

    match Mode::from_target(cli.target.as_deref())? {
        Mode::Serve(port) => {
            let config = ServerConfig {
                port,
                delimiters,
                idle_timeout: cli.idle_timeout.map(Duration::from_secs),
                serialize_compiles: cli.serialize_compiles,
                max_line_length: cli.max_line_length,
            };
            serve(config, javac).await
        }
        Mode::Compile(file) => {
            let mut options = vec![SINGLE_SHOT_DEBUG_OPTION.to_string()];
            options.extend(cli.options);
            let request = CompileRequest::new(vec![file], options);
            compile_once(&javac, request, &delimiters, cli.json).await
        }
    }
}

async fn serve(config: ServerConfig, javac: JavacInvoker) -> Result<()> {
    let server = ServerBuilder::new()
        .config(config)
        .invoker(javac)
        .bind()
        .await?;

    server
        .run_until(async {
            // Without a signal handler the listener simply runs until killed.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!("stopped");
    Ok(())
}

async fn compile_once(
    javac: &JavacInvoker,
    request: CompileRequest,
    delimiters: &Delimiters,
    json: bool,
) -> Result<()> {
    if json {
        let records = javac.compile(request).await?;
        write_stdout_line(&JsonCodec::encode(&records)?)?;
        return Ok(());
    }

    let response = service::compile(javac, request, delimiters).await;
    write_stdout_line(&response.to_line())?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("compile_service=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults_to_server() {
        assert_eq!(Mode::from_target(None).unwrap(), Mode::Serve(DEFAULT_PORT));
    }

    #[test]
    fn test_mode_numeric_target_is_port() {
        assert_eq!(Mode::from_target(Some("12000")).unwrap(), Mode::Serve(12000));
        assert!(matches!(
            Mode::from_target(Some("70000")),
            Err(CompileServiceError::Config(_))
        ));
    }

    #[test]
    fn test_mode_other_target_is_file() {
        assert_eq!(
            Mode::from_target(Some("src/A.java")).unwrap(),
            Mode::Compile("src/A.java".to_string())
        );
        assert_eq!(
            Mode::from_target(Some("1000.java")).unwrap(),
            Mode::Compile("1000.java".to_string())
        );
    }

    #[test]
    fn test_cli_parses_single_shot_options() {
        let cli = Cli::try_parse_from([
            "compile-service",
            "A.java",
            "|",
            "-O",
            "-Xlint:all",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.target.as_deref(), Some("A.java"));
        assert_eq!(cli.separator.as_deref(), Some("|"));
        assert_eq!(cli.options, vec!["-Xlint:all".to_string()]);
        assert!(cli.json);
    }
}
