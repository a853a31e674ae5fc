use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use reqwest::Url;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use medimind_stream::auth::EnvSession;
use medimind_stream::buffer::TokenBuffer;
use medimind_stream::config::Config;
use medimind_stream::resilience::{CircuitBreaker, retry_with_backoff_if};
use medimind_stream::{
    ChatPayload, ConnectionRegistry, FilteredHandler, SseClient, StreamError, StreamHandler,
    StreamOptions, StreamingService,
};

/// Exit status for an interrupted request, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "medimind-stream",
    version,
    about = "Ask a medical chat backend a question and stream the answer"
)]
struct Cli {
    /// The question to ask
    question: String,

    /// Flow id, path on the base URL, or absolute URL to stream from
    #[arg(short, long)]
    endpoint: String,

    /// Config file (default: ~/.config/medimind/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Conversation session id sent to the backend
    #[arg(long, value_name = "ID")]
    session: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print tokens as they arrive, without safety buffering
    #[arg(long)]
    no_filter: bool,

    /// Ignore lines that are not SSE fields instead of treating them as tokens
    #[arg(long)]
    raw_frames: bool,

    /// Log stream lifecycle to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    let service = build_service(&config, cli.raw_frames)?;
    let breaker = CircuitBreaker::new(config.breaker_config());
    let policy = config.retry_policy();

    let mut payload = ChatPayload::new(cli.question.clone());
    if let Some(session) = &cli.session {
        payload = payload.session(session.clone());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut options = StreamOptions::default().with_cancel(cancel);
    if let Some(secs) = cli.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let filter = config.stream.medical_filter && !cli.no_filter;
    let debounce = config.stream.debounce();
    let printed = Arc::new(AtomicBool::new(false));
    let output_failed = Arc::new(AtomicBool::new(false));
    let sources = Arc::new(Mutex::new(Vec::new()));

    // Once output has reached the terminal a retry would repeat it
    let should_retry = |err: &StreamError| err.is_retryable() && !printed.load(Ordering::SeqCst);

    let result = retry_with_backoff_if(&policy, should_retry, |attempt| {
        let printed = Arc::clone(&printed);
        let output_failed = Arc::clone(&output_failed);
        let sources = Arc::clone(&sources);
        let (service, breaker, payload, options) = (&service, &breaker, &payload, &options);
        let endpoint = cli.endpoint.as_str();
        async move {
            if attempt > 0 {
                log::info!("Retrying request (attempt {})", attempt + 1);
            }
            let terminal = TerminalHandler::new(debounce, printed, output_failed, sources);
            let mut handler: Box<dyn StreamHandler> = if filter {
                Box::new(FilteredHandler::new(terminal))
            } else {
                Box::new(terminal)
            };
            breaker
                .execute(
                    endpoint,
                    service.fetch_streaming_response(endpoint, payload, &mut *handler, options),
                )
                .await
        }
    })
    .await;

    match result {
        Ok(_) if output_failed.load(Ordering::SeqCst) => {
            Err(eyre!("Failed to write the answer to stdout"))
        }
        Ok(summary) => {
            print_sources(&lock(&sources));
            log::info!(
                "Completed via {:?}: {} tokens in {:?} ({:.1} tokens/s)",
                summary.completion,
                summary.metrics.tokens_received,
                summary.metrics.duration(),
                summary.metrics.tokens_per_second()
            );
            Ok(())
        }
        Err(StreamError::Cancelled) => {
            eprintln!("\nCancelled");
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(err) => Err(err).wrap_err("Streaming request failed"),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn build_service(config: &Config, raw_frames: bool) -> Result<StreamingService> {
    let client =
        SseClient::new().coerce_bare_lines(config.stream.coerce_bare_lines && !raw_frames);
    let mut service = StreamingService::new(
        client,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(EnvSession::new(config.auth.token_env.clone())),
    )
    .with_prediction_path(config.endpoint.path.clone())
    .with_default_timeout(config.stream.timeout());

    if let Some(base_url) = &config.endpoint.base_url {
        let url = Url::parse(base_url).wrap_err_with(|| format!("Invalid base URL {base_url}"))?;
        service = service.with_base_url(url);
    }
    Ok(service)
}

/// Writes batched tokens to stdout and collects sources for the end
struct TerminalHandler {
    buffer: TokenBuffer,
    printed: Arc<AtomicBool>,
    sources: Arc<Mutex<Vec<Value>>>,
}

impl TerminalHandler {
    fn new(
        debounce: Duration,
        printed: Arc<AtomicBool>,
        output_failed: Arc<AtomicBool>,
        sources: Arc<Mutex<Vec<Value>>>,
    ) -> Self {
        let buffer = TokenBuffer::new(debounce, move |text| {
            write_text(&mut std::io::stdout().lock(), &text, &output_failed);
        });
        Self {
            buffer,
            printed,
            sources,
        }
    }
}

impl StreamHandler for TerminalHandler {
    fn on_start(&mut self) {
        // Sources from a failed attempt do not belong to this answer
        lock(&self.sources).clear();
    }

    fn on_token(&mut self, token: &str) {
        self.printed.store(true, Ordering::SeqCst);
        self.buffer.add(token);
    }

    fn on_source(&mut self, sources: &[Value]) {
        lock(&self.sources).extend_from_slice(sources);
    }

    fn on_complete(&mut self) {
        self.buffer.flush();
        println!();
    }

    fn on_error(&mut self, _error: &StreamError) {
        self.buffer.flush();
        if self.printed.load(Ordering::SeqCst) {
            println!();
        }
    }
}

/// Write a batch of answer text, remembering the first failure
fn write_text(out: &mut impl Write, text: &str, failed: &AtomicBool) {
    if failed.load(Ordering::SeqCst) {
        return;
    }
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        log::debug!("Writing answer to stdout failed: {err}");
        failed.store(true, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn print_sources(sources: &[Value]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, source) in sources.iter().enumerate() {
        println!("  [{}] {}", i + 1, source_label(source));
    }
}

/// Human-readable name for a cited document
fn source_label(source: &Value) -> String {
    ["title", "name", "url"]
        .iter()
        .find_map(|key| source.get(key).and_then(Value::as_str))
        .or_else(|| {
            source
                .get("metadata")
                .and_then(|m| m.get("source"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| source.to_string())
}
