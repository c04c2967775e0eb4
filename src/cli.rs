//! Shared entry point of the three programs.

use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

use crate::error::{Abandoned, FetchError};
use crate::fetch::{Fetch, FetchResult};
use crate::target::Target;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_UNDESCRIBED: u8 = 2;
pub const EXIT_USAGE: u8 = 64;

/// Maximum log level named by `RUST_LOG` (`error`..`trace`, `off`); `warn` otherwise.
pub fn max_level(rust_log: Option<&str>) -> LevelFilter {
    rust_log
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::WARN)
}

/// Logs go to stderr so that stdout carries nothing but the response.
pub fn init_tracing() {
    let rust_log = env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level(rust_log.as_deref()))
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Fetches the page named by the single command-line argument and prints it.
pub fn run(fetcher: impl Fetch) -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program = args.get(0).map(String::as_str).unwrap_or("fetch");
        eprintln!("Usage: {} <host>", program);
        return ExitCode::from(EXIT_USAGE);
    }
    let target: Target = match args[1].parse() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let result = fetcher.fetch(target).map(|pending| pending.wait());
    let stdout = io::stdout();
    let stderr = io::stderr();
    ExitCode::from(finish(result, &mut stdout.lock(), &mut stderr.lock()))
}

/// Writes the outcome of a fetch and picks the exit status.
pub fn finish(
    result: Result<Result<FetchResult, Abandoned>, FetchError>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> u8 {
    match result {
        Ok(Ok(Ok(response))) => match out.write_all(&response).and_then(|()| out.flush()) {
            Ok(()) => 0,
            Err(e) => {
                error!("failed to write response: {}", e);
                let _ = writeln!(err, "error: failed to write response: {}", e);
                EXIT_FAILURE
            }
        },
        Ok(Ok(Err(e))) | Err(e) => {
            let _ = writeln!(err, "error: {}", report(&e));
            EXIT_FAILURE
        }
        Ok(Err(abandoned)) => {
            let _ = writeln!(err, "error: {}", abandoned);
            EXIT_UNDESCRIBED
        }
    }
}

/// Formats an error with its whole source chain, `outer: inner: ...`.
pub fn report(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
