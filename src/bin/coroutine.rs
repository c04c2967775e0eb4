use fetch_styles::cli;
use fetch_styles::fetch::Coroutine;
use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run(Coroutine::default())
}
