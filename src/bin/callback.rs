use fetch_styles::cli;
use fetch_styles::fetch::Callback;
use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run(Callback::default())
}
