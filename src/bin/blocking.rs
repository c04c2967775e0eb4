use fetch_styles::cli;
use fetch_styles::fetch::Blocking;
use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run(Blocking::default())
}
