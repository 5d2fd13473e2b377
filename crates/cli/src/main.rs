use std::process::ExitCode;

fn main() -> ExitCode {
    planbook_cli::run()
}
