use std::process::ExitCode;

fn main() -> ExitCode {
    jukebot_cli::run()
}
