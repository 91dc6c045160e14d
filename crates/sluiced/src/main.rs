use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let handle = match sluiced::install() {
        Ok(handle) => handle,
        Err(error) => {
            eprintln!("sluiced: {error}");
            return ExitCode::FAILURE;
        }
    };
    let outcome = sluiced::run_daemon(std::env::args_os(), Arc::new(handle));
    ExitCode::from(outcome.exit_status())
}
