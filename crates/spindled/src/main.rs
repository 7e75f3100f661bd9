use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    match spindled::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(spindled::write_error_chain(&mut io::stderr().lock(), &error));
            ExitCode::FAILURE
        }
    }
}
