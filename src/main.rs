use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let result = tokio::select! {
        result = homepage::cli::run() => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nReceived interrupt, exiting.");
            return ExitCode::from(homepage::errors::EXIT_ERROR);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(homepage::errors::get_exit_code(&e))
        }
    }
}
