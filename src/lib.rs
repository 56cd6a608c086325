pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_fixture;

pub use commands::Cli;
pub use error::AppError;

/// Reads `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Process exit status for a failed run: 2 for caller misuse, 1 otherwise.
pub fn exit_code(err: &AppError) -> i32 {
    if err.is_hard() {
        2
    } else {
        1
    }
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    log::debug!("leafscan starting: {:?}", cli.command);
    commands::dispatch(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_errors_get_their_own_exit_code() {
        assert_eq!(exit_code(&AppError::NotReady), 2);
        assert_eq!(exit_code(&AppError::UnknownImage("file:///a.jpg".into())), 2);
        assert_eq!(exit_code(&AppError::NoImages), 1);
        assert_eq!(exit_code(&AppError::Capture("no frames".into())), 1);
    }
}
