use thiserror::Error;
use tracing::error;
use tracing_error::SpanTrace;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("config error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
    #[error("database error: {0}")]
    DatabaseError(#[from] crate::model::DatabaseError),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Process exit status, following the BSD `sysexits` codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IoError(_) => 74,
            Self::ConfigError(_) => 78,
            Self::DatabaseError(_) => 69,
        }
    }
}

/// Awaits `run`, and on failure logs the error with its span trace before
/// exiting the process.
pub async fn run_with_error_handler<F, T>(run: F) -> T
where
    F: AsyncFn() -> AppResult<T>,
    T: Send + Sync,
{
    match run().await {
        Ok(value) => value,
        Err(e) => {
            log_error(&e);
            std::process::exit(e.exit_code());
        }
    }
}

pub fn log_error<E: std::error::Error + std::fmt::Display>(error: &E) {
    let span = SpanTrace::capture();
    error!("{}\n{}", error, span);
}
