//! Application-level error type.
//!
//! Every failure that reaches `main` carries a process exit code:
//!
//! - `2`: usage, configuration or I/O problems
//! - `3`: not enough data to fit anything
//! - `4`: numerical or data failures

use crate::fit::FitError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::Config(_) => 2,
            FitError::InvalidInput(_) => 3,
            FitError::NonConvergence { .. } | FitError::IterationLimit { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_exit_codes() {
        let err: AppError = FitError::Config("block length".into()).into();
        assert_eq!(err.exit_code(), 2);

        let err: AppError = FitError::IterationLimit {
            iterations: 50,
            criterion: 0.1,
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("50"));
    }
}
