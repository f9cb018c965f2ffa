//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("preset error: {0}")]
    Preset(String),

    #[error("grammar error: {0}")]
    Grammar(String),

    #[error("markdown error: {0}")]
    Markdown(String),

    #[error("voice error: {0}")]
    Voice(#[from] crate::voice::VoiceError),

    #[error("provider error: {0}")]
    Provider(#[from] crate::llm::ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn preset_error_display() {
        let e = AppError::Preset("no such preset".into());
        assert!(e.to_string().contains("no such preset"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
