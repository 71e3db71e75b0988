use thiserror::Error;

/// Stored values that do not fit the courier vocabulary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown package status `{0}`")]
    InvalidPackageStatus(String),
    #[error("unknown trip status `{0}`")]
    InvalidTripStatus(String),
    #[error("unsupported currency `{0}`")]
    InvalidCurrency(String),
    #[error("unknown response type `{0}`")]
    InvalidResponseType(String),
    #[error("unknown tone marker `{0}`")]
    InvalidToneMarker(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid assistant request: {0}")]
    InvalidRequest(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("language model failure: {0}")]
    LanguageModel(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("assistant pipeline aborted: {0}")]
    PipelineAborted(String),
}

/// What the HTTP caller sees. The delivery channel relays `user_message`
/// to operators, never the inner message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "The message could not be processed. Check inputs and try again.",
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            Self::InvalidRequest(message) => InterfaceError::BadRequest { message, correlation_id },
            Self::Persistence(message) | Self::LanguageModel(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            Self::Configuration(message) | Self::PipelineAborted(message) => {
                InterfaceError::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_with_its_text() {
        let interface =
            ApplicationError::from(DomainError::InvalidCurrency("EUR".to_owned())).into_interface("req-1");

        assert_eq!(
            interface,
            InterfaceError::BadRequest {
                message: "unsupported currency `EUR`".to_owned(),
                correlation_id: "req-1".to_owned(),
            }
        );
        assert_eq!(
            interface.user_message(),
            "The message could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn store_and_model_failures_are_retryable() {
        for error in [
            ApplicationError::Persistence("database lock timeout".to_owned()),
            ApplicationError::LanguageModel("RATE_LIMIT_EXCEEDED".to_owned()),
        ] {
            let interface = error.into_interface("req-3");
            assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
            assert_eq!(interface.correlation_id(), "req-3");
        }
    }

    #[test]
    fn aborted_pipeline_maps_to_internal() {
        let interface =
            ApplicationError::PipelineAborted("task panicked".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
