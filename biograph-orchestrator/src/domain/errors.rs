//! Request validation errors

/// Synchronous client-input errors raised during request normalization.
/// A job is never created when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("{0} must be specified and cannot be empty")]
    Missing(&'static str),

    #[error("Invalid value for {parameter}: {value:?} (allowed: {allowed})")]
    Invalid {
        parameter: &'static str,
        value: String,
        allowed: String,
    },
}

impl ParameterError {
    pub fn invalid(parameter: &'static str, value: impl Into<String>, allowed: impl Into<String>) -> Self {
        Self::Invalid {
            parameter,
            value: value.into(),
            allowed: allowed.into(),
        }
    }
}
