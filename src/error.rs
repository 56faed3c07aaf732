pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Unauthorized (HTTP {code})")]
    Unauthorized { code: u16 },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    Url(String),

    #[error("This action requires a signed-in user")]
    MissingToken,

    #[error("No job source configured")]
    NoSources,

    #[error("All {attempts} job sources failed, last error: {last}")]
    SourcesExhausted { attempts: usize, last: Box<ApiError> },
}

impl ApiError {
    /// 401 and 403 both count: the backend uses either for a missing or expired token.
    pub fn is_auth(&self) -> bool {
        match self {
            ApiError::Unauthorized { .. } | ApiError::MissingToken => true,
            ApiError::SourcesExhausted { last, .. } => last.is_auth(),
            _ => false,
        }
    }

    pub fn is_server(&self) -> bool {
        match self {
            ApiError::Status { code, .. } => *code >= 500,
            ApiError::SourcesExhausted { last, .. } => last.is_server(),
            _ => false,
        }
    }
}

/// Read-only endpoints refuse anonymous or expired sessions with 401/403.
/// Callers show nothing in that case instead of an error.
pub fn empty_on_auth<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.is_auth() => {
            log::info!("Treating refused request as empty ({})", e);
            Ok(T::default())
        }
        other => other,
    }
}
