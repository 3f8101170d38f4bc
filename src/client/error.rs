use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    Server,
    Malformed,
}

impl ApiErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Malformed => "malformed",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("malformed response: {message}")]
    Malformed { status: Option<u16>, message: String },
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Malformed {
            status,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network { message } => message,
            Self::Server { message, .. } => message,
            Self::Malformed { message, .. } => message,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Network { .. } => None,
            Self::Server { status, .. } => Some(*status),
            Self::Malformed { status, .. } => *status,
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network { .. } => ApiErrorKind::Network,
            Self::Server { .. } => ApiErrorKind::Server,
            Self::Malformed { .. } => ApiErrorKind::Malformed,
        }
    }
}
