use thiserror::Error;

/// Failures reported by SOAP message operations.
///
/// Every failure is scoped to the single operation that raised it: the
/// message state stays usable afterwards.
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("Malformed path expression '{path}': {reason}")]
    MalformedPath { path: String, reason: String },
    #[error("Namespace prefix '{0}' is not bound")]
    NamespaceUnbound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("No response message available")]
    NoSuchResponse,
    #[error("Invalid SOAP envelope: {0}")]
    InvalidEnvelope(String),
}

impl SoapError {
    pub fn malformed_path(path: &str, reason: &str) -> Self {
        SoapError::MalformedPath {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn namespace_unbound(prefix: &str) -> Self {
        SoapError::NamespaceUnbound(prefix.to_string())
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        SoapError::Transport(message.to_string())
    }
}

impl From<xmltree::Error> for SoapError {
    fn from(err: xmltree::Error) -> Self {
        SoapError::Serialization(err.to_string())
    }
}

impl From<quick_xml::Error> for SoapError {
    fn from(err: quick_xml::Error) -> Self {
        SoapError::InvalidEnvelope(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SoapError>;
