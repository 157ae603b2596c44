//! Blocking HTTP transport for SOAP messages.

use std::time::Duration;

use tracing::{debug, warn};
use ureq::Agent;

use crate::errors::{Result, SoapError};
use crate::mime::MimeHeaders;
use crate::soap::{SoapMessage, SoapVersion};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("pmosoap/", env!("CARGO_PKG_VERSION"));

/// Sends a request message to an endpoint and returns the response message.
pub trait SoapTransport {
    fn call(&self, request: &SoapMessage, url: &str) -> Result<SoapMessage>;
}

/// Transport settings, usually read from the `transport` configuration section
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    /// Overrides the version's default Content-Type when set
    pub content_type: Option<String>,
    /// SOAPAction sent by SOAP 1.1 requests that carry none
    pub soap_action: String,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            content_type: None,
            soap_action: "\"\"".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportOptions {
    pub fn from_config(config: &pmosoapconfig::Config) -> Self {
        let defaults = Self::default();
        Self {
            timeout: config
                .get_timeout_secs()
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            content_type: config
                .get_content_type()
                .ok()
                .filter(|c| !c.trim().is_empty()),
            soap_action: config.get_soap_action().unwrap_or(defaults.soap_action),
            user_agent: config
                .get_user_agent()
                .ok()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.user_agent),
        }
    }

    /// Headers added on the wire when the request does not carry them
    pub fn default_headers(&self, request: &SoapMessage) -> Vec<(String, String)> {
        let version = request.version();
        let headers = request.mime_headers();
        let mut defaults = Vec::new();

        if !headers.contains("Content-Type") {
            let content_type = self
                .content_type
                .clone()
                .unwrap_or_else(|| version.content_type().to_string());
            defaults.push(("Content-Type".to_string(), content_type));
        }
        if version == SoapVersion::Soap11 && !headers.contains("SOAPAction") {
            defaults.push(("SOAPAction".to_string(), self.soap_action.clone()));
        }
        if !headers.contains("User-Agent") {
            defaults.push(("User-Agent".to_string(), self.user_agent.clone()));
        }
        defaults
    }
}

/// `ureq` based transport
///
/// HTTP error statuses are not treated as errors: a SOAP 500 response
/// carrying a Fault is a regular response.
pub struct HttpTransport {
    agent: Agent,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(options.timeout))
            .build();
        let agent: Agent = config.into();

        Self { agent, options }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(TransportOptions::default())
    }
}

impl SoapTransport for HttpTransport {
    fn call(&self, request: &SoapMessage, url: &str) -> Result<SoapMessage> {
        let body = request.to_wire()?;

        let mut builder = self.agent.post(url);
        for header in request.mime_headers().iter() {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        for (name, value) in self.options.default_headers(request) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(url, bytes = body.len(), "Sending SOAP request");
        let mut response = builder
            .send(body)
            .map_err(|e| SoapError::transport(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        let mut headers = MimeHeaders::new();
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => headers.add(name.as_str(), value),
                Err(_) => warn!(header = %name, "Skipping non-ASCII response header"),
            }
        }

        let raw = response
            .body_mut()
            .read_to_string()
            .map_err(|e| SoapError::transport(format!("Failed to read response from {}: {}", url, e)))?;
        debug!(url, status = status.as_u16(), bytes = raw.len(), "Received SOAP response");

        match SoapMessage::from_wire(raw, headers) {
            Ok(message) => Ok(message),
            Err(e) if !status.is_success() => Err(SoapError::transport(format!(
                "{} answered HTTP {} without a SOAP envelope ({})",
                url, status, e
            ))),
            Err(e) => Err(e),
        }
    }
}
