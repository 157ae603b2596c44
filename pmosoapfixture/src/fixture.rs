//! The SOAP fixture driven by test scripts.

use pmosoap::serializer;
use pmosoap::{
    HttpTransport, MessageOptions, MessagePart, NamespaceTable, Result, Section, SoapError,
    SoapMessage, SoapTransport, TransportOptions,
};
use pmosoapconfig::Config;
use tracing::{debug, info, warn};

/// Message targeted by a serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    Request,
    Response,
}

/// Builds a request, sends it, and exposes the response to assertions.
///
/// One fixture is used by one script at a time. The pending request is
/// regenerated after every send: its MIME headers are carried over and the
/// registered namespaces are declared again on its Header and Body.
pub struct SoapFixture {
    message_options: MessageOptions,
    namespaces: NamespaceTable,
    request: SoapMessage,
    response: Option<SoapMessage>,
    transport: Box<dyn SoapTransport>,
}

impl SoapFixture {
    /// Fixture configured from the global configuration
    pub fn new() -> Self {
        Self::from_config(&pmosoapconfig::get_config())
    }

    /// HTTP fixture configured from `config`, with its preset namespaces registered
    pub fn from_config(config: &Config) -> Self {
        let transport = HttpTransport::new(TransportOptions::from_config(config));
        let mut fixture = Self::with_transport(MessageOptions::from_config(config), Box::new(transport));

        match config.get_namespaces() {
            Ok(namespaces) => {
                for (prefix, uri) in namespaces {
                    fixture.add_prefix_namespace(&prefix, &uri);
                }
            }
            Err(err) => warn!(error = %err, "Cannot read preset namespaces"),
        }
        fixture
    }

    pub fn with_transport(message_options: MessageOptions, transport: Box<dyn SoapTransport>) -> Self {
        let request = SoapMessage::new(&message_options);
        Self {
            message_options,
            namespaces: NamespaceTable::new(),
            request,
            response: None,
            transport,
        }
    }

    fn prepare_for_new_request(&mut self) {
        let mut request = SoapMessage::new(&self.message_options);
        for (prefix, uri) in self.namespaces.iter() {
            request.declare_namespace(prefix, uri);
        }
        *request.mime_headers_mut() = self.request.mime_headers().clone();
        self.request = request;
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn request_message(&self) -> &SoapMessage {
        &self.request
    }

    pub fn response_message(&self) -> Option<&SoapMessage> {
        self.response.as_ref()
    }

    fn response_or_err(&self) -> Result<&SoapMessage> {
        self.response.as_ref().ok_or(SoapError::NoSuchResponse)
    }

    // ---- path addressing ----

    /// Reads a path in the response Header or Body
    pub fn read_path(&self, path: &str, section: Section) -> Result<String> {
        let value = self
            .response_or_err()?
            .read_path(section, path, &self.namespaces)?;
        debug!(path, ?section, %value, "Read path");
        Ok(value)
    }

    /// Writes a path in the pending request Header or Body
    pub fn write_path(&mut self, path: &str, value: &str, section: Section) -> Result<()> {
        self.request
            .write_path(section, path, value, &self.namespaces)?;
        debug!(path, ?section, value, "Wrote path");
        Ok(())
    }

    pub fn get_xpath(&self, path: &str) -> Result<String> {
        self.read_path(path, Section::Body)
    }

    pub fn get_xpath_in_header(&self, path: &str) -> Result<String> {
        self.read_path(path, Section::Header)
    }

    pub fn set_xpath_value(&mut self, path: &str, value: &str) -> Result<()> {
        self.write_path(path, value, Section::Body)
    }

    pub fn set_xpath_in_header_value(&mut self, path: &str, value: &str) -> Result<()> {
        self.write_path(path, value, Section::Header)
    }

    // ---- serialization ----

    pub fn serialize(&self, which: Which, part: MessagePart) -> Result<String> {
        let message = match which {
            Which::Request => &self.request,
            Which::Response => self.response_or_err()?,
        };
        serializer::render(message, part)
    }

    pub fn request(&self) -> Result<String> {
        self.serialize(Which::Request, MessagePart::Body)
    }

    pub fn response(&self) -> Result<String> {
        self.serialize(Which::Response, MessagePart::Body)
    }

    pub fn request_header(&self) -> Result<String> {
        self.serialize(Which::Request, MessagePart::Header)
    }

    pub fn response_header(&self) -> Result<String> {
        self.serialize(Which::Response, MessagePart::Header)
    }

    pub fn full_request(&self) -> Result<String> {
        self.serialize(Which::Request, MessagePart::Full)
    }

    pub fn full_response(&self) -> Result<String> {
        self.serialize(Which::Response, MessagePart::Full)
    }

    // ---- faults ----

    /// True when there is no response, when it has no Body, or when its Body holds a Fault
    pub fn soap_fault(&self) -> bool {
        match &self.response {
            Some(response) if response.body().is_some() => response.has_fault(),
            _ => true,
        }
    }

    pub fn fault_code(&self) -> Result<String> {
        Ok(self
            .response_or_err()?
            .fault()
            .map(|fault| fault.fault_code)
            .unwrap_or_default())
    }

    pub fn fault_string(&self) -> Result<String> {
        Ok(self
            .response_or_err()?
            .fault()
            .map(|fault| fault.fault_string)
            .unwrap_or_default())
    }

    /// Texte du détail de la faute, `""` s'il n'y en a pas
    pub fn fault_detail(&self) -> Result<String> {
        Ok(self
            .response_or_err()?
            .fault()
            .and_then(|fault| fault.detail)
            .unwrap_or_default())
    }

    // ---- MIME headers ----

    pub fn set_header_value(&mut self, name: &str, value: &str) {
        self.request.mime_headers_mut().set(name, value);
    }

    pub fn add_header_value(&mut self, name: &str, value: &str) {
        self.request.mime_headers_mut().add(name, value);
    }

    pub fn reset_headers(&mut self) {
        self.request.mime_headers_mut().remove_all();
    }

    /// Pending request headers as `[name] = [value]` lines
    pub fn headers(&self) -> String {
        self.request.mime_headers().listing()
    }

    /// Values of a response header, joined with ", "
    pub fn response_header_value(&self, name: &str) -> Result<String> {
        Ok(self.response_or_err()?.mime_headers().get(name).join(", "))
    }

    // ---- dispatch ----

    /// Sends the pending request to `url`
    ///
    /// The previous response is dropped before the call; a fresh request is
    /// prepared whatever the outcome.
    pub fn send_to(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        self.response = None;
        let result = self.transport.call(&self.request, url);
        self.prepare_for_new_request();

        match result {
            Ok(response) => {
                info!(url, fault = response.has_fault(), "SOAP call completed");
                self.response = Some(response);
                Ok(())
            }
            Err(err) => {
                warn!(url, error = %err, "SOAP call failed");
                Err(err)
            }
        }
    }

    // ---- namespaces ----

    /// Registers a prefix and declares it on the pending request
    pub fn add_prefix_namespace(&mut self, prefix: &str, namespace: &str) {
        let (prefix, namespace) = (prefix.trim(), namespace.trim());
        self.request.declare_namespace(prefix, namespace);
        self.namespaces.add(prefix, namespace);
    }

    /// Forgets every prefix; declarations already written stay in place
    pub fn reset_namespaces(&mut self) {
        self.namespaces.clear();
    }
}

impl Default for SoapFixture {
    fn default() -> Self {
        Self::new()
    }
}
