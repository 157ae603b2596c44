//! # Module SOAP - enveloppes, en-têtes et faults
//!
//! Ce module construit les messages SOAP envoyés par la fixture et analyse
//! les réponses reçues.
//!
//! ## Architecture
//!
//! - [`SoapMessage`] : enveloppe + en-têtes MIME
//! - [`SoapVersion`] : SOAP 1.1 ou 1.2
//! - [`SoapFault`] : erreur SOAP extraite d'une réponse
//!
//! ## Example
//!
//! ```ignore
//! use pmosoap::soap::{MessageOptions, SoapMessage};
//!
//! let mut message = SoapMessage::new(&MessageOptions::default());
//! message.declare_namespace("m", "urn:example:stock");
//! let xml = message.to_wire().unwrap();
//! assert!(xml.contains("xmlns:m=\"urn:example:stock\""));
//! ```

pub(crate) mod builder;
mod envelope;
mod fault;
mod parser;

pub use builder::{build_empty_envelope, build_soap_fault};
pub use envelope::{Section, SoapMessage};
pub use fault::SoapFault;
pub use parser::parse_envelope;

/// URI de l'enveloppe SOAP 1.1
pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// URI de l'enveloppe SOAP 1.2
pub const SOAP12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Préfixe utilisé par défaut pour l'enveloppe
pub const DEFAULT_ENVELOPE_PREFIX: &str = "SOAP-ENV";

/// Version du protocole SOAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoapVersion {
    #[default]
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_ENVELOPE_NS,
            SoapVersion::Soap12 => SOAP12_ENVELOPE_NS,
        }
    }

    /// Content-Type par défaut sur le fil
    pub fn content_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml; charset=utf-8",
            SoapVersion::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }

    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            SOAP11_ENVELOPE_NS => Some(SoapVersion::Soap11),
            SOAP12_ENVELOPE_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    /// Accepte "1.1", "1.2", "soap11", "soap12"
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1.1" | "soap11" | "soap1.1" => Some(SoapVersion::Soap11),
            "1.2" | "soap12" | "soap1.2" => Some(SoapVersion::Soap12),
            _ => None,
        }
    }
}

/// Options de construction des messages de requête
#[derive(Debug, Clone)]
pub struct MessageOptions {
    pub version: SoapVersion,
    pub envelope_prefix: String,
    pub xml_declaration: bool,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            version: SoapVersion::Soap11,
            envelope_prefix: DEFAULT_ENVELOPE_PREFIX.to_string(),
            xml_declaration: false,
        }
    }
}

impl MessageOptions {
    /// Lit la section `message` de la configuration
    pub fn from_config(config: &pmosoapconfig::Config) -> Self {
        let defaults = Self::default();
        let version = config
            .get_soap_version()
            .ok()
            .and_then(|v| SoapVersion::parse(&v))
            .unwrap_or(defaults.version);
        let envelope_prefix = config
            .get_envelope_prefix()
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.envelope_prefix);
        let xml_declaration = config
            .get_xml_declaration()
            .unwrap_or(defaults.xml_declaration);

        Self {
            version,
            envelope_prefix,
            xml_declaration,
        }
    }
}
