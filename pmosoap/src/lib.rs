//! # pmosoap - SOAP messages for table-driven tests
//!
//! Building blocks used by the SOAP fixture:
//!
//! - [`soap`] : request construction, response parsing, faults
//! - [`xpath`] : namespace-aware path addressing inside a section
//! - [`serializer`] : text rendering of sections and whole messages
//! - [`transport`] : blocking HTTP dispatch with `ureq`
//!
//! ## Example
//!
//! ```ignore
//! use pmosoap::{MessageOptions, NamespaceTable, Section, SoapMessage};
//!
//! let mut table = NamespaceTable::new();
//! table.add("m", "urn:example:stock");
//!
//! let mut request = SoapMessage::new(&MessageOptions::default());
//! request.declare_namespace("m", "urn:example:stock");
//! request.write_path(Section::Body, "/m:GetPrice/m:Symbol", "ACME", &table)?;
//! ```

pub mod errors;
pub mod mime;
pub mod namespaces;
pub mod serializer;
pub mod soap;
pub mod transport;
pub mod xpath;

pub use errors::{Result, SoapError};
pub use mime::{MimeHeader, MimeHeaders};
pub use namespaces::NamespaceTable;
pub use serializer::MessagePart;
pub use soap::{MessageOptions, Section, SoapFault, SoapMessage, SoapVersion};
pub use transport::{HttpTransport, SoapTransport, TransportOptions};
