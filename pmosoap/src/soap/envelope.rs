//! Message SOAP : enveloppe XML et en-têtes MIME

use std::collections::BTreeMap;

use xmltree::{Element, XMLNode};

use super::builder::{build_empty_envelope, declare_namespace};
use super::{MessageOptions, SoapFault, SoapVersion, parser};
use crate::errors::Result;
use crate::mime::MimeHeaders;
use crate::namespaces::NamespaceTable;
use crate::serializer;
use crate::xpath::{self, PathExpr};

/// Section adressable d'une enveloppe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Body,
}

impl Section {
    pub fn local_name(&self) -> &'static str {
        match self {
            Section::Header => "Header",
            Section::Body => "Body",
        }
    }
}

/// Message SOAP complet
#[derive(Debug, Clone)]
pub struct SoapMessage {
    version: SoapVersion,
    envelope: Element,
    mime_headers: MimeHeaders,
    /// Octets reçus, pour les messages venant du réseau
    raw: Option<String>,
    xml_declaration: bool,
}

impl SoapMessage {
    /// Crée un message vide (Header et Body vides)
    pub fn new(options: &MessageOptions) -> Self {
        Self {
            version: options.version,
            envelope: build_empty_envelope(options),
            mime_headers: MimeHeaders::new(),
            raw: None,
            xml_declaration: options.xml_declaration,
        }
    }

    /// Analyse un message reçu ; `raw` est conservé tel quel
    pub fn from_wire(raw: String, mime_headers: MimeHeaders) -> Result<Self> {
        let (version, envelope) = parser::parse_envelope(raw.as_bytes())?;
        Ok(Self {
            version,
            envelope,
            mime_headers,
            raw: Some(raw),
            xml_declaration: false,
        })
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn envelope(&self) -> &Element {
        &self.envelope
    }

    pub fn mime_headers(&self) -> &MimeHeaders {
        &self.mime_headers
    }

    pub fn mime_headers_mut(&mut self) -> &mut MimeHeaders {
        &mut self.mime_headers
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    fn is_section(&self, element: &Element, section: Section) -> bool {
        element.name == section.local_name()
            && element.namespace.as_deref() == Some(self.version.envelope_namespace())
    }

    pub fn section(&self, section: Section) -> Option<&Element> {
        self.envelope
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|e| self.is_section(e, section))
    }

    pub fn section_mut(&mut self, section: Section) -> Option<&mut Element> {
        let version = self.version;
        self.envelope
            .children
            .iter_mut()
            .filter_map(XMLNode::as_mut_element)
            .find(|e| {
                e.name == section.local_name()
                    && e.namespace.as_deref() == Some(version.envelope_namespace())
            })
    }

    pub fn header(&self) -> Option<&Element> {
        self.section(Section::Header)
    }

    pub fn body(&self) -> Option<&Element> {
        self.section(Section::Body)
    }

    /// Déclare le namespace sur le Header et le Body
    pub fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        for section in [Section::Header, Section::Body] {
            if let Some(element) = self.section_mut(section) {
                declare_namespace(element, prefix, uri);
            }
        }
    }

    /// Namespaces déclarés directement sur une section
    pub fn declared_namespaces(&self, section: Section) -> BTreeMap<String, String> {
        self.section(section)
            .and_then(|e| e.namespaces.as_ref())
            .map(|ns| ns.0.clone())
            .unwrap_or_default()
    }

    /// Namespaces visibles depuis l'intérieur d'une section
    pub(crate) fn in_scope_namespaces(&self, section: Section) -> BTreeMap<String, String> {
        let mut scope = BTreeMap::new();
        if let Some(ns) = &self.envelope.namespaces {
            scope.extend(ns.0.clone());
        }
        scope.extend(self.declared_namespaces(section));
        scope
    }

    /// Valeur XPath `string()` de l'expression `path` évaluée sur une section
    pub fn read_path(&self, section: Section, path: &str, table: &NamespaceTable) -> Result<String> {
        let query = xpath::Query::compile(path, table)?;
        match self.section(section) {
            Some(element) => query.evaluate(element, &self.in_scope_namespaces(section)),
            None => Ok(String::new()),
        }
    }

    /// Crée au besoin puis remplit le nœud désigné par `path`
    pub fn write_path(
        &mut self,
        section: Section,
        path: &str,
        value: &str,
        table: &NamespaceTable,
    ) -> Result<()> {
        let expr = PathExpr::compile(path, table)?;
        let scope = self.in_scope_namespaces(section);
        let version = self.version;
        let prefix = self.envelope.prefix.clone();
        if self.section(section).is_none() {
            // Les réponses sans Header reçoivent un Header vide
            let element = super::builder::qualified_element(
                prefix.as_deref(),
                Some(version.envelope_namespace()),
                section.local_name(),
            );
            let position = match section {
                Section::Header => 0,
                Section::Body => self.envelope.children.len(),
            };
            self.envelope
                .children
                .insert(position, XMLNode::Element(element));
        }
        match self.section_mut(section) {
            Some(element) => xpath::write(element, &expr, value, &scope),
            None => Ok(()),
        }
    }

    /// Premier élément Fault du Body, s'il existe
    pub fn fault_element(&self) -> Option<&Element> {
        let uri = self.version.envelope_namespace();
        self.body()?
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|e| e.name == "Fault" && e.namespace.as_deref() == Some(uri))
    }

    pub fn has_fault(&self) -> bool {
        self.fault_element().is_some()
    }

    pub fn fault(&self) -> Option<SoapFault> {
        self.fault_element()
            .map(|element| SoapFault::from_element(self.version, element))
    }

    /// Enveloppe sur le fil : octets reçus, ou rendu de l'arbre
    pub fn to_wire(&self) -> Result<String> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => serializer::render_document(&self.envelope, self.xml_declaration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> NamespaceTable {
        let mut table = NamespaceTable::new();
        table.add("s", "urn:test");
        table
    }

    #[test]
    fn test_new_message_has_empty_sections() {
        let message = SoapMessage::new(&MessageOptions::default());
        assert!(message.header().unwrap().children.is_empty());
        assert!(message.body().unwrap().children.is_empty());
        assert!(!message.has_fault());
        assert!(message.mime_headers().is_empty());
    }

    #[test]
    fn test_declare_namespace_on_both_sections() {
        let mut message = SoapMessage::new(&MessageOptions::default());
        message.declare_namespace("s", "urn:test");

        for section in [Section::Header, Section::Body] {
            let declared = message.declared_namespaces(section);
            assert_eq!(declared.get("s").map(String::as_str), Some("urn:test"));
        }
    }

    #[test]
    fn test_write_then_read_body() {
        let table = table();
        let mut message = SoapMessage::new(&MessageOptions::default());
        message.declare_namespace("s", "urn:test");

        message
            .write_path(Section::Body, "/s:Foo/s:Bar", "bar", &table)
            .unwrap();

        assert_eq!(
            message.read_path(Section::Body, "/s:Foo/s:Bar", &table).unwrap(),
            "bar"
        );
        assert_eq!(message.read_path(Section::Body, "/s:Foo", &table).unwrap(), "bar");
        assert_eq!(message.read_path(Section::Header, "/s:Foo", &table).unwrap(), "");
    }

    #[test]
    fn test_write_creates_missing_header() {
        let raw = format!(
            r#"<e:Envelope xmlns:e="{}"><e:Body/></e:Envelope>"#,
            crate::soap::SOAP11_ENVELOPE_NS
        );
        let mut message = SoapMessage::from_wire(raw, MimeHeaders::new()).unwrap();
        assert!(message.header().is_none());

        message
            .write_path(Section::Header, "/s:Token", "abc", &table())
            .unwrap();
        assert_eq!(
            message.read_path(Section::Header, "s:Token", &table()).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_to_wire_keeps_received_bytes() {
        let raw = format!(
            "<env:Envelope xmlns:env=\"{}\">\n  <env:Body/>\n</env:Envelope>",
            crate::soap::SOAP11_ENVELOPE_NS
        );
        let message = SoapMessage::from_wire(raw.clone(), MimeHeaders::new()).unwrap();
        assert_eq!(message.to_wire().unwrap(), raw);
    }
}
