//! Construction d'enveloppes SOAP

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use super::{MessageOptions, SoapVersion};
use crate::errors::{Result, SoapError};

/// Crée un élément qualifié (préfixe + URI de namespace)
pub(crate) fn qualified_element(prefix: Option<&str>, uri: Option<&str>, local: &str) -> Element {
    let mut element = Element::new(local);
    element.prefix = prefix.map(str::to_string);
    element.namespace = uri.map(str::to_string);
    element
}

/// Ajoute une déclaration `xmlns:prefix="uri"` sur l'élément
pub(crate) fn declare_namespace(element: &mut Element, prefix: &str, uri: &str) {
    element
        .namespaces
        .get_or_insert_with(Namespace::empty)
        .0
        .insert(prefix.to_string(), uri.to_string());
}

/// Construit une enveloppe vide : `<Envelope><Header/><Body/></Envelope>`
pub fn build_empty_envelope(options: &MessageOptions) -> Element {
    let prefix = options.envelope_prefix.as_str();
    let uri = options.version.envelope_namespace();

    let mut envelope = qualified_element(Some(prefix), Some(uri), "Envelope");
    declare_namespace(&mut envelope, prefix, uri);

    let header = qualified_element(Some(prefix), Some(uri), "Header");
    let body = qualified_element(Some(prefix), Some(uri), "Body");
    envelope.children.push(XMLNode::Element(header));
    envelope.children.push(XMLNode::Element(body));

    envelope
}

fn text_element(prefix: Option<&str>, uri: Option<&str>, local: &str, text: &str) -> Element {
    let mut element = qualified_element(prefix, uri, local);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

/// Construit un document SOAP Fault complet
///
/// # Arguments
///
/// * `version` - version SOAP de l'enveloppe
/// * `fault_code` - code du fault (ex: "SOAP-ENV:Client", "env:Sender")
/// * `fault_string` - message d'erreur
///
/// # Returns
///
/// XML SOAP Fault, avec déclaration XML
pub fn build_soap_fault(
    version: SoapVersion,
    fault_code: &str,
    fault_string: &str,
) -> Result<String> {
    let options = MessageOptions {
        version,
        ..MessageOptions::default()
    };
    let prefix = Some(options.envelope_prefix.as_str());
    let uri = Some(version.envelope_namespace());

    let mut fault = qualified_element(prefix, uri, "Fault");
    match version {
        SoapVersion::Soap11 => {
            fault
                .children
                .push(XMLNode::Element(text_element(None, None, "faultcode", fault_code)));
            fault.children.push(XMLNode::Element(text_element(
                None,
                None,
                "faultstring",
                fault_string,
            )));
        }
        SoapVersion::Soap12 => {
            let mut code = qualified_element(prefix, uri, "Code");
            code.children
                .push(XMLNode::Element(text_element(prefix, uri, "Value", fault_code)));
            let mut reason = qualified_element(prefix, uri, "Reason");
            let mut text = text_element(prefix, uri, "Text", fault_string);
            text.attributes
                .insert("xml:lang".to_string(), "en".to_string());
            reason.children.push(XMLNode::Element(text));
            fault.children.push(XMLNode::Element(code));
            fault.children.push(XMLNode::Element(reason));
        }
    }

    let mut envelope = build_empty_envelope(&options);
    if let Some(body) = envelope
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|e| e.name == "Body")
    {
        body.children.push(XMLNode::Element(fault));
    }

    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(true);
    envelope.write_with_config(&mut buf, config)?;

    String::from_utf8(buf).map_err(|e| SoapError::Serialization(e.to_string()))
}
