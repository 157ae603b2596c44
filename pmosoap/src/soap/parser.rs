//! Parser d'enveloppes SOAP reçues
//!
//! L'arbre `xmltree` est construit à partir des événements `quick-xml` :
//!
//! - les clés d'attributs gardent leur préfixe (`xsi:type`) ;
//! - `namespaces` ne contient que les déclarations écrites sur l'élément ;
//! - les nœuds texte blancs sont conservés.

use std::collections::BTreeMap;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::{Error as XmlError, Reader};
use tracing::debug;
use xmltree::{Element, XMLNode};

use super::SoapVersion;
use super::builder::declare_namespace;
use crate::errors::{Result, SoapError};

type Bindings = BTreeMap<String, String>;

fn invalid(reason: impl std::fmt::Display) -> SoapError {
    SoapError::InvalidEnvelope(reason.to_string())
}

/// Ouvre un élément : déclarations, préfixe résolu, attributs préfixés
fn open_element(reader: &Reader<&[u8]>, start: &BytesStart, scopes: &mut Vec<Bindings>) -> Result<Element> {
    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qname.clone()),
    };

    let mut element = Element::new(&local);
    let mut scope = scopes.last().cloned().unwrap_or_default();

    for attr in start.attributes() {
        let attr = attr.map_err(XmlError::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();

        if key == "xmlns" {
            declare_namespace(&mut element, "", &value);
            scope.insert(String::new(), value);
        } else if let Some(declared) = key.strip_prefix("xmlns:") {
            declare_namespace(&mut element, declared, &value);
            scope.insert(declared.to_string(), value);
        } else {
            element.attributes.insert(key, value);
        }
    }

    element.namespace = match prefix.as_deref() {
        Some("xml") => Some("http://www.w3.org/XML/1998/namespace".to_string()),
        Some(prefix) => Some(
            scope
                .get(prefix)
                .cloned()
                .ok_or_else(|| invalid(format!("prefix '{}' of <{}> is not declared", prefix, qname)))?,
        ),
        None => scope.get("").filter(|uri| !uri.is_empty()).cloned(),
    };
    element.prefix = prefix;

    scopes.push(scope);
    Ok(element)
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    match parent.children.last_mut() {
        Some(XMLNode::Text(existing)) => existing.push_str(text),
        _ => parent.children.push(XMLNode::Text(text.to_string())),
    }
}

fn resolve_reference(reference: &BytesRef) -> Result<String> {
    if let Some(c) = reference.resolve_char_ref()? {
        return Ok(c.to_string());
    }
    let name = reference.decode().map_err(XmlError::Encoding)?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("unknown entity '&{};'", name)))
}

fn close_element(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XMLNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(invalid("more than one root element")),
    }
    Ok(())
}

/// Construit l'arbre d'un document XML
pub(crate) fn parse_document(xml: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut scopes: Vec<Bindings> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let element = open_element(&reader, &start, &mut scopes)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start, &mut scopes)?;
                scopes.pop();
                close_element(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| invalid("unexpected closing tag"))?;
                scopes.pop();
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text.decode().map_err(XmlError::Encoding)?;
                push_text(&mut stack, &text);
            }
            Event::GeneralRef(reference) => {
                let text = resolve_reference(&reference)?;
                push_text(&mut stack, &text);
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(XMLNode::CData(String::from_utf8_lossy(&data).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(invalid(format!("element <{}> is not closed", open.name)));
    }
    root.ok_or_else(|| invalid("no root element"))
}

/// Parse une enveloppe SOAP complète et détecte sa version
///
/// Le Header est optionnel ; un Body absent est accepté, la fixture
/// considère alors la réponse comme fautive.
pub fn parse_envelope(xml: &[u8]) -> Result<(SoapVersion, Element)> {
    let root = parse_document(xml)?;

    if root.name != "Envelope" {
        return Err(SoapError::InvalidEnvelope(format!(
            "root element is '{}', expected 'Envelope'",
            root.name
        )));
    }

    let version = root
        .namespace
        .as_deref()
        .and_then(SoapVersion::from_namespace)
        .ok_or_else(|| {
            SoapError::InvalidEnvelope(format!(
                "unknown envelope namespace '{}'",
                root.namespace.as_deref().unwrap_or_default()
            ))
        })?;

    debug!(?version, "Parsed SOAP envelope");
    Ok((version, root))
}
