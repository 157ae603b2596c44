//! Text rendering of messages and message sections.

use std::collections::BTreeMap;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::errors::{Result, SoapError};
use crate::soap::{Section, SoapMessage, builder::declare_namespace};

/// Which part of a message to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePart {
    Header,
    Body,
    Full,
}

fn emit(element: &Element, xml_declaration: bool) -> Result<String> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(xml_declaration)
        .perform_indent(false);
    element.write_with_config(&mut buf, config)?;
    String::from_utf8(buf).map_err(|e| SoapError::Serialization(e.to_string()))
}

/// Renders a whole element tree as a document
pub fn render_document(element: &Element, xml_declaration: bool) -> Result<String> {
    emit(element, xml_declaration)
}

/// `p:local` values whose prefix is bound, such as `xsi:type="xsd:string"`
fn qname_prefix<'a>(value: &'a str, bindings: &BTreeMap<String, String>) -> Option<&'a str> {
    let (prefix, local) = value.trim().split_once(':')?;
    let mut chars = local.chars();
    let ncname = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    (ncname && bindings.contains_key(prefix)).then_some(prefix)
}

/// Rewrites namespace declarations of a detached subtree.
///
/// Each element keeps the declarations written on it, and declares the
/// bindings it uses (its prefix, attribute prefixes, prefixed values) that
/// came from outside the fragment.
fn prune_namespaces(
    element: &mut Element,
    emitted: &BTreeMap<String, String>,
    scope: &BTreeMap<String, String>,
) {
    let own = element.namespaces.take();
    let mut bindings = scope.clone();
    let mut wanted = BTreeMap::new();
    if let Some(ns) = &own {
        for (prefix, uri) in ns.0.iter() {
            bindings.insert(prefix.clone(), uri.clone());
            if prefix != "xml" && prefix != "xmlns" && !uri.is_empty() {
                wanted.insert(prefix.clone(), uri.clone());
            }
        }
    }

    if let Some(uri) = element.namespace.as_deref().filter(|u| !u.is_empty()) {
        let prefix = element.prefix.clone().unwrap_or_default();
        wanted.insert(prefix, uri.to_string());
    }

    let mut used: Vec<&str> = Vec::new();
    for (key, value) in &element.attributes {
        if let Some((prefix, _)) = key.split_once(':') {
            used.push(prefix);
        }
        used.extend(qname_prefix(value, &bindings));
    }
    for child in &element.children {
        if let XMLNode::Text(text) = child {
            used.extend(qname_prefix(text, &bindings));
        }
    }
    for prefix in used {
        if prefix == "xml" || prefix == "xmlns" {
            continue;
        }
        if let Some(uri) = bindings.get(prefix) {
            wanted.entry(prefix.to_string()).or_insert_with(|| uri.clone());
        }
    }

    let mut now_emitted = emitted.clone();
    for (prefix, uri) in wanted {
        if emitted.get(&prefix) != Some(&uri) {
            declare_namespace(element, &prefix, &uri);
            now_emitted.insert(prefix, uri);
        }
    }

    for child in element
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
    {
        prune_namespaces(child, &now_emitted, &bindings);
    }
}

/// Renders a detached element with the namespace declarations it needs
pub fn render_fragment(element: &Element, scope: &BTreeMap<String, String>) -> Result<String> {
    let mut detached = element.clone();
    prune_namespaces(&mut detached, &BTreeMap::new(), scope);
    emit(&detached, false)
}

/// Child elements of a section, concatenated, without XML declaration
pub fn render_section(message: &SoapMessage, section: Section) -> Result<String> {
    let Some(element) = message.section(section) else {
        return Ok(String::new());
    };
    let scope = message.in_scope_namespaces(section);

    let mut out = String::new();
    for child in element.children.iter().filter_map(XMLNode::as_element) {
        out.push_str(&render_fragment(child, &scope)?);
    }
    Ok(out)
}

/// Transport headers (`Name: value` lines and a blank line) followed by the envelope
pub fn render_full(message: &SoapMessage) -> Result<String> {
    let mut out = String::new();
    if !message.mime_headers().is_empty() {
        for header in message.mime_headers().iter() {
            out.push_str(&header.name);
            out.push_str(": ");
            out.push_str(&header.value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
    }
    out.push_str(&message.to_wire()?);
    Ok(out)
}

pub fn render(message: &SoapMessage, part: MessagePart) -> Result<String> {
    match part {
        MessagePart::Header => render_section(message, Section::Header),
        MessagePart::Body => render_section(message, Section::Body),
        MessagePart::Full => render_full(message),
    }
}
