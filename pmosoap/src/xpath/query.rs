//! XPath 1.0 reads, delegated to `sxd-xpath`.
//!
//! The section is rendered alone (with the declarations it needs) and parsed
//! into an `sxd-document`; the section element is the context node and the
//! document root. Absolute location paths are anchored at the section.

use std::collections::BTreeMap;

use sxd_document::dom::ChildOfRoot;
use sxd_xpath::{Context, Factory, XPath};
use tracing::trace;
use xmltree::Element;

use crate::errors::{Result, SoapError};
use crate::namespaces::NamespaceTable;
use crate::serializer::render_fragment;

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Byte ranges of string literals
fn literal_spans(expr: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<(char, usize)> = None;
    for (offset, c) in expr.char_indices() {
        match open {
            Some((quote, start)) if c == quote => {
                spans.push((start, offset));
                open = None;
            }
            Some(_) => {}
            None if c == '\'' || c == '"' => open = Some((c, offset)),
            None => {}
        }
    }
    if let Some((_, start)) = open {
        spans.push((start, expr.len()));
    }
    spans
}

fn in_literal(spans: &[(usize, usize)], offset: usize) -> bool {
    spans.iter().any(|(start, end)| offset >= *start && offset <= *end)
}

/// Prefixes used by name tests, outside string literals
fn prefixes(expr: &str) -> Vec<&str> {
    let spans = literal_spans(expr);
    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut found = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let (start, c) = chars[index];
        let previous = index.checked_sub(1).map(|i| chars[i].1);
        let name_start = (c.is_alphabetic() || c == '_')
            && !previous.is_some_and(is_name_char)
            && !in_literal(&spans, start);
        if !name_start {
            index += 1;
            continue;
        }

        let mut end = index;
        while end < chars.len() && is_name_char(chars[end].1) {
            end += 1;
        }
        // local part of `p:local` (a single ':' before it)
        let local_part = previous == Some(':') && index >= 2 && chars[index - 2].1 != ':';
        let colon = chars.get(end).map(|(_, c)| *c) == Some(':');
        let axis = chars.get(end + 1).map(|(_, c)| *c) == Some(':');
        if colon && !axis && !local_part {
            let stop = chars.get(end).map_or(expr.len(), |(offset, _)| *offset);
            found.push(&expr[start..stop]);
        }
        index = end;
    }
    found
}

/// Rewrites absolute location paths relative to the context node
///
/// `/` alone becomes `.`, `/a` becomes `./a`; `//a` is left as is since the
/// document holds the section only.
fn anchor(expr: &str) -> String {
    let spans = literal_spans(expr);
    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut out = String::with_capacity(expr.len() + 4);

    for (index, (offset, c)) in chars.iter().copied().enumerate() {
        if c != '/' || in_literal(&spans, offset) {
            out.push(c);
            continue;
        }
        let before = chars[..index].iter().rev().map(|(_, c)| *c).find(|c| !c.is_whitespace());
        let after = chars[index + 1..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace());
        let prev_raw = index.checked_sub(1).map(|i| chars[i].1);

        if prev_raw == Some('/') || after == Some('/') || !starts_path(&chars[..index], before) {
            out.push(c);
            continue;
        }
        match after {
            Some(next) if is_name_char(next) || matches!(next, '@' | '*') => out.push_str("./"),
            _ => out.push('.'),
        }
    }
    out
}

/// Whether a `/` preceded by `before` opens a location path
fn starts_path(head: &[(usize, char)], before: Option<char>) -> bool {
    match before {
        None => true,
        Some('(' | '[' | ',' | '|' | '=' | '<' | '>' | '+' | '-' | '!') => true,
        Some('*') => {
            // `a * /b` multiplies, `*/b` is a wildcard step
            let operand = head
                .iter()
                .rev()
                .map(|(_, c)| *c)
                .filter(|c| !c.is_whitespace())
                .nth(1);
            operand.is_some_and(|c| is_name_char(c) || matches!(c, ')' | ']' | '\'' | '"'))
        }
        Some(c) if is_name_char(c) => {
            let text: String = head.iter().map(|(_, c)| *c).collect();
            let trimmed = text.trim_end();
            ["and", "or", "div", "mod"].iter().any(|word| {
                trimmed
                    .strip_suffix(word)
                    .is_some_and(|rest| rest.ends_with(char::is_whitespace))
            })
        }
        Some(_) => false,
    }
}

/// A compiled XPath 1.0 read expression
pub struct Query {
    source: String,
    xpath: XPath,
    namespaces: Vec<(String, String)>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").field("source", &self.source).finish()
    }
}

impl Query {
    /// Checks every prefix against `table`, then compiles the anchored expression.
    pub fn compile(source: &str, table: &NamespaceTable) -> Result<Self> {
        let text = source.trim();
        if text.is_empty() {
            return Err(SoapError::malformed_path(source, "empty path"));
        }
        for prefix in prefixes(text) {
            table.resolve(prefix)?;
        }

        let anchored = anchor(text);
        let xpath = Factory::new()
            .build(&anchored)
            .map_err(|e| SoapError::malformed_path(source, &format!("{:?}", e)))?
            .ok_or_else(|| SoapError::malformed_path(source, "empty path"))?;
        trace!(path = source, anchored = %anchored, "Compiled query");

        Ok(Self {
            source: source.to_string(),
            xpath,
            namespaces: table
                .iter()
                .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
                .collect(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// String value (XPath `string()`) of the expression evaluated on `section`
    ///
    /// `scope` holds the namespace bindings visible at `section`.
    pub fn evaluate(&self, section: &Element, scope: &BTreeMap<String, String>) -> Result<String> {
        let xml = render_fragment(section, scope)?;
        let package = sxd_document::parser::parse(&xml)
            .map_err(|e| SoapError::Serialization(format!("{:?}", e)))?;
        let document = package.as_document();
        let root = document
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(element),
                _ => None,
            })
            .ok_or_else(|| SoapError::Serialization("section has no element".to_string()))?;

        let mut context = Context::new();
        for (prefix, uri) in &self.namespaces {
            context.set_namespace(prefix, uri);
        }
        let value = self
            .xpath
            .evaluate(&context, root)
            .map_err(|e| SoapError::malformed_path(&self.source, &format!("{:?}", e)))?;
        Ok(value.string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::parse_envelope;

    fn table() -> NamespaceTable {
        let mut table = NamespaceTable::new();
        table.add("m", "urn:m");
        table.add("o", "urn:o");
        table.add("xsi", "http://www.w3.org/2001/XMLSchema-instance");
        table.add("z", "urn:zzz");
        table
    }

    fn body() -> (Element, BTreeMap<String, String>) {
        let xml = r#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema"><e:Body><m:R xmlns:m="urn:m" xmlns:p="urn:o"><m:I>a</m:I><m:I>b</m:I><m:I p:id="3" xsi:type="xsd:string">c</m:I><m:S>  x   y </m:S><m:W> </m:W></m:R></e:Body></e:Envelope>"#;
        let (_, envelope) = parse_envelope(xml.as_bytes()).unwrap();
        let scope = envelope.namespaces.as_ref().unwrap().0.clone();
        (envelope.get_child("Body").unwrap().clone(), scope)
    }

    fn read(path: &str) -> Result<String> {
        let (body, scope) = body();
        Query::compile(path, &table())?.evaluate(&body, &scope)
    }

    #[test]
    fn test_anchor_rewrites_absolute_paths() {
        assert_eq!(anchor("/"), ".");
        assert_eq!(anchor("/m:R/m:I"), "./m:R/m:I");
        assert_eq!(anchor("//m:I"), "//m:I");
        assert_eq!(anchor("count(/m:R/m:I)"), "count(./m:R/m:I)");
        assert_eq!(anchor("m:R/m:I[.='/x']"), "m:R/m:I[.='/x']");
        assert_eq!(anchor("2 * /m:R"), "2 * ./m:R");
        assert_eq!(anchor("m:R/*/m:I"), "m:R/*/m:I");
        assert_eq!(anchor("m:A or /m:B"), "m:A or ./m:B");
    }

    #[test]
    fn test_prefixes_skip_axes_and_literals() {
        assert_eq!(prefixes("child::m:I[@o:id='q:x']/text()"), vec!["m", "o"]);
        assert!(prefixes("count(//*)").is_empty());
    }

    #[test]
    fn test_location_paths() {
        assert_eq!(read("/m:R/m:I").unwrap(), "a");
        assert_eq!(read("m:R/m:I[2]").unwrap(), "b");
        assert_eq!(read("//m:I[last()]").unwrap(), "c");
        assert_eq!(read("//m:I[.='b']").unwrap(), "b");
        assert_eq!(read("/m:R/m:I/..").unwrap(), "abc  x   y  ");
        assert_eq!(read("/m:Missing").unwrap(), "");
    }

    #[test]
    fn test_functions() {
        let count: f64 = read("count(//m:I)").unwrap().parse().unwrap();
        assert_eq!(count, 3.0);
        assert_eq!(read("normalize-space(m:R/m:S)").unwrap(), "x y");
        assert_eq!(read("concat(m:R/m:I[1], '-', m:R/m:I[2])").unwrap(), "a-b");
    }

    #[test]
    fn test_attributes_are_namespace_aware() {
        // the document binds urn:o to `p`, the table to `o`
        assert_eq!(read("//m:I/@o:id").unwrap(), "3");
        assert_eq!(read("//m:I/@xsi:type").unwrap(), "xsd:string");
        assert_eq!(read("//m:I/@z:type").unwrap(), "");
        assert_eq!(read("//m:I/@type").unwrap(), "");
        assert_eq!(read("//m:I/@id").unwrap(), "");
    }

    #[test]
    fn test_whitespace_text_is_kept() {
        assert_eq!(read("/m:R/m:W").unwrap(), " ");
    }

    #[test]
    fn test_unbound_prefix_and_malformed_expression() {
        match read("/q:R") {
            Err(SoapError::NamespaceUnbound(prefix)) => assert_eq!(prefix, "q"),
            other => panic!("unexpected result: {:?}", other),
        }
        for path in ["", "/m:R/", "m:R[", "count(", "m:R]]"] {
            assert!(
                matches!(read(path), Err(SoapError::MalformedPath { .. })),
                "expected MalformedPath for {:?}",
                path
            );
        }
    }
}
