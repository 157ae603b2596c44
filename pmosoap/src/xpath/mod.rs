//! Namespace-aware paths over SOAP sections.
//!
//! Reads go through [`Query`]: any XPath 1.0 expression, evaluated by
//! `sxd-xpath` with the section as context node. A single leading `/`
//! anchors at the section.
//!
//! Writes use [`PathExpr`], the creation subset:
//!
//! - `/a/b`, `a/b`: child steps; a leading `/` anchors at the section
//! - `//b`, `a//b`: descendant-or-self steps, to existing nodes only
//! - `p:name`, `name`, `*`, `p:*`, `.`
//! - final `@attr`, `@p:attr` or `text()` steps
//! - predicates `[n]` and `[@attr='value']`
//!
//! Unprefixed names only match elements without namespace.

mod create;
mod query;

pub use create::write;
pub use query::Query;

use crate::errors::{Result, SoapError};
use crate::namespaces::NamespaceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    DescendantOrSelf,
}

/// Qualified name with its prefix resolved to a namespace URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub uri: Option<String>,
    pub local: String,
}

impl QName {
    /// Attribute key as stored in `xmltree` attribute maps
    pub fn attribute_key(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Element(QName),
    /// `*` (uri `None`) or `p:*`
    Wildcard { prefix: Option<String>, uri: Option<String> },
    Attribute(QName),
    Text,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Position(usize),
    AttributeEquals { name: QName, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

/// A parsed path whose prefixes are all bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    steps: Vec<Step>,
}

impl PathExpr {
    /// Parses `source` and resolves every prefix against `table`.
    pub fn compile(source: &str, table: &NamespaceTable) -> Result<Self> {
        Parser::new(source, table).parse()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

struct Parser<'a> {
    source: &'a str,
    table: &'a NamespaceTable,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, table: &'a NamespaceTable) -> Self {
        Self { source, table }
    }

    fn malformed(&self, reason: &str) -> SoapError {
        SoapError::malformed_path(self.source, reason)
    }

    fn parse(&self) -> Result<PathExpr> {
        let text = self.source.trim();
        if text.is_empty() {
            return Err(self.malformed("empty path"));
        }

        let mut steps = Vec::new();
        let mut rest = text;
        let mut axis = Axis::Child;

        if let Some(stripped) = rest.strip_prefix("//") {
            axis = Axis::DescendantOrSelf;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
            if rest.is_empty() {
                // "/" selects the section itself
                return Ok(PathExpr {
                    source: self.source.to_string(),
                    steps,
                });
            }
        }

        loop {
            let end = self.step_end(rest)?;
            let (raw_step, tail) = rest.split_at(end);
            if raw_step.trim().is_empty() {
                return Err(self.malformed("empty step"));
            }
            steps.push(self.parse_step(raw_step.trim(), axis)?);

            if tail.is_empty() {
                break;
            }
            // tail starts with '/'
            rest = &tail[1..];
            axis = Axis::Child;
            if let Some(stripped) = rest.strip_prefix('/') {
                axis = Axis::DescendantOrSelf;
                rest = stripped;
            }
            if rest.is_empty() {
                return Err(self.malformed("trailing '/'"));
            }
        }

        for (index, step) in steps.iter().enumerate() {
            let terminal = matches!(step.test, NodeTest::Attribute(_) | NodeTest::Text);
            if terminal && index + 1 != steps.len() {
                return Err(self.malformed("attribute and text() steps must come last"));
            }
        }

        Ok(PathExpr {
            source: self.source.to_string(),
            steps,
        })
    }

    /// Byte offset of the next '/' outside predicates and quotes.
    fn step_end(&self, input: &str) -> Result<usize> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        for (offset, c) in input.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| self.malformed("unbalanced ']'"))?;
                }
                (None, '/') if depth == 0 => return Ok(offset),
                _ => {}
            }
        }
        if quote.is_some() {
            return Err(self.malformed("unterminated string literal"));
        }
        if depth != 0 {
            return Err(self.malformed("unterminated predicate"));
        }
        Ok(input.len())
    }

    fn parse_step(&self, raw: &str, axis: Axis) -> Result<Step> {
        let (head, predicates) = match raw.find('[') {
            Some(index) => (raw[..index].trim(), self.parse_predicates(&raw[index..])?),
            None => (raw, Vec::new()),
        };

        let test = match head {
            "" => return Err(self.malformed("missing node test")),
            "." => NodeTest::SelfNode,
            "text()" => NodeTest::Text,
            "*" => NodeTest::Wildcard {
                prefix: None,
                uri: None,
            },
            _ if head.starts_with('@') => NodeTest::Attribute(self.parse_qname(&head[1..])?),
            _ => match head.strip_suffix(":*") {
                Some(prefix) => {
                    self.check_ncname(prefix)?;
                    let uri = self.table.resolve(prefix)?;
                    NodeTest::Wildcard {
                        prefix: Some(prefix.to_string()),
                        uri: Some(uri.to_string()),
                    }
                }
                None => NodeTest::Element(self.parse_qname(head)?),
            },
        };

        if !predicates.is_empty()
            && !matches!(test, NodeTest::Element(_) | NodeTest::Wildcard { .. })
        {
            return Err(self.malformed("predicates are only allowed on element steps"));
        }
        if axis == Axis::DescendantOrSelf
            && !matches!(test, NodeTest::Element(_) | NodeTest::Wildcard { .. })
        {
            return Err(self.malformed("'//' must be followed by an element step"));
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicates(&self, mut input: &str) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::new();
        while !input.is_empty() {
            let inner_start = input
                .strip_prefix('[')
                .ok_or_else(|| self.malformed("unexpected text after predicate"))?;
            let close = self.predicate_close(inner_start)?;
            predicates.push(self.parse_predicate(inner_start[..close].trim())?);
            input = inner_start[close + 1..].trim_start();
        }
        Ok(predicates)
    }

    fn predicate_close(&self, input: &str) -> Result<usize> {
        let mut quote: Option<char> = None;
        for (offset, c) in input.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, ']') => return Ok(offset),
                _ => {}
            }
        }
        Err(self.malformed("unterminated predicate"))
    }

    fn parse_predicate(&self, inner: &str) -> Result<Predicate> {
        if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
            let position: usize = inner
                .parse()
                .map_err(|_| self.malformed("position out of range"))?;
            if position == 0 {
                return Err(self.malformed("positions start at 1"));
            }
            return Ok(Predicate::Position(position));
        }

        let attribute = inner
            .strip_prefix('@')
            .ok_or_else(|| self.malformed("unsupported predicate"))?;
        let (name, literal) = attribute
            .split_once('=')
            .ok_or_else(|| self.malformed("expected [@name='value']"))?;
        let literal = literal.trim();
        let value = ['\'', '"']
            .iter()
            .find_map(|q| {
                literal
                    .strip_prefix(*q)
                    .and_then(|l| l.strip_suffix(*q))
            })
            .filter(|_| literal.len() >= 2)
            .ok_or_else(|| self.malformed("predicate value must be quoted"))?;

        Ok(Predicate::AttributeEquals {
            name: self.parse_qname(name.trim())?,
            value: value.to_string(),
        })
    }

    fn parse_qname(&self, raw: &str) -> Result<QName> {
        let (prefix, local) = match raw.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, raw),
        };
        self.check_ncname(local)?;

        match prefix {
            Some(prefix) => {
                self.check_ncname(prefix)?;
                let uri = self.table.resolve(prefix)?;
                Ok(QName {
                    prefix: Some(prefix.to_string()),
                    uri: Some(uri.to_string()),
                    local: local.to_string(),
                })
            }
            None => Ok(QName {
                prefix: None,
                uri: None,
                local: local.to_string(),
            }),
        }
    }

    fn check_ncname(&self, name: &str) -> Result<()> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => {
                chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            }
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(self.malformed(&format!("invalid name '{}'", name)))
        }
    }
}
