//! Script tables.
//!
//! A script is plain text. Lines starting with `|` are table rows, every
//! other line is commentary. A row whose first cell is `script` opens a
//! table and is not executed.
//!
//! ```text
//! | script |
//! | add prefix namespace | m | urn:example:stock |
//! | set xpath value | /m:GetPrice/m:Symbol | ACME |
//! | send to | http://localhost:8080/stock |
//! | check | get xpath | /m:GetPriceResponse/m:Price | 34.5 |
//! | reject | soap fault |
//! ```
//!
//! A cell wrapped in `!-` and `-!` is taken literally, without trimming.

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Cannot read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: row has no cell")]
    EmptyRow { line: usize },

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("'{operation}' takes {expected} argument(s), got {got}")]
    Arity {
        operation: String,
        expected: usize,
        got: usize,
    },

    #[error("'{0}' needs an operation and an expected value")]
    IncompleteCheck(String),
}

/// One executable row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line in the script text
    pub line: usize,
    pub cells: Vec<String>,
}

impl Row {
    /// The row as written, `| a | b |`
    pub fn display(&self) -> String {
        let mut out = String::from("|");
        for cell in &self.cells {
            out.push(' ');
            out.push_str(cell);
            out.push_str(" |");
        }
        out
    }
}

/// Lowercases and drops spaces, `_` and `-`: `Get XPath`, `get_xpath` and
/// `getXPath` are the same operation.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("!-")
        .and_then(|rest| rest.strip_suffix("-!"))
    {
        Some(literal) => literal.to_string(),
        None => trimmed.to_string(),
    }
}

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(parse_cell).collect()
}

/// Extracts the executable rows of a script
pub fn parse_script(text: &str) -> Result<Vec<Row>, ScriptError> {
    let mut rows = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if !line.trim_start().starts_with('|') {
            continue;
        }

        let cells = split_row(line);
        let Some(first) = cells.first() else {
            return Err(ScriptError::EmptyRow { line: line_number });
        };
        if first.is_empty() && cells.len() == 1 {
            return Err(ScriptError::EmptyRow { line: line_number });
        }
        if normalize_name(first) == "script" {
            continue;
        }

        rows.push(Row {
            line: line_number,
            cells,
        });
    }

    Ok(rows)
}

pub fn load_script(path: &Path) -> Result<Vec<Row>, ScriptError> {
    let text = fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_script(&text)
}
