//! Execution of script rows against a [`SoapFixture`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::fixture::SoapFixture;
use crate::script::{Row, ScriptError, normalize_name};

/// Value returned by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returned {
    Text(String),
    Bool(bool),
    Nothing,
}

impl Returned {
    pub fn as_text(&self) -> String {
        match self {
            Returned::Text(text) => text.clone(),
            Returned::Bool(value) => value.to_string(),
            Returned::Nothing => String::new(),
        }
    }

    fn truth(&self) -> bool {
        match self {
            Returned::Bool(value) => *value,
            Returned::Text(text) => text.trim().eq_ignore_ascii_case("true"),
            Returned::Nothing => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail { expected: String, actual: String },
    Error(String),
    Ignored,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail { .. } => "FAIL",
            Outcome::Error(_) => "ERROR",
            Outcome::Ignored => "IGNORED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RowResult {
    pub row: Row,
    pub outcome: Outcome,
    pub returned: Option<Returned>,
}

impl fmt::Display for RowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {:<7} {}", self.row.line, self.outcome.label(), self.row.display())?;
        match &self.outcome {
            Outcome::Fail { expected, actual } => {
                write!(f, " expected [{}] actual [{}]", expected, actual)
            }
            Outcome::Error(message) => write!(f, " {}", message),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub ignored: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} right, {} wrong, {} ignored, {} exceptions",
            self.pass, self.fail, self.ignored, self.error
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Report {
    pub results: Vec<RowResult>,
}

impl Report {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for result in &self.results {
            match result.outcome {
                Outcome::Pass => summary.pass += 1,
                Outcome::Fail { .. } => summary.fail += 1,
                Outcome::Error(_) => summary.error += 1,
                Outcome::Ignored => summary.ignored += 1,
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        let summary = self.summary();
        summary.fail == 0 && summary.error == 0
    }
}

fn expect_args(operation: &str, args: &[String], expected: usize) -> Result<(), ScriptError> {
    if args.len() != expected {
        return Err(ScriptError::Arity {
            operation: operation.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Calls one fixture operation by its script name
pub fn invoke(fixture: &mut SoapFixture, operation: &str, args: &[String]) -> Result<Returned, String> {
    let name = normalize_name(operation);
    let arity = match name.as_str() {
        "getxpath" | "getxpathinheader" | "responseheadervalue" | "sendto" => 1,
        "setxpathvalue" | "setxpathinheadervalue" | "setheadervalue" | "addheadervalue"
        | "addprefixnamespace" => 2,
        "request" | "response" | "requestheader" | "responseheader" | "fullrequest"
        | "fullresponse" | "soapfault" | "faultcode" | "faultstring" | "faultdetail"
        | "resetheaders" | "headers" | "resetnamespaces" => 0,
        _ => return Err(ScriptError::UnknownOperation(operation.to_string()).to_string()),
    };
    expect_args(operation, args, arity).map_err(|e| e.to_string())?;

    let text = |value: pmosoap::Result<String>| value.map(Returned::Text).map_err(|e| e.to_string());
    let unit = |value: pmosoap::Result<()>| value.map(|_| Returned::Nothing).map_err(|e| e.to_string());

    match name.as_str() {
        "getxpath" => text(fixture.get_xpath(&args[0])),
        "getxpathinheader" => text(fixture.get_xpath_in_header(&args[0])),
        "setxpathvalue" => unit(fixture.set_xpath_value(&args[0], &args[1])),
        "setxpathinheadervalue" => unit(fixture.set_xpath_in_header_value(&args[0], &args[1])),
        "request" => text(fixture.request()),
        "response" => text(fixture.response()),
        "requestheader" => text(fixture.request_header()),
        "responseheader" => text(fixture.response_header()),
        "fullrequest" => text(fixture.full_request()),
        "fullresponse" => text(fixture.full_response()),
        "soapfault" => Ok(Returned::Bool(fixture.soap_fault())),
        "faultcode" => text(fixture.fault_code()),
        "faultstring" => text(fixture.fault_string()),
        "faultdetail" => text(fixture.fault_detail()),
        "setheadervalue" => {
            fixture.set_header_value(&args[0], &args[1]);
            Ok(Returned::Nothing)
        }
        "addheadervalue" => {
            fixture.add_header_value(&args[0], &args[1]);
            Ok(Returned::Nothing)
        }
        "resetheaders" => {
            fixture.reset_headers();
            Ok(Returned::Nothing)
        }
        "headers" => Ok(Returned::Text(fixture.headers())),
        "responseheadervalue" => text(fixture.response_header_value(&args[0])),
        "sendto" => unit(fixture.send_to(&args[0])),
        "addprefixnamespace" => {
            fixture.add_prefix_namespace(&args[0], &args[1]);
            Ok(Returned::Nothing)
        }
        "resetnamespaces" => {
            fixture.reset_namespaces();
            Ok(Returned::Nothing)
        }
        _ => Err(ScriptError::UnknownOperation(operation.to_string()).to_string()),
    }
}

enum Directive {
    Call,
    Check { negated: bool },
    Ensure,
    Reject,
    Show,
    Note,
}

fn directive(first: &str) -> Directive {
    match normalize_name(first).as_str() {
        "check" => Directive::Check { negated: false },
        "checknot" => Directive::Check { negated: true },
        "ensure" => Directive::Ensure,
        "reject" => Directive::Reject,
        "show" => Directive::Show,
        "note" => Directive::Note,
        _ => Directive::Call,
    }
}

fn execute(fixture: &mut SoapFixture, row: &Row) -> (Outcome, Option<Returned>) {
    let cells = &row.cells;
    let Some(first) = cells.first() else {
        return (Outcome::Error(ScriptError::EmptyRow { line: row.line }.to_string()), None);
    };
    let call = |fixture: &mut SoapFixture, cells: &[String]| match cells.split_first() {
        Some((operation, args)) => invoke(fixture, operation, args),
        None => Err(ScriptError::IncompleteCheck(row.display()).to_string()),
    };

    match directive(first) {
        Directive::Note => (Outcome::Ignored, None),
        Directive::Call => match call(fixture, cells) {
            Ok(returned) => (Outcome::Pass, Some(returned)),
            Err(message) => (Outcome::Error(message), None),
        },
        Directive::Show => match call(fixture, &cells[1..]) {
            Ok(returned) => (Outcome::Pass, Some(returned)),
            Err(message) => (Outcome::Error(message), None),
        },
        Directive::Ensure | Directive::Reject => {
            let wanted = matches!(directive(first), Directive::Ensure);
            match call(fixture, &cells[1..]) {
                Ok(returned) if returned.truth() == wanted => (Outcome::Pass, Some(returned)),
                Ok(returned) => (
                    Outcome::Fail {
                        expected: wanted.to_string(),
                        actual: returned.as_text(),
                    },
                    Some(returned),
                ),
                Err(message) => (Outcome::Error(message), None),
            }
        }
        Directive::Check { negated } => {
            if cells.len() < 3 {
                return (
                    Outcome::Error(ScriptError::IncompleteCheck(first.clone()).to_string()),
                    None,
                );
            }
            let (expected, call_cells) = match cells[1..].split_last() {
                Some((expected, rest)) => (expected.clone(), rest.to_vec()),
                None => return (Outcome::Error(ScriptError::IncompleteCheck(first.clone()).to_string()), None),
            };
            match call(fixture, &call_cells) {
                Ok(returned) => {
                    let actual = returned.as_text();
                    if (actual == expected) != negated {
                        (Outcome::Pass, Some(returned))
                    } else {
                        let expected = if negated { format!("not {}", expected) } else { expected };
                        (Outcome::Fail { expected, actual }, Some(returned))
                    }
                }
                Err(message) => (Outcome::Error(message), None),
            }
        }
    }
}

/// Runs every row in order; failures do not stop the script
pub fn run_script(fixture: &mut SoapFixture, rows: &[Row]) -> Report {
    let mut report = Report::default();

    for row in rows {
        let (outcome, returned) = execute(fixture, row);
        let result = RowResult {
            row: row.clone(),
            outcome,
            returned,
        };
        match &result.outcome {
            Outcome::Pass | Outcome::Ignored => debug!(line = row.line, "{}", result),
            Outcome::Fail { .. } | Outcome::Error(_) => warn!(line = row.line, "{}", result),
        }
        report.results.push(result);
    }

    info!(summary = %report.summary(), "Script finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::tests::echo_fixture;
    use crate::script::parse_script;

    fn run(text: &str) -> Report {
        let (mut fixture, _) = echo_fixture();
        run_script(&mut fixture, &parse_script(text).unwrap())
    }

    #[test]
    fn test_successful_script() {
        let report = run("\
| script |
| add prefix namespace | s | urn:test |
| set x path value | /s:Foo/@id | 7 |
| setXPathValue | /s:Foo/s:Bar | bar |
| ensure | soap fault |
| send to | http://localhost/echo |
| reject | soap fault |
| check | get x path | /s:Foo/s:Bar | bar |
| check | get_xpath | /s:Foo/@id | 7 |
| check not | get x path | /s:Foo/s:Bar | baz |
| note | anything here |
| show | response |
");
        let summary = report.summary();
        assert_eq!(summary, Summary { pass: 10, fail: 0, error: 0, ignored: 1 });
        assert!(report.is_success());

        let shown = report.results.last().unwrap().returned.clone().unwrap();
        assert!(shown.as_text().starts_with("<s:Foo"));
    }

    #[test]
    fn test_failures_do_not_stop_execution() {
        let report = run("\
| add prefix namespace | s | urn:test |
| set x path value | s:Foo | bar |
| send to | http://localhost/echo |
| check | get x path | s:Foo | other |
| get x path | u:Foo |
| frobnicate |
| send to |
| check | get x path | s:Foo | bar |
");
        assert_eq!(report.summary(), Summary { pass: 4, fail: 1, error: 3, ignored: 0 });
        assert!(!report.is_success());

        match &report.results[3].outcome {
            Outcome::Fail { expected, actual } => {
                assert_eq!(expected, "other");
                assert_eq!(actual, "bar");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(&report.results[5].outcome, Outcome::Error(m) if m.contains("frobnicate")));
        assert!(matches!(&report.results[6].outcome, Outcome::Error(m) if m.contains("argument")));
    }

    #[test]
    fn test_read_before_send_is_an_error() {
        let report = run("| check | get x path | /a | |\n| ensure | soap fault |\n");
        assert!(matches!(report.results[0].outcome, Outcome::Error(_)));
        assert_eq!(report.results[1].outcome, Outcome::Pass);
    }

    #[test]
    fn test_headers_and_fault_rows() {
        let report = run("\
| add header value | X-Trace | 1 |
| set header value | x-trace | 2 |
| check | headers | [X-Trace] = [2] |
| send to | http://localhost/fault |
| ensure | soap fault |
| check | fault string | Boom |
| check | fault detail | |
| send to | http://localhost/detailed |
| check | fault detail | 401 |
| reset headers |
| check | headers | |
");
        assert!(report.is_success(), "{:#?}", report.results);
    }

    #[test]
    fn test_row_without_cells_is_an_error() {
        let (mut fixture, _) = echo_fixture();
        let rows = vec![
            Row { line: 1, cells: Vec::new() },
            Row { line: 2, cells: vec!["soap fault".to_string()] },
        ];
        let report = run_script(&mut fixture, &rows);

        assert!(matches!(&report.results[0].outcome, Outcome::Error(m) if m.contains("Line 1")));
        assert_eq!(report.results[1].outcome, Outcome::Pass);
    }

    #[test]
    fn test_summary_display() {
        let summary = Summary { pass: 3, fail: 1, error: 0, ignored: 2 };
        assert_eq!(summary.to_string(), "3 right, 1 wrong, 2 ignored, 0 exceptions");
    }
}
