//! # pmosoapfixture - SOAP calls driven by script tables
//!
//! [`SoapFixture`] holds a pending request and the last response. Script
//! rows call its operations by name (see [`script`] and [`runner`]).
//!
//! ```ignore
//! use pmosoapfixture::{SoapFixture, parse_script, run_script};
//!
//! let rows = parse_script("| send to | http://localhost:8080/soap |\n| reject | soap fault |")?;
//! let report = run_script(&mut SoapFixture::new(), &rows);
//! println!("{}", report.summary());
//! ```

pub mod fixture;
pub mod logs;
pub mod runner;
pub mod script;

pub use fixture::{SoapFixture, Which};
pub use runner::{Outcome, Report, Returned, RowResult, Summary, invoke, run_script};
pub use script::{Row, ScriptError, load_script, parse_script};
