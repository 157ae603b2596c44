//! Scripts exécutés contre un service de cotation local (axum)

use std::fs;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use pmosoap::soap::build_soap_fault;
use pmosoap::{MimeHeaders, NamespaceTable, Section, SoapError, SoapMessage, SoapVersion};
use pmosoapconfig::Config;
use pmosoapfixture::{Outcome, SoapFixture, load_script, parse_script, run_script};

const STOCK_NS: &str = "urn:example:stock";

fn price_response() -> String {
    format!(
        "<SOAP-ENV:Envelope xmlns:SOAP-ENV=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:m=\"{ns}\">\
         <SOAP-ENV:Header><m:Quota><m:Remaining>99</m:Remaining></m:Quota></SOAP-ENV:Header>\
         <SOAP-ENV:Body><m:GetPriceResponse><m:Price currency=\"USD\">34.5</m:Price></m:GetPriceResponse></SOAP-ENV:Body>\
         </SOAP-ENV:Envelope>",
        ns = STOCK_NS
    )
}

fn client_fault(message: &str) -> Response {
    let body = build_soap_fault(SoapVersion::Soap11, "SOAP-ENV:Client", message).unwrap();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("content-type", "text/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

async fn stock(headers: HeaderMap, body: String) -> Response {
    let action = headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if action != "\"urn:example:stock#GetPrice\"" {
        return client_fault("Missing SOAPAction");
    }

    let Ok(request) = SoapMessage::from_wire(body, MimeHeaders::new()) else {
        return client_fault("Malformed request");
    };
    let mut table = NamespaceTable::new();
    table.add("m", STOCK_NS);
    let symbol = request
        .read_path(Section::Body, "/m:GetPrice/m:Symbol", &table)
        .unwrap_or_default();

    if symbol != "ACME" {
        return client_fault(&format!("Unknown symbol {}", symbol));
    }
    (
        [("content-type", "text/xml; charset=utf-8"), ("x-quote-source", "test")],
        price_response(),
    )
        .into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "<html><body>Not here</body></html>")
}

fn spawn_server() -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let app = Router::new()
                .route("/stock", post(stock))
                .route("/missing", post(not_found));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn fixture() -> SoapFixture {
    let config = Config::from_yaml_str("transport:\n  timeout_secs: 5\n").unwrap();
    SoapFixture::from_config(&config)
}

#[test]
fn test_price_lookup() {
    let base = spawn_server();
    let mut fixture = fixture();

    fixture.add_prefix_namespace("m", STOCK_NS);
    fixture.set_header_value("SOAPAction", "\"urn:example:stock#GetPrice\"");
    fixture.set_xpath_value("/m:GetPrice/m:Symbol", "ACME").unwrap();
    fixture.send_to(&format!("{}/stock", base)).unwrap();

    assert!(!fixture.soap_fault());
    assert_eq!(fixture.get_xpath("/m:GetPriceResponse/m:Price").unwrap(), "34.5");
    assert_eq!(fixture.get_xpath("//m:Price/@currency").unwrap(), "USD");
    assert_eq!(fixture.get_xpath_in_header("m:Quota/m:Remaining").unwrap(), "99");
    assert_eq!(fixture.response_header_value("X-Quote-Source").unwrap(), "test");
    assert_eq!(fixture.full_response().unwrap(), fixture.full_response().unwrap());
    assert!(fixture.full_response().unwrap().ends_with(&price_response()));
    assert_eq!(
        fixture.response().unwrap(),
        "<m:GetPriceResponse xmlns:m=\"urn:example:stock\"><m:Price currency=\"USD\">34.5</m:Price></m:GetPriceResponse>"
    );
}

#[test]
fn test_fault_on_http_500() {
    let base = spawn_server();
    let mut fixture = fixture();

    fixture.add_prefix_namespace("m", STOCK_NS);
    fixture.set_xpath_value("/m:GetPrice/m:Symbol", "ACME").unwrap();
    fixture.send_to(&format!("{}/stock", base)).unwrap();

    assert!(fixture.soap_fault());
    assert_eq!(fixture.fault_code().unwrap(), "SOAP-ENV:Client");
    assert_eq!(fixture.fault_string().unwrap(), "Missing SOAPAction");
}

#[test]
fn test_transport_failures_clear_the_response() {
    let base = spawn_server();
    let mut fixture = fixture();
    fixture.add_prefix_namespace("m", STOCK_NS);
    fixture.set_header_value("SOAPAction", "\"urn:example:stock#GetPrice\"");
    fixture.set_xpath_value("/m:GetPrice/m:Symbol", "ACME").unwrap();
    fixture.send_to(&format!("{}/stock", base)).unwrap();
    assert!(!fixture.soap_fault());

    let result = fixture.send_to(&format!("{}/missing", base));
    assert!(matches!(result, Err(SoapError::Transport(_))));
    assert!(fixture.soap_fault());
    assert!(matches!(fixture.response(), Err(SoapError::NoSuchResponse)));
    assert_eq!(
        fixture.headers(),
        "[SOAPAction] = [\"urn:example:stock#GetPrice\"]"
    );
}

#[test]
fn test_sample_script() {
    let base = spawn_server();
    let sample = fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/scripts/stock_quote.txt")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock_quote.txt");
    fs::write(&path, sample.replace("http://localhost:8080", &base)).unwrap();

    let rows = load_script(&path).unwrap();
    let report = run_script(&mut fixture(), &rows);

    assert!(report.is_success(), "{:#?}", report.results);
    assert_eq!(report.summary().pass, rows.len());
}

#[test]
fn test_script_reports_wrong_values() {
    let base = spawn_server();
    let script = format!(
        "| add prefix namespace | m | {ns} |\n\
         | set header value | SOAPAction | \"urn:example:stock#GetPrice\" |\n\
         | set x path value | /m:GetPrice/m:Symbol | ACME |\n\
         | send to | {base}/stock |\n\
         | check | get x path | /m:GetPriceResponse/m:Price | 12 |\n\
         | send to | {base}/missing |\n\
         | ensure | soap fault |\n",
        ns = STOCK_NS,
        base = base
    );
    let report = run_script(&mut fixture(), &parse_script(&script).unwrap());

    let outcomes: Vec<&Outcome> = report.results.iter().map(|r| &r.outcome).collect();
    assert_eq!(
        outcomes[4],
        &Outcome::Fail {
            expected: "12".to_string(),
            actual: "34.5".to_string()
        }
    );
    assert!(matches!(outcomes[5], Outcome::Error(_)));
    assert_eq!(outcomes[6], &Outcome::Pass);
    assert!(!report.is_success());
}
