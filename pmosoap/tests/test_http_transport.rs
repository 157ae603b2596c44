//! Tests d'intégration du transport HTTP contre un serveur axum local

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use pmosoap::soap::build_soap_fault;
use pmosoap::{
    HttpTransport, MessageOptions, NamespaceTable, Section, SoapError, SoapMessage, SoapTransport,
    SoapVersion, TransportOptions,
};

fn header_text(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn echo(headers: HeaderMap, body: String) -> impl IntoResponse {
    (
        [
            ("content-type", "text/xml; charset=utf-8".to_string()),
            ("x-received-soapaction", header_text(&headers, "soapaction")),
            ("x-received-content-type", header_text(&headers, "content-type")),
            ("x-received-user-agent", header_text(&headers, "user-agent")),
        ],
        body,
    )
}

async fn fault() -> impl IntoResponse {
    let body = build_soap_fault(SoapVersion::Soap11, "SOAP-ENV:Client", "Unknown symbol").unwrap();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("content-type", "text/xml; charset=utf-8")],
        body,
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "<html><body>Not here</body></html>")
}

async fn garbage() -> impl IntoResponse {
    (StatusCode::OK, "this is not xml")
}

fn spawn_server() -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let app = Router::new()
                .route("/echo", post(echo))
                .route("/fault", post(fault))
                .route("/missing", post(not_found))
                .route("/garbage", post(garbage));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn transport() -> HttpTransport {
    HttpTransport::new(TransportOptions {
        timeout: Duration::from_secs(5),
        user_agent: "transport-tests".to_string(),
        ..TransportOptions::default()
    })
}

fn stock_request(version: SoapVersion) -> SoapMessage {
    let mut table = NamespaceTable::new();
    table.add("m", "urn:example:stock");
    let mut request = SoapMessage::new(&MessageOptions {
        version,
        ..MessageOptions::default()
    });
    request.declare_namespace("m", "urn:example:stock");
    request
        .write_path(Section::Body, "/m:GetPrice/m:Symbol", "ACME", &table)
        .unwrap();
    request
}

#[test]
fn test_echo_round_trip_with_default_headers() {
    let base = spawn_server();
    let request = stock_request(SoapVersion::Soap11);

    let response = transport().call(&request, &format!("{}/echo", base)).unwrap();

    let mut table = NamespaceTable::new();
    table.add("m", "urn:example:stock");
    assert_eq!(
        response.read_path(Section::Body, "/m:GetPrice/m:Symbol", &table).unwrap(),
        "ACME"
    );
    assert!(!response.has_fault());
    assert_eq!(response.mime_headers().get("X-Received-SOAPAction"), vec!["\"\""]);
    assert_eq!(
        response.mime_headers().get("x-received-content-type"),
        vec!["text/xml; charset=utf-8"]
    );
    assert_eq!(response.mime_headers().get("x-received-user-agent"), vec!["transport-tests"]);
    assert!(request.mime_headers().is_empty());
}

#[test]
fn test_request_headers_win_over_defaults() {
    let base = spawn_server();
    let mut request = stock_request(SoapVersion::Soap11);
    request
        .mime_headers_mut()
        .set("SOAPAction", "\"urn:example:stock#GetPrice\"");

    let response = transport().call(&request, &format!("{}/echo", base)).unwrap();
    assert_eq!(
        response.mime_headers().get("x-received-soapaction"),
        vec!["\"urn:example:stock#GetPrice\""]
    );
}

#[test]
fn test_soap12_content_type() {
    let base = spawn_server();
    let request = stock_request(SoapVersion::Soap12);

    let response = transport().call(&request, &format!("{}/echo", base)).unwrap();
    assert_eq!(response.version(), SoapVersion::Soap12);
    assert_eq!(
        response.mime_headers().get("x-received-content-type"),
        vec!["application/soap+xml; charset=utf-8"]
    );
    assert_eq!(response.mime_headers().get("x-received-soapaction"), vec![""]);
}

#[test]
fn test_http_500_with_fault_is_a_response() {
    let base = spawn_server();
    let request = stock_request(SoapVersion::Soap11);

    let response = transport().call(&request, &format!("{}/fault", base)).unwrap();
    let fault = response.fault().unwrap();
    assert_eq!(fault.fault_code, "SOAP-ENV:Client");
    assert_eq!(fault.fault_string, "Unknown symbol");
}

#[test]
fn test_error_status_without_envelope_is_transport_error() {
    let base = spawn_server();
    let request = stock_request(SoapVersion::Soap11);

    let result = transport().call(&request, &format!("{}/missing", base));
    assert!(matches!(result, Err(SoapError::Transport(_))));
}

#[test]
fn test_success_status_without_envelope_is_invalid() {
    let base = spawn_server();
    let request = stock_request(SoapVersion::Soap11);

    let result = transport().call(&request, &format!("{}/garbage", base));
    assert!(matches!(result, Err(SoapError::InvalidEnvelope(_))));
}
