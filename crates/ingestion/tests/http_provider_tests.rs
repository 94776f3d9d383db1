//! HttpProvider against a one-shot local HTTP server.

mod common;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use climate_common::{Partition, PipelineError};
use ingestion::{classify_response, header_column, FetchOutcome, HttpProvider, Provider};

use common::fire_source;

/// Serve one response, reporting the request line back.
async fn serve_once(status: &str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let status = status.to_string();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let request = String::from_utf8_lossy(&request);
        let _ = tx.send(request.lines().next().unwrap_or_default().to_string());

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (format!("http://{}", addr), rx)
}

#[tokio::test]
async fn test_renders_url_with_key_and_date() {
    let (base, request_line) = serve_once("200 OK", "acq_date,frp\n2004-08-01,12.3\n").await;
    let mut source = fire_source();
    source.endpoint_template = format!("{}/api/area/csv/{{map_key}}/MODIS_SP/world/1/{{date}}", base);

    let provider = HttpProvider::with_key(source.clone(), Some("ABC123".to_string())).unwrap();
    let response = provider.fetch(&Partition::fire(2004)).await.unwrap();

    assert_eq!(
        request_line.await.unwrap(),
        "GET /api/area/csv/ABC123/MODIS_SP/world/1/2004-08-01 HTTP/1.1"
    );
    assert_eq!(response.status, 200);
    assert!(matches!(
        classify_response(response, &source.error_markers, header_column(source.kind)),
        Ok(FetchOutcome::Data(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (base, _request) = serve_once("503 Service Unavailable", "try later").await;
    let mut source = fire_source();
    source.endpoint_template = format!("{}/{{map_key}}/{{date}}", base);

    let provider = HttpProvider::with_key(source.clone(), Some("k".to_string())).unwrap();
    let response = provider.fetch(&Partition::fire(2010)).await.unwrap();
    let err = classify_response(response, &source.error_markers, header_column(source.kind))
        .unwrap_err();

    assert!(matches!(err, PipelineError::Provider { status: Some(503), .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut source = fire_source();
    source.endpoint_template = format!("http://{}/{{map_key}}/{{date}}", addr);
    let provider = HttpProvider::with_key(source, Some("k".to_string())).unwrap();

    let err = provider.fetch(&Partition::fire(2010)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Provider { status: None, .. }));
}
