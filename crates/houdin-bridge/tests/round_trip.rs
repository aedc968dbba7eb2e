use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use houdin_bridge::{
  BackgroundDispatcher, Bridge, BridgeError, BridgeExt, ErrorCode, HandlerError, HttpRequest,
  InProcessTransport, MessageKind, NavigationRequest, ReqwestHttpHandler, RequestHandler,
  ScriptRequest,
};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct FakeScript;

#[async_trait]
impl RequestHandler for FakeScript {
  async fn handle(&self, data: Value) -> Result<Value, HandlerError> {
    let request: ScriptRequest = serde_json::from_value(data).map_err(HandlerError::invalid_payload)?;
    if request.code.contains("eval") {
      return Err(HandlerError::new(
        ErrorCode::Script,
        "EvalError: Refused to evaluate a string as JavaScript because 'unsafe-eval' is not allowed",
      ));
    }
    Ok(json!({ "result": request.code.len() }))
  }
}

struct NeverNavigates;

#[async_trait]
impl RequestHandler for NeverNavigates {
  async fn handle(&self, _data: Value) -> Result<Value, HandlerError> {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(json!({ "url": "https://never" }))
  }
}

fn dispatcher() -> BackgroundDispatcher {
  let mut dispatcher = BackgroundDispatcher::new();
  dispatcher.register(MessageKind::ExecuteScript, Arc::new(FakeScript));
  dispatcher.register(MessageKind::WaitForNavigation, Arc::new(NeverNavigates));
  dispatcher
}

#[tokio::test]
async fn test_script_round_trip() {
  let client = InProcessTransport::connect(dispatcher(), Duration::from_secs(5));
  let result = client
    .execute_script(
      &ScriptRequest {
        code: "1 + 1".to_string(),
        tab_id: None,
      },
      &CancellationToken::new(),
    )
    .await
    .unwrap();
  assert_eq!(result, json!({ "result": 5 }));
}

#[tokio::test]
async fn test_script_error_message_is_preserved() {
  let client = InProcessTransport::connect(dispatcher(), Duration::from_secs(5));
  let err = client
    .execute_script(
      &ScriptRequest {
        code: "eval('x')".to_string(),
        tab_id: None,
      },
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
  match err {
    BridgeError::Script(message) => assert!(message.contains("unsafe-eval")),
    other => panic!("expected script error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_slow_handler_times_out_client_side() {
  let client = InProcessTransport::connect(dispatcher(), Duration::from_secs(5));
  let err = client
    .wait_for_navigation(
      &NavigationRequest { url: None, tab_id: None },
      Some(Duration::from_millis(30)),
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, BridgeError::Timeout(_)));
  assert!(client.pending().is_empty());
}

#[tokio::test]
async fn test_unregistered_kind_rejects_instead_of_hanging() {
  let client = InProcessTransport::connect(BackgroundDispatcher::new(), Duration::from_secs(5));
  let err = client
    .request(MessageKind::HttpRequest, json!({}), None, &CancellationToken::new())
    .await
    .unwrap_err();
  assert_eq!(err, BridgeError::UnknownKind("http-request".to_string()));
}

/// Serve one canned HTTP response on a local port.
async fn serve_once(status_line: &'static str, body: &'static str) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = vec![0u8; 4096];
    let _ = socket.read(&mut buf).await.unwrap();
    let response = format!(
      "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      status_line,
      body.len(),
      body
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.unwrap();
  });
  format!("http://{}/ip", addr)
}

#[tokio::test]
async fn test_http_handler_parses_json_body() {
  let url = serve_once("HTTP/1.1 200 OK", r#"{"ip":"1.2.3.4"}"#).await;

  let mut dispatcher = BackgroundDispatcher::new();
  dispatcher.register(
    MessageKind::HttpRequest,
    Arc::new(ReqwestHttpHandler::new(Duration::from_secs(5)).unwrap()),
  );
  let client = InProcessTransport::connect(dispatcher, Duration::from_secs(10));

  let response = client
    .http(&HttpRequest::get(url.clone()), &CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(response.status, 200);
  assert_eq!(response.status_text, "OK");
  assert_eq!(response.data, json!({ "ip": "1.2.3.4" }));
  assert_eq!(response.url, url);
  assert!(response.is_success());
}

#[tokio::test]
async fn test_http_handler_returns_non_success_status() {
  let url = serve_once("HTTP/1.1 404 Not Found", r#"{"error":"missing"}"#).await;
  let handler = ReqwestHttpHandler::new(Duration::from_secs(5)).unwrap();

  let response = handler.perform(HttpRequest::get(url)).await.unwrap();
  assert_eq!(response.status, 404);
  assert!(!response.is_success());
}

#[tokio::test]
async fn test_http_handler_connection_refused_is_network_error() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let handler = ReqwestHttpHandler::new(Duration::from_secs(5)).unwrap();
  let err = handler
    .perform(HttpRequest::get(format!("http://{}/", addr)))
    .await
    .unwrap_err();
  assert_eq!(err.code, ErrorCode::Network);
}
