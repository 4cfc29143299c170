//! HTTP push client and token exchange against a mock destination.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use pushload_engine::auth::{resolve_token, BearerToken};
use pushload_engine::config::types::{ApiConfig, AuthConfig};
use pushload_engine::{HttpPushClient, PushApi, RetryPolicy};
use pushload_types::dataset::{DatasetPayload, Scope};
use pushload_types::error::ErrorCategory;
use pushload_types::rows::RowBatch;
use pushload_types::schema::{ColumnDefinition, DataType, TableDefinition};
use serde_json::json;

fn client(base_url: &str, workspace: Option<&str>) -> HttpPushClient {
    HttpPushClient::new(
        &ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
        },
        &Scope::new(workspace),
        BearerToken::new("tok").unwrap(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    )
    .unwrap()
}

fn batch() -> RowBatch {
    let columns: Arc<[String]> = vec!["id".to_string(), "note".to_string()].into();
    RowBatch::try_new(
        columns,
        0,
        vec![
            vec![Some("1".into()), Some("a".into())],
            vec![Some("2".into()), None],
        ],
    )
    .unwrap()
}

fn payload() -> DatasetPayload {
    DatasetPayload::push(
        "Sales",
        vec![TableDefinition {
            name: "orders".into(),
            columns: vec![ColumnDefinition::new("id", DataType::Int64)],
        }],
        vec![],
    )
}

#[tokio::test]
async fn list_datasets_in_workspace_scope() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/groups/ws-1/datasets")
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value":[{"id":"abc123","name":"Sales"},{"id":"d2","name":"Other"}]}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let datasets = client(&server.url(), Some("ws-1"))
        .list_datasets()
        .await
        .unwrap();

    //* Then
    mock.assert_async().await;
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0].id, "abc123");
}

#[tokio::test]
async fn list_datasets_status_mapping() {
    let cases = [
        (400, "MALFORMED_REQUEST", ErrorCategory::Remote),
        (401, "UNAUTHORIZED", ErrorCategory::Auth),
        (403, "UNAUTHORIZED", ErrorCategory::Permission),
        (500, "REMOTE_INTERNAL_ERROR", ErrorCategory::Remote),
        (503, "LIST_DATASETS_FAILED", ErrorCategory::Remote),
    ];
    for (status, code, category) in cases {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/datasets")
            .with_status(status)
            .create_async()
            .await;

        let err = client(&server.url(), None)
            .list_datasets()
            .await
            .unwrap_err();
        assert_eq!(err.code, code, "status {status}");
        assert_eq!(err.category, category, "status {status}");
        assert_eq!(err.status, Some(status as u16));
        assert!(!err.retryable);
    }
}

#[tokio::test]
async fn create_dataset_returns_assigned_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/datasets")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::PartialJson(json!({
            "name": "Sales",
            "defaultMode": "Push",
            "tables": [{"name": "orders", "columns": [{"name": "id", "dataType": "Int64"}]}],
        })))
        .with_status(201)
        .with_body(r#"{"id":"abc123","name":"Sales"}"#)
        .expect(1)
        .create_async()
        .await;

    let id = client(&server.url(), None)
        .create_dataset(&payload())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(id, "abc123");
}

#[tokio::test]
async fn create_dataset_rejection_carries_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/datasets")
        .with_status(400)
        .with_body(r#"{"error":{"code":"InvalidRequest","message":"Relationship table not found"}}"#)
        .create_async()
        .await;

    let err = client(&server.url(), None)
        .create_dataset(&payload())
        .await
        .unwrap_err();

    assert_eq!(err.code, "DATASET_CREATE_REJECTED");
    assert!(err.message.contains("Relationship table not found"));
    assert_eq!(err.details.unwrap()["error"]["code"], "InvalidRequest");
}

#[tokio::test]
async fn append_rows_sends_records_in_column_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/datasets/abc123/tables/orders/rows")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::Json(json!({
            "rows": [{"id": "1", "note": "a"}, {"id": "2", "note": null}]
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    client(&server.url(), None)
        .append_rows("abc123", "orders", &batch())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn append_rows_429_is_fatal_rate_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/datasets/abc123/tables/orders/rows")
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    let err = client(&server.url(), None)
        .append_rows("abc123", "orders", &batch())
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, "RATE_LIMITED");
    assert_eq!(err.category, ErrorCategory::RateLimit);
    assert!(!err.retryable);
}

#[tokio::test]
async fn append_rows_rejection_uses_remote_message() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/datasets/abc123/tables/orders/rows")
        .with_status(400)
        .with_body(r#"{"error":{"code":"InvalidRequest","message":"Column 'x' not found"}}"#)
        .create_async()
        .await;

    let err = client(&server.url(), None)
        .append_rows("abc123", "orders", &batch())
        .await
        .unwrap_err();

    assert_eq!(err.code, "ROWS_REJECTED");
    assert!(err.message.contains("Column 'x' not found"));
    assert_eq!(err.details.unwrap()["rows"], 2);
}

#[tokio::test]
async fn list_tables_returns_names() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/datasets/abc123/tables")
        .with_status(200)
        .with_body(r#"{"value":[{"name":"orders"},{"name":"customers"}]}"#)
        .create_async()
        .await;

    let tables = client(&server.url(), None)
        .list_tables("abc123")
        .await
        .unwrap();
    assert_eq!(tables, vec!["orders", "customers"]);
}

#[tokio::test]
async fn delete_operations_map_failures() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("DELETE", "/datasets/abc123/tables/orders/rows")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let _rows = server
        .mock("DELETE", "/datasets/abc123/tables/ghost/rows")
        .with_status(404)
        .with_body(r#"{"error":{"message":"Table not found"}}"#)
        .create_async()
        .await;
    let _dataset = server
        .mock("DELETE", "/datasets/abc123")
        .with_status(500)
        .create_async()
        .await;

    let api = client(&server.url(), None);
    api.delete_rows("abc123", "orders").await.unwrap();
    ok.assert_async().await;

    let err = api.delete_rows("abc123", "ghost").await.unwrap_err();
    assert_eq!(err.code, "ROWS_DELETE_FAILED");
    assert!(err.message.contains("Table not found"));

    let err = api.delete_dataset("abc123").await.unwrap_err();
    assert_eq!(err.code, "DATASET_DELETE_FAILED");
    assert_eq!(err.status, Some(500));
}

#[tokio::test]
async fn connection_refused_retries_then_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"), None)
        .list_datasets()
        .await
        .unwrap_err();

    assert_eq!(err.code, "TRANSPORT_ERROR");
    assert_eq!(err.category, ErrorCategory::TransientNetwork);
    assert!(err.message.contains("after 3 attempt(s)"), "{}", err.message);
}

#[tokio::test]
async fn stalled_response_body_is_retried() {
    //* Given
    // First connection sends headers and half a body, then stalls.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let mut held = Vec::new();
        for (i, stream) in listener.incoming().take(2).enumerate() {
            let mut stream = stream.unwrap();
            let mut request = [0_u8; 4096];
            let _ = stream.read(&mut request).unwrap();
            let body = r#"{"value":[{"id":"abc123","name":"Sales"}]}"#;
            if i == 0 {
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                    body.len(),
                    &body[..10]
                )
                .unwrap();
                stream.flush().unwrap();
                held.push(stream);
            } else {
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
        }
        held
    });
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let api = HttpPushClient::with_client(
        http,
        &ApiConfig {
            base_url: format!("http://{addr}"),
            request_timeout_secs: 1,
        },
        &Scope::new(None),
        BearerToken::new("tok").unwrap(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    )
    .unwrap();

    //* When
    let datasets = api.list_datasets().await;

    //* Then
    let datasets = datasets.unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].id, "abc123");
    drop(server.join().unwrap());
}

#[tokio::test]
async fn append_rows_encodes_table_name_in_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/datasets/abc123/tables/sales%2F2024/rows")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    client(&server.url(), None)
        .append_rows("abc123", "sales/2024", &batch())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn oauth_refresh_exchanges_refresh_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("client_id".into(), "app".into()),
            Matcher::UrlEncoded("refresh_token".into(), "r-1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"fresh","token_type":"Bearer"}"#)
        .expect(1)
        .create_async()
        .await;

    let auth = AuthConfig::OauthRefresh {
        client_id: "app".into(),
        client_secret: "secret".into(),
        refresh_token: "r-1".into(),
        token_url: format!("{}/token", server.url()),
        resource: "https://analysis.windows.net/powerbi/api".into(),
    };
    let token = resolve_token(Some(&auth), &reqwest::Client::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(token, BearerToken::new("fresh").unwrap());
}

#[tokio::test]
async fn oauth_refresh_rejection_asks_for_reauthorization() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let auth = AuthConfig::OauthRefresh {
        client_id: "app".into(),
        client_secret: "secret".into(),
        refresh_token: "expired".into(),
        token_url: format!("{}/token", server.url()),
        resource: "https://analysis.windows.net/powerbi/api".into(),
    };
    let err = resolve_token(Some(&auth), &reqwest::Client::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, "TOKEN_REFRESH_FAILED");
    assert_eq!(err.category, ErrorCategory::Auth);
    assert!(err.message.contains("reset the account authorization"));
}
