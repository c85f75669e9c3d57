//! HTTP gateway tests against a mock NocoDB server.
//!
//! The gateway uses a blocking client, so every call runs on a blocking thread while
//! the mock server lives on the test runtime.

use nocodb::api::NocoApi;
use nocodb::commands::{OutcomeStatus, ReconcileOptions};
use nocodb::gateway::http::{ClientConfig, HttpGateway, RetryPolicy};
use nocodb::gateway::{GatewayError, ListQuery, RecordGateway};
use nocodb::model::{FailurePolicy, MatchSpec, Record, RowId};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECORDS: &str = "/api/v2/tables/tbl1/records";

fn client_config(uri: &str, retries: u32) -> ClientConfig {
    let mut config = ClientConfig::new(uri);
    config
        .headers
        .insert("xc-token".to_string(), "secret".to_string());
    config.retry = RetryPolicy {
        retries,
        delay: Duration::from_millis(10),
        status_codes: vec![429, 503],
    };
    config
}

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn rec(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn list_page_sends_query_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .and(header("xc-token", "secret"))
        .and(query_param("where", "(Email,eq,a@x.com)"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"Id": 1, "Email": "a@x.com"}],
            "pageInfo": {"totalRows": 21, "page": 3, "pageSize": 10}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let page = blocking(move || {
        let gateway = HttpGateway::new(&client_config(&uri, 0)).unwrap();
        let query = ListQuery::new()
            .with_where(Some("(Email,eq,a@x.com)".into()))
            .with_limit(Some(10))
            .with_offset(20);
        gateway.list_page("tbl1", &query)
    })
    .await
    .unwrap();

    assert_eq!(page.total_rows, 21);
    assert_eq!(page.rows, vec![rec(json!({"Id": 1, "Email": "a@x.com"}))]);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_page_info_means_last_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"list": [{"Id": 1}, {"Id": 2}]})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let page = blocking(move || {
        let gateway = HttpGateway::new(&client_config(&uri, 0)).unwrap();
        gateway.list_page("tbl1", &ListQuery::new().with_offset(5))
    })
    .await
    .unwrap();
    assert_eq!(page.total_rows, 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_configured_status_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"list": [], "pageInfo": {"totalRows": 0}})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let page = blocking(move || {
        let gateway = HttpGateway::new(&client_config(&uri, 2)).unwrap();
        gateway.list_page("tbl1", &ListQuery::new())
    })
    .await
    .unwrap();

    assert!(page.rows.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn gives_up_after_retry_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"msg": "Too many requests"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = blocking(move || {
        let gateway = HttpGateway::new(&client_config(&uri, 1)).unwrap();
        gateway.list_page("tbl1", &ListQuery::new())
    })
    .await
    .unwrap_err();

    assert_eq!(
        err,
        GatewayError::Status {
            status: 429,
            message: "Too many requests".into()
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn other_statuses_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"msg": "Invalid column"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = blocking(move || {
        let mut gateway = HttpGateway::new(&client_config(&uri, 3)).unwrap();
        gateway.create_many("tbl1", &[rec(json!({"Nope": 1}))])
    })
    .await
    .unwrap_err();

    assert!(matches!(err, GatewayError::Status { status: 400, .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn writes_use_batch_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .and(body_json(json!([{"Name": "a"}, {"Name": "b"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Id": 5}, {"Id": 6}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(RECORDS))
        .and(body_json(json!([{"Id": 5, "Name": "a2"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Id": 5}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(RECORDS))
        .and(body_json(json!([{"Id": 5}, {"Id": 6}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Id": 5}, {"Id": 6}])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (created, updated, deleted) = blocking(move || {
        let mut gateway = HttpGateway::new(&client_config(&uri, 0)).unwrap();
        let created = gateway
            .create_many("tbl1", &[rec(json!({"Name": "a"})), rec(json!({"Name": "b"}))])
            .unwrap();
        let updated = gateway
            .update_many("tbl1", &[rec(json!({"Id": 5, "Name": "a2"}))])
            .unwrap();
        let deleted = gateway
            .delete_many("tbl1", &[RowId::from(5), RowId::from(6)])
            .unwrap();
        (created, updated, deleted)
    })
    .await;

    assert_eq!(created.rows.len(), 2);
    assert_eq!(updated.rows.len(), 1);
    assert_eq!(deleted.rows.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_upsert_over_http_partitions_create_and_update() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"Id": 1, "Email": "a@x.com"}, {"Id": 2, "Email": "b@x.com"}],
            "pageInfo": {"totalRows": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .and(body_json(json!([{"Email": "c@x.com", "Name": "C"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Id": 3}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(RECORDS))
        .and(body_json(json!([{"Email": "a@x.com", "Name": "A2", "Id": 1}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = blocking(move || {
        let gateway = HttpGateway::new(&client_config(&uri, 0)).unwrap();
        let mut api = NocoApi::new(gateway, ReconcileOptions::default());
        let spec: MatchSpec = "Email".parse().unwrap();
        api.bulk_upsert(
            "tbl1",
            &spec,
            vec![
                rec(json!({"Email": "a@x.com", "Name": "A2"})),
                rec(json!({"Email": "c@x.com", "Name": "C"})),
            ],
            FailurePolicy::default(),
        )
    })
    .await
    .unwrap();

    assert_eq!(
        result
            .outcomes
            .iter()
            .map(|o| o.status.clone())
            .collect::<Vec<_>>(),
        vec![
            OutcomeStatus::Updated { id: RowId::from(1) },
            OutcomeStatus::Created {
                id: Some(RowId::from(3))
            },
        ]
    );
}
