use httpmock::prelude::*;
use serde_json::json;
use sitecheck_lib::config::{DatasetConfig, UpstreamConfig};
use sitecheck_lib::error::AppError;
use sitecheck_lib::models::checklist::DatasetKind;
use sitecheck_lib::services::document_service::DocumentServiceClient;
use sitecheck_lib::services::record_normalizer::{parse_completions, parse_locations};

const PLAN_BASE: &str = "/projects/P-1/quality-plans";

fn upstream(server: &MockServer, record_limit: usize) -> UpstreamConfig {
    UpstreamConfig {
        base_url: server.base_url(),
        username: Some("engineer".into()),
        password: Some("secret".into()),
        project_id: "P-1".into(),
        record_limit,
        page_delay_ms: 0,
        timeout_secs: 5,
    }
}

fn association(location: u32, activity: u32) -> serde_json::Value {
    json!({ "qiLocationId": location, "activitySeq": activity, "statusName": "Completed" })
}

#[tokio::test]
async fn association_pages_until_no_content() {
    let server = MockServer::start_async().await;
    let path = format!("{PLAN_BASE}/Q-1/associations");

    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(path.as_str())
                .query_param("recordStart", "0")
                .query_param("recordLimit", "2");
            then.status(200)
                .json_body(json!({ "associationList": [association(1, 7), association(2, 7)] }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET).path(path.as_str()).query_param("recordStart", "2");
            then.status(200)
                .json_body(json!([association(3, 7), association(4, 8)]));
        })
        .await;
    let last = server
        .mock_async(|when, then| {
            when.method(GET).path(path.as_str()).query_param("recordStart", "4");
            then.status(204);
        })
        .await;

    let client = DocumentServiceClient::try_new(&upstream(&server, 2)).expect("client");
    let body = client
        .fetch_association("ews-finishing", "Q-1")
        .await
        .expect("association fetch");

    first.assert_async().await;
    second.assert_async().await;
    last.assert_async().await;
    let records = parse_completions("ews-finishing", &body).expect("records");
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn short_page_stops_pagination() {
    let server = MockServer::start_async().await;
    let path = format!("{PLAN_BASE}/Q-2/associations");

    let page = server
        .mock_async(|when, then| {
            when.method(GET).path(path.as_str());
            then.status(200).json_body(json!([association(1, 7)]));
        })
        .await;

    let client = DocumentServiceClient::try_new(&upstream(&server, 5)).expect("client");
    let body = client
        .fetch_association("ews-structure", "Q-2")
        .await
        .expect("association fetch");

    assert_eq!(page.hits_async().await, 1);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn wrapped_location_lists_are_normalized() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{PLAN_BASE}/Q-1/locations"));
            then.status(200).json_body(json!({
                "locationList": [
                    { "qiLocationId": 1, "qiParentId": null, "name": "Quality" },
                    { "qiLocationId": 2, "qiParentId": 1, "name": "Tower-F" }
                ]
            }));
        })
        .await;

    let client = DocumentServiceClient::try_new(&upstream(&server, 100)).expect("client");
    let body = client.fetch_locations("ews", "Q-1").await.expect("locations");
    let nodes = parse_locations("ews", &body).expect("nodes");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].parent_id.as_deref(), Some("1"));
}

#[tokio::test]
async fn server_errors_surface_as_upstream_failures() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{PLAN_BASE}/Q-9/activities"));
            then.status(503);
        })
        .await;

    let client = DocumentServiceClient::try_new(&upstream(&server, 100)).expect("client");
    let error = client
        .fetch_activities("lig", "Q-9")
        .await
        .expect_err("service unavailable");
    match error {
        AppError::UpstreamFetch { dataset, status, .. } => {
            assert_eq!(dataset, "lig");
            assert_eq!(status, Some(503));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn failing_dataset_does_not_stop_the_others() {
    let server = MockServer::start_async().await;
    for resource in ["locations", "activities", "associations"] {
        let _ok = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{PLAN_BASE}/Q-1/{resource}"));
                then.status(200).json_body(json!([]));
            })
            .await;
    }
    let _broken = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{PLAN_BASE}/Q-2/locations"));
            then.status(500);
        })
        .await;

    let datasets = vec![
        DatasetConfig {
            name: "ews-finishing".into(),
            plan_id: "Q-1".into(),
            kind: DatasetKind::Finishing,
        },
        DatasetConfig {
            name: "lig-structure".into(),
            plan_id: "Q-2".into(),
            kind: DatasetKind::Structure,
        },
    ];

    let client = DocumentServiceClient::try_new(&upstream(&server, 100)).expect("client");
    let results = client.fetch_all(&datasets).await;

    assert_eq!(results.len(), 2);
    let (name, ok) = &results[0];
    assert_eq!(name, "ews-finishing");
    let snapshot = ok.as_ref().expect("first dataset fetched");
    assert_eq!(snapshot.kind, DatasetKind::Finishing);
    assert!(matches!(
        results[1].1,
        Err(AppError::UpstreamFetch { status: Some(500), .. })
    ));
}

#[tokio::test]
async fn login_posts_credentials_and_rejects_bad_status() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/login")
                .json_body(json!({ "username": "engineer", "password": "secret" }));
            then.status(200).header("set-cookie", "session=abc; Path=/");
        })
        .await;

    let client = DocumentServiceClient::try_new(&upstream(&server, 100)).expect("client");
    client.login().await.expect("login succeeds");
    login.assert_async().await;

    let denied = MockServer::start_async().await;
    let _mock = denied
        .mock_async(|when, then| {
            when.method(POST).path("/login");
            then.status(401);
        })
        .await;
    let client = DocumentServiceClient::try_new(&upstream(&denied, 100)).expect("client");
    let error = client.login().await.expect_err("login rejected");
    assert!(matches!(error, AppError::UpstreamFetch { status: Some(401), .. }));
}
