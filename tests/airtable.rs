use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sms_guidelines::error::StoreError;
use sms_guidelines::normalize::normalize;
use sms_guidelines::record::{NormalizedRecord, RawPairs};
use sms_guidelines::settings::AirtableSettings;
use sms_guidelines::store::{AirtableStore, RecordStore, UpsertAction};

const TABLE_PATH: &str = "/v0/appTEST/Guidelines";

fn store(server: &MockServer) -> AirtableStore {
    AirtableStore::new(&AirtableSettings {
        api_url: server.uri(),
        base_id: "appTEST".into(),
        table_name: "Guidelines".into(),
        api_token: "secret".into(),
    })
    .unwrap()
}

fn germany() -> NormalizedRecord {
    let raw: RawPairs = [("Region", "Europe"), ("ISO code", "DE")].into_iter().collect();
    normalize(&raw)
}

#[tokio::test]
async fn creates_when_no_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .and(query_param("filterByFormula", "{ISO code}='DE'"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TABLE_PATH))
        .and(body_json(json!({ "fields": { "ISO code": "DE", "Region": "Europe" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "recNEW", "fields": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let action = store(&server).upsert("DE", &germany()).await.unwrap();
    assert_eq!(action, UpsertAction::Created("recNEW".into()));
}

#[tokio::test]
async fn patches_existing_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{ "id": "recOLD", "fields": { "ISO code": "DE" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/recOLD", TABLE_PATH)))
        .and(body_json(json!({ "fields": { "ISO code": "DE", "Region": "Europe" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "recOLD", "fields": {} })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let action = store(&server).upsert("DE", &germany()).await.unwrap();
    assert_eq!(action, UpsertAction::Updated("recOLD".into()));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_FILTER_BY_FORMULA"))
        .mount(&server)
        .await;

    let err = store(&server).upsert("DE", &germany()).await.unwrap_err();
    match err {
        StoreError::Status { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("INVALID_FILTER"));
        }
        other => panic!("expected status error, got {}", other),
    }
}
