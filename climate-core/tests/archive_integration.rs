//! Integration tests for the Open-Meteo archive client and the batch driver,
//! run against a wiremock server.

use std::fs;

use climate_core::{
    ArchiveConfig, ArchiveProvider, ArchiveRequest, EnrichError, Enricher, ExpiryPolicy,
    OpenMeteoArchive, ResponseCache, resolve_month,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARCHIVE_PATH: &str = "/v1/archive";

fn archive_config(server: &MockServer) -> ArchiveConfig {
    ArchiveConfig {
        base_url: format!("{}{ARCHIVE_PATH}", server.uri()),
        max_retries: 2,
        initial_backoff_ms: 10,
        ..ArchiveConfig::default()
    }
}

/// 31 days of March: daily mean temperature 5..=35, rain cycling 0,1,2,
/// constant wind.
fn march_body() -> Value {
    let time: Vec<String> = (1..=31).map(|d| format!("2024-03-{d:02}")).collect();
    let temp_max: Vec<f64> = (0..31).map(|i| 8.0 + f64::from(i)).collect();
    let temp_min: Vec<f64> = (0..31).map(|i| 2.0 + f64::from(i)).collect();
    let rain: Vec<f64> = (0..31).map(|i| f64::from(i % 3)).collect();
    let wind = vec![12.5; 31];

    json!({
        "latitude": 51.5,
        "longitude": -0.1,
        "utc_offset_seconds": 0,
        "timezone": "Europe/London",
        "daily_units": {
            "time": "iso8601",
            "temperature_2m_max": "°C",
            "temperature_2m_min": "°C",
            "rain_sum": "mm",
            "windspeed_10m_max": "km/h"
        },
        "daily": {
            "time": time,
            "temperature_2m_max": temp_max,
            "temperature_2m_min": temp_min,
            "rain_sum": rain,
            "windspeed_10m_max": wind
        }
    })
}

async fn mount_march(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("latitude", "51.5"))
        .and(query_param("longitude", "-0.1"))
        .and(query_param("start_date", "2024-03-01"))
        .and(query_param("end_date", "2024-03-31"))
        .and(query_param(
            "daily",
            "temperature_2m_max,temperature_2m_min,rain_sum,windspeed_10m_max",
        ))
        .and(query_param("timezone", "Europe/London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(march_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_march_point_end_to_end() {
    let server = MockServer::start().await;
    mount_march(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let points_path = dir.path().join("points.json");
    fs::write(&points_path, r#"[{"lat":51.5,"lng":-0.1,"month":"march"}]"#).unwrap();

    let archive = OpenMeteoArchive::new(&archive_config(&server), None).unwrap();
    let report = Enricher::new(&archive)
        .run(&points_path, &points_path)
        .await
        .unwrap();

    assert_eq!(report.read, 1);
    assert_eq!(report.enriched, 1);

    let written: Value = serde_json::from_str(&fs::read_to_string(&points_path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!([{
            "lat": 51.5,
            "lng": -0.1,
            "month": "march",
            "avg_temp": "20.00",
            "avg_rain": "0.97",
            "avg_wind": "12.50"
        }])
    );
}

#[tokio::test]
async fn test_warm_cache_rerun_is_identical_and_offline() {
    let server = MockServer::start().await;
    // Second run must be served from the cache.
    mount_march(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let points_path = dir.path().join("points.json");
    fs::write(
        &points_path,
        r#"[{"name":"Greenwich","lat":51.5,"lng":-0.1,"month":"March","tags":["park"]}]"#,
    )
    .unwrap();

    let cache = ResponseCache::open(dir.path().join("cache"), ExpiryPolicy::Never).unwrap();
    let archive = OpenMeteoArchive::new(&archive_config(&server), Some(cache)).unwrap();
    let enricher = Enricher::new(&archive);

    enricher.run(&points_path, &points_path).await.unwrap();
    let first = fs::read(&points_path).unwrap();

    enricher.run(&points_path, &points_path).await.unwrap();
    let second = fs::read(&points_path).unwrap();

    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.starts_with("[\n    {\n        \"name\": \"Greenwich\","));
    assert!(text.contains("\"tags\": [\n            \"park\"\n        ],"));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_march(&server, 1).await;

    let archive = OpenMeteoArchive::new(&archive_config(&server), None).unwrap();
    let request = ArchiveRequest::new(51.5, -0.1, resolve_month("march"));
    let series = archive.daily_series(&request).await.unwrap();

    assert_eq!(series.len(), 31);
}

#[tokio::test]
async fn test_api_error_reason_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "reason": "Parameter 'start_date' is out of allowed range"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let archive = OpenMeteoArchive::new(&archive_config(&server), None).unwrap();
    let request = ArchiveRequest::new(51.5, -0.1, resolve_month("march"));
    let err = archive.daily_series(&request).await.unwrap_err();

    assert!(matches!(err, EnrichError::Api { status: 400, .. }));
    assert!(err.to_string().contains("out of allowed range"), "{err}");
}

#[tokio::test]
async fn test_failed_responses_are_not_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "reason": "bad request"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_march(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::open(dir.path(), ExpiryPolicy::Never).unwrap();
    let archive = OpenMeteoArchive::new(&archive_config(&server), Some(cache)).unwrap();
    let request = ArchiveRequest::new(51.5, -0.1, resolve_month("march"));

    assert!(archive.daily_series(&request).await.is_err());
    assert_eq!(archive.daily_series(&request).await.unwrap().len(), 31);
    assert_eq!(archive.daily_series(&request).await.unwrap().len(), 31);
}
