/// HTTP client tests against an in-process `tiny_http` backend.
///
/// Each test scripts the backend's responses in order and inspects the
/// request URLs the client actually sent.
use std::sync::mpsc::{self, Receiver};
use std::thread;

use serde_json::json;
use tiny_http::{Header, Response, Server, StatusCode};

use spendboard::api::http::HttpApi;
use spendboard::api::{ApiError, DashboardApi};
use spendboard::filter::{FilterField, FilterOptions, FilterState};

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

struct MockBackend {
    base_url: String,
    urls: Receiver<String>,
}

/// Serve `responses` in order, one per request, then stop.
fn mock_backend(responses: Vec<(u16, Vec<u8>)>) -> MockBackend {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok(request) = server.recv() else {
                return;
            };
            let _ = tx.send(request.url().to_string());
            let response = Response::from_data(body)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json; charset=utf-8").unwrap(),
                )
                .with_status_code(StatusCode(status));
            let _ = request.respond(response);
        }
    });

    MockBackend {
        base_url: format!("http://{addr}"),
        urls: rx,
    }
}

fn json_body(value: serde_json::Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[test]
fn fetches_and_decodes_options() {
    let backend = mock_backend(vec![(
        200,
        json_body(json!({
            "success": true,
            "options": {
                "agents": ["奇异果"],
                "targetings": ["A", "B"],
                "benefits": null,
                "dates": ["2024-03-01", "2024-03-02"]
            }
        })),
    )]);
    let api = HttpApi::new(&backend.base_url, None);

    let options = api.fetch_options().unwrap();

    assert_eq!(options.agents, vec!["奇异果"]);
    assert_eq!(options.targetings, vec!["A", "B"]);
    assert!(options.benefits.is_empty());
    assert_eq!(backend.urls.recv().unwrap(), "/api/options");
}

#[test]
fn non_json_body_is_malformed() {
    let backend = mock_backend(vec![(200, b"<html>oops</html>".to_vec())]);
    let api = HttpApi::new(&backend.base_url, None);

    let err = api.fetch_options().unwrap_err();

    assert!(matches!(err, ApiError::Malformed(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[test]
fn statistics_query_has_every_parameter_in_order() {
    let backend = mock_backend(vec![(200, json_body(json!({ "success": true, "total_spend": 1.0 })))]);
    let api = HttpApi::new(&backend.base_url, None);

    let mut state = FilterState::new();
    state.initialize_from_options(&FilterOptions {
        dates: vec!["2024-03-01".into(), "2024-03-31".into()],
        ..FilterOptions::default()
    });
    state.update_field(FilterField::BiddingMethod, "OCPC");
    state.set_targeting(["A", "B"]);

    let result = api.fetch_statistics(&state.to_query_params()).unwrap();
    assert_eq!(result.get("total_spend"), Some(&json!(1.0)));

    let url = backend.urls.recv().unwrap();
    let (path, query) = url.split_once('?').unwrap();
    assert_eq!(path, "/api/statistics");

    let names: Vec<&str> = query
        .split('&')
        .map(|pair| pair.split_once('=').map_or(pair, |(name, _)| name))
        .collect();
    assert_eq!(
        names,
        vec![
            "date_from",
            "date_to",
            "agent",
            "bidding_method",
            "targeting",
            "resource",
            "material",
            "benefit"
        ]
    );
    assert!(query.contains("date_from=2024-03-01"));
    assert!(query.contains("agent=all"));
    assert!(query.contains("bidding_method=OCPC"));
    assert!(query.contains("targeting=A%2CB"));
}

#[test]
fn error_status_with_envelope_is_a_rejection_with_message() {
    let backend = mock_backend(vec![(
        404,
        json_body(json!({ "success": false, "message": "no data" })),
    )]);
    let api = HttpApi::new(&backend.base_url, None);

    let err = api
        .fetch_statistics(&FilterState::new().to_query_params())
        .unwrap_err();

    assert!(
        matches!(&err, ApiError::Rejected { message: Some(m) } if m == "no data"),
        "got {err:?}"
    );
    assert!(err.user_message().contains("no data"));
}

#[test]
fn success_flag_false_on_200_is_still_a_rejection() {
    let backend = mock_backend(vec![(200, json_body(json!({ "success": false })))]);
    let api = HttpApi::new(&backend.base_url, None);

    let err = api
        .fetch_statistics(&FilterState::new().to_query_params())
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { message: None }));
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_streams_body_bytes() {
    let bytes = b"PK\x03\x04 spreadsheet bytes".to_vec();
    let backend = mock_backend(vec![(200, bytes.clone())]);
    let api = HttpApi::new(&backend.base_url, None);

    let mut out = Vec::new();
    let written = api.download_export(&mut out).unwrap();

    assert_eq!(written, bytes.len() as u64);
    assert_eq!(out, bytes);
    assert_eq!(backend.urls.recv().unwrap(), "/api/export");
}

#[test]
fn failed_export_surfaces_server_message() {
    let backend = mock_backend(vec![(
        400,
        json_body(json!({ "success": false, "message": "没有可导出的数据" })),
    )]);
    let api = HttpApi::new(&backend.base_url, None);

    let mut out = Vec::new();
    let err = api.download_export(&mut out).unwrap_err();

    assert!(out.is_empty());
    assert!(err.user_message().contains("没有可导出的数据"));
}
