//! wiremock-based upstream API for transport tests.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start an upstream with a JSON `GET /widgets` and an echoing `POST /echo`.
pub async fn setup_upstream() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc")
                .insert_header("x-upstream", "widgets")
                .set_body_json(json!([{ "id": 1, "name": "sprocket" }])),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/echo"))
        .respond_with(|req: &wiremock::Request| {
            ResponseTemplate::new(201).set_body_bytes(req.body.clone())
        })
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    server
}

/// Requests the upstream has received, in order.
pub async fn received(server: &MockServer) -> Vec<wiremock::Request> {
    server.received_requests().await.unwrap_or_default()
}
