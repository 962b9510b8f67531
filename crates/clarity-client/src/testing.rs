//! Mock portal helpers shared by the unit tests

use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clarity_auth::Session;
use tokio::net::TcpListener;

use crate::client::ClarityClient;

pub const SUBJECT_ID: &str = "subj-123";

/// Bearer token whose claims name [`SUBJECT_ID`].
pub fn token() -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"subjectId":"{SUBJECT_ID}"}}"#))
    )
}

/// Client with a ready-made session pointed at `base_url`.
pub fn client(base_url: &str) -> ClarityClient {
    ClarityClient::new(reqwest::Client::new(), base_url, Session::new(token(), "XYZ"))
}

pub fn subject_info_json(unit: &str) -> serde_json::Value {
    serde_json::json!({
        "email": "pat@example.com",
        "first_name": "Pat",
        "last_name": "Doe",
        "glucose_unit": unit,
        "locale": "en-US",
        "country": "US",
    })
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
