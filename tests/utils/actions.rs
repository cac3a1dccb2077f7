use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::setup::TestSetup;

/// Status and parsed JSON body of a response (`Value::Null` for empty bodies)
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl HttpResponse {
    pub fn str_field(&self, field: &str) -> String {
        self.body[field]
            .as_str()
            .unwrap_or_else(|| panic!("missing field {field} in {}", self.body))
            .to_string()
    }
}

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Send a request through the router and collect the response
    pub async fn send(&self, request: Request<Body>) -> HttpResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        HttpResponse { status, body }
    }

    pub async fn post_json(&self, uri: &str, body: Value, bearer: Option<&str>) -> HttpResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> HttpResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(builder.body(Body::empty()).unwrap()).await
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn register(&self, identifier: &str, credential: &str) -> HttpResponse {
        self.post_json(
            "/register",
            json!({"identifier": identifier, "credential": credential}),
            None,
        )
        .await
    }

    pub async fn login(&self, identifier: &str, credential: &str) -> HttpResponse {
        self.post_json(
            "/login",
            json!({"identifier": identifier, "credential": credential}),
            None,
        )
        .await
    }

    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> HttpResponse {
        self.post_json(
            "/logout",
            json!({"refresh_token": refresh_token}),
            Some(access_token),
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> HttpResponse {
        self.post_json("/token/refresh", json!({"refresh_token": refresh_token}), None)
            .await
    }

    /// Register and log in, returning (access_token, refresh_token)
    pub async fn signed_in(&self, identifier: &str, credential: &str) -> (String, String) {
        assert_eq!(
            self.register(identifier, credential).await.status,
            StatusCode::CREATED
        );
        let login = self.login(identifier, credential).await;
        assert_eq!(login.status, StatusCode::OK);

        (login.str_field("access_token"), login.str_field("refresh_token"))
    }
}
