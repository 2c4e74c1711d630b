//! Shared helpers for the HTTP integration tests

use std::path::PathBuf;
use std::time::Duration;
use axum::body::{Body, Bytes};
use axum::http::{self, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use stylepins::api::{self, ApiContext};
use stylepins::config::{AppConfig, ServerConfig};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub router: Router,
    pub ctx: ApiContext,
    pub app_config: AppConfig,
    // removed on drop
    pub dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| panic!("response is not JSON: {}", String::from_utf8_lossy(&self.body)))
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

pub async fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let app_config = AppConfig::new(dir.path().to_str().unwrap()).unwrap();
    let server_config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        session_ttl: Duration::from_secs(3600),
        max_upload_bytes: 1024 * 1024,
    };
    let ctx = ApiContext::connect(&app_config, server_config).await.unwrap();
    let router = api::router(ctx.clone());
    TestApp { router, ctx, app_config, dir }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(http::Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(&self, method: http::Method, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(http::Method::DELETE).uri(uri);
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn login(&self) -> String {
        let response = self.send_json(http::Method::POST, "/api/auth/login", None, json!({ "password": ADMIN_PASSWORD })).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text());
        response.json()["token"].as_str().unwrap().to_string()
    }

    pub async fn create_category(&self, token: &str, name: &str, parent_id: Option<&str>) -> String {
        let response = self.send_json(
            http::Method::POST,
            "/api/categories",
            Some(token),
            json!({ "name": name, "parentId": parent_id }),
        ).await;
        assert_eq!(response.status, StatusCode::CREATED, "failed to create category: {}", response.text());
        response.json()["id"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, token: Option<&str>, form: &MultipartForm) -> TestResponse {
        let (content_type, body) = form.encode();
        let mut builder = Request::builder()
            .method(http::Method::POST)
            .uri("/api/images")
            .header(http::header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Uploads a small image and returns the created record.
    pub async fn upload_image(&self, token: &str, title: &str, category_id: &str) -> Value {
        let form = MultipartForm::new()
            .file("file", &format!("{}.png", title), b"\x89PNG fake")
            .text("title", title)
            .text("categoryId", category_id);
        let response = self.upload(Some(token), &form).await;
        assert_eq!(response.status, StatusCode::CREATED, "upload failed: {}", response.text());
        response.json()
    }

    pub fn uploaded_files(&self) -> Vec<PathBuf> {
        let images_dir = self.ctx.assets.images_dir();
        match std::fs::read_dir(images_dir) {
            Ok(entries) => entries.map(|x| x.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn image_count(&self) -> usize {
        self.ctx.db.read().await.get_image_count()
    }
}

// Function to generate a random boundary string
pub fn generate_boundary() -> String {
    format!("----WebKitFormBoundary{}", Uuid::new_v4().simple())
}

enum Part {
    Text { name: String, value: String },
    File { name: String, filename: String, data: Vec<u8> },
}

#[derive(Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text { name: name.to_string(), value: value.to_string() });
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.parts.push(Part::File { name: name.to_string(), filename: filename.to_string(), data: data.to_vec() });
        self
    }

    pub fn encode(&self) -> (String, Vec<u8>) {
        let boundary = generate_boundary();
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File { name, filename, data } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n", name, filename).as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        (format!("multipart/form-data; boundary={}", boundary), body)
    }
}
