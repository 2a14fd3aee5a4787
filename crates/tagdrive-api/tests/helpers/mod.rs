//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p tagdrive-api`. Every app gets its own state
//! directory, removed when the `TestApp` is dropped.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::Value;
use tagdrive_api::setup::routes;
use tagdrive_api::AppState;
use tagdrive_core::secrets::hash_password;
use tagdrive_core::Config;
use tagdrive_services::Stores;
use tempfile::TempDir;

pub const TEST_LOGIN: &str = "user";
pub const TEST_PASSWORD: &str = "qwerty";

/// Test application: server, shared state and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Logs in with the default credentials; returns the `Cookie` header value.
    pub async fn login(&self) -> String {
        let response = self
            .server
            .post("/api/login")
            .form(&[
                ("login", TEST_LOGIN.to_string()),
                ("password", hash_password(TEST_PASSWORD)),
            ])
            .await;
        assert_eq!(response.status_code(), 200, "login failed: {}", response.text());

        let set_cookie = response.header("set-cookie");
        set_cookie
            .to_str()
            .expect("Set-Cookie isn't ASCII")
            .split(';')
            .next()
            .expect("empty Set-Cookie")
            .to_string()
    }

    /// Creates a tag and returns its id.
    pub async fn add_tag(&self, cookie: &str, name: &str) -> u64 {
        let response = self
            .server
            .post("/api/tags")
            .add_header("Cookie", cookie.to_string())
            .form(&[("name", name)])
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        response.json::<Value>()["id"]
            .as_u64()
            .expect("tag id missing")
    }

    /// Uploads one file; returns the per-file status list.
    pub async fn upload(&self, cookie: &str, filename: &str, data: Vec<u8>, tags: &str) -> Value {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_type("application/octet-stream");
        let form = MultipartForm::new()
            .add_text("tags", tags.to_string())
            .add_part("files", part);

        let response = self
            .server
            .post("/api/files")
            .add_header("Cookie", cookie.to_string())
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        response.json::<Value>()
    }

    /// `GET /api/files` as the owner with the given query parameters.
    pub async fn list_files(&self, cookie: &str, query: &[(&str, &str)]) -> Vec<Value> {
        let mut request = self
            .server
            .get("/api/files")
            .add_header("Cookie", cookie.to_string());
        for (key, value) in query {
            request = request.add_query_param(key, value);
        }
        let response = request.await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        response.json::<Vec<Value>>()
    }
}

/// Filenames of a listing, in response order.
pub fn filenames(files: &[Value]) -> Vec<String> {
    files
        .iter()
        .map(|f| f["filename"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Small PNG that the thumbnail pipeline can decode.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf
}

/// Setup test app with default configuration and local storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app, letting the caller tweak the configuration first.
pub async fn setup_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config =
        Config::with_var_folder(temp_dir.path()).expect("Failed to build test config");
    configure(&mut config);
    config.validate().expect("Invalid test config");

    let stores = Stores::open(&config)
        .await
        .expect("Failed to open stores");
    let state = Arc::new(AppState::new(config.clone(), stores));
    let app = routes::setup_routes(&config, state.clone());

    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
