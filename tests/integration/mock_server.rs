//! Mock HTTP server setup for integration tests

use intura_ai::{ClientConfig, InturaFetch};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const TEST_KEY: &str = "test-intura-key";

pub const VALIDATE_PATH: &str = "/v1/external/validate-api-key";
pub const BUILD_PATH: &str = "/v1/experiment/build/chat";
pub const TRACK_PATH: &str = "/v1/ai/track";
pub const INFERENCE_PATH: &str = "/v1/external/insert/inference";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub fn new() -> Self {
        let server = Server::new();
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Client configuration pointing at the mock server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_api_key(TEST_KEY)
            .with_base_url(&self.base_url)
    }

    /// Accept the test key.
    pub fn mock_valid_key(&mut self) -> Mock {
        self.server
            .mock("GET", VALIDATE_PATH)
            .match_header("x-api-key", TEST_KEY)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok"}"#)
            .create()
    }

    /// Validated fetch client; the returned mock must outlive the test body.
    pub fn fetch(&mut self) -> (Arc<InturaFetch>, Mock) {
        let mock = self.mock_valid_key();
        let client = InturaFetch::new(self.config()).expect("fetch client");
        (Arc::new(client), mock)
    }

    pub fn mock_json(&mut self, method: &str, path: &str, status: usize, body: &Value) -> Mock {
        self.server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create()
    }

    /// Respond to `experiment/build/chat` with `treatments`.
    pub fn mock_build(&mut self, treatments: Vec<Value>) -> Mock {
        self.mock_json("POST", BUILD_PATH, 200, &json!({ "data": treatments }))
    }

    /// Accept any reward event matching `partial`.
    pub fn mock_track(&mut self, partial: Value) -> Mock {
        self.server
            .mock("POST", TRACK_PATH)
            .match_body(Matcher::PartialJson(partial))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"tracked"}"#)
            .create()
    }
}

/// Treatment as the service returns it.
pub fn treatment(id: u64, provider: &str, module: &str, class: &str, model: &str) -> Value {
    json!({
        "treatment_id": id,
        "treatment_name": format!("arm-{}", id),
        "model_provider": provider,
        "sdk_config": { "module_path": module, "class_name": class },
        "prompt": format!("You are assistant {}", id),
        "model_configuration": { "model": model, "temperature": 0.2, "max_tokens": null },
    })
}

/// Accept the key check once, then stop listening.
///
/// Pooled mockito servers keep their port open after the guard drops, so a
/// service that disappears mid-session needs a listener of its own. Join the
/// handle before relying on the port being closed.
pub fn serve_key_check_once() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let handle = thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let body = r#"{"status":"ok"}"#;
        let _ = write!(
            stream,
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.flush();
    });
    (base_url, handle)
}
