#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

impl Recorded {
    /// Decoded value of a query parameter.
    pub fn param(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Minimal stand-in for the log server, listening on an ephemeral port.
pub struct MockServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    /// `handler` gets the request path and returns status and body.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("Failed to bind mock server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("Mock server has no ip address")
            .port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let (path, query) = match request.url().split_once('?') {
                    Some((path, query)) => (path.to_string(), query.to_string()),
                    None => (request.url().to_string(), String::new()),
                };
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let entry = Recorded {
                    path,
                    query,
                    authorization: header("Authorization"),
                    accept: header("Accept"),
                };
                recorded.lock().unwrap().push(entry.clone());

                let (status, body) = handler(&entry);
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap(),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn streams_body() -> String {
    r#"{"total":3,"streams":[
        {"id":"s-web","title":"Web","description":"frontend logs","disabled":false},
        {"id":"s-jobs","title":"Jobs","description":null,"disabled":false},
        {"id":"s-old","title":"Legacy","disabled":true}
    ]}"#
    .to_string()
}

/// Search response with one message per `(id, second, text)`, in the given order.
pub fn search_body(entries: &[(&str, u32, &str)]) -> String {
    let messages: Vec<String> = entries
        .iter()
        .map(|(id, second, text)| {
            serde_json::json!({
                "index": "graylog_0",
                "message": {
                    "_id": id,
                    "timestamp": format!("2020-01-01T00:00:{:02}.000Z", second),
                    "message": text,
                    "level": "INFO",
                    "source": "web01",
                    "streams": ["s-web"],
                }
            })
            .to_string()
        })
        .collect();
    format!(r#"{{"total_results":{},"messages":[{}]}}"#, entries.len(), messages.join(","))
}
