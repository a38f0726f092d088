#![allow(dead_code)]

pub mod fixtures {
    use serde_json::{json, Value};
    use std::path::{Path, PathBuf};

    /// Pet Store document used across the integration suites.
    ///
    /// `Pet.owner.pets` points back at `Pet`, so full expansion has to cut the
    /// cycle.
    pub fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {
                "title": "Pet Store",
                "version": "1.0.0",
                "description": "Sample pets API"
            },
            "servers": [{
                "url": "https://{env}.petstore.test/v1/",
                "variables": {"env": {"default": "api", "enum": ["api", "staging"]}}
            }],
            "tags": [
                {"name": "pets", "description": "Everything about pets"},
                {"name": "store"}
            ],
            "security": [{"api_key": []}],
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "summary": "List pets",
                        "tags": ["pets"],
                        "parameters": [
                            {"name": "limit", "in": "query", "schema": {"type": "integer"}},
                            {"name": "tag", "in": "query", "schema": {"type": "array", "items": {"type": "string"}}}
                        ],
                        "responses": {
                            "200": {
                                "description": "pets",
                                "content": {"application/json": {"schema": {
                                    "type": "array",
                                    "items": {"$ref": "#/components/schemas/Pet"}
                                }}}
                            }
                        }
                    },
                    "post": {
                        "operationId": "addPet",
                        "tags": ["pets"],
                        "requestBody": {
                            "required": true,
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/NewPet"}}}
                        },
                        "responses": {"201": {"description": "created"}}
                    }
                },
                "/pets/{petId}": {
                    "parameters": [{
                        "name": "petId",
                        "in": "path",
                        "required": true,
                        "schema": {"type": "integer", "format": "int64"}
                    }],
                    "get": {
                        "operationId": "getPetById",
                        "tags": ["pets"],
                        "responses": {
                            "200": {
                                "description": "a pet",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                            },
                            "404": {
                                "description": "missing",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}
                            }
                        }
                    },
                    "delete": {
                        "tags": ["pets"],
                        "security": [],
                        "responses": {"204": {"description": "deleted"}}
                    }
                },
                "/health": {
                    "get": {
                        "operationId": "health",
                        "responses": {"200": {
                            "description": "ok",
                            "content": {"text/plain": {"schema": {"type": "string"}}}
                        }}
                    }
                }
            },
            "components": {
                "securitySchemes": {
                    "api_key": {"type": "apiKey", "name": "X-API-Key", "in": "header"}
                },
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "required": ["id", "name"],
                        "properties": {
                            "id": {"type": "integer", "format": "int64"},
                            "name": {"type": "string", "example": "doggie"},
                            "status": {"type": "string", "enum": ["available", "pending", "sold"]},
                            "owner": {"$ref": "#/components/schemas/Owner"}
                        }
                    },
                    "NewPet": {"allOf": [{"$ref": "#/components/schemas/Pet"}]},
                    "Owner": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "pets": {"type": "array", "items": {"$ref": "#/components/schemas/Pet"}}
                        }
                    },
                    "Error": {
                        "type": "object",
                        "properties": {
                            "code": {"type": "integer"},
                            "message": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    /// Write `content` to `dir/name` and return the path.
    pub fn write_spec(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Minimal document with the given title.
    pub fn titled(title: &str) -> String {
        json!({
            "openapi": "3.1.0",
            "info": {"title": title, "version": "1"},
            "paths": {"/ping": {"get": {"operationId": "ping"}}}
        })
        .to_string()
    }
}

pub mod mock_server {
    use std::io::Cursor;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// A request as seen by the mock upstream.
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: String,
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Recorded {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Debug, Clone)]
    pub struct MockResponse {
        pub status: u16,
        pub content_type: Option<String>,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl MockResponse {
        pub fn json(status: u16, body: serde_json::Value) -> Self {
            MockResponse {
                status,
                content_type: Some("application/json".to_string()),
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        pub fn text(status: u16, body: &str) -> Self {
            MockResponse {
                status,
                content_type: Some("text/plain".to_string()),
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.push((name.to_string(), value.to_string()));
            self
        }
    }

    /// Single-threaded `tiny_http` upstream on an ephemeral port.
    ///
    /// Every request is recorded and answered by the handler. Stopped on drop.
    pub struct MockServer {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<Recorded>>>,
        stopping: Arc<AtomicBool>,
        server: Arc<tiny_http::Server>,
        thread: Option<JoinHandle<()>>,
    }

    impl MockServer {
        pub fn start<F>(handler: F) -> Self
        where
            F: Fn(&Recorded) -> MockResponse + Send + 'static,
        {
            let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
            let addr = server.server_addr().to_ip().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let stopping = Arc::new(AtomicBool::new(false));

            let thread = {
                let server = Arc::clone(&server);
                let requests = Arc::clone(&requests);
                let stopping = Arc::clone(&stopping);
                thread::spawn(move || {
                    while !stopping.load(Ordering::SeqCst) {
                        let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                            Ok(Some(request)) => request,
                            _ => continue,
                        };
                        let mut body = String::new();
                        let _ = request.as_reader().read_to_string(&mut body);
                        let recorded = Recorded {
                            method: request.method().as_str().to_string(),
                            url: request.url().to_string(),
                            headers: request
                                .headers()
                                .iter()
                                .map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string()))
                                .collect(),
                            body,
                        };
                        let reply = handler(&recorded);
                        requests.lock().unwrap().push(recorded);

                        let mut headers = Vec::new();
                        if let Some(ct) = &reply.content_type {
                            headers.push(tiny_http::Header::from_bytes("Content-Type", ct.as_bytes()).unwrap());
                        }
                        for (name, value) in &reply.headers {
                            headers.push(tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
                        }
                        let data = reply.body.into_bytes();
                        let len = data.len();
                        let response = tiny_http::Response::new(
                            tiny_http::StatusCode(reply.status),
                            headers,
                            Cursor::new(data),
                            Some(len),
                            None,
                        );
                        let _ = request.respond(response);
                    }
                })
            };

            MockServer {
                addr,
                requests,
                stopping,
                server,
                thread: Some(thread),
            }
        }

        pub fn addr(&self) -> SocketAddr {
            self.addr
        }

        pub fn base_url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url(), path)
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Drop for MockServer {
        fn drop(&mut self) {
            self.stopping.store(true, Ordering::SeqCst);
            self.server.unblock();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
