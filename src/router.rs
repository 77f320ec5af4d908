//! Path-keyed dispatch of request bodies to endpoint handlers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::server::RequestHandler;

/// An endpoint: request body in, JSON response body out.
pub type EndpointHandler = Box<dyn Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync>;

const JSON: &str = "application/json";

/// Maps absolute request paths to endpoint handlers.
///
/// The query string is ignored when looking up a path.
#[derive(Default)]
pub struct RequestRouter {
    endpoints: HashMap<String, EndpointHandler>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `path`, replacing any previous handler.
    pub fn register<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.endpoints.insert(path.into(), Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.endpoints.contains_key(path)
    }

    /// Produces the response for `request`. Never fails: an unknown path is
    /// a 400 and an endpoint error is a 500, both with a JSON body.
    pub fn route(&self, request: &Request) -> Response {
        let path = request.uri().absolute_path();

        let Some(endpoint) = self.endpoints.get(path.raw()) else {
            let body = json!({ "error": format!("no service for {}", path.raw()) });
            return Response::new(StatusCode::BadRequest, body.to_string(), JSON);
        };

        match endpoint(request.body()) {
            Ok(body) => Response::new(StatusCode::Ok, body, JSON),
            Err(e) => {
                tracing::error!(endpoint = path.raw(), error = %e, "endpoint failed");
                let body = json!({ "error": "internal server error" });
                Response::new(StatusCode::InternalServerError, body.to_string(), JSON)
            }
        }
    }

    /// Wraps the router as the server's request handler.
    pub fn into_handler(self) -> RequestHandler {
        let router = Arc::new(self);
        Arc::new(move |request: &Request| Ok(router.route(request)))
    }
}
