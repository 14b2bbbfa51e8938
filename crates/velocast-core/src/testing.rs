//! Offline [`HttpClient`] used by tests and the CLI's mock mode.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use crate::http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
struct Route {
    method: HttpMethod,
    url_fragment: String,
    response: HttpResponse,
}

/// Replays scripted outcomes and records every request it receives.
///
/// Scripted outcomes are consumed in order. Once the script is empty, the
/// first route whose method matches and whose fragment appears in the URL
/// answers; anything else gets a 404.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Shorthand for a script of plain status codes with empty JSON bodies.
    pub fn statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|status| Ok(HttpResponse::new(*status, "{}")))
                .collect(),
        )
    }

    /// Answer `method` requests whose URL contains `url_fragment`.
    pub fn with_route(
        mut self,
        method: HttpMethod,
        url_fragment: impl Into<String>,
        response: HttpResponse,
    ) -> Self {
        self.routes.push(Route {
            method,
            url_fragment: url_fragment.into(),
            response,
        });
        self
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// URLs requested so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.recorded_requests()
            .into_iter()
            .map(|request| request.url)
            .collect()
    }

    fn respond(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        if let Some(scripted) = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return scripted;
        }

        self.routes
            .iter()
            .find(|route| route.method == request.method && request.url.contains(&route.url_fragment))
            .map(|route| Ok(route.response.clone()))
            .unwrap_or_else(|| {
                Ok(HttpResponse::new(
                    404,
                    format!(r#"{{"errorMessages":["no scripted response for {} {}"]}}"#, request.method, request.url),
                ))
            })
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self.respond(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Box::pin(async move { response })
    }
}
