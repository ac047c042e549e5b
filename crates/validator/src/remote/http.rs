//! `reqwest`-backed transport.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use url::Url;

use super::{RemoteTransport, Request, Response};
use crate::error::TransportError;

/// Sends requests with a shared [`reqwest::Client`]. GET and HEAD carry
/// parameters in the query string, other methods as a form body.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport reusing an existing client (timeouts, proxies, TLS).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl RemoteTransport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        let client = self.client.clone();
        async move {
            let failed = |reason: String| TransportError::Request {
                url: request.url.clone(),
                reason,
            };
            let mut url = Url::parse(&request.url).map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;
            let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| failed(e.to_string()))?;

            let builder = if method == Method::GET || method == Method::HEAD {
                if !request.params.is_empty() {
                    url.query_pairs_mut().extend_pairs(&request.params);
                }
                client.request(method, url)
            } else {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&request.params)
                    .finish();
                client
                    .request(method, url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body)
            };

            let response = builder.send().await.map_err(|e| failed(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| failed(e.to_string()))?;
            tracing::trace!(url = %request.url, status, "remote response");
            Ok(Response { status, body })
        }
        .boxed()
    }
}
