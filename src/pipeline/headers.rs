//! Request header logging and response header injection.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderName, HeaderValue};
use tower::{Layer, Service};
use tracing::info;

use crate::config::{ConfigError, HeaderConfig};

/// Layer that logs incoming request headers and adds a fixed header to
/// every response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaderLayer {
    header: Option<(HeaderName, HeaderValue)>,
}

impl ResponseHeaderLayer {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            header: Some((name, value)),
        }
    }

    /// A pass-through layer.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HeaderConfig) -> Result<Self, ConfigError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let name = HeaderName::from_bytes(config.response_key.as_bytes()).map_err(|e| {
            ConfigError::Invalid(format!("response header name '{}': {e}", config.response_key))
        })?;
        let value = HeaderValue::from_str(&config.response_value)
            .map_err(|e| ConfigError::Invalid(format!("response header value: {e}")))?;
        Ok(Self::new(name, value))
    }
}

impl<S> Layer<S> for ResponseHeaderLayer {
    type Service = ResponseHeaderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseHeaderService {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseHeaderService<S> {
    inner: S,
    header: Option<(HeaderName, HeaderValue)>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for ResponseHeaderService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let header = self.header.clone();
        if header.is_some() {
            info!(
                path = %request.uri().path(),
                headers = ?request.headers(),
                "Headers received from client"
            );
        }

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            if let Some((name, value)) = header {
                response.headers_mut().insert(name, value);
            }
            Ok(response)
        })
    }
}
