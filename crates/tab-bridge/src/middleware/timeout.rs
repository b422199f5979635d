//! Hard wall-clock bound per HTTP request.
//!
//! The bound for a route is its reply timeout plus `grace_ms`, so the
//! Correlator's own 504 normally wins and this layer only catches stalls.

use crate::domain::config::TimeoutConfig;
use crate::domain::error::ApiError;
use crate::router::route_action;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

/// Timeout layer
#[derive(Clone)]
pub struct TimeoutLayer {
    config: Arc<TimeoutConfig>,
}

impl TimeoutLayer {
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    config: Arc<TimeoutConfig>,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let bound = bound_for_request(&req, &self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(bound) = bound else {
                return inner.call(req).await;
            };

            match timeout(bound, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(bound_ms = bound.as_millis(), "Request exceeded hard bound");
                    Ok(ApiError::timeout().into_response())
                }
            }
        })
    }
}

/// Bound for a request, or `None` for routes that never wait on the browser.
fn bound_for_request<B>(req: &Request<B>, config: &TimeoutConfig) -> Option<Duration> {
    route_action(req.method(), req.uri().path()).map(|action| config.http_bound(action))
}
