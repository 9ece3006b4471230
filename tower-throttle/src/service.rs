use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use http::Request;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use throttle_limit::Reason;

use crate::BucketKind;
use crate::LimiterSlot;
use crate::ThrottleError;

/// Request extension left by [`AdmissionService`] for the handler it admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    /// Level of the bucket right after this admission.
    pub level: u64,
}

#[derive(Clone, Debug)]
struct AdmissionMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
}

/// Runs one admission check per request against the limiter held in a
/// [`LimiterSlot`].
///
/// Admitted requests reach the inner service carrying an [`Admitted`]
/// extension. Rejections never reach it and fail with a boxed
/// [`ThrottleError`].
#[derive(Clone, Debug)]
pub struct AdmissionService<S> {
    inner: S,
    slot: Arc<LimiterSlot>,
    kind: BucketKind,
    instruments: AdmissionMetrics,
}

pin_project! {
    /// Either the inner service future or an immediate rejection.
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F> {
        Called {
            #[pin]
            inner: F,
        },
        Rejected {
            error: Option<ThrottleError>,
        },
    }
}

impl<F, T> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, BoxError>>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Called { inner } => inner.poll(cx),
            ResponseFutureProj::Rejected { error } => {
                let error = error
                    .take()
                    .expect("ResponseFuture polled after completion");
                Poll::Ready(Err(Box::new(error)))
            }
        }
    }
}

impl<S, B> Service<Request<B>> for AdmissionService<S>
where
    S: Service<Request<B>, Error = BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let attributes = [KeyValue::new("bucket", self.kind.as_str())];

        let Some(limiter) = self.slot.load() else {
            debug!(bucket = %self.kind, "request denied, bucket not configured");
            self.instruments.rejected.add(1, &attributes);
            return ResponseFuture::Rejected {
                error: Some(ThrottleError::NotConfigured { kind: self.kind }),
            };
        };

        match limiter.process() {
            ControlFlow::Continue(level) => {
                debug!(bucket = %self.kind, level, "request granted");
                self.instruments.admitted.add(1, &attributes);
                req.extensions_mut().insert(Admitted { level });
                ResponseFuture::Called {
                    inner: self.inner.call(req),
                }
            }
            ControlFlow::Break(Reason::Overloaded { level, retry_after }) => {
                debug!(bucket = %self.kind, level, ?retry_after, "request throttled");
                self.instruments.rejected.add(1, &attributes);
                ResponseFuture::Rejected {
                    error: Some(ThrottleError::RateLimited {
                        kind: self.kind,
                        level,
                        retry_after,
                    }),
                }
            }
        }
    }
}

impl<S> AdmissionService<S> {
    pub fn new(inner: S, slot: Arc<LimiterSlot>, kind: BucketKind) -> Self {
        let meter = global::meter("admission_service");
        let instruments = AdmissionMetrics {
            admitted: meter.u64_counter("admitted").build(),
            rejected: meter.u64_counter("rejected").build(),
        };

        Self {
            inner,
            slot,
            kind,
            instruments,
        }
    }
}
