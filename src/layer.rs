//! Tower integration: apply a shared policy to every call through a service.
//!
//! The inner service sits behind an async mutex so each attempt can wait for
//! readiness before calling; requests must be `Clone` so retries can replay
//! them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Mutex;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::error::PolicyError;
use crate::policy::Policy;

/// Wraps services so that a shared [`Policy`] guards every call.
pub struct PolicyLayer<C = ()> {
    policy: Arc<Policy<BoxError, C>>,
}

impl<C> PolicyLayer<C> {
    /// The same policy instance (and so the same circuit breaker) is shared
    /// by every service this layer wraps.
    pub fn new(policy: Arc<Policy<BoxError, C>>) -> Self {
        Self { policy }
    }
}

impl<C> Clone for PolicyLayer<C> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
        }
    }
}

impl<S, C> Layer<S> for PolicyLayer<C> {
    type Service = PolicyService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        PolicyService {
            inner: Arc::new(Mutex::new(inner)),
            policy: self.policy.clone(),
        }
    }
}

/// Service produced by [`PolicyLayer`].
pub struct PolicyService<S, C = ()> {
    inner: Arc<Mutex<S>>,
    policy: Arc<Policy<BoxError, C>>,
}

impl<S, C, Req> Service<Req> for PolicyService<S, C>
where
    Req: Clone + Send + Sync + 'static,
    S: Service<Req, Error = BoxError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    C: Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let result = policy
                .execute_async(|| {
                    let inner = inner.clone();
                    let req = req.clone();
                    async move {
                        let mut guard = inner.lock().await;
                        ServiceExt::ready(&mut *guard).await?.call(req).await
                    }
                })
                .await;

            match result {
                Ok(resp) => Ok(resp),
                Err(PolicyError::Inner(e)) => Err(e),
                Err(PolicyError::Broken(b)) => Err(Box::new(b) as BoxError),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokenCircuitError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::service_fn;

    fn transient_only() -> impl Fn(&BoxError) -> bool + Send + Sync {
        |e: &BoxError| e.to_string().contains("transient")
    }

    #[tokio::test]
    async fn test_layer_retries_until_inner_succeeds() {
        let policy = Arc::new(
            Policy::builder()
                .on(transient_only())
                .retry(5)
                .after_waiting(Duration::from_millis(1))
                .build()
                .unwrap(),
        );

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let svc = service_fn(move |()| {
            let n = count_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err::<&str, BoxError>("transient failure".into())
                } else {
                    Ok("ok")
                }
            }
        });

        let mut svc = PolicyLayer::new(policy).layer(svc);
        let out = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap();

        assert_eq!(out, "ok");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_layer_passes_unhandled_errors_through() {
        let policy = Arc::new(
            Policy::builder()
                .on(transient_only())
                .retry(5)
                .build()
                .unwrap(),
        );

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let svc = service_fn(move |()| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), BoxError>("schema mismatch".into()) }
        });

        let mut svc = PolicyLayer::new(policy).layer(svc);
        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "schema mismatch");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_layer_fails_fast_once_circuit_opens() {
        let policy = Arc::new(
            Policy::builder()
                .on(transient_only())
                .break_circuit(2, Duration::from_secs(60))
                .build()
                .unwrap(),
        );

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let svc = service_fn(move |()| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), BoxError>("transient failure".into()) }
        });

        let mut svc = PolicyLayer::new(policy).layer(svc);
        for _ in 0..2 {
            let _ = ServiceExt::ready(&mut svc).await.unwrap().call(()).await;
        }

        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<BrokenCircuitError>().is_some());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
