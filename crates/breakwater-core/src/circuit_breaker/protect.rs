//! Wrap a fallible async function so every call goes through a breaker

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::breaker::CircuitBreaker;
use super::types::CircuitBreakerError;

/// An async function bound to a circuit breaker.
///
/// # Example
/// ```ignore
/// use breakwater_core::circuit_breaker::{protect, CircuitBreaker};
/// use std::sync::Arc;
///
/// let breaker = Arc::new(CircuitBreaker::new("inventory"));
/// let lookup = protect(breaker, |sku: String| async move { inventory::fetch(&sku).await });
/// let item = lookup.call("sku-42".to_string()).await?;
/// ```
pub struct Protected<F> {
    breaker: Arc<CircuitBreaker>,
    inner: F,
}

impl<F: Clone> Clone for Protected<F> {
    fn clone(&self) -> Self {
        Self {
            breaker: Arc::clone(&self.breaker),
            inner: self.inner.clone(),
        }
    }
}

/// Bind `f` to `breaker`
pub fn protect<F>(breaker: Arc<CircuitBreaker>, f: F) -> Protected<F> {
    Protected { breaker, inner: f }
}

impl<F> Protected<F> {
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Invoke the wrapped function under the breaker
    pub async fn call<A, T, E, Fut>(&self, arg: A) -> Result<T, CircuitBreakerError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: std::error::Error + 'static,
    {
        self.breaker.execute(|| (self.inner)(arg)).await
    }

    /// Owned, boxed variant of [`call`](Self::call) for spawning onto a runtime
    pub fn call_boxed<A, T, E, Fut>(&self, arg: A) -> BoxFuture<'static, Result<T, CircuitBreakerError<E>>>
    where
        F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
        A: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let this = self.clone();
        Box::pin(async move { this.call(arg).await })
    }
}
