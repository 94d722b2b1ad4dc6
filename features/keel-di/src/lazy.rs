use std::{
    any::type_name,
    fmt::Debug,
    marker::PhantomData,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    task::{Context, Poll},
};

use futures::{future::poll_fn, FutureExt};
use futures_channel::oneshot;

use crate::{
    errors::ResolveError,
    types::{Injectable, Instance, Token},
};

pub(crate) type LazySender = oneshot::Sender<Result<Instance, ResolveError>>;
type LazyReceiver = oneshot::Receiver<Result<Instance, ResolveError>>;

/// Untyped handle to an instance which is resolved after the dependent was constructed
#[derive(Clone)]
pub(crate) struct LazyInstance(Arc<LazyInner>);
struct LazyInner {
    token: Token,
    once: OnceLock<Result<Instance, ResolveError>>,
    rx: Mutex<LazyReceiver>,
}
impl Debug for LazyInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyInstance")
            .field("token", &self.0.token)
            .field("resolved", &self.0.once.get().is_some())
            .finish()
    }
}
impl LazyInstance {
    /// Creates an unresolved handle and the sender which completes it
    pub(crate) fn channel(token: Token) -> (LazyInstance, LazySender) {
        let (tx, rx) = oneshot::channel();
        let lazy = LazyInstance(Arc::new(LazyInner {
            token,
            once: OnceLock::new(),
            rx: Mutex::new(rx),
        }));
        (lazy, tx)
    }

    /// Creates an already resolved handle
    pub(crate) fn resolved(token: Token, instance: Instance) -> LazyInstance {
        let (lazy, tx) = Self::channel(token);
        let _ = lazy.0.once.set(Ok(instance));
        drop(tx);
        lazy
    }

    pub(crate) fn try_get(&self) -> Option<&Result<Instance, ResolveError>> {
        if let Some(result) = self.0.once.get() {
            return Some(result);
        }

        // Lock receiver, so result is not taken out while we check
        let mut rx = self.0.rx.lock().unwrap_or_else(PoisonError::into_inner);

        // Double check once - it might have been set while we waited for the lock
        if let Some(result) = self.0.once.get() {
            return Some(result);
        }

        let result = match rx.try_recv() {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(oneshot::Canceled) => Err(self.abandoned()),
        };
        Some(self.0.once.get_or_init(|| result))
    }

    pub(crate) async fn wait(&self) -> &Result<Instance, ResolveError> {
        let this = self;
        poll_fn(move |cx| this.poll_result(cx)).await
    }

    fn poll_result(&self, cx: &mut Context<'_>) -> Poll<&Result<Instance, ResolveError>> {
        // Lock receiver, so result is not taken out while we check
        let mut rx = self.0.rx.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(result) = self.0.once.get() {
            return Poll::Ready(result);
        }

        match rx.poll_unpin(cx) {
            Poll::Ready(received) => {
                let result = received.unwrap_or_else(|oneshot::Canceled| Err(self.abandoned()));
                Poll::Ready(self.0.once.get_or_init(|| result))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn abandoned(&self) -> ResolveError {
        ResolveError::Abandoned {
            token: self.0.token.clone(),
        }
    }

    pub(crate) fn token(&self) -> &Token {
        &self.0.token
    }
}

/// Lazily resolved dependency
///
/// Handed to providers which declared the dependency with
/// [`Dependency::forward`](crate::Dependency::forward). The instance becomes
/// available once the resolution which constructed the dependent completed and
/// the target was resolved. Do not wait on it inside a constructor or factory.
pub struct Lazy<T: Injectable> {
    inner: LazyInstance,
    _marker: PhantomData<fn() -> T>,
}
impl<T: Injectable> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}
impl<T: Injectable + Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(instance) => f.debug_tuple("Lazy").field(&instance).finish(),
            None => f.debug_tuple("Lazy").field(&"<unresolved>").finish(),
        }
    }
}
impl<T: Injectable> Lazy<T> {
    pub(crate) fn new(inner: LazyInstance) -> Self {
        Lazy {
            inner,
            _marker: PhantomData,
        }
    }

    /// Try to access the lazy dependency
    ///
    /// Returns `None` while the target is still being resolved
    pub fn try_get(&self) -> Option<Result<Arc<T>, ResolveError>> {
        self.inner.try_get().map(Self::downcast)
    }

    /// Accesses the lazy dependency if it resolved successfully
    pub fn get(&self) -> Option<Arc<T>> {
        self.try_get().and_then(Result::ok)
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.try_get().is_some()
    }

    /// Resolves as soon as the target is available
    pub async fn wait(&self) -> Result<Arc<T>, ResolveError> {
        Self::downcast(self.inner.wait().await)
    }

    pub fn token(&self) -> &Token {
        self.inner.token()
    }

    fn downcast(result: &Result<Instance, ResolveError>) -> Result<Arc<T>, ResolveError> {
        match result {
            Ok(instance) => instance
                .downcast()
                .map_err(|actual| ResolveError::TypeMismatch {
                    required: type_name::<T>(),
                    actual,
                }),
            Err(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Lazy, LazyInstance};
    use crate::{
        errors::ResolveError,
        types::{Instance, Token},
    };

    #[test]
    fn it_is_unresolved_until_sent() {
        let (inner, tx) = LazyInstance::channel(Token::of::<u32>());
        let lazy = Lazy::<u32>::new(inner);

        assert!(!lazy.is_resolved());
        assert!(lazy.get().is_none());

        tx.send(Ok(Instance::new(7_u32))).unwrap();

        assert_eq!(*lazy.get().unwrap(), 7);
        assert_eq!(*lazy.clone().get().unwrap(), 7);
    }

    #[test]
    fn it_reports_abandoned_when_sender_is_dropped() {
        let (inner, tx) = LazyInstance::channel(Token::of::<u32>());
        let lazy = Lazy::<u32>::new(inner);
        drop(tx);

        assert!(matches!(
            lazy.try_get(),
            Some(Err(ResolveError::Abandoned { .. }))
        ));
    }

    #[test]
    fn it_reports_type_mismatches() {
        let lazy = Lazy::<String>::new(LazyInstance::resolved(
            Token::of::<u32>(),
            Instance::new(1_u32),
        ));

        assert!(matches!(
            lazy.try_get(),
            Some(Err(ResolveError::TypeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn wait_resolves_once_sent() {
        let (inner, tx) = LazyInstance::channel(Token::of::<u32>());
        let lazy = Lazy::<u32>::new(inner);

        let waiter = tokio::spawn({
            let lazy = lazy.clone();
            async move { lazy.wait().await.map(|value| *value) }
        });
        tokio::task::yield_now().await;
        tx.send(Ok(Instance::new(3_u32))).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), 3);
    }
}
