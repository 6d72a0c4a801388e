//! Observability hook chain.
//!
//! A [`Hook`] wraps the decision call middleware-style: `hooks = [A, B]`
//! composes as `A(B(inner))`, so execution order is `A.before, B.before,
//! inner, B.after, A.after`. A hook that panics is caught and the chain
//! proceeds as if that hook had simply called `call_next` and returned its
//! result: the panicking hook is skipped, not the whole chain.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt as _;
use tracing::{debug, warn};

use crate::decision::Decision;
use crate::error::Result;
use crate::storage::StoreKind;

/// Immutable snapshot passed to every hook, built once per `limit()` call
/// (not once per retry attempt).
#[derive(Debug, Clone)]
pub struct HookContext {
    /// The caller-supplied rate limit key.
    pub key: String,
    /// The cost of this request.
    pub cost: u64,
    /// Stable algorithm id, e.g. `"token_bucket"`.
    pub algorithm_id: &'static str,
    /// Which backend is in use.
    pub store_kind: StoreKind,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The rest of the chain. Callable more than once: if a hook panics before
/// calling it, it is invoked directly in the hook's place.
pub type CallNext<'a> = Arc<dyn Fn() -> BoxFuture<'a, Result<Decision>> + Send + Sync + 'a>;

/// A single link in the observability chain around a rate limit decision.
///
/// Implementations wrap `call_next`, which resolves the rest of the chain
/// (and ultimately the real limiter call). Implement this for timing,
/// logging, or metrics emission without touching decision semantics.
pub trait Hook: Send + Sync {
    /// Wrap one decision call. `call_next` yields the decision from the rest
    /// of the chain; hooks add behavior before and/or after invoking it.
    fn on_limit<'a>(&'a self, call_next: CallNext<'a>, context: &'a HookContext) -> BoxFuture<'a, Result<Decision>>;
}

/// Compose `hooks` around `do_limit`, returning a future that runs the full
/// chain exactly once. `hooks = [A, B]` behaves as `A.on_limit(B.on_limit(do_limit))`.
pub(crate) fn build_hook_chain<'a>(
    hooks: &'a [Arc<dyn Hook>],
    do_limit: impl Fn() -> BoxFuture<'a, Result<Decision>> + Send + Sync + 'a,
    context: &'a HookContext,
) -> BoxFuture<'a, Result<Decision>> {
    let mut chain: CallNext<'a> = Arc::new(do_limit);

    for hook in hooks.iter().rev() {
        let next = Arc::clone(&chain);
        let hook = Arc::clone(hook);
        chain = Arc::new(move || -> BoxFuture<'a, Result<Decision>> {
            let next = Arc::clone(&next);
            let fallback = Arc::clone(&next);
            let hook = Arc::clone(&hook);
            Box::pin(async move {
                match AssertUnwindSafe(hook.on_limit(next, context)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_panic) => {
                        warn!(
                            key = %context.key,
                            algorithm = context.algorithm_id,
                            "hook panicked; skipping it and continuing the chain"
                        );
                        fallback().await
                    }
                }
            })
        });
    }

    Box::pin(async move {
        debug!(key = %context.key, algorithm = context.algorithm_id, "running hook chain");
        chain().await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Recorder {
        label: &'static str,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Hook for Recorder {
        fn on_limit<'a>(&'a self, call_next: CallNext<'a>, context: &'a HookContext) -> BoxFuture<'a, Result<Decision>> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.label);
                let result = call_next().await;
                self.order.lock().unwrap().push(self.label);
                let _ = &context.key;
                result
            })
        }
    }

    struct AlwaysPanics {
        label: &'static str,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Hook for AlwaysPanics {
        fn on_limit<'a>(&'a self, _call_next: CallNext<'a>, _context: &'a HookContext) -> BoxFuture<'a, Result<Decision>> {
            self.order.lock().unwrap().push(self.label);
            Box::pin(async move { panic!("{} always panics", self.label) })
        }
    }

    fn context() -> HookContext {
        HookContext {
            key: "user:1".into(),
            cost: 1,
            algorithm_id: "token_bucket",
            store_kind: StoreKind::Memory,
        }
    }

    #[tokio::test]
    async fn chain_runs_in_nesting_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = Arc::new(Recorder { label: "A", order: order.clone() });
        let b = Arc::new(Recorder { label: "B", order: order.clone() });
        let hooks: Vec<Arc<dyn Hook>> = vec![a, b];
        let ctx = context();

        let calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = calls.clone();
        let decision = build_hook_chain(
            &hooks,
            move || -> BoxFuture<'_, Result<Decision>> {
                let inner_calls = inner_calls.clone();
                Box::pin(async move {
                    inner_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Decision::allowed(10, 9, Duration::from_secs(1)))
                })
            },
            &ctx,
        )
        .await
        .unwrap();

        assert!(decision.is_allowed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "B", "A"]);
    }

    #[tokio::test]
    async fn empty_chain_calls_inner_directly() {
        let hooks: Vec<Arc<dyn Hook>> = vec![];
        let ctx = context();

        let decision = build_hook_chain(
            &hooks,
            || -> BoxFuture<'_, Result<Decision>> {
                Box::pin(async move { Ok(Decision::allowed(10, 9, Duration::from_secs(1))) })
            },
            &ctx,
        )
        .await
        .unwrap();

        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn panicking_hook_is_skipped_and_chain_continues() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let failing = Arc::new(AlwaysPanics { label: "failing", order: order.clone() });
        let working = Arc::new(Recorder { label: "working", order: order.clone() });
        let hooks: Vec<Arc<dyn Hook>> = vec![failing, working];
        let ctx = context();
        let inner_order = order.clone();

        let decision = build_hook_chain(
            &hooks,
            move || -> BoxFuture<'_, Result<Decision>> {
                let order = inner_order.clone();
                Box::pin(async move {
                    order.lock().unwrap().push("inner");
                    Ok(Decision::allowed(10, 9, Duration::from_secs(1)))
                })
            },
            &ctx,
        )
        .await
        .unwrap();

        assert!(decision.is_allowed());
        assert_eq!(*order.lock().unwrap(), vec!["failing", "working", "inner", "working"]);
    }
}
