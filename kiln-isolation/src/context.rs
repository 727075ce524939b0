//! The code domain owned by the running action
//!
//! The context domain is task-local. [`with_context_domain`] installs a
//! domain for the duration of a future and the previous one is back in place
//! once the future completes, returns an error, or panics.

use std::future::Future;
use std::sync::Arc;

use crate::domain::CodeDomain;

tokio::task_local! {
    static CONTEXT_DOMAIN: Arc<CodeDomain>;
}

/// Run `future` with `domain` as the context domain
pub async fn with_context_domain<F, T>(domain: Arc<CodeDomain>, future: F) -> T
where
    F: Future<Output = T>,
{
    CONTEXT_DOMAIN.scope(domain, future).await
}

/// The current context domain, if one is installed
pub fn context_domain() -> Option<Arc<CodeDomain>> {
    CONTEXT_DOMAIN.try_with(|domain| domain.clone()).ok()
}
