//! Service abstractions for external services.
//!
//! Traits for external collaborators (the push provider, compensation
//! actions) return boxed futures so they stay object safe and can be held
//! behind `Arc<dyn Trait>`.

use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;
