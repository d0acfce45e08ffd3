//! Latency sample sources
//!
//! A [`SampleSource`] owns the external side of a measurement: it opens a
//! resource (a browser tab), signals when that resource is ready, and closes
//! it again. The [`CycleRunner`](crate::runner::CycleRunner) calls the three
//! operations in strict sequence and does the timing itself, from the start
//! of [`acquire`](SampleSource::acquire) to the return of
//! [`wait_until_ready`](SampleSource::wait_until_ready).

pub mod chrome;

use async_trait::async_trait;

use crate::error::SourceError;

pub use chrome::{ChromeTabSource, PageTarget};

/// External collaborator producing one timed unit of work per resource
#[async_trait]
pub trait SampleSource: Send {
    /// Handle to an acquired resource, released exactly once
    type Handle: Send;

    /// Start acquiring a resource
    async fn acquire(&mut self) -> Result<Self::Handle, SourceError>;

    /// Wait until the resource reports ready, or fail with
    /// [`SourceError::Timeout`]
    async fn wait_until_ready(&mut self, handle: &Self::Handle) -> Result<(), SourceError>;

    /// Release a resource. May be retried by the caller on failure.
    async fn release(&mut self, handle: &Self::Handle) -> Result<(), SourceError>;
}
