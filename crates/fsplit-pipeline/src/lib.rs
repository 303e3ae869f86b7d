//! Ingestion pipeline.
//!
//! The control logic between the notification relay and the object
//! store: validate -> fetch -> decode -> store -> report. Everything
//! here is invocation-local; duplicate deliveries converge through
//! deterministic destination naming rather than coordination.

pub mod naming;
pub mod notification;
pub mod outcome;
pub mod pipeline;
pub mod retry;

pub use naming::frame_key;
pub use notification::{decode_notification, NotificationError, SourceDescriptor};
pub use outcome::{Outcome, PipelineError};
pub use pipeline::{FramePipeline, PipelineConfig};
pub use retry::{retry_transient, RetryConfig};
