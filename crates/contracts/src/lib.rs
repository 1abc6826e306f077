//! # Contracts
//!
//! Frozen interface contracts shared by the form binder, the submission
//! aggregator and the CLI. All business crates can only depend on this crate,
//! reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `ResponsePayload`: one completed survey response (ordered field -> answer)
//! - `SinkConfig`: independently optional sink sub-configs
//! - `SubmissionResult`: per-sink success or captured failure

mod error;
mod payload;
mod record;
mod result;
mod sink;
mod sink_config;

pub use error::*;
pub use payload::*;
pub use record::*;
pub use result::*;
pub use sink::*;
pub use sink_config::*;
