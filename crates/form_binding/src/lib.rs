//! # Form Binding
//!
//! Client-side glue between a live survey form and the submission pipeline.
//!
//! 负责：
//! - `FormInstance`: named event channels of one rendering session
//! - `EventBinder`: built-in + caller-supplied handlers, exact-once cleanup
//! - `FormBinding`: per-view lifecycle (bind once, swap handlers, rebind on change)
//! - `UploadProxy`: file uploads forwarded to an HTTP endpoint

pub mod binder;
pub mod error;
pub mod form;
pub mod upload;

pub use binder::{
    completion, Builtins, CompletionCallback, DisposeHandle, EventBinder, EventBinding,
    FormBinding, HandlerMap, RenderOutcome,
};
pub use error::{BindError, UploadTransportError};
pub use form::{
    async_handler, channels, handler, Channel, ChannelStats, CssClassesOptions, Dispatch,
    EventOptions, FormInstance, Handler, HandlerFuture, SubscriptionId,
};
pub use upload::{FileBlob, UploadCallback, UploadEvent, UploadProxy, UploadStatus, UploadedFile};
