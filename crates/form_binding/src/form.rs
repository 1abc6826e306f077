//! FormInstance - live form with a registry of named event channels
//!
//! The form engine owns one `FormInstance` per rendering session. Each channel
//! holds independently removable subscribers that are invoked in subscription
//! order with `(sender, options)`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::ResponsePayload;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::BindError;
use crate::upload::UploadEvent;

/// Standard channel names exposed by the form engine
pub mod channels {
    pub const UPDATE_QUESTION_CSS_CLASSES: &str = "onUpdateQuestionCssClasses";
    pub const UPLOAD_FILES: &str = "onUploadFiles";
    pub const COMPLETE: &str = "onComplete";
    pub const VALUE_CHANGED: &str = "onValueChanged";
    pub const CURRENT_PAGE_CHANGED: &str = "onCurrentPageChanged";
    pub const AFTER_RENDER_QUESTION: &str = "onAfterRenderQuestion";

    /// Channels every engine instance exposes
    pub const STANDARD: &[&str] = &[
        UPDATE_QUESTION_CSS_CLASSES,
        UPLOAD_FILES,
        COMPLETE,
        VALUE_CHANGED,
        CURRENT_PAGE_CHANGED,
        AFTER_RENDER_QUESTION,
    ];
}

/// Subscription identity within one channel
pub type SubscriptionId = u64;

/// Future a handler hands back when its work outlives the call
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Result of invoking one subscriber
pub enum Dispatch {
    /// Handling finished during the call
    Done,
    /// Channel handling is finished once this future resolves
    Pending(HandlerFuture),
}

/// Channel subscriber
pub type Handler = Arc<dyn Fn(&FormInstance, &mut EventOptions) -> Dispatch + Send + Sync>;

/// Wrap a synchronous closure as a `Handler`
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&FormInstance, &mut EventOptions) + Send + Sync + 'static,
{
    Arc::new(move |form, options| {
        f(form, options);
        Dispatch::Done
    })
}

/// Wrap a closure returning a future as a `Handler`; the channel awaits it
pub fn async_handler<F, Fut>(f: F) -> Handler
where
    F: Fn(&FormInstance, &mut EventOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |form, options| Dispatch::Pending(Box::pin(f(form, options))))
}

/// Channel-specific event options
#[derive(Debug, Clone)]
pub enum EventOptions {
    /// Completion and other sender-only channels
    None,
    /// CSS channel: `{question, cssClasses}`
    CssClasses(CssClassesOptions),
    /// Upload channel: `{files, callback}`
    UploadFiles(UploadEvent),
    /// Value channel: `{name, value}`
    ValueChanged { name: String, value: Value },
    /// Any other channel
    Custom(Value),
}

/// Options of the CSS class channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssClassesOptions {
    pub question: String,
    pub css_classes: BTreeMap<String, String>,
}

/// Add/remove counters of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub adds: u64,
    pub removes: u64,
}

/// A named event stream supporting multiple independent subscribers
pub struct Channel {
    name: String,
    subscribers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
    adds: AtomicU64,
    removes: AtomicU64,
}

impl Channel {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            adds: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe a handler
    pub fn add(&self, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, handler));
        self.adds.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Unsubscribe; returns false when the id is not subscribed
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let Some(pos) = subscribers.iter().position(|(sid, _)| *sid == id) else {
            return false;
        };
        subscribers.remove(pos);
        self.removes.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            adds: self.adds.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    fn snapshot(&self) -> Vec<Handler> {
        lock(&self.subscribers)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }
}

/// One in-progress survey
pub struct FormInstance {
    channels: BTreeMap<String, Channel>,
    data: Mutex<ResponsePayload>,
}

impl FormInstance {
    /// Create a form exposing the given channels
    pub fn new<I, S>(channel_names: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = channel_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), Channel::new(name))
            })
            .collect();

        Arc::new(Self {
            channels,
            data: Mutex::new(ResponsePayload::new()),
        })
    }

    /// Create a form exposing `channels::STANDARD`
    pub fn with_standard_channels() -> Arc<Self> {
        Self::new(channels::STANDARD.iter().copied())
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Result<&Channel, BindError> {
        self.channels
            .get(name)
            .ok_or_else(|| BindError::channel_not_found(name))
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Snapshot of the answers collected so far
    pub fn data(&self) -> ResponsePayload {
        lock(&self.data).clone()
    }

    /// Record an answer without firing any channel
    pub fn set_value(&self, name: impl Into<String>, value: impl Into<Value>) {
        lock(&self.data).insert(name, value);
    }

    /// Invoke every subscriber of a channel in order
    ///
    /// A subscriber returning `Dispatch::Pending` is awaited before the next
    /// one runs, so engine-side subscribers added later observe its effects.
    #[instrument(name = "form_fire", skip(self, options), fields(channel = %name))]
    pub async fn fire(&self, name: &str, options: &mut EventOptions) -> Result<(), BindError> {
        let handlers = self.channel(name)?.snapshot();
        debug!(subscribers = handlers.len(), "dispatching form event");

        for handler in handlers {
            if let Dispatch::Pending(fut) = handler(self, options) {
                fut.await;
            }
        }
        Ok(())
    }

    /// Record an answer and fire `onValueChanged`
    pub async fn change_value(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), BindError> {
        let name = name.into();
        let value = value.into();
        self.set_value(name.clone(), value.clone());
        let mut options = EventOptions::ValueChanged { name, value };
        self.fire(channels::VALUE_CHANGED, &mut options).await
    }

    /// Fire `onComplete`
    pub async fn complete(&self) -> Result<(), BindError> {
        self.fire(channels::COMPLETE, &mut EventOptions::None).await
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
