//! EventBinder - attaches built-in and caller-supplied handlers to a form
//!
//! Built-ins: CSS class override, upload proxying (only with an endpoint) and
//! completion. Caller-supplied handlers are subscribed through a latest-handler
//! cell, so replacing them on a later render needs no new subscription.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use contracts::{FormConfig, ResponsePayload};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::form::{channels, lock, Dispatch, EventOptions, FormInstance, Handler, HandlerFuture, SubscriptionId};
use crate::upload::UploadProxy;

/// Caller-supplied handlers, keyed by channel name
pub type HandlerMap = BTreeMap<String, Handler>;

/// Caller completion logic; the completion channel awaits it
pub type CompletionCallback = Arc<dyn Fn(ResponsePayload) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a `CompletionCallback`
pub fn completion<F, Fut>(f: F) -> CompletionCallback
where
    F: Fn(ResponsePayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Built-in handler specs
#[derive(Clone, Default)]
pub struct Builtins {
    /// Classes merged into every question's class map
    pub css_classes: BTreeMap<String, String>,
    /// Upload endpoint; the upload proxy is only attached when set
    pub upload_url: Option<Url>,
    /// Caller completion logic
    pub on_complete: Option<CompletionCallback>,
    /// HTTP client shared by upload proxies
    pub http: Client,
}

impl Builtins {
    pub fn from_config(config: &FormConfig) -> Self {
        Self {
            css_classes: config.css_classes.clone(),
            upload_url: config.upload_url.clone(),
            ..Default::default()
        }
    }

    pub fn on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Whether the subscription-shaping parts of two specs agree
    fn same_config(&self, other: &Builtins) -> bool {
        self.css_classes == other.css_classes && self.upload_url == other.upload_url
    }
}

/// (channel name, subscription) pair added by the binder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub channel: String,
    pub id: SubscriptionId,
}

/// Removes every subscription one `bind` call added
///
/// Disposal is idempotent: the first call removes the bindings, later calls do
/// nothing. Dropping the handle disposes it.
pub struct DisposeHandle {
    form: Weak<FormInstance>,
    bindings: Mutex<Option<Vec<EventBinding>>>,
    skipped: Vec<String>,
}

impl DisposeHandle {
    /// Remove the subscriptions; returns how many were removed
    #[instrument(name = "dispose_bindings", skip(self))]
    pub fn dispose(&self) -> usize {
        let Some(bindings) = lock(&self.bindings).take() else {
            return 0;
        };

        let Some(form) = self.form.upgrade() else {
            debug!(bindings = bindings.len(), "form already torn down, nothing to remove");
            return 0;
        };

        let mut removed = 0;
        for binding in &bindings {
            match form.channel(&binding.channel) {
                Ok(channel) if channel.remove(binding.id) => removed += 1,
                Ok(_) => warn!(channel = %binding.channel, id = binding.id, "binding already removed"),
                Err(e) => warn!(error = %e, "binding channel vanished"),
            }
        }
        debug!(removed, "bindings disposed");
        removed
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.bindings).is_none()
    }

    /// Bindings still owned by this handle
    pub fn bindings(&self) -> Vec<EventBinding> {
        lock(&self.bindings).clone().unwrap_or_default()
    }

    /// Dynamic handler names with no matching channel on the form
    pub fn skipped_channels(&self) -> &[String] {
        &self.skipped
    }
}

impl Drop for DisposeHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Default)]
struct HandlerCells {
    handlers: RwLock<HandlerMap>,
    on_complete: RwLock<Option<CompletionCallback>>,
}

impl HandlerCells {
    fn handler(&self, channel: &str) -> Option<Handler> {
        read(&self.handlers).get(channel).cloned()
    }

    fn completion(&self) -> Option<CompletionCallback> {
        read(&self.on_complete).clone()
    }
}

/// Binds handlers to form instances
///
/// Owns the latest-handler cells; every subscription it creates dereferences
/// them at invocation time.
#[derive(Default)]
pub struct EventBinder {
    cells: Arc<HandlerCells>,
}

impl EventBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the caller-supplied handlers without touching subscriptions
    pub fn update_handlers(&self, handlers: HandlerMap) {
        *write(&self.cells.handlers) = handlers;
    }

    /// Replace the completion callback without touching subscriptions
    pub fn update_completion(&self, callback: Option<CompletionCallback>) {
        *write(&self.cells.on_complete) = callback;
    }

    /// Subscribe built-ins and dynamic handlers to `form`
    #[instrument(
        name = "event_binder_bind",
        skip_all,
        fields(dynamic = handlers.len(), upload = builtins.upload_url.is_some())
    )]
    pub fn bind(
        &self,
        form: &Arc<FormInstance>,
        builtins: &Builtins,
        handlers: HandlerMap,
    ) -> DisposeHandle {
        let names: Vec<String> = handlers.keys().cloned().collect();
        self.update_handlers(handlers);
        self.update_completion(builtins.on_complete.clone());

        let mut bindings = Vec::new();
        let mut skipped = Vec::new();

        let mut subscribe = |channel: &str, handler: Handler| match form.channel(channel) {
            Ok(ch) => {
                bindings.push(EventBinding {
                    channel: channel.to_string(),
                    id: ch.add(handler),
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "skipping handler");
                false
            }
        };

        subscribe(
            channels::UPDATE_QUESTION_CSS_CLASSES,
            css_override(builtins.css_classes.clone()),
        );
        if let Some(url) = &builtins.upload_url {
            let proxy = UploadProxy::with_client(builtins.http.clone(), url.clone());
            subscribe(channels::UPLOAD_FILES, upload_proxy(proxy));
        }
        subscribe(channels::COMPLETE, self.completion_handler());

        for name in names {
            if !subscribe(&name, self.latest_handler(&name)) {
                skipped.push(name);
            }
        }

        info!(
            bindings = bindings.len(),
            skipped = skipped.len(),
            "form handlers bound"
        );

        DisposeHandle {
            form: Arc::downgrade(form),
            bindings: Mutex::new(Some(bindings)),
            skipped,
        }
    }

    fn latest_handler(&self, channel: &str) -> Handler {
        let cells = Arc::clone(&self.cells);
        let channel = channel.to_string();
        Arc::new(move |form, options| match cells.handler(&channel) {
            Some(current) => current(form, options),
            None => Dispatch::Done,
        })
    }

    fn completion_handler(&self) -> Handler {
        let cells = Arc::clone(&self.cells);
        Arc::new(move |form, _options| match cells.completion() {
            Some(callback) => Dispatch::Pending(callback(form.data())),
            None => Dispatch::Done,
        })
    }
}

fn css_override(classes: BTreeMap<String, String>) -> Handler {
    Arc::new(move |_form, options| {
        if let EventOptions::CssClasses(css) = options {
            for (key, value) in &classes {
                css.css_classes.insert(key.clone(), value.clone());
            }
        }
        Dispatch::Done
    })
}

fn upload_proxy(proxy: UploadProxy) -> Handler {
    Arc::new(move |_form, options| {
        if let EventOptions::UploadFiles(event) = options {
            proxy.spawn(event.clone());
        }
        Dispatch::Done
    })
}

/// Outcome of `FormBinding::render`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Subscriptions were (re)created
    Bound,
    /// Only the latest-handler cells changed
    Updated,
}

struct ActiveBinding {
    form: Weak<FormInstance>,
    builtins: Builtins,
    channels: BTreeSet<String>,
    handle: DisposeHandle,
}

/// Lifecycle owner binding one view to its current form
///
/// Subscriptions exist once per form instance: re-rendering with the same form,
/// the same built-in config and the same handler names only swaps the latest
/// handlers. Any other change disposes and rebinds.
#[derive(Default)]
pub struct FormBinding {
    binder: EventBinder,
    active: Option<ActiveBinding>,
}

impl FormBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        form: &Arc<FormInstance>,
        builtins: Builtins,
        handlers: HandlerMap,
    ) -> RenderOutcome {
        let channels: BTreeSet<String> = handlers.keys().cloned().collect();

        if let Some(active) = &self.active {
            let same_form = std::ptr::eq(active.form.as_ptr(), Arc::as_ptr(form));
            if same_form && active.builtins.same_config(&builtins) && active.channels == channels {
                self.binder.update_handlers(handlers);
                self.binder.update_completion(builtins.on_complete);
                return RenderOutcome::Updated;
            }
        }

        self.unmount();
        let handle = self.binder.bind(form, &builtins, handlers);
        self.active = Some(ActiveBinding {
            form: Arc::downgrade(form),
            builtins,
            channels,
            handle,
        });
        RenderOutcome::Bound
    }

    /// Dispose the current bindings, if any
    pub fn unmount(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.dispose();
        }
    }

    pub fn handle(&self) -> Option<&DisposeHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }
}

fn read<T>(cell: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    cell.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(cell: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    cell.write().unwrap_or_else(|e| e.into_inner())
}
