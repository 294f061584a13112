//! Ambient context accessors.
//!
//! The two process-wide context stacks live here, together with the
//! late-binding accessors over them. Accessors resolve the current top of
//! the relevant stack fresh on every call; nothing is captured at
//! construction time.
//!
//! Using an accessor with no active context is a [`ContextError`], distinct
//! from any "key missing" condition inside the scratch storage.

use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::app::App;
use crate::ctx::{AppContext, RequestContext};
use crate::error::ContextError;
use crate::local::ContextStack;

static APP_CTX_STACK: OnceLock<ContextStack<Arc<AppContext>>> = OnceLock::new();
static REQUEST_CTX_STACK: OnceLock<ContextStack<Arc<RequestContext>>> = OnceLock::new();

pub(crate) fn app_ctx_stack() -> &'static ContextStack<Arc<AppContext>> {
    APP_CTX_STACK.get_or_init(ContextStack::new)
}

pub(crate) fn request_ctx_stack() -> &'static ContextStack<Arc<RequestContext>> {
    REQUEST_CTX_STACK.get_or_init(ContextStack::new)
}

/// Returns the app of the active application context.
///
/// # Errors
///
/// Returns [`ContextError::NoAppContext`] when no application context is
/// active on the current task/thread.
pub fn current_app() -> Result<Arc<App>, ContextError> {
    app_ctx_stack()
        .top()
        .map(|ctx| Arc::clone(ctx.app()))
        .ok_or(ContextError::NoAppContext)
}

/// Returns the active application context.
///
/// # Errors
///
/// Returns [`ContextError::NoAppContext`] when no application context is
/// active on the current task/thread.
pub fn current_app_context() -> Result<Arc<AppContext>, ContextError> {
    app_ctx_stack().top().ok_or(ContextError::NoAppContext)
}

/// Returns the active request context.
///
/// # Errors
///
/// Returns [`ContextError::NoRequestContext`] when no request context is
/// active on the current task/thread.
pub fn current_request() -> Result<Arc<RequestContext>, ContextError> {
    request_ctx_stack()
        .top()
        .ok_or(ContextError::NoRequestContext)
}

/// Returns a handle over the active application context's scratch storage.
///
/// # Errors
///
/// Returns [`ContextError::NoAppContext`] when no application context is
/// active on the current task/thread.
pub fn scratch() -> Result<Scratch, ContextError> {
    app_ctx_stack()
        .top()
        .map(|ctx| Scratch { ctx })
        .ok_or(ContextError::NoAppContext)
}

/// Handle over the scratch storage of one application context.
///
/// The handle is bound to the context that was active when it was resolved;
/// it stays valid even if the stack changes afterwards.
#[derive(Debug, Clone)]
pub struct Scratch {
    ctx: Arc<AppContext>,
}

impl Scratch {
    /// Returns a clone of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.ctx.scratch_map().lock().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.ctx.scratch_map().lock().insert(key.into(), value)
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.ctx.scratch_map().lock().remove(key)
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.ctx.scratch_map().lock().contains_key(key)
    }

    /// Returns `true` if the scratch storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ctx.scratch_map().lock().is_empty()
    }
}
