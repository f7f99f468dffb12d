//! Scope-owned model registry.
//!
//! The registry lazily loads one model instance per family and hands out
//! shared handles. It replaces ambient module-level model caches: the host
//! creates a registry per scope and injects it into whoever needs a model.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{PerceptionError, PerceptionResult};
use crate::perceptor::{Perceptor, PerceptorLoader};
use crate::scope::Scope;

/// Observable lifecycle of a model handle.
///
/// A handle only exists once a load has started, so there is no observable
/// Unloaded state; a failed load stays `Failed` and is never retried by the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// The asynchronous load has started and not yet completed.
    Loading,
    /// The model is loaded and usable.
    Ready,
    /// The load failed; the model is unavailable for this scope's lifetime.
    Failed,
}

enum LoadState<P> {
    Loading,
    Ready(Arc<P>),
    Failed(String),
}

/// Shared handle to a lazily-loaded model.
///
/// Cheap to clone; all clones observe the same load.
#[derive(Debug)]
pub struct ModelHandle<P> {
    rx: watch::Receiver<LoadState<P>>,
}

impl<P> Clone for ModelHandle<P> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<P> std::fmt::Debug for LoadState<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Loading => f.write_str("Loading"),
            LoadState::Ready(_) => f.write_str("Ready"),
            LoadState::Failed(msg) => write!(f, "Failed({msg})"),
        }
    }
}

impl<P> ModelHandle<P> {
    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        match &*self.rx.borrow() {
            LoadState::Loading => ModelState::Loading,
            LoadState::Ready(_) => ModelState::Ready,
            LoadState::Failed(_) => ModelState::Failed,
        }
    }

    /// Current lifecycle state, marking it seen: a subsequent
    /// [`changed`](Self::changed) only reports later transitions.
    pub fn latest_state(&mut self) -> ModelState {
        match &*self.rx.borrow_and_update() {
            LoadState::Loading => ModelState::Loading,
            LoadState::Ready(_) => ModelState::Ready,
            LoadState::Failed(_) => ModelState::Failed,
        }
    }

    /// The loaded model, if ready.
    pub fn model(&self) -> Option<Arc<P>> {
        match &*self.rx.borrow() {
            LoadState::Ready(model) => Some(model.clone()),
            _ => None,
        }
    }

    /// The load failure message, if the load failed.
    pub fn failure(&self) -> Option<String> {
        match &*self.rx.borrow() {
            LoadState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Wait for the next state change.
    ///
    /// Returns `false` once no further change can happen (the load task has
    /// finished or was discarded at teardown).
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the model is ready, or fail if it becomes unavailable.
    pub async fn ready(&mut self) -> PerceptionResult<Arc<P>> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                match &*state {
                    LoadState::Ready(model) => return Ok(model.clone()),
                    LoadState::Failed(msg) => {
                        return Err(PerceptionError::model_unavailable(msg.clone()))
                    }
                    LoadState::Loading => {}
                }
            }
            if self.rx.changed().await.is_err() {
                // Load task ended without publishing: the scope tore down
                // mid-load and the result was discarded.
                return Err(PerceptionError::model_unavailable(
                    "scope torn down during model load",
                ));
            }
        }
    }
}

/// Registry of model handles keyed by model family.
///
/// Owned by a [`Scope`]; load completions that land after the scope's
/// teardown are discarded silently.
pub struct ModelRegistry {
    scope: Scope,
    slots: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl ModelRegistry {
    /// Create a registry bound to the given scope.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The scope this registry is bound to.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Acquire the handle for the loader's model family.
    ///
    /// The first call per family starts the asynchronous load and returns an
    /// unready handle immediately; later calls return the same logical
    /// handle. Must be called from within a tokio runtime.
    pub fn acquire<L: PerceptorLoader>(&self, loader: L) -> ModelHandle<L::Model> {
        let family = loader.family();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(slot) = slots.get(family) {
            if let Some(handle) = slot.downcast_ref::<ModelHandle<L::Model>>() {
                debug!(family, "reusing model handle");
                return handle.clone();
            }
            warn!(
                family,
                "model family already registered with a different perceptor type; \
                 loading a separate unregistered instance"
            );
            return spawn_load(self.scope.clone(), family, loader);
        }

        let handle = spawn_load(self.scope.clone(), family, loader);
        slots.insert(family, Box::new(handle.clone()));
        handle
    }
}

fn spawn_load<L: PerceptorLoader>(
    scope: Scope,
    family: &'static str,
    loader: L,
) -> ModelHandle<L::Model> {
    let (tx, rx) = watch::channel(LoadState::Loading);
    info!(family, "starting model load");

    tokio::spawn(async move {
        let started = Instant::now();
        let result = loader.load().await;
        if !scope.is_active() {
            debug!(family, "scope torn down during model load; discarding result");
            return;
        }
        match result {
            Ok(model) => {
                info!(family, elapsed = ?started.elapsed(), "model loaded");
                let _ = tx.send(LoadState::Ready(Arc::new(model)));
            }
            Err(e) => {
                error!(family, error = %e, "model load failed");
                let _ = tx.send(LoadState::Failed(e.to_string()));
            }
        }
    });

    ModelHandle { rx }
}
