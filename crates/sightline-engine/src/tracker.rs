//! Media readiness tracking.
//!
//! [`MediaTracker`] turns a live, possibly-changing media binding into a
//! de-duplicated stream of ready-to-process observations. It polls the
//! source at a fixed interval; polling stops only at scope teardown, never
//! because the element is momentarily absent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use sightline_models::{ContentId, MediaKind, ReadyState};
use sightline_perception::Scope;

use crate::config::EngineConfig;
use crate::media::{MediaElement, MediaSource};

/// Writer half of a media feed.
///
/// The tracker publishes through one of these; hosts that bind an element
/// directly (no tracker interposed) push observations themselves.
#[derive(Debug)]
pub struct MediaPublisher<E> {
    tx: Arc<watch::Sender<Option<E>>>,
}

impl<E> Clone for MediaPublisher<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: Clone + Send + Sync> MediaPublisher<E> {
    /// Publish the current media observation.
    ///
    /// Every publish notifies subscribers, including re-publishes of the
    /// same element; downstream consumers must treat those as idempotent.
    pub fn publish(&self, element: Option<E>) {
        self.tx.send_replace(element);
    }
}

/// Reader half of a media feed: the latest published observation.
#[derive(Debug)]
pub struct MediaFeed<E> {
    rx: watch::Receiver<Option<E>>,
}

impl<E> Clone for MediaFeed<E> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<E: Clone + Send + Sync> MediaFeed<E> {
    /// Create an unconnected feed pair. Starts empty.
    pub fn channel() -> (MediaPublisher<E>, MediaFeed<E>) {
        let (tx, rx) = watch::channel(None);
        (MediaPublisher { tx: Arc::new(tx) }, MediaFeed { rx })
    }

    /// The most recent observation, if any.
    pub fn current(&self) -> Option<E> {
        self.rx.borrow().clone()
    }

    /// The most recent observation, marking it seen: a subsequent
    /// [`changed`](Self::changed) only reports later publishes.
    pub fn latest(&mut self) -> Option<E> {
        self.rx.borrow_and_update().clone()
    }

    /// Whether a publish has landed that [`latest`](Self::latest) has not
    /// yet returned. `false` once the publishing side has gone away.
    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next publish.
    ///
    /// Returns `false` once the publishing side has gone away.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Polls a [`MediaSource`] and publishes ready-to-process observations.
pub struct MediaTracker<S: MediaSource> {
    source: S,
    scope: Scope,
    poll_interval: Duration,
    threshold: ReadyState,
}

impl<S: MediaSource> MediaTracker<S> {
    /// Create a tracker over the given source, bound to the scope.
    pub fn new(source: S, scope: Scope, config: &EngineConfig) -> Self {
        Self {
            source,
            scope,
            poll_interval: config.poll_interval,
            threshold: config.video_ready_threshold,
        }
    }

    /// Start polling. Returns the feed of published observations.
    ///
    /// Must be called from within a tokio runtime. The polling task exits
    /// at scope teardown.
    pub fn spawn(self) -> MediaFeed<S::Element> {
        let (publisher, feed) = MediaFeed::channel();
        tokio::spawn(self.run(publisher));
        feed
    }

    async fn run(self, publisher: MediaPublisher<S::Element>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_image: Option<ContentId> = None;
        // At most one outstanding data-loaded waiter, re-armed per tick so
        // it always follows the element most recently resolved.
        let mut ready_waiter: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = self.scope.cancelled() => break,
                _ = interval.tick() => {}
            }

            // An absent element does not end observation; keep polling.
            let Some(element) = self.source.resolve() else {
                continue;
            };

            if let Some(task) = ready_waiter.take() {
                task.abort();
            }

            match element.kind() {
                MediaKind::Image => {
                    let id = element.content_id();
                    if let Some(last) = &last_image {
                        // Skip if it's the same image to avoid doing empty work.
                        if id.is_same_image(last) {
                            continue;
                        }
                    }
                    debug!(source = ?id.source, "publishing new image");
                    last_image = Some(id);
                    publisher.publish(Some(element));
                }
                MediaKind::Video => {
                    // The previous observation may have been an image.
                    last_image = None;
                    if element.ready_state() < self.threshold {
                        ready_waiter = Some(self.spawn_ready_waiter(element, &publisher));
                        continue;
                    }
                    publisher.publish(Some(element));
                }
                MediaKind::Other => {
                    last_image = None;
                    // No de-duplication for this kind; re-published every tick.
                    debug!("publishing other-kind element");
                    publisher.publish(Some(element));
                }
            }
        }

        debug!("media tracker stopped");
    }

    fn spawn_ready_waiter(
        &self,
        element: S::Element,
        publisher: &MediaPublisher<S::Element>,
    ) -> JoinHandle<()> {
        let scope = self.scope.clone();
        let publisher = publisher.clone();
        let threshold = self.threshold;
        tokio::spawn(async move {
            element.loaded_data().await;
            if !scope.is_active() {
                return;
            }
            if element.ready_state() >= threshold {
                debug!(ready_state = element.ready_state().ordinal(), "video data loaded; publishing");
                publisher.publish(Some(element));
            }
        })
    }
}
