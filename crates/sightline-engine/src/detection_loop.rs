//! The detection loop.
//!
//! Runs one detection pass per distinct (model, media) pair and publishes
//! normalized overlay records. The loop re-evaluates on exactly two
//! triggers — the model state changed or the current media changed — and
//! never on its own output, so publishing cannot re-trigger it. In
//! [`IdentityMode::DirectRef`] an unchanged still image is also skipped.
//!
//! At most one detect call is in flight per loop; triggers arriving
//! mid-flight coalesce into the next evaluation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use sightline_models::{normalize, ContentId, MediaKind, OverlayRecord};
use sightline_perception::{ModelHandle, ModelState, Perceptor, Scope};

use crate::error::EngineError;
use crate::media::MediaElement;
use crate::repaint::{RepaintScheduler, YieldScheduler};
use crate::tracker::MediaFeed;

/// Content-identity strategy for skipping redundant detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// The loop re-derives still-image identity itself and skips unchanged
    /// images. Use when no readiness tracker is interposed; also the safe
    /// default behind a tracker.
    DirectRef,
    /// Trust the upstream tracker's de-duplication and detect on whatever
    /// the feed currently holds.
    Tracked,
}

/// Latest published overlay; `None` until the first successful detection.
#[derive(Debug, Clone)]
pub struct OverlayFeed {
    rx: watch::Receiver<Option<Vec<OverlayRecord>>>,
}

impl OverlayFeed {
    /// The most recent result.
    pub fn latest(&self) -> Option<Vec<OverlayRecord>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns `false` once the loop has exited.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Stream of faults reported by the loop.
#[derive(Debug)]
pub struct FaultStream {
    rx: mpsc::UnboundedReceiver<EngineError>,
}

impl FaultStream {
    /// Wait for the next fault. `None` once the loop has exited.
    pub async fn next_fault(&mut self) -> Option<EngineError> {
        self.rx.recv().await
    }

    /// Take a fault if one is already pending.
    pub fn try_fault(&mut self) -> Option<EngineError> {
        self.rx.try_recv().ok()
    }
}

impl Stream for FaultStream {
    type Item = EngineError;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<EngineError>> {
        self.rx.poll_recv(cx)
    }
}

/// Consumer-side handle to a running detection loop.
pub struct LoopHandle {
    overlay: OverlayFeed,
    faults: FaultStream,
}

impl LoopHandle {
    /// The most recent overlay; `None` until the first successful detection.
    pub fn overlay(&self) -> Option<Vec<OverlayRecord>> {
        self.overlay.latest()
    }

    /// Wait for the next overlay publish.
    pub async fn overlay_changed(&mut self) -> bool {
        self.overlay.changed().await
    }

    /// Wait for the next fault report.
    pub async fn next_fault(&mut self) -> Option<EngineError> {
        self.faults.next_fault().await
    }

    /// Take a fault if one is already pending.
    pub fn try_fault(&mut self) -> Option<EngineError> {
        self.faults.try_fault()
    }

    /// Split into the overlay feed and the fault stream.
    pub fn split(self) -> (OverlayFeed, FaultStream) {
        (self.overlay, self.faults)
    }
}

/// Runs detection over a media feed with a lazily-loaded model.
pub struct DetectionLoop<E: MediaElement, P: Perceptor<Media = E>> {
    scope: Scope,
    model: ModelHandle<P>,
    feed: MediaFeed<E>,
    scheduler: Arc<dyn RepaintScheduler>,
    identity: IdentityMode,
}

impl<E: MediaElement, P: Perceptor<Media = E>> DetectionLoop<E, P> {
    /// Create a loop over the given model and media feed.
    pub fn new(
        scope: Scope,
        model: ModelHandle<P>,
        feed: MediaFeed<E>,
        identity: IdentityMode,
    ) -> Self {
        Self {
            scope,
            model,
            feed,
            scheduler: Arc::new(YieldScheduler),
            identity,
        }
    }

    /// Use the host's repaint scheduler instead of the default yield.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn RepaintScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Start the loop. Must be called from within a tokio runtime; the task
    /// exits at scope teardown.
    pub fn spawn(self) -> LoopHandle {
        let (out_tx, out_rx) = watch::channel(None);
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(out_tx, fault_tx));
        LoopHandle {
            overlay: OverlayFeed { rx: out_rx },
            faults: FaultStream { rx: fault_rx },
        }
    }

    async fn run(
        mut self,
        out: watch::Sender<Option<Vec<OverlayRecord>>>,
        faults: mpsc::UnboundedSender<EngineError>,
    ) {
        let mut last_identity: Option<ContentId> = None;
        let mut last_model_state: Option<ModelState> = None;
        let mut load_failure_reported = false;
        let mut model_open = true;
        let mut feed_open = true;

        loop {
            let keep_going = self
                .evaluate(
                    &out,
                    &faults,
                    &mut last_identity,
                    &mut last_model_state,
                    &mut load_failure_reported,
                )
                .await;
            if !keep_going || !self.scope.is_active() {
                break;
            }

            tokio::select! {
                _ = self.scope.cancelled() => break,
                changed = self.model.changed(), if model_open => {
                    if !changed {
                        model_open = false;
                    }
                }
                changed = self.feed.changed(), if feed_open => {
                    if !changed {
                        feed_open = false;
                    }
                }
            }
        }

        debug!("detection loop stopped");
    }

    /// One reactive evaluation. Returns `false` when the loop should stop.
    ///
    /// Reads the model state and the media feed through their seen-marking
    /// accessors, so a value consumed here is not re-delivered by the
    /// `changed` arms in [`run`](Self::run). Detection runs only when one
    /// of the two triggers actually fired: an unseen media publish, or the
    /// model becoming ready.
    async fn evaluate(
        &mut self,
        out: &watch::Sender<Option<Vec<OverlayRecord>>>,
        faults: &mpsc::UnboundedSender<EngineError>,
        last_identity: &mut Option<ContentId>,
        last_model_state: &mut Option<ModelState>,
        load_failure_reported: &mut bool,
    ) -> bool {
        let state = self.model.latest_state();
        let model_became_ready =
            state == ModelState::Ready && *last_model_state != Some(ModelState::Ready);
        *last_model_state = Some(state);
        match state {
            ModelState::Failed => {
                if !*load_failure_reported {
                    *load_failure_reported = true;
                    let message = self
                        .model
                        .failure()
                        .unwrap_or_else(|| "model load failed".to_string());
                    warn!(error = %message, "model unavailable");
                    let _ = faults.send(EngineError::load_failure(message));
                }
                return true;
            }
            ModelState::Loading => return true,
            ModelState::Ready => {}
        }
        if !model_became_ready && !self.feed.has_pending() {
            return true;
        }
        let Some(model) = self.model.model() else {
            return true;
        };
        let Some(media) = self.feed.latest() else {
            return true;
        };

        let id = media.content_id();
        if self.identity == IdentityMode::DirectRef && id.kind == MediaKind::Image {
            if let Some(last) = last_identity {
                // Skip if it's the same image to avoid doing empty work.
                if id.is_same_image(last) {
                    return true;
                }
            }
        }
        let previous_identity = last_identity.take();
        *last_identity = Some(id.clone());

        debug!(model = model.name(), kind = %id.kind, "running detection");
        match model.detect(&media).await {
            Ok(raw) => {
                if !self.scope.is_active() {
                    debug!("discarding detect result after teardown");
                    return false;
                }
                // Plain read: a replacement publish must stay pending so the
                // next evaluation picks it up.
                let now = self.feed.current().map(|m| m.content_id());
                if matches!(&now, Some(current) if *current != id) {
                    debug!("media replaced mid-flight; discarding stale result");
                    return true;
                }
                let records = normalize(raw);
                debug!(count = records.len(), "publishing overlay");
                self.scheduler.before_next_repaint().await;
                if !self.scope.is_active() {
                    return false;
                }
                out.send_replace(Some(records));
            }
            Err(e) => {
                // Forget the failed identity so a later trigger retries it.
                *last_identity = previous_identity;
                if !self.scope.is_active() {
                    return false;
                }
                warn!(error = %e, "detect call failed");
                let _ = faults.send(EngineError::DetectFailure(e));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    use sightline_models::{RawDetection, ReadyState};
    use sightline_perception::{
        ModelRegistry, PerceptionError, PerceptionResult, PerceptorLoader,
    };

    use crate::tracker::MediaPublisher;

    #[derive(Clone)]
    struct FakeImage {
        src: Arc<String>,
    }

    impl FakeImage {
        fn new(src: &str) -> Self {
            Self {
                src: Arc::new(src.to_string()),
            }
        }
    }

    #[async_trait]
    impl MediaElement for FakeImage {
        fn kind(&self) -> MediaKind {
            MediaKind::Image
        }

        fn source_url(&self) -> Option<String> {
            Some((*self.src).clone())
        }

        fn ready_state(&self) -> ReadyState {
            ReadyState::HaveEnoughData
        }

        async fn loaded_data(&self) {}
    }

    struct GatedPerceptor {
        gate: Semaphore,
        calls: AtomicUsize,
        results: Mutex<VecDeque<PerceptionResult<Vec<RawDetection>>>>,
    }

    impl GatedPerceptor {
        fn new(results: Vec<PerceptionResult<Vec<RawDetection>>>) -> Self {
            Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                results: Mutex::new(results.into()),
            }
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Perceptor for GatedPerceptor {
        type Media = FakeImage;

        async fn detect(&self, _media: &FakeImage) -> PerceptionResult<Vec<RawDetection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    struct InstantLoader {
        model: Mutex<Option<GatedPerceptor>>,
    }

    impl InstantLoader {
        fn new(model: GatedPerceptor) -> Self {
            Self {
                model: Mutex::new(Some(model)),
            }
        }
    }

    #[async_trait]
    impl PerceptorLoader for InstantLoader {
        type Model = GatedPerceptor;

        fn family(&self) -> &'static str {
            "gated"
        }

        async fn load(self) -> PerceptionResult<GatedPerceptor> {
            Ok(self.model.lock().unwrap().take().unwrap())
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl PerceptorLoader for FailingLoader {
        type Model = GatedPerceptor;

        fn family(&self) -> &'static str {
            "failing"
        }

        async fn load(self) -> PerceptionResult<GatedPerceptor> {
            Err(PerceptionError::load_failed("weights missing"))
        }
    }

    struct Fixture {
        scope: Scope,
        model: ModelHandle<GatedPerceptor>,
        publisher: MediaPublisher<FakeImage>,
        handle: LoopHandle,
    }

    async fn fixture(
        results: Vec<PerceptionResult<Vec<RawDetection>>>,
        identity: IdentityMode,
    ) -> Fixture {
        let scope = Scope::new();
        let registry = ModelRegistry::new(scope.clone());
        let mut model = registry.acquire(InstantLoader::new(GatedPerceptor::new(results)));
        model.ready().await.unwrap();

        let (publisher, feed) = MediaFeed::channel();
        let handle = DetectionLoop::new(scope.clone(), model.clone(), feed, identity).spawn();
        Fixture {
            scope,
            model,
            publisher,
            handle,
        }
    }

    fn chair() -> PerceptionResult<Vec<RawDetection>> {
        Ok(vec![RawDetection::object("chair", 0.8, [10.0, 20.0, 30.0, 40.0])])
    }

    fn dog() -> PerceptionResult<Vec<RawDetection>> {
        Ok(vec![RawDetection::object("dog", 0.7, [1.0, 2.0, 3.0, 4.0])])
    }

    async fn expect_overlay(handle: &mut LoopHandle) -> Vec<OverlayRecord> {
        timeout(Duration::from_secs(1), handle.overlay_changed())
            .await
            .expect("expected an overlay publish");
        handle.overlay().expect("overlay should be set")
    }

    async fn settle() {
        // Let the loop task run through any pending evaluations.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_no_detect_without_media() {
        let fx = fixture(vec![chair()], IdentityMode::DirectRef).await;
        settle().await;
        assert_eq!(fx.model.model().unwrap().calls(), 0);
        assert!(fx.handle.overlay().is_none());
    }

    #[tokio::test]
    async fn test_no_detect_until_model_ready() {
        let scope = Scope::new();
        let registry = ModelRegistry::new(scope.clone());

        // A load that never starts resolving: the loop must stay quiet.
        struct NeverLoader;

        #[async_trait]
        impl PerceptorLoader for NeverLoader {
            type Model = GatedPerceptor;

            fn family(&self) -> &'static str {
                "never"
            }

            async fn load(self) -> PerceptionResult<GatedPerceptor> {
                std::future::pending().await
            }
        }

        let model = registry.acquire(NeverLoader);
        let (publisher, feed) = MediaFeed::channel();
        let handle =
            DetectionLoop::new(scope, model, feed, IdentityMode::DirectRef).spawn();

        publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        assert!(handle.overlay().is_none());
    }

    #[tokio::test]
    async fn test_single_flight_and_termination_on_same_identity() {
        let mut fx = fixture(vec![chair()], IdentityMode::DirectRef).await;
        let model = fx.model.model().unwrap();

        // Repeated triggers for the same identity while the first call is
        // still in flight: call count must stay at 1.
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        assert_eq!(model.calls(), 1);

        model.release();
        let records = expect_overlay(&mut fx.handle).await;
        assert_eq!(records[0].as_object().unwrap().label, "chair");

        // After the publish, the same identity never re-triggers detection.
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_tracked_mode_trusts_upstream_dedup() {
        let mut fx = fixture(vec![chair(), chair()], IdentityMode::Tracked).await;
        let model = fx.model.model().unwrap();
        model.release();
        model.release();

        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        expect_overlay(&mut fx.handle).await;
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        expect_overlay(&mut fx.handle).await;

        // Exactly one call per publish; no stray re-delivery of a publish
        // already consumed by an evaluation.
        settle().await;
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_preloaded_model_and_media_detect_once() {
        let scope = Scope::new();
        let registry = ModelRegistry::new(scope.clone());
        let model = registry.acquire(InstantLoader::new(GatedPerceptor::new(vec![chair()])));

        // The load completes and the media is published before the loop
        // starts; both are pending-unseen on its channels.
        settle().await;
        let (publisher, feed) = MediaFeed::channel();
        publisher.publish(Some(FakeImage::new("a.jpg")));

        let mut handle =
            DetectionLoop::new(scope, model.clone(), feed, IdentityMode::Tracked).spawn();
        let gated = model.model().unwrap();
        gated.release();

        let records = expect_overlay(&mut handle).await;
        assert_eq!(records[0].as_object().unwrap().label, "chair");

        // The first evaluation consumed both pending values; neither is
        // re-delivered as a second trigger.
        settle().await;
        assert_eq!(gated.calls(), 1);
    }

    #[tokio::test]
    async fn test_teardown_discards_inflight_result() {
        let fx = fixture(vec![chair()], IdentityMode::DirectRef).await;
        let model = fx.model.model().unwrap();

        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        assert_eq!(model.calls(), 1);

        fx.scope.teardown();
        model.release();
        settle().await;

        // The result resolved after teardown: no publish happened.
        assert!(fx.handle.overlay().is_none());
    }

    #[tokio::test]
    async fn test_stale_media_result_is_discarded() {
        let mut fx = fixture(vec![chair(), dog()], IdentityMode::DirectRef).await;
        let model = fx.model.model().unwrap();

        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        settle().await;
        assert_eq!(model.calls(), 1);

        // Media is replaced while the first call is still in flight.
        fx.publisher.publish(Some(FakeImage::new("b.jpg")));
        model.release();
        model.release();

        // The first (stale) result is dropped; the published overlay is the
        // second call's.
        let records = expect_overlay(&mut fx.handle).await;
        assert_eq!(records[0].as_object().unwrap().label, "dog");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_detect_failure_reports_fault_and_recovers() {
        let mut fx = fixture(
            vec![Err(PerceptionError::detection_failed("backend error")), chair()],
            IdentityMode::DirectRef,
        )
        .await;
        let model = fx.model.model().unwrap();
        model.release();

        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        let fault = timeout(Duration::from_secs(1), fx.handle.next_fault())
            .await
            .expect("expected a fault")
            .unwrap();
        assert!(matches!(fault, EngineError::DetectFailure(_)));
        assert!(fx.handle.overlay().is_none());

        // The failed identity was forgotten: the same image retries and
        // publishes on a later trigger.
        model.release();
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));
        let records = expect_overlay(&mut fx.handle).await;
        assert_eq!(records[0].as_object().unwrap().label, "chair");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_reported_once() {
        let scope = Scope::new();
        let registry = ModelRegistry::new(scope.clone());
        let mut model = registry.acquire(FailingLoader);
        assert!(model.ready().await.is_err());

        let (publisher, feed) = MediaFeed::channel();
        let mut handle =
            DetectionLoop::new(scope, model, feed, IdentityMode::DirectRef).spawn();

        let fault = timeout(Duration::from_secs(1), handle.next_fault())
            .await
            .expect("expected a load fault")
            .unwrap();
        assert!(matches!(fault, EngineError::LoadFailure(_)));

        // Further triggers do not repeat the report.
        publisher.publish(Some(FakeImage::new("a.jpg")));
        publisher.publish(Some(FakeImage::new("b.jpg")));
        settle().await;
        assert!(handle.try_fault().is_none());
        assert!(handle.overlay().is_none());
    }

    #[tokio::test]
    async fn test_fault_stream_adapter() {
        use futures_util::StreamExt;

        let fx = fixture(
            vec![Err(PerceptionError::detection_failed("bad frame"))],
            IdentityMode::DirectRef,
        )
        .await;
        fx.model.model().unwrap().release();
        fx.publisher.publish(Some(FakeImage::new("a.jpg")));

        let (_overlay, mut faults) = fx.handle.split();
        let fault = timeout(Duration::from_secs(1), faults.next())
            .await
            .expect("expected a fault via the stream")
            .unwrap();
        assert!(matches!(fault, EngineError::DetectFailure(_)));
    }
}
