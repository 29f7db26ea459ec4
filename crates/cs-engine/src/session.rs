//! Adapter session state machine.
//!
//! Owns the [`Session`], the sampler handle, and a monotonically
//! increasing session epoch. State moves disconnected/error → scanning →
//! connecting → connected; discovery or handshake failure lands in
//! `error` with a message and no auto-retry. At most one sampler runs
//! per session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use cs_adapter::AdapterDriver;
use cs_protocol::session::{Session, SessionStatus};
use cs_protocol::telemetry::TelemetrySnapshot;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::sampler::{self, SamplerHandle};

struct Inner {
    session: Session,
    /// Bumped on every connect attempt and disconnect. A sampler fault
    /// carries the epoch it was spawned under; a mismatch means the
    /// fault belongs to a session that was already torn down.
    epoch: u64,
    sampler: Option<Arc<SamplerHandle>>,
}

/// Drives one adapter session at a time for a user-vehicle context.
pub struct SessionController<D: AdapterDriver> {
    driver: Arc<D>,
    inner: Arc<Mutex<Inner>>,
    status_tx: watch::Sender<SessionStatus>,
    events: EventBus,
    sample_interval: Duration,
    channel_capacity: usize,
}

impl<D: AdapterDriver + 'static> SessionController<D> {
    pub fn new(driver: Arc<D>, config: &EngineConfig, events: EventBus) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Disconnected);
        Self {
            driver,
            inner: Arc::new(Mutex::new(Inner {
                session: Session::disconnected(),
                epoch: 0,
                sampler: None,
            })),
            status_tx,
            events,
            sample_interval: Duration::from_millis(config.sample_interval_ms),
            channel_capacity: config.snapshot_channel_capacity,
        }
    }

    /// Discover an adapter, handshake, and start sampling. Allowed from
    /// `disconnected` and `error` only; any other state fails with
    /// [`EngineError::SessionBusy`] and changes nothing. The session lock
    /// is held for the whole attempt, so a concurrent `disconnect()`
    /// waits rather than interleaving.
    pub async fn connect(&self) -> EngineResult<Session> {
        let mut inner = self.inner.lock().await;
        match inner.session.status {
            SessionStatus::Disconnected | SessionStatus::Error => {}
            other => {
                return Err(EngineError::SessionBusy(format!(
                    "session is {}",
                    other.as_str()
                )));
            }
        }
        inner.epoch += 1;
        let epoch = inner.epoch;

        inner.session.status = SessionStatus::Scanning;
        self.publish(&inner.session);

        let candidates = match self.driver.discover().await {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.fail(&mut inner, e.into())),
        };
        let Some(candidate) = candidates.into_iter().next() else {
            let err = EngineError::AdapterUnavailable("no adapters in range".to_string());
            return Err(self.fail(&mut inner, err));
        };

        // A candidate was found; the previous error clears here.
        inner.session.status = SessionStatus::Connecting;
        inner.session.adapter_name = Some(candidate.name.clone());
        inner.session.error = None;
        self.publish(&inner.session);

        let link = match self.driver.connect(&candidate).await {
            Ok(link) => link,
            Err(e) => return Err(self.fail(&mut inner, e.into())),
        };

        let (fault_tx, fault_rx) = mpsc::channel(1);
        let handle = Arc::new(sampler::spawn(
            self.driver.clone(),
            self.sample_interval,
            self.channel_capacity,
            fault_tx,
        ));
        self.spawn_fault_listener(epoch, fault_rx);

        inner.sampler = Some(handle);
        inner.session.status = SessionStatus::Connected;
        inner.session.adapter_name = Some(link.adapter_name);
        inner.session.protocol = Some(link.protocol);
        inner.session.connected_at = Some(Utc::now());
        self.publish(&inner.session);

        Ok(inner.session.clone())
    }

    /// Tear the session down from any state; idempotent. The sampler is
    /// stopped synchronously, so no snapshot is published after this
    /// returns.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.session.status == SessionStatus::Disconnected && inner.sampler.is_none() {
            return;
        }
        inner.epoch += 1;

        if let Some(sampler) = inner.sampler.take() {
            sampler.stop().await;
        }
        if let Err(e) = self.driver.disconnect().await {
            tracing::debug!(error = %e, "adapter disconnect failed");
        }

        inner.session = Session::disconnected();
        self.publish(&inner.session);
    }

    /// Read-only snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    /// Watch session status transitions. Intermediate states may coalesce
    /// for slow readers; the latest value is always observable.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to the live telemetry stream of the connected session.
    pub async fn subscribe_telemetry(
        &self,
    ) -> EngineResult<broadcast::Receiver<TelemetrySnapshot>> {
        let inner = self.inner.lock().await;
        match &inner.sampler {
            Some(sampler) if inner.session.is_connected() => Ok(sampler.subscribe()),
            _ => Err(EngineError::AdapterDisconnected(
                "no active session".to_string(),
            )),
        }
    }

    fn publish(&self, session: &Session) {
        let _ = self.status_tx.send(session.status);
        self.events.emit(EngineEvent::SessionChanged {
            status: session.status,
            at: Utc::now(),
        });
        tracing::info!(status = session.status.as_str(), "session state changed");
    }

    fn fail(&self, inner: &mut Inner, err: EngineError) -> EngineError {
        tracing::warn!(error = %err, "session attempt failed");
        inner.session.status = SessionStatus::Error;
        inner.session.error = Some(err.to_string());
        inner.session.connected_at = None;
        self.publish(&inner.session);
        err
    }

    fn spawn_fault_listener(&self, epoch: u64, mut fault_rx: mpsc::Receiver<String>) {
        let inner = Arc::clone(&self.inner);
        let status_tx = self.status_tx.clone();
        let events = self.events.clone();
        let driver: Arc<dyn AdapterDriver> = self.driver.clone();

        tokio::spawn(async move {
            let Some(message) = fault_rx.recv().await else {
                return;
            };
            let mut inner = inner.lock().await;
            if inner.epoch != epoch || inner.session.status != SessionStatus::Connected {
                tracing::debug!("stale sampler fault ignored");
                return;
            }
            tracing::warn!(error = %message, "adapter lost mid-session");

            // The loop already exited; stop() just reaps the task.
            if let Some(sampler) = inner.sampler.take() {
                sampler.stop().await;
            }
            inner.session.status = SessionStatus::Error;
            inner.session.error = Some(message);
            inner.session.connected_at = None;
            let _ = status_tx.send(SessionStatus::Error);
            events.emit(EngineEvent::SessionChanged {
                status: SessionStatus::Error,
                at: Utc::now(),
            });

            if let Err(e) = driver.disconnect().await {
                tracing::debug!(error = %e, "adapter disconnect after fault failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_adapter::MockAdapter;
    use tokio::time;

    fn controller(mock: Arc<MockAdapter>) -> SessionController<MockAdapter> {
        SessionController::new(mock, &EngineConfig::default(), EventBus::default())
    }

    async fn next_status(rx: &mut broadcast::Receiver<EngineEvent>) -> SessionStatus {
        loop {
            if let EngineEvent::SessionChanged { status, .. } = rx.recv().await.unwrap() {
                return status;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_walks_through_states() {
        let mock = Arc::new(MockAdapter::new());
        let events = EventBus::default();
        let controller =
            SessionController::new(mock, &EngineConfig::default(), events.clone());
        let mut rx = events.subscribe();

        let session = controller.connect().await.unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.adapter_name.as_deref(), Some("CarScope SIM"));
        assert_eq!(session.protocol.as_deref(), Some("ISO 15765-4 CAN 11/500"));
        assert!(session.connected_at.is_some());

        assert_eq!(next_status(&mut rx).await, SessionStatus::Scanning);
        assert_eq!(next_status(&mut rx).await, SessionStatus::Connecting);
        assert_eq!(next_status(&mut rx).await, SessionStatus::Connected);

        controller.disconnect().await;
        assert_eq!(next_status(&mut rx).await, SessionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_is_rejected_while_connected() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock);

        controller.connect().await.unwrap();
        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, EngineError::SessionBusy(_)));
        assert!(err.to_string().contains("connected"));

        controller.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_one_wins() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock);

        let (a, b) = tokio::join!(controller.connect(), controller.connect());
        let mut results = [a.is_ok(), b.is_ok()];
        results.sort();
        assert_eq!(results, [false, true]);

        controller.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_failure_lands_in_error() {
        let mock = Arc::new(MockAdapter::new());
        mock.fail_discovery(true);
        let controller = controller(mock.clone());

        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));

        let session = controller.session().await;
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.error.as_deref().unwrap().contains("radio off"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_adapters_in_range_lands_in_error() {
        let mock = Arc::new(MockAdapter::offline());
        let controller = controller(mock);

        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));
        assert_eq!(controller.session().await.status, SessionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_failure_lands_in_error() {
        let mock = Arc::new(MockAdapter::new());
        mock.refuse_connections(true);
        let controller = controller(mock);

        let err = controller.connect().await.unwrap_err();
        assert!(err.to_string().contains("refused"));
        assert_eq!(controller.session().await.status, SessionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_after_error_clears_message() {
        let mock = Arc::new(MockAdapter::new());
        mock.fail_discovery(true);
        let controller = controller(mock.clone());

        controller.connect().await.unwrap_err();
        assert!(controller.session().await.error.is_some());

        mock.fail_discovery(false);
        let session = controller.connect().await.unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
        assert!(session.error.is_none());

        controller.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_sampling() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock.clone());

        controller.connect().await.unwrap();
        let mut telemetry = controller.subscribe_telemetry().await.unwrap();
        telemetry.recv().await.unwrap();

        controller.disconnect().await;
        assert_eq!(controller.session().await.status, SessionStatus::Disconnected);
        assert!(!mock.is_connected());

        // Drain what was already published, then verify the stream ended.
        time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        loop {
            match telemetry.try_recv() {
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Closed) => break,
                Err(other) => panic!("stream still open: {other:?}"),
            }
        }

        // Idempotent.
        controller.disconnect().await;
        assert_eq!(controller.session().await.status, SessionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_requires_active_session() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock);

        let err = controller.subscribe_telemetry().await.unwrap_err();
        assert!(matches!(err, EngineError::AdapterDisconnected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn mid_session_fault_transitions_to_error() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock.clone());

        controller.connect().await.unwrap();
        let mut status = controller.watch_status();
        mock.drop_link_after(0);

        loop {
            status.changed().await.unwrap();
            if *status.borrow() == SessionStatus::Error {
                break;
            }
        }
        let session = controller.session().await;
        assert!(session.error.as_deref().unwrap().contains("link"));
        assert!(session.connected_at.is_none());

        // Error is a valid launch point for a fresh attempt.
        let session = controller.connect().await.unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
        controller.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fault_after_disconnect_does_not_corrupt_state() {
        let mock = Arc::new(MockAdapter::new());
        let controller = controller(mock.clone());

        controller.connect().await.unwrap();
        mock.drop_link_after(0);
        controller.disconnect().await;

        // However the in-flight fault raced the teardown, the new state
        // must hold.
        time::advance(Duration::from_secs(10)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(controller.session().await.status, SessionStatus::Disconnected);
    }
}
