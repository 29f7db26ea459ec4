//! Fixed-cadence telemetry sampler.
//!
//! Polls the adapter for the full PID set on a steady interval and
//! publishes decoded [`TelemetrySnapshot`]s on a broadcast channel.
//! Cancellation is cooperative: `stop()` raises a watch flag and awaits
//! the loop task, so an in-flight sweep finishes but its snapshot is
//! never published after `stop()` returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use cs_adapter::{AdapterDriver, Pid};
use cs_protocol::telemetry::TelemetrySnapshot;

/// Handle to a running sampler task.
pub struct SamplerHandle {
    snapshot_tx: broadcast::Sender<TelemetrySnapshot>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SamplerHandle {
    /// Subscribe to the snapshot stream. Subscribers added mid-stream see
    /// only snapshots produced after this call; delivery per subscriber is
    /// in production order.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetrySnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Stop the sampler and wait for the loop to exit. Idempotent and safe
    /// concurrently with an in-flight tick; once this returns, no further
    /// snapshot is published.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sampler task join failed");
            }
        }
    }
}

/// Spawn the sampling loop. Mid-stream adapter loss sends one message on
/// `fault_tx` before the loop exits.
pub(crate) fn spawn(
    driver: Arc<dyn AdapterDriver>,
    interval: Duration,
    channel_capacity: usize,
    fault_tx: mpsc::Sender<String>,
) -> SamplerHandle {
    let (snapshot_tx, _) = broadcast::channel(channel_capacity);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run_loop(
        driver,
        interval,
        snapshot_tx.clone(),
        stop_rx,
        fault_tx,
    ));

    SamplerHandle {
        snapshot_tx,
        stop_tx,
        task: Mutex::new(Some(task)),
    }
}

async fn run_loop(
    driver: Arc<dyn AdapterDriver>,
    interval: Duration,
    snapshot_tx: broadcast::Sender<TelemetrySnapshot>,
    mut stop_rx: watch::Receiver<bool>,
    fault_tx: mpsc::Sender<String>,
) {
    let mut ticker = time::interval(interval);
    // A delayed tick reschedules instead of bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                // Handle dropped counts as a stop request.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let readings = match driver.read_sweep(&Pid::ALL).await {
                    Ok(readings) => readings,
                    Err(e) => {
                        tracing::warn!(error = %e, "adapter lost mid-stream, sampler exiting");
                        let _ = fault_tx.send(e.to_string()).await;
                        break;
                    }
                };

                // A stop that landed during the sweep suppresses this snapshot.
                if *stop_rx.borrow() {
                    break;
                }

                let snapshot = snapshot_from(readings);
                tracing::debug!(readings = snapshot.reading_count(), "snapshot published");
                let _ = snapshot_tx.send(snapshot);
            }
        }
    }
}

fn snapshot_from(readings: Vec<(Pid, Option<f64>)>) -> TelemetrySnapshot {
    let mut snapshot = TelemetrySnapshot::empty();
    for (pid, value) in readings {
        match pid {
            Pid::EngineRpm => snapshot.rpm = value,
            Pid::VehicleSpeed => snapshot.speed_kph = value,
            Pid::CoolantTemp => snapshot.coolant_temp_c = value,
            Pid::IntakeAirTemp => snapshot.intake_temp_c = value,
            Pid::ThrottlePosition => snapshot.throttle_pct = value,
            Pid::EngineLoad => snapshot.engine_load_pct = value,
            Pid::ShortFuelTrim => snapshot.short_fuel_trim_pct = value,
            Pid::LongFuelTrim => snapshot.long_fuel_trim_pct = value,
            Pid::O2VoltageB1 => snapshot.o2_voltage_b1 = value,
            Pid::O2VoltageB2 => snapshot.o2_voltage_b2 = value,
            Pid::MafRate => snapshot.maf_gps = value,
            Pid::TimingAdvance => snapshot.timing_advance_deg = value,
            Pid::ControlModuleVoltage => snapshot.battery_voltage = value,
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cs_adapter::{
        AdapterCandidate, AdapterError, AdapterLink, AdapterResult, CodeScan, MockAdapter,
    };
    use std::collections::BTreeMap;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn connected_adapter() -> Arc<MockAdapter> {
        let mock = MockAdapter::new();
        let candidates = mock.discover().await.unwrap();
        mock.connect(&candidates[0]).await.unwrap();
        Arc::new(mock)
    }

    fn fault_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(1)
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshots_on_cadence() {
        let adapter = connected_adapter().await;
        adapter.set_value(Pid::EngineRpm, 2100.0);
        let (fault_tx, _fault_rx) = fault_channel();

        let handle = spawn(adapter, Duration::from_secs(1), 64, fault_tx);
        let mut rx = handle.subscribe();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.rpm, Some(2100.0));
        assert_eq!(first.reading_count(), Pid::ALL.len());

        let second = rx.recv().await.unwrap();
        assert!(second.sampled_at >= first.sampled_at);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pid_leaves_field_empty() {
        let adapter = connected_adapter().await;
        adapter.remove_value(Pid::MafRate);
        let (fault_tx, _fault_rx) = fault_channel();

        let handle = spawn(adapter, Duration::from_secs(1), 64, fault_tx);
        let mut rx = handle.subscribe();

        let snapshot = rx.recv().await.unwrap();
        assert!(snapshot.maf_gps.is_none());
        assert!(snapshot.rpm.is_some());
        assert_eq!(snapshot.reading_count(), Pid::ALL.len() - 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_publishing() {
        let adapter = connected_adapter().await;
        let (fault_tx, _fault_rx) = fault_channel();

        let handle = spawn(adapter, Duration::from_secs(1), 64, fault_tx);
        let mut rx = handle.subscribe();
        rx.recv().await.unwrap();

        handle.stop().await;

        // Drain anything produced before the stop, then verify silence.
        while rx.try_recv().is_ok() {}
        time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(matches!(
            rx.try_recv(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let adapter = connected_adapter().await;
        let (fault_tx, _fault_rx) = fault_channel();

        let handle = spawn(adapter, Duration::from_secs(1), 64, fault_tx);
        handle.stop().await;
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_loss_sends_fault_and_exits() {
        let adapter = connected_adapter().await;
        // First sweep (13 reads) succeeds, second sweep hits the drop.
        adapter.drop_link_after(Pid::ALL.len() as u64);
        let (fault_tx, mut fault_rx) = fault_channel();

        let handle = spawn(adapter.clone(), Duration::from_secs(1), 64, fault_tx);
        let mut rx = handle.subscribe();

        rx.recv().await.unwrap();
        let fault = fault_rx.recv().await.unwrap();
        assert!(fault.contains("link dropped"));

        // Loop exited on its own; stop() just joins.
        handle.stop().await;
        while rx.try_recv().is_ok() {}
        time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    // Adapter whose reads take real time, for exercising the in-flight
    // suppression path.
    struct SlowDriver;

    #[async_trait]
    impl AdapterDriver for SlowDriver {
        async fn discover(&self) -> AdapterResult<Vec<AdapterCandidate>> {
            Ok(vec![])
        }
        async fn connect(&self, _candidate: &AdapterCandidate) -> AdapterResult<AdapterLink> {
            Err(AdapterError::Unavailable("test driver".into()))
        }
        async fn read_pid(&self, _pid: Pid) -> AdapterResult<f64> {
            time::sleep(Duration::from_millis(50)).await;
            Ok(800.0)
        }
        async fn read_codes(&self) -> AdapterResult<CodeScan> {
            Ok(CodeScan::default())
        }
        async fn read_freeze_frame(&self, _code: &str) -> AdapterResult<BTreeMap<String, f64>> {
            Ok(BTreeMap::new())
        }
        async fn clear_codes(&self) -> AdapterResult<()> {
            Ok(())
        }
        async fn disconnect(&self) -> AdapterResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_sweep_is_suppressed_by_stop() {
        let (fault_tx, _fault_rx) = fault_channel();
        let handle = spawn(Arc::new(SlowDriver), Duration::from_secs(60), 64, fault_tx);
        let mut rx = handle.subscribe();

        // Let the first sweep get underway (it sleeps inside read_pid).
        tokio::task::yield_now().await;
        handle.stop().await;

        // The sweep completed during stop(), but its snapshot was dropped.
        assert!(rx.try_recv().is_err());
    }
}
