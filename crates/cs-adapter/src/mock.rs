//! Mock adapter for testing and simulation.
//!
//! Supports scripted PID values, code scans, freeze frames, and failure
//! injection (refused connections, mid-session link drops). All tests use
//! this instead of real hardware so the suite runs in CI on any platform.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::driver::{AdapterCandidate, AdapterDriver, AdapterLink, CodeScan, Transport};
use crate::error::{AdapterError, AdapterResult};
use crate::pid::Pid;

/// Scriptable in-memory adapter.
pub struct MockAdapter {
    candidates: Mutex<Vec<AdapterCandidate>>,
    fail_discovery: AtomicBool,
    refuse_connect: AtomicBool,
    connected: AtomicBool,
    pid_values: Mutex<HashMap<Pid, f64>>,
    scan: Mutex<CodeScan>,
    freeze_frames: Mutex<HashMap<String, BTreeMap<String, f64>>>,
    /// When set, the link drops after this many successful PID reads.
    drop_after_reads: Mutex<Option<u64>>,
    reads: AtomicU64,
    clear_calls: AtomicU64,
    disconnect_calls: AtomicU64,
}

impl MockAdapter {
    /// A discoverable adapter reporting a healthy warm idle.
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(Pid::EngineRpm, 800.0);
        values.insert(Pid::VehicleSpeed, 0.0);
        values.insert(Pid::CoolantTemp, 90.0);
        values.insert(Pid::IntakeAirTemp, 25.0);
        values.insert(Pid::ThrottlePosition, 12.0);
        values.insert(Pid::EngineLoad, 22.0);
        values.insert(Pid::ShortFuelTrim, 1.5);
        values.insert(Pid::LongFuelTrim, 2.0);
        values.insert(Pid::O2VoltageB1, 0.45);
        values.insert(Pid::O2VoltageB2, 0.44);
        values.insert(Pid::MafRate, 3.5);
        values.insert(Pid::TimingAdvance, 12.0);
        values.insert(Pid::ControlModuleVoltage, 14.2);

        Self {
            candidates: Mutex::new(vec![AdapterCandidate {
                name: "CarScope SIM".to_string(),
                transport: Transport::Bluetooth,
            }]),
            fail_discovery: AtomicBool::new(false),
            refuse_connect: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            pid_values: Mutex::new(values),
            scan: Mutex::new(CodeScan::default()),
            freeze_frames: Mutex::new(HashMap::new()),
            drop_after_reads: Mutex::new(None),
            reads: AtomicU64::new(0),
            clear_calls: AtomicU64::new(0),
            disconnect_calls: AtomicU64::new(0),
        }
    }

    /// An adapter that discovery never finds.
    pub fn offline() -> Self {
        let mock = Self::new();
        mock.candidates.lock().unwrap().clear();
        mock
    }

    /// Toggle outright `discover` failure.
    pub fn fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// Toggle `connect` refusal.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Set the live value returned for a PID.
    pub fn set_value(&self, pid: Pid, value: f64) {
        self.pid_values.lock().unwrap().insert(pid, value);
    }

    /// Remove a PID so reads report it as unsupported.
    pub fn remove_value(&self, pid: Pid) {
        self.pid_values.lock().unwrap().remove(&pid);
    }

    /// Replace the stored/pending code scan.
    pub fn set_scan(&self, scan: CodeScan) {
        *self.scan.lock().unwrap() = scan;
    }

    /// Attach a freeze frame for a stored code.
    pub fn set_freeze_frame(&self, code: &str, frame: BTreeMap<String, f64>) {
        self.freeze_frames
            .lock()
            .unwrap()
            .insert(code.to_uppercase(), frame);
    }

    /// Drop the link after `n` more successful PID reads.
    pub fn drop_link_after(&self, n: u64) {
        *self.drop_after_reads.lock().unwrap() = Some(self.reads.load(Ordering::SeqCst) + n);
    }

    /// Drop the link immediately.
    pub fn drop_link_now(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Total `read_pid` calls observed.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> u64 {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    fn require_connected(&self) -> AdapterResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::Disconnected("adapter not connected".into()))
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdapterDriver for MockAdapter {
    async fn discover(&self) -> AdapterResult<Vec<AdapterCandidate>> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("bluetooth radio off".into()));
        }
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn connect(&self, candidate: &AdapterCandidate) -> AdapterResult<AdapterLink> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable(format!(
                "{} refused the connection",
                candidate.name
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(AdapterLink {
            adapter_name: candidate.name.clone(),
            protocol: "ISO 15765-4 CAN 11/500".to_string(),
        })
    }

    async fn read_pid(&self, pid: Pid) -> AdapterResult<f64> {
        self.require_connected()?;

        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = *self.drop_after_reads.lock().unwrap() {
            if reads > limit {
                self.connected.store(false, Ordering::SeqCst);
                return Err(AdapterError::Disconnected("link dropped".into()));
            }
        }

        match self.pid_values.lock().unwrap().get(&pid) {
            Some(value) => Ok(*value),
            None => Err(AdapterError::UnsupportedPid { pid: pid.code() }),
        }
    }

    async fn read_codes(&self) -> AdapterResult<CodeScan> {
        self.require_connected()?;
        Ok(self.scan.lock().unwrap().clone())
    }

    async fn read_freeze_frame(&self, code: &str) -> AdapterResult<BTreeMap<String, f64>> {
        self.require_connected()?;
        Ok(self
            .freeze_frames
            .lock()
            .unwrap()
            .get(&code.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_codes(&self) -> AdapterResult<()> {
        self.require_connected()?;
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        *self.scan.lock().unwrap() = CodeScan::default();
        self.freeze_frames.lock().unwrap().clear();
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
