// Synthetic media provider: generates deterministic fragments on a timer
// instead of reading real hardware. Used by the demo binary and the test
// suite, and doubles as the reference implementation of the stream contract.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::provider::{
    CaptureConstraints, CaptureStream, DeviceDescriptor, MediaChunk, MediaError, MediaProvider,
};

const DEFAULT_CHUNK_BYTES: usize = 16 * 1024;
const FRAGMENT_CHANNEL_CAPACITY: usize = 100;

/// In-process provider backed by generated frames.
///
/// Tracks the liveness of every stream it has handed out, keyed by device id,
/// so callers can verify that device switches never leave two streams holding
/// hardware at once.
pub struct SyntheticProvider {
    devices: Vec<DeviceDescriptor>,
    chunk_bytes: usize,
    live: Arc<Mutex<BTreeMap<String, Arc<AtomicBool>>>>,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::with_devices(vec![DeviceDescriptor::video(
            "synthetic-cam-0",
            "Built-in Synthetic Camera",
        )])
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            live: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Device ids whose most recently opened stream still holds its tracks.
    pub fn live_devices(&self) -> Vec<String> {
        let live = self.live.lock().unwrap();
        live.iter()
            .filter(|(_, flag)| flag.load(Ordering::SeqCst))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn live_stream_count(&self) -> usize {
        self.live_devices().len()
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProvider for SyntheticProvider {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError> {
        Ok(self.devices.clone())
    }

    async fn open_stream(
        &self,
        device_id: &str,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, MediaError> {
        let device = self
            .devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| MediaError::DeviceAccess(format!("unknown device: {}", device_id)))?;

        let live = Arc::new(AtomicBool::new(true));
        self.live
            .lock()
            .unwrap()
            .insert(device.id.clone(), Arc::clone(&live));

        debug!("opened synthetic stream on {}", device.id);
        Ok(Box::new(SyntheticStream {
            device_id: device.id.clone(),
            live,
            chunk_bytes: self.chunk_bytes,
            pump: None,
        }))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Stream that pumps one generated fragment per timeslice.
pub struct SyntheticStream {
    device_id: String,
    live: Arc<AtomicBool>,
    chunk_bytes: usize,
    pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl CaptureStream for SyntheticStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn start_capture(
        &mut self,
        timeslice: Duration,
    ) -> Result<mpsc::Receiver<MediaChunk>, MediaError> {
        if !self.is_live() {
            return Err(MediaError::DeviceAccess(format!(
                "stream on {} already released",
                self.device_id
            )));
        }
        // A restart supersedes any previous delivery.
        if let Some(old) = self.pump.take() {
            old.abort();
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let live = Arc::clone(&self.live);
        let chunk_bytes = self.chunk_bytes;
        self.pump = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(timeslice);
            // The first tick completes immediately; fragments should arrive
            // one full timeslice apart.
            ticker.tick().await;
            let mut seq: u64 = 0;
            loop {
                ticker.tick().await;
                if !live.load(Ordering::SeqCst) {
                    break;
                }
                let chunk = MediaChunk {
                    data: vec![(seq & 0xff) as u8; chunk_bytes],
                    timestamp_ms: started.elapsed().as_millis() as u64,
                };
                if tx.send(chunk).await.is_err() {
                    // Receiver dropped; nobody is recording anymore.
                    break;
                }
                seq += 1;
            }
        }));
        Ok(rx)
    }

    async fn stop_capture(&mut self) -> Result<(), MediaError> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("stopped fragment delivery on {}", self.device_id);
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<(), MediaError> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("released synthetic stream on {}", self.device_id);
        }
        Ok(())
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.live.store(false, Ordering::SeqCst);
    }
}
