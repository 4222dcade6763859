//! # Link Session
//!
//! Owns the serial transport and runs the two link loops:
//!
//! - **Writer**: every packet interval, maps the latest controller input
//!   through the current mapping table, encodes an RC channels frame and
//!   writes it. The transmitted channels are published for observers.
//! - **Reader**: polls the port with a bounded read, feeds the bytes to a
//!   [`FrameDecoder`] and merges decoded telemetry into the shared
//!   [`TelemetrySnapshot`].
//!
//! Transport failures are logged and retried after a backoff; they never
//! end the session. Only [`LinkSession::stop`] does. A failed write, or
//! three failed reads in a row, closes the port so the writer re-opens it.
//!
//! ## Usage
//!
//! ```no_run
//! use crsf_bridge::controller::{MappingTable, RawInput};
//! use crsf_bridge::serial::SerialOpener;
//! use crsf_bridge::session::{LinkSession, SessionConfig};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (_input_tx, input_rx) = watch::channel(RawInput::default());
//!     let session = LinkSession::start(
//!         SessionConfig::default(),
//!         Box::new(SerialOpener),
//!         input_rx,
//!         MappingTable::new(),
//!     );
//!
//!     let telemetry = session.telemetry();
//!     println!("{:?}", telemetry.borrow().get("Voltage"));
//!
//!     session.stop().await;
//! }
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::controller::channel_mapper::map_to_channels;
use crate::controller::{MappingTable, RawInput};
use crate::crsf::decoder::FrameDecoder;
use crate::crsf::encoder::encode_rc_channels_frame;
use crate::crsf::protocol::{RcChannels, CRSF_CHANNEL_VALUE_CENTER, CRSF_NUM_CHANNELS};
use crate::error::{BridgeError, Result};
use crate::serial::port_trait::{PortOpener, SerialPortIO};
use crate::serial::{AUTO_PORT, DEFAULT_BAUD_RATE};
use crate::telemetry::{parse_frame, TelemetrySnapshot};

/// Bytes requested per serial read
const READ_BUFFER_SIZE: usize = 256;

/// Consecutive failed reads after which the port is closed and re-opened
const MAX_READ_FAILURES: u32 = 3;

/// Timing and endpoint settings of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Port name passed to the opener (may be `"auto"`)
    pub port: String,
    pub baud_rate: u32,

    /// Period of the writer loop
    pub packet_interval: Duration,

    /// Upper bound on one read
    pub read_poll: Duration,

    /// Upper bound on one frame write
    pub write_timeout: Duration,

    /// Reader pause when no bytes arrived
    pub idle_backoff: Duration,

    /// Pause after a failed read or write
    pub error_backoff: Duration,

    /// Pause between attempts to open the port
    pub reconnect_interval: Duration,

    /// Transmitted packets between status log lines
    pub status_interval_packets: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            packet_interval: Duration::from_millis(20),
            read_poll: Duration::from_millis(10),
            write_timeout: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(5),
            error_backoff: Duration::from_secs(1),
            reconnect_interval: Duration::from_secs(1),
            status_interval_packets: 500,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            port: config.serial.port.clone(),
            baud_rate: config.serial.baud_rate,
            packet_interval: config.link.packet_interval(),
            read_poll: Duration::from_millis(config.link.read_poll_ms),
            write_timeout: Duration::from_millis(config.serial.timeout_ms),
            reconnect_interval: Duration::from_millis(config.serial.reconnect_interval_ms),
            error_backoff: Duration::from_millis(config.serial.reconnect_interval_ms),
            status_interval_packets: config.link.status_interval_packets,
            ..Self::default()
        }
    }
}

/// The open port (if any) and where to open it
struct Transport {
    port: Option<Box<dyn SerialPortIO>>,
    port_name: String,
    baud_rate: u32,

    /// Bumped every time a port is attached
    generation: u64,
}

impl Transport {
    fn attach(&mut self, port: Box<dyn SerialPortIO>) {
        self.port = Some(port);
        self.generation += 1;
    }
}

enum ReadOutcome {
    Data(usize),
    Idle,
    NoTransport,
    Failed(io::Error),
}

enum WriteOutcome {
    Sent,
    NoTransport,
    Failed(io::Error),
}

/// State shared by the session handle and both loops
struct Shared {
    transport: Mutex<Transport>,

    /// Serializes port opens; held across the open, unlike `transport`
    open_lock: Mutex<()>,
    opener: Arc<dyn PortOpener>,
    config: SessionConfig,
    telemetry: watch::Sender<TelemetrySnapshot>,
    channels: watch::Sender<RcChannels>,
    mapping: watch::Sender<Arc<MappingTable>>,
    stop: watch::Sender<bool>,
}

impl Shared {
    /// Run the opener on the blocking pool; it may scan for ports.
    async fn open(&self, port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPortIO>> {
        let opener = Arc::clone(&self.opener);
        let port_name = port_name.to_string();

        tokio::task::spawn_blocking(move || opener.open(&port_name, baud_rate))
            .await
            .map_err(|e| BridgeError::Serial(format!("Port open task failed: {}", e)))?
    }

    /// Open the configured port unless one is already open.
    async fn connect(&self) -> bool {
        let _opening = self.open_lock.lock().await;

        let (port_name, baud_rate) = {
            let transport = self.transport.lock().await;
            if transport.port.is_some() {
                return true;
            }
            (transport.port_name.clone(), transport.baud_rate)
        };

        match self.open(&port_name, baud_rate).await {
            Ok(port) => {
                info!("Serial link up on {} at {} baud", port_name, baud_rate);
                self.transport.lock().await.attach(port);
                true
            }
            Err(e) => {
                warn!("Failed to open serial port {}: {}", port_name, e);
                false
            }
        }
    }

    /// Close the port if it is still the one attached as `generation`.
    async fn disconnect(&self, generation: u64) {
        let mut transport = self.transport.lock().await;
        if transport.generation == generation && transport.port.take().is_some() {
            warn!("Closed serial port {}, will re-open", transport.port_name);
        }
    }

    /// Write one frame. A failed or timed-out write closes the port.
    async fn write_frame(&self, frame: &[u8]) -> WriteOutcome {
        let mut transport = self.transport.lock().await;
        let Some(port) = transport.port.as_mut() else {
            return WriteOutcome::NoTransport;
        };

        let write = async {
            port.write_all(frame).await?;
            port.flush().await
        };

        let result = match timeout(self.config.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "serial write timed out",
            )),
        };

        match result {
            Ok(()) => WriteOutcome::Sent,
            Err(e) => {
                transport.port = None;
                WriteOutcome::Failed(e)
            }
        }
    }

    /// One bounded read, tagged with the generation of the port it used.
    async fn read_chunk(&self, buf: &mut [u8]) -> (ReadOutcome, u64) {
        let mut transport = self.transport.lock().await;
        let generation = transport.generation;
        let Some(port) = transport.port.as_mut() else {
            return (ReadOutcome::NoTransport, generation);
        };

        let outcome = match timeout(self.config.read_poll, port.read(buf)).await {
            Err(_) | Ok(Ok(0)) => ReadOutcome::Idle,
            Ok(Ok(n)) => ReadOutcome::Data(n),
            Ok(Err(e)) => ReadOutcome::Failed(e),
        };
        (outcome, generation)
    }
}

/// Sleep for `duration`, returning early once stop is signalled.
async fn sleep_or_stop(duration: Duration, stop: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = sleep(duration) => {}
        _ = stop.changed() => {}
    }
}

async fn writer_loop(
    shared: Arc<Shared>,
    input: watch::Receiver<RawInput>,
    mapping: watch::Receiver<Arc<MappingTable>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(shared.config.packet_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let status_interval = shared.config.status_interval_packets.max(1);
    let mut sent: u64 = 0;

    while !*stop.borrow() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            break;
        }

        let channels = {
            let input = input.borrow();
            let table = mapping.borrow();
            map_to_channels(&input, &table)
        };

        let frame = match encode_rc_channels_frame(&channels) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode RC channels: {}", e);
                continue;
            }
        };

        match shared.write_frame(&frame).await {
            WriteOutcome::Sent => {
                shared.channels.send_replace(channels);
                sent += 1;

                if sent % status_interval == 0 {
                    info!("Sent {} packets", sent);
                }
            }
            WriteOutcome::NoTransport => {
                if !shared.connect().await {
                    sleep_or_stop(shared.config.reconnect_interval, &mut stop).await;
                }
            }
            WriteOutcome::Failed(e) => {
                warn!("Failed to send RC frame, closing port: {}", e);
                sleep_or_stop(shared.config.error_backoff, &mut stop).await;
            }
        }
    }

    info!("Writer stopped, total packets sent: {}", sent);
}

async fn reader_loop(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut seen_generation = 0;
    let mut failures: u32 = 0;

    while !*stop.borrow() {
        let (outcome, generation) = shared.read_chunk(&mut buf).await;

        // Bytes left from a previous port belong to no frame on this one
        if generation != seen_generation {
            decoder.clear();
            seen_generation = generation;
            failures = 0;
        }

        match outcome {
            ReadOutcome::Data(n) => {
                failures = 0;
                for frame in decoder.decode(&buf[..n]) {
                    if let Some(record) = parse_frame(&frame) {
                        shared
                            .telemetry
                            .send_modify(|snapshot| snapshot.apply(&record));
                    }
                }
            }
            ReadOutcome::Idle => {
                failures = 0;
                sleep_or_stop(shared.config.idle_backoff, &mut stop).await;
            }
            ReadOutcome::NoTransport => {
                sleep_or_stop(shared.config.packet_interval, &mut stop).await;
            }
            ReadOutcome::Failed(e) => {
                warn!("Serial read failed: {}", e);
                failures += 1;
                if failures >= MAX_READ_FAILURES {
                    shared.disconnect(generation).await;
                    decoder.clear();
                    failures = 0;
                }
                sleep_or_stop(shared.config.error_backoff, &mut stop).await;
            }
        }
    }

    let stats = decoder.stats();
    info!(
        "Reader stopped: {} frames, {} CRC errors, {} bytes discarded",
        stats.frames, stats.crc_errors, stats.discarded_bytes
    );
}

/// A running link: transport plus writer and reader tasks
///
/// Dropping the session signals both loops to stop; [`LinkSession::stop`]
/// additionally waits for them and closes the port.
pub struct LinkSession {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for LinkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSession")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl LinkSession {
    /// Spawn the writer and reader loops.
    ///
    /// The port is opened by the writer on its first cycle. Must be called
    /// from within a tokio runtime.
    pub fn start(
        config: SessionConfig,
        opener: Box<dyn PortOpener>,
        input: watch::Receiver<RawInput>,
        table: MappingTable,
    ) -> Self {
        let (telemetry, _) = watch::channel(TelemetrySnapshot::new());
        let (channels, _) = watch::channel([CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS]);
        let (mapping, mapping_rx) = watch::channel(Arc::new(table));
        let (stop, _) = watch::channel(false);

        info!(
            "Starting link on {} at {} baud, {:?} packet interval",
            config.port, config.baud_rate, config.packet_interval
        );

        let shared = Arc::new(Shared {
            transport: Mutex::new(Transport {
                port: None,
                port_name: config.port.clone(),
                baud_rate: config.baud_rate,
                generation: 0,
            }),
            open_lock: Mutex::new(()),
            opener: Arc::from(opener),
            config,
            telemetry,
            channels,
            mapping,
            stop,
        });

        let writer = tokio::spawn(writer_loop(
            Arc::clone(&shared),
            input,
            mapping_rx,
            shared.stop.subscribe(),
        ));
        let reader = tokio::spawn(reader_loop(Arc::clone(&shared), shared.stop.subscribe()));

        Self {
            shared,
            tasks: vec![writer, reader],
        }
    }

    /// Live view of the telemetry snapshot.
    pub fn telemetry(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.shared.telemetry.subscribe()
    }

    /// Live view of the last transmitted channel values.
    pub fn channels(&self) -> watch::Receiver<RcChannels> {
        self.shared.channels.subscribe()
    }

    /// The mapping table the writer currently uses.
    pub fn mapping(&self) -> Arc<MappingTable> {
        Arc::clone(&self.shared.mapping.borrow())
    }

    /// Replace the mapping table; takes effect on the next writer cycle.
    pub fn set_mapping(&self, table: MappingTable) {
        debug!("Mapping table replaced ({} entries)", table.len());
        self.shared.mapping.send_replace(Arc::new(table));
    }

    /// Whether a port is currently open.
    pub async fn is_connected(&self) -> bool {
        self.shared.transport.lock().await.port.is_some()
    }

    /// Port name and baud rate used for (re)connecting.
    pub async fn endpoint(&self) -> (String, u32) {
        let transport = self.shared.transport.lock().await;
        (transport.port_name.clone(), transport.baud_rate)
    }

    /// Close the current port and open `port` at `baud_rate`.
    ///
    /// Both loops keep running. On failure the session is left without a
    /// transport and the writer keeps retrying the new endpoint.
    ///
    /// # Errors
    ///
    /// Returns the opener's error if the new port cannot be opened.
    pub async fn reconfigure(&self, port: &str, baud_rate: u32) -> Result<()> {
        let _opening = self.shared.open_lock.lock().await;

        {
            let mut transport = self.shared.transport.lock().await;
            if transport.port.take().is_some() {
                info!("Closed serial port {}", transport.port_name);
            }
            transport.port_name = port.to_string();
            transport.baud_rate = baud_rate;
        }

        match self.shared.open(port, baud_rate).await {
            Ok(handle) => {
                info!("Serial link up on {} at {} baud", port, baud_rate);
                self.shared.transport.lock().await.attach(handle);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to open serial port {}: {}", port, e);
                Err(e)
            }
        }
    }

    /// Stop both loops, wait for them, and close the port.
    pub async fn stop(mut self) {
        self.shared.stop.send_replace(true);

        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Link task ended abnormally: {}", e);
            }
        }

        if self.shared.transport.lock().await.port.take().is_some() {
            info!("Serial port closed");
        }
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.shared.stop.send_replace(true);
    }
}
