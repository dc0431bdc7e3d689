//! Session controller: brings the driver, codec and streams up in order,
//! waits for the user, and tears everything down in reverse.

use std::mem;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::signal;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{
    AudioDriver, AudioStream, CodecAdapter, CodecError, FrameQueue, LoopbackContext, PacketStats,
};
use crate::config::Config;
use crate::report::StatsReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    DriverReady,
    CodecReady,
    StreamsCreated,
    StreamsRunning,
    Stopping,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    UserQuit,
    Interrupted,
    IterationsElapsed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to initialize audio driver: {0:#}")]
    DriverInit(anyhow::Error),
    #[error("Failed to initialize codec: {0}")]
    CodecInit(CodecError),
    #[error("I can not create I/O streams: {0:#}")]
    StreamOpen(anyhow::Error),
    #[error("I can not start I/O streams: {0:#}")]
    StreamStart(anyhow::Error),
}

pub struct Session<D: AudioDriver> {
    id: Uuid,
    config: Config,
    driver: D,
    driver_ready: bool,
    state: SessionState,
    codec: Arc<CodecAdapter>,
    loopback: Arc<LoopbackContext>,
    playback: Option<Box<dyn AudioStream>>,
    capture: Option<Box<dyn AudioStream>>,
}

impl<D: AudioDriver> Session<D> {
    pub fn new(config: Config, driver: D) -> Self {
        let codec = Arc::new(CodecAdapter::new());
        let loopback = Arc::new(LoopbackContext::new(
            codec.clone(),
            Arc::new(FrameQueue::new(config.queue_limit())),
            Arc::new(PacketStats::new()),
        ));

        Self {
            id: Uuid::new_v4(),
            config,
            driver,
            driver_ready: false,
            state: SessionState::Uninitialized,
            codec,
            loopback,
            playback: None,
            capture: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Driver → codec → streams created → streams running.
    ///
    /// Any failure releases whatever was acquired, newest first, and leaves
    /// the session `TornDown`. Only valid from `Uninitialized`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            log::warn!("[{}] start ignored in state {:?}", self.id, self.state);
            return Ok(());
        }

        if let Err(e) = self.bring_up() {
            log::error!("[{}] {}", self.id, e);
            self.teardown();
            return Err(e);
        }
        log::info!("[{}] streams running", self.id);
        Ok(())
    }

    fn bring_up(&mut self) -> Result<(), SessionError> {
        self.driver.initialize().map_err(SessionError::DriverInit)?;
        self.driver_ready = true;
        self.state = SessionState::DriverReady;
        log::info!("[{}] audio driver initialized", self.id);

        self.codec
            .initialize(&self.config.codec_params())
            .map_err(SessionError::CodecInit)?;
        self.state = SessionState::CodecReady;

        self.create_streams().map_err(SessionError::StreamOpen)?;
        self.state = SessionState::StreamsCreated;

        self.start_streams().map_err(SessionError::StreamStart)?;
        self.state = SessionState::StreamsRunning;
        Ok(())
    }

    fn create_streams(&mut self) -> anyhow::Result<()> {
        let params = self.config.stream_params();

        let ctx = self.loopback.clone();
        let playback = self
            .driver
            .open_output(&params, Box::new(move |out: &mut [i16]| ctx.on_playback(out)))
            .context("Could not create streaming stream")?;
        self.playback = Some(playback);

        let ctx = self.loopback.clone();
        let capture = self
            .driver
            .open_input(&params, Box::new(move |input: &[i16]| ctx.on_capture(input)))
            .context("Could not create stream record")?;
        self.capture = Some(capture);
        Ok(())
    }

    fn start_streams(&mut self) -> anyhow::Result<()> {
        if let Some(stream) = self.playback.as_mut() {
            stream.start().context("Unable to start streaming playback")?;
        }
        if let Some(stream) = self.capture.as_mut() {
            stream.start().context("Could not start stream record")?;
        }
        Ok(())
    }

    /// Poll until the user quits, Ctrl+C arrives, or the configured number
    /// of poll rounds has elapsed.
    pub async fn wait_for_quit(&self, quit: &mut mpsc::Receiver<()>) -> QuitReason {
        for _ in 0..self.config.poll_iterations {
            tokio::select! {
                Some(()) = quit.recv() => return QuitReason::UserQuit,
                Ok(()) = signal::ctrl_c() => return QuitReason::Interrupted,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
            if self.state == SessionState::StreamsRunning && !self.streams_active() {
                log::warn!("[{}] audio stream stopped unexpectedly", self.id);
            }
            log::debug!(
                "[{}] queue depth: {}",
                self.id,
                self.loopback.queue().len()
            );
        }
        QuitReason::IterationsElapsed
    }

    pub fn streams_active(&self) -> bool {
        [&self.playback, &self.capture]
            .into_iter()
            .all(|s| s.as_ref().is_some_and(|s| s.is_active()))
    }

    /// Stop both streams, close them, release the codec and the driver.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        log::info!("[{}] shutting down from {:?}", self.id, self.state);
        self.teardown();
    }

    fn teardown(&mut self) {
        self.state = SessionState::Stopping;

        // Capture first so nothing new is queued while playback winds down
        for (name, stream) in [("capture", &mut self.capture), ("playback", &mut self.playback)] {
            if let Some(stream) = stream.as_mut() {
                if let Err(e) = stream.stop() {
                    log::warn!("[{}] failed to stop {} stream: {:#}", self.id, name, e);
                }
            }
        }

        // Close in reverse creation order
        drop(self.capture.take());
        drop(self.playback.take());

        let queue = self.loopback.queue();
        if !queue.is_empty() {
            log::debug!("[{}] {} packets left unplayed", self.id, queue.len());
        }

        self.codec.shutdown();

        if mem::take(&mut self.driver_ready) {
            self.driver.terminate();
        }
        self.state = SessionState::TornDown;
    }

    pub fn report(&self) -> StatsReport {
        let queue = self.loopback.queue();
        StatsReport {
            stats: self.loopback.stats().snapshot(),
            buffer_size: self.config.frame_size as u64,
            queue_high_water: queue.high_water_mark(),
            queue_dropped: queue.dropped(),
        }
    }
}

impl<D: AudioDriver> Drop for Session<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
