//! ALSA-backed audio driver.
//!
//! Each stream runs its callback on a dedicated std::thread (NOT a tokio
//! task) so realtime I/O never competes with the async side.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use alsa::pcm::PCM;
use anyhow::{Context, Result};

use super::alsa_device::{self, AlsaParams};
use super::driver::{AudioDriver, AudioStream, CaptureCallback, PlaybackCallback, StreamParams};
use super::play::play_thread;
use super::record::record_thread;

pub struct AlsaDriver {
    capture_device: String,
    playback_device: String,
    initialized: bool,
}

impl AlsaDriver {
    pub fn new(capture_device: impl Into<String>, playback_device: impl Into<String>) -> Self {
        Self {
            capture_device: capture_device.into(),
            playback_device: playback_device.into(),
            initialized: false,
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            anyhow::bail!("ALSA driver is not initialized");
        }
        Ok(())
    }
}

impl AudioDriver for AlsaDriver {
    fn initialize(&mut self) -> Result<()> {
        let mut cards = Vec::new();
        for card in alsa::card::Iter::new() {
            let card = card.context("Failed to enumerate ALSA sound cards")?;
            let name = card
                .get_name()
                .unwrap_or_else(|_| format!("card {}", card.get_index()));
            cards.push(name);
        }

        if cards.is_empty() {
            log::warn!(
                "No ALSA sound cards found, relying on PCM plugins \"{}\" / \"{}\"",
                self.capture_device,
                self.playback_device,
            );
        } else {
            log::info!("ALSA sound cards: {}", cards.join(", "));
        }

        self.initialized = true;
        Ok(())
    }

    fn open_input(
        &mut self,
        params: &StreamParams,
        callback: CaptureCallback,
    ) -> Result<Box<dyn AudioStream>> {
        self.ensure_initialized()?;
        let (pcm, hw) = alsa_device::open_capture(&self.capture_device, params)
            .context("Could not find recorder")?;
        Ok(Box::new(AlsaStream::new(
            "audio-record",
            pcm,
            hw,
            params.period_samples(),
            StreamCallback::Capture(callback),
        )))
    }

    fn open_output(
        &mut self,
        params: &StreamParams,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn AudioStream>> {
        self.ensure_initialized()?;
        let (pcm, hw) = alsa_device::open_playback(&self.playback_device, params)
            .context("Could not find the playback device")?;
        Ok(Box::new(AlsaStream::new(
            "audio-play",
            pcm,
            hw,
            params.period_samples(),
            StreamCallback::Playback(callback),
        )))
    }

    fn terminate(&mut self) {
        if mem::take(&mut self.initialized) {
            log::info!("ALSA driver terminated");
        }
    }
}

enum StreamCallback {
    Capture(CaptureCallback),
    Playback(PlaybackCallback),
}

/// Everything the stream thread needs; handed back when the thread exits
/// so a stopped stream can be started again.
struct Endpoint {
    pcm: PCM,
    hw: AlsaParams,
    callback: StreamCallback,
}

impl Endpoint {
    fn run(&mut self, period_samples: usize, running: &AtomicBool) -> Result<()> {
        match &mut self.callback {
            StreamCallback::Capture(cb) => {
                record_thread(&self.pcm, &self.hw, period_samples, cb, running)
            }
            StreamCallback::Playback(cb) => {
                play_thread(&self.pcm, &self.hw, period_samples, cb, running)
            }
        }
    }
}

enum StreamState {
    Idle(Endpoint),
    Running(JoinHandle<Endpoint>),
    Closed,
}

pub struct AlsaStream {
    name: &'static str,
    period_samples: usize,
    running: Arc<AtomicBool>,
    state: StreamState,
}

impl AlsaStream {
    fn new(
        name: &'static str,
        pcm: PCM,
        hw: AlsaParams,
        period_samples: usize,
        callback: StreamCallback,
    ) -> Self {
        Self {
            name,
            period_samples,
            running: Arc::new(AtomicBool::new(false)),
            state: StreamState::Idle(Endpoint { pcm, hw, callback }),
        }
    }
}

impl AudioStream for AlsaStream {
    fn start(&mut self) -> Result<()> {
        let mut endpoint = match mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Idle(endpoint) => endpoint,
            running @ StreamState::Running(_) => {
                self.state = running;
                return Ok(());
            }
            StreamState::Closed => anyhow::bail!("{} stream is closed", self.name),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let period_samples = self.period_samples;
        let name = self.name;

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                if let Err(e) = endpoint.run(period_samples, &running) {
                    log::error!("{} thread error: {}", name, e);
                }
                endpoint
            })
            .with_context(|| format!("Failed to spawn {} thread", name))?;

        self.state = StreamState::Running(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let handle = match mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Running(handle) => handle,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        self.running.store(false, Ordering::SeqCst);
        let endpoint = handle
            .join()
            .map_err(|_| anyhow::anyhow!("{} thread panicked", self.name))?;

        // Discard whatever is still buffered and get ready for a restart
        if let Err(e) = PCM::drop(&endpoint.pcm) {
            log::warn!("{}: failed to drop pending frames: {}", self.name, e);
        }
        endpoint.pcm.prepare()?;
        self.state = StreamState::Idle(endpoint);
        Ok(())
    }

    fn is_active(&self) -> bool {
        matches!(&self.state, StreamState::Running(h) if !h.is_finished())
    }
}

impl Drop for AlsaStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{}: error while closing: {}", self.name, e);
        }
        log::debug!("{} stream closed", self.name);
    }
}
