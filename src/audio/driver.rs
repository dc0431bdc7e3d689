//! Audio I/O boundary: a driver that owns realtime threads and calls back
//! into the loopback once per period.

use std::time::Duration;

use anyhow::Result;

/// Receives exactly one period of interleaved input samples.
pub type CaptureCallback = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// Must fill exactly one period of interleaved output samples.
pub type PlaybackCallback = Box<dyn FnMut(&mut [i16]) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel handed to each callback
    pub frames_per_period: usize,
    pub suggested_latency: Duration,
}

impl StreamParams {
    /// Interleaved samples per callback.
    pub fn period_samples(&self) -> usize {
        self.frames_per_period * self.channels as usize
    }
}

pub trait AudioDriver: Send {
    fn initialize(&mut self) -> Result<()>;

    fn open_input(
        &mut self,
        params: &StreamParams,
        callback: CaptureCallback,
    ) -> Result<Box<dyn AudioStream>>;

    fn open_output(
        &mut self,
        params: &StreamParams,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn AudioStream>>;

    /// Release driver-wide resources. Streams are already closed when this
    /// is called.
    fn terminate(&mut self);
}

/// A single unidirectional stream. Dropping it closes the stream.
pub trait AudioStream: Send {
    fn start(&mut self) -> Result<()>;

    /// Blocks until the callback thread has quiesced.
    fn stop(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;
}
