use std::sync::atomic::{AtomicBool, Ordering};

use alsa::pcm::PCM;
use anyhow::Result;

use super::alsa_device::AlsaParams;
use super::driver::CaptureCallback;

/// Collects short ALSA reads into one callback-sized period.
pub struct PeriodAssembler {
    frame: Vec<i16>,
    filled: usize,
}

impl PeriodAssembler {
    pub fn new(period_samples: usize) -> Self {
        Self {
            frame: vec![0i16; period_samples],
            filled: 0,
        }
    }

    /// Unfilled tail of the current period, for the next read.
    pub fn spare(&mut self) -> &mut [i16] {
        &mut self.frame[self.filled..]
    }

    /// Account for `samples` just read into `spare()`. Returns the full
    /// period once it is complete and starts a new one.
    pub fn commit(&mut self, samples: usize) -> Option<&[i16]> {
        self.filled = (self.filled + samples).min(self.frame.len());
        if self.filled < self.frame.len() {
            return None;
        }
        self.filled = 0;
        Some(&self.frame)
    }

    /// Drop a partially filled period.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    pub fn filled(&self) -> usize {
        self.filled
    }
}

/// Driver side of a capture stream: read from ALSA until one full period
/// is available, hand it to the callback, repeat.
pub fn record_thread(
    pcm: &PCM,
    params: &AlsaParams,
    period_samples: usize,
    callback: &mut CaptureCallback,
    running: &AtomicBool,
) -> Result<()> {
    let io = pcm.io_i16()?;
    let channels = params.channels as usize;

    // ALSA may return short reads, so collect into one period-sized frame
    let mut period = PeriodAssembler::new(period_samples);

    log::info!(
        "Recording started: rate={}, ch={}, alsa_period={}, callback_samples={}",
        params.sample_rate,
        params.channels,
        params.period_size,
        period_samples,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(period.spare()) {
            Ok(frames) => {
                if let Some(frame) = period.commit(frames * channels) {
                    callback(frame);
                }
            }
            Err(e) => {
                log::warn!(
                    "ALSA capture error: {}, recovering... ({} samples discarded)",
                    e,
                    period.filled()
                );
                // 丢弃未完成的帧
                period.reset();
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("Recording stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulate a read of `chunk` into the assembler.
    fn read(period: &mut PeriodAssembler, chunk: &[i16]) -> Option<Vec<i16>> {
        period.spare()[..chunk.len()].copy_from_slice(chunk);
        period.commit(chunk.len()).map(<[i16]>::to_vec)
    }

    #[test]
    fn test_short_reads_fill_one_period() {
        let mut period = PeriodAssembler::new(6);
        assert_eq!(read(&mut period, &[1, 2]), None);
        assert_eq!(read(&mut period, &[3]), None);
        assert_eq!(period.filled(), 3);
        assert_eq!(period.spare().len(), 3);
        assert_eq!(read(&mut period, &[4, 5, 6]), Some(vec![1, 2, 3, 4, 5, 6]));
        assert_eq!(period.filled(), 0);
        assert_eq!(period.spare().len(), 6);
    }

    #[test]
    fn test_exact_fit_emits_immediately() {
        let mut period = PeriodAssembler::new(4);
        assert_eq!(read(&mut period, &[9, 8, 7, 6]), Some(vec![9, 8, 7, 6]));
        assert_eq!(read(&mut period, &[1, 1, 1, 1]), Some(vec![1, 1, 1, 1]));
    }

    #[test]
    fn test_reset_discards_partial_period() {
        let mut period = PeriodAssembler::new(4);
        assert_eq!(read(&mut period, &[1, 2, 3]), None);
        period.reset();
        assert_eq!(period.filled(), 0);
        assert_eq!(read(&mut period, &[5, 6]), None);
        assert_eq!(read(&mut period, &[7, 8]), Some(vec![5, 6, 7, 8]));
    }

    #[test]
    fn test_zero_length_read_keeps_progress() {
        let mut period = PeriodAssembler::new(3);
        assert_eq!(read(&mut period, &[1]), None);
        assert_eq!(period.commit(0), None);
        assert_eq!(read(&mut period, &[2, 3]), Some(vec![1, 2, 3]));
    }
}
