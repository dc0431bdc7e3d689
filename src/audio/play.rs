use std::sync::atomic::{AtomicBool, Ordering};

use alsa::pcm::PCM;
use anyhow::Result;

use super::alsa_device::AlsaParams;
use super::driver::PlaybackCallback;

/// Give up on a period after this many failed XRUN recoveries.
const MAX_RECOVERY_RETRIES: u32 = 3;

/// Write position within one period, plus the XRUN retry counter.
#[derive(Debug)]
pub struct PeriodWriter {
    total_frames: usize,
    written: usize,
    retries: u32,
}

impl PeriodWriter {
    pub fn new(total_frames: usize) -> Self {
        Self {
            total_frames,
            written: 0,
            retries: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.written >= self.total_frames
    }

    /// Sample offset of the first unwritten frame.
    pub fn offset(&self, channels: usize) -> usize {
        self.written * channels
    }

    pub fn remaining(&self) -> usize {
        self.total_frames.saturating_sub(self.written)
    }

    pub fn on_written(&mut self, frames: usize) {
        self.written += frames;
        // 成功写入，重置重试计数
        self.retries = 0;
    }

    /// Count a failed write. Returns false once the period should be dropped.
    pub fn on_error(&mut self) -> bool {
        self.retries += 1;
        self.retries < MAX_RECOVERY_RETRIES
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Driver side of a playback stream: ask the callback for one period, then
/// write it out. The blocking write paces the loop at the device rate.
pub fn play_thread(
    pcm: &PCM,
    params: &AlsaParams,
    period_samples: usize,
    callback: &mut PlaybackCallback,
    running: &AtomicBool,
) -> Result<()> {
    let io = pcm.io_i16()?;
    let channels = params.channels as usize;
    let mut frame = vec![0i16; period_samples];

    log::info!(
        "Playback started: rate={}, ch={}, alsa_period={}, callback_samples={}",
        params.sample_rate,
        params.channels,
        params.period_size,
        period_samples,
    );

    while running.load(Ordering::Relaxed) {
        callback(&mut frame[..]);

        // Write with a retry loop to handle short writes and XRUN recovery
        let mut writer = PeriodWriter::new(frame.len() / channels);

        while !writer.is_done() {
            match io.writei(&frame[writer.offset(channels)..]) {
                Ok(n) => writer.on_written(n),
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    let keep_trying = writer.on_error();

                    // 触发 ALSA 硬件恢复状态机
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        return Err(e2.into());
                    }

                    // 熔断器：底层持续跟不上写入速度时，丢弃剩余帧防止死循环
                    if !keep_trying {
                        log::error!(
                            "Max recovery retries ({}) reached. Dropping {} unwritten frames to break dead-loop.",
                            writer.retries(),
                            writer.remaining()
                        );
                        break;
                    }
                }
            }
        }
    }

    log::info!("Playback stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_writes_advance_offset() {
        let mut w = PeriodWriter::new(960);
        w.on_written(400);
        assert!(!w.is_done());
        assert_eq!(w.offset(2), 800);
        assert_eq!(w.remaining(), 560);
        w.on_written(560);
        assert!(w.is_done());
        assert_eq!(w.remaining(), 0);
    }

    #[test]
    fn test_gives_up_after_three_failed_recoveries() {
        let mut w = PeriodWriter::new(960);
        assert!(w.on_error());
        assert!(w.on_error());
        assert!(!w.on_error());
        assert_eq!(w.retries(), MAX_RECOVERY_RETRIES);
        assert!(!w.is_done());
    }

    #[test]
    fn test_successful_write_resets_retries() {
        let mut w = PeriodWriter::new(960);
        assert!(w.on_error());
        assert!(w.on_error());
        w.on_written(100);
        assert_eq!(w.retries(), 0);
        assert!(w.on_error());
        assert!(w.on_error());
        assert_eq!(w.offset(1), 100);
    }
}
