//! ALSA PCM device wrappers for audio capture and playback.

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use super::driver::StreamParams;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames (one frame = channels × sample_width)
    pub period_size: usize,
    /// Ring buffer size in frames
    pub buffer_size: usize,
}

/// Open a PCM device for capture (recording).
pub fn open_capture(device: &str, params: &StreamParams) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Capture, params, "Capture")
}

/// Open a PCM device for playback.
pub fn open_playback(device: &str, params: &StreamParams) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Playback, params, "Playback")
}

/// Ring buffer length that gives roughly the suggested latency.
fn buffer_frames(params: &StreamParams) -> Frames {
    let frames = params.sample_rate as f64 * params.suggested_latency.as_secs_f64();
    (frames.round() as Frames).max(params.frames_per_period as Frames * 2)
}

fn open_pcm(
    device: &str,
    direction: Direction,
    params: &StreamParams,
    dir_name: &str,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(params.channels as u32)
            .with_context(|| format!("{} device '{}' rejects {} channel(s)", dir_name, device, params.channels))?;
        hwp.set_rate_near(params.sample_rate, ValueOr::Nearest)?;
        hwp.set_period_size_near(params.frames_per_period as Frames, ValueOr::Nearest)?;
        hwp.set_buffer_size_near(buffer_frames(params))?;
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let negotiated = {
        let hwp = pcm.hw_params_current()?;
        AlsaParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
            buffer_size: hwp.get_buffer_size()? as usize,
        }
    };

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}, buffer_size={}",
        dir_name,
        device,
        negotiated.sample_rate,
        negotiated.channels,
        negotiated.period_size,
        negotiated.buffer_size,
    );

    // Callbacks are promised the exact rate and layout that was asked for.
    if negotiated.sample_rate != params.sample_rate || negotiated.channels != params.channels as u32 {
        anyhow::bail!(
            "{} device '{}' negotiated {}Hz/{}ch, wanted {}Hz/{}ch",
            dir_name,
            device,
            negotiated.sample_rate,
            negotiated.channels,
            params.sample_rate,
            params.channels,
        );
    }

    Ok((pcm, negotiated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_buffer_frames_follow_latency() {
        let params = StreamParams {
            sample_rate: 48000,
            channels: 1,
            frames_per_period: 960,
            suggested_latency: Duration::from_millis(100),
        };
        assert_eq!(buffer_frames(&params), 4800);
    }

    #[test]
    fn test_buffer_frames_hold_two_periods() {
        let params = StreamParams {
            sample_rate: 48000,
            channels: 1,
            frames_per_period: 960,
            suggested_latency: Duration::from_millis(5),
        };
        assert_eq!(buffer_frames(&params), 1920);
    }
}
