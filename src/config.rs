use std::time::Duration;

use crate::audio::{CodecApplication, CodecParams, StreamParams};

#[derive(Debug, Clone)]
pub struct Config {
    // 音频设备配置
    pub capture_device: String,
    pub playback_device: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size: usize,
    pub suggested_latency_ms: u64,

    // 编解码配置
    pub bitrate: i32,
    pub application: CodecApplication,

    // 会话配置
    pub poll_iterations: u32,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    /// 0 means the frame queue is unbounded.
    pub max_queue_depth: usize,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            capture_device: env!("AUDIO_CAPTURE_DEVICE").to_string(),
            playback_device: env!("AUDIO_PLAYBACK_DEVICE").to_string(),
            sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            channels: env!("AUDIO_CHANNELS").parse()
                .map_err(|_| "Failed to parse AUDIO_CHANNELS")?,
            frame_size: env!("AUDIO_FRAME_SIZE").parse()
                .map_err(|_| "Failed to parse AUDIO_FRAME_SIZE")?,
            suggested_latency_ms: env!("AUDIO_SUGGESTED_LATENCY_MS").parse()
                .map_err(|_| "Failed to parse AUDIO_SUGGESTED_LATENCY_MS")?,

            bitrate: env!("CODEC_BITRATE").parse()
                .map_err(|_| "Failed to parse CODEC_BITRATE")?,
            application: env!("CODEC_APPLICATION").parse()
                .map_err(|_| "Failed to parse CODEC_APPLICATION")?,

            poll_iterations: env!("SESSION_POLL_ITERATIONS").parse()
                .map_err(|_| "Failed to parse SESSION_POLL_ITERATIONS")?,
            poll_interval_ms: env!("SESSION_POLL_INTERVAL_MS").parse()
                .map_err(|_| "Failed to parse SESSION_POLL_INTERVAL_MS")?,
            settle_delay_ms: env!("SESSION_SETTLE_DELAY_MS").parse()
                .map_err(|_| "Failed to parse SESSION_SETTLE_DELAY_MS")?,
            max_queue_depth: env!("SESSION_MAX_QUEUE_DEPTH").parse()
                .map_err(|_| "Failed to parse SESSION_MAX_QUEUE_DEPTH")?,
        })
    }

    pub fn codec_params(&self) -> CodecParams {
        CodecParams {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bitrate: self.bitrate,
            application: self.application,
        }
    }

    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frames_per_period: self.frame_size,
            suggested_latency: Duration::from_millis(self.suggested_latency_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn queue_limit(&self) -> Option<usize> {
        (self.max_queue_depth > 0).then_some(self.max_queue_depth)
    }
}

/// Built-in values: 48 kHz mono, 20 ms periods, 16 kbit/s "audio" profile.
impl Default for Config {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            sample_rate: 48000,
            channels: 1,
            frame_size: 960,
            suggested_latency_ms: 100,
            bitrate: 16000,
            application: CodecApplication::Audio,
            poll_iterations: 30,
            poll_interval_ms: 200,
            settle_delay_ms: 1000,
            max_queue_depth: 0,
        }
    }
}
