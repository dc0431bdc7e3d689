use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    codec: Codec,
    session: Session,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    sample_rate: u32,
    channels: u16,
    frame_size: usize,
    suggested_latency_ms: u64,
}

#[derive(Deserialize)]
struct Codec {
    bitrate: i32,
    application: String,
}

#[derive(Deserialize)]
struct Session {
    poll_iterations: u32,
    poll_interval_ms: u64,
    settle_delay_ms: u64,
    max_queue_depth: usize,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_CHANNELS={}", config.audio.channels);
    println!("cargo:rustc-env=AUDIO_FRAME_SIZE={}", config.audio.frame_size);
    println!("cargo:rustc-env=AUDIO_SUGGESTED_LATENCY_MS={}", config.audio.suggested_latency_ms);

    // 编解码配置
    println!("cargo:rustc-env=CODEC_BITRATE={}", config.codec.bitrate);
    println!("cargo:rustc-env=CODEC_APPLICATION={}", config.codec.application);

    // 会话配置
    println!("cargo:rustc-env=SESSION_POLL_ITERATIONS={}", config.session.poll_iterations);
    println!("cargo:rustc-env=SESSION_POLL_INTERVAL_MS={}", config.session.poll_interval_ms);
    println!("cargo:rustc-env=SESSION_SETTLE_DELAY_MS={}", config.session.settle_delay_ms);
    println!("cargo:rustc-env=SESSION_MAX_QUEUE_DEPTH={}", config.session.max_queue_depth);
}
