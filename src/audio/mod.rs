//! audio - capture/playback loopback through an Opus encoder and decoder
//!
//! ALSA drives two realtime streams; their callbacks share a queue of
//! compressed packets and a set of packet size statistics.

mod alsa_device;
mod audio_system;
pub mod driver;
pub mod frame_queue;
pub mod loopback;
pub mod opus_codec;
mod play;
mod record;
pub mod stats;

pub use audio_system::AlsaDriver;
pub use driver::{AudioDriver, AudioStream, CaptureCallback, PlaybackCallback, StreamParams};
pub use frame_queue::FrameQueue;
pub use loopback::LoopbackContext;
pub use opus_codec::{CodecAdapter, CodecApplication, CodecError, CodecParams};
pub use stats::{PacketStats, StatsSnapshot, to_kbit};
