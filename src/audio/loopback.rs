//! Capture → encode → queue → decode → playback.
//!
//! Both entry points run on driver threads. The queue lock is only held
//! for the push/pop itself, never across encode or decode.

use std::sync::Arc;

use super::frame_queue::FrameQueue;
use super::opus_codec::CodecAdapter;
use super::stats::PacketStats;

pub struct LoopbackContext {
    codec: Arc<CodecAdapter>,
    queue: Arc<FrameQueue>,
    stats: Arc<PacketStats>,
}

impl LoopbackContext {
    pub fn new(codec: Arc<CodecAdapter>, queue: Arc<FrameQueue>, stats: Arc<PacketStats>) -> Self {
        Self { codec, queue, stats }
    }

    /// Encode one captured period and queue it.
    pub fn on_capture(&self, input: &[i16]) {
        let packet = match self.codec.encode(input) {
            Ok(packet) if !packet.is_empty() => packet,
            Ok(_) => {
                log::error!("Encode error: empty packet");
                return;
            }
            Err(e) => {
                log::error!("Encode error: {} ({})", e, e.code());
                return;
            }
        };

        let size = packet.len() as u64;
        self.queue.append(packet);
        self.stats.record(size);
    }

    /// Fill one playback period from the oldest queued packet, or with
    /// silence when there is nothing to play or the packet is bad.
    pub fn on_playback(&self, output: &mut [i16]) {
        let Some(packet) = self.queue.take_first() else {
            output.fill(0);
            return;
        };

        if let Err(e) = self.codec.decode(&packet, output) {
            log::error!("Decode error: {} ({})", e, e.code());
            output.fill(0);
        }
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }
}
