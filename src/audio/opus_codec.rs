//! Opus encoder/decoder pair shared by the capture and playback callbacks.
//!
//! The encoder and decoder live behind separate locks: capture only ever
//! touches the encoder and playback only the decoder, so neither side waits
//! on the other.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use thiserror::Error;

/// Largest packet libopus will ever produce.
const MAX_PACKET_SIZE: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("One or more invalid/out of range arguments.")]
    BadArg,
    #[error("Not enough bytes allocated in the buffer.")]
    BufferTooSmall,
    #[error("An internal error was detected.")]
    InternalError,
    #[error("The compressed data passed is corrupted.")]
    InvalidPacket,
    #[error("Invalid/unsupported request number")]
    Unimplemented,
    #[error("An encoder or decoder structure is invalid or already freed.")]
    InvalidState,
    #[error("Memory allocation has failed.")]
    AllocFail,
    #[error("undef error ( {0} )")]
    Unknown(i32),
}

impl CodecError {
    /// Numeric libopus error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::BadArg => -1,
            Self::BufferTooSmall => -2,
            Self::InternalError => -3,
            Self::InvalidPacket => -4,
            Self::Unimplemented => -5,
            Self::InvalidState => -6,
            Self::AllocFail => -7,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<opus::Error> for CodecError {
    fn from(e: opus::Error) -> Self {
        match e.code() {
            opus::ErrorCode::BadArg => Self::BadArg,
            opus::ErrorCode::BufferTooSmall => Self::BufferTooSmall,
            opus::ErrorCode::InternalError => Self::InternalError,
            opus::ErrorCode::InvalidPacket => Self::InvalidPacket,
            opus::ErrorCode::Unimplemented => Self::Unimplemented,
            opus::ErrorCode::InvalidState => Self::InvalidState,
            opus::ErrorCode::AllocFail => Self::AllocFail,
            other => Self::Unknown(other as i32),
        }
    }
}

/// Opus application profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecApplication {
    Audio,
    Voip,
    LowDelay,
}

impl CodecApplication {
    fn to_opus(self) -> opus::Application {
        match self {
            Self::Audio => opus::Application::Audio,
            Self::Voip => opus::Application::Voip,
            Self::LowDelay => opus::Application::LowDelay,
        }
    }
}

impl FromStr for CodecApplication {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "voip" => Ok(Self::Voip),
            "lowdelay" | "restricted_lowdelay" => Ok(Self::LowDelay),
            _ => Err(CodecError::BadArg),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CodecParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Target bitrate in bits/s
    pub bitrate: i32,
    pub application: CodecApplication,
}

struct EncoderSlot {
    encoder: opus::Encoder,
    scratch: Vec<u8>,
}

struct DecoderSlot {
    decoder: opus::Decoder,
    channels: usize,
}

/// Owns one encoder and one decoder for the lifetime of a session.
pub struct CodecAdapter {
    encoder: Mutex<Option<EncoderSlot>>,
    decoder: Mutex<Option<DecoderSlot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CodecAdapter {
    pub fn new() -> Self {
        Self {
            encoder: Mutex::new(None),
            decoder: Mutex::new(None),
        }
    }

    /// Create both handles and apply the target bitrate.
    ///
    /// Handles are only stored once every step has succeeded; on failure
    /// whatever was created is dropped here and the adapter stays empty.
    pub fn initialize(&self, params: &CodecParams) -> Result<(), CodecError> {
        let channels = match params.channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            _ => return Err(CodecError::BadArg),
        };

        let decoder = opus::Decoder::new(params.sample_rate, channels).map_err(|e| {
            let e = CodecError::from(e);
            log::error!("Can not create opus decoder: {}", e);
            e
        })?;

        let mut encoder =
            opus::Encoder::new(params.sample_rate, channels, params.application.to_opus())
                .map_err(|e| {
                    let e = CodecError::from(e);
                    log::error!("Can not create opus encoder: {}", e);
                    e
                })?;

        encoder
            .set_bitrate(opus::Bitrate::Bits(params.bitrate))
            .map_err(|e| {
                let e = CodecError::from(e);
                log::error!("Error set bitrate encoder: {}", e);
                e
            })?;

        *lock(&self.decoder) = Some(DecoderSlot {
            decoder,
            channels: params.channels as usize,
        });
        *lock(&self.encoder) = Some(EncoderSlot {
            encoder,
            scratch: vec![0u8; MAX_PACKET_SIZE],
        });

        log::info!(
            "Opus codec ready: rate={}, ch={}, bitrate={}, application={:?}",
            params.sample_rate,
            params.channels,
            params.bitrate,
            params.application,
        );
        Ok(())
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        lock(&self.encoder).is_some() && lock(&self.decoder).is_some()
    }

    /// Encode one frame of interleaved PCM into an Opus packet.
    pub fn encode(&self, pcm: &[i16]) -> Result<Bytes, CodecError> {
        let mut guard = lock(&self.encoder);
        let slot = guard.as_mut().ok_or(CodecError::InvalidState)?;
        let len = slot.encoder.encode(pcm, &mut slot.scratch)?;
        Ok(Bytes::copy_from_slice(&slot.scratch[..len]))
    }

    /// Decode `packet` into `out`, returning samples per channel written.
    ///
    /// Whatever part of `out` the packet does not cover is zeroed.
    pub fn decode(&self, packet: &[u8], out: &mut [i16]) -> Result<usize, CodecError> {
        let mut guard = lock(&self.decoder);
        let slot = guard.as_mut().ok_or(CodecError::InvalidState)?;
        let decoded = slot.decoder.decode(packet, out, false)?;
        let written = (decoded * slot.channels).min(out.len());
        out[written..].fill(0);
        Ok(decoded)
    }

    /// Release both handles. Safe to call repeatedly or after a failed
    /// `initialize`.
    pub fn shutdown(&self) {
        let had_decoder = lock(&self.decoder).take().is_some();
        let had_encoder = lock(&self.encoder).take().is_some();
        if had_decoder || had_encoder {
            log::info!("Opus codec released");
        }
    }
}

impl Default for CodecAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CodecParams {
        CodecParams {
            sample_rate: 48000,
            channels: 1,
            bitrate: 16000,
            application: CodecApplication::Audio,
        }
    }

    fn tone(len: usize, step: i32) -> Vec<i16> {
        (0..len as i32).map(|i| ((i * step) % 16000 - 8000) as i16).collect()
    }

    #[test]
    fn test_initialize_and_shutdown() {
        let codec = CodecAdapter::new();
        assert!(!codec.is_initialized());
        codec.initialize(&params()).unwrap();
        assert!(codec.is_initialized());
        codec.shutdown();
        assert!(!codec.is_initialized());
        // second shutdown is a no-op
        codec.shutdown();
    }

    #[test]
    fn test_bad_bitrate_leaves_no_handles() {
        let codec = CodecAdapter::new();
        let mut p = params();
        p.bitrate = 0;
        assert_eq!(codec.initialize(&p), Err(CodecError::BadArg));
        assert!(!codec.is_initialized());
        assert_eq!(codec.encode(&tone(960, 37)), Err(CodecError::InvalidState));
    }

    #[test]
    fn test_unsupported_format_rejected() {
        let codec = CodecAdapter::new();
        let mut p = params();
        p.channels = 3;
        assert_eq!(codec.initialize(&p), Err(CodecError::BadArg));

        let mut p = params();
        p.sample_rate = 44100;
        assert!(codec.initialize(&p).is_err());
        assert!(!codec.is_initialized());
    }

    #[test]
    fn test_encode_decode_frame() {
        let codec = CodecAdapter::new();
        codec.initialize(&params()).unwrap();

        let packet = codec.encode(&tone(960, 37)).unwrap();
        assert!(!packet.is_empty());
        assert!(packet.len() < 960 * 2);

        let mut out = vec![1i16; 960];
        let decoded = codec.decode(&packet, &mut out).unwrap();
        assert_eq!(decoded, 960);
    }

    #[test]
    fn test_invalid_frame_size_is_bad_arg() {
        let codec = CodecAdapter::new();
        codec.initialize(&params()).unwrap();
        assert_eq!(codec.encode(&tone(100, 37)), Err(CodecError::BadArg));
    }

    #[test]
    fn test_corrupt_packet_is_invalid_packet() {
        let codec = CodecAdapter::new();
        codec.initialize(&params()).unwrap();
        let mut out = vec![0i16; 960];
        // code 3 packet with no frame-count byte
        assert_eq!(codec.decode(&[0x03], &mut out), Err(CodecError::InvalidPacket));
    }

    #[test]
    fn test_short_packet_zero_fills_tail() {
        let codec = CodecAdapter::new();
        codec.initialize(&params()).unwrap();

        // 10 ms packet decoded into a 20 ms buffer
        let packet = codec.encode(&tone(480, 91)).unwrap();
        let mut out = vec![7i16; 960];
        let decoded = codec.decode(&packet, &mut out).unwrap();
        assert_eq!(decoded, 480);
        assert!(out[480..].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_error_descriptions() {
        assert_eq!(
            CodecError::InvalidPacket.to_string(),
            "The compressed data passed is corrupted."
        );
        assert_eq!(CodecError::Unknown(-42).to_string(), "undef error ( -42 )");
        assert_eq!(CodecError::InvalidState.code(), -6);
    }

    #[test]
    fn test_application_from_str() {
        assert_eq!("audio".parse(), Ok(CodecApplication::Audio));
        assert_eq!("VoIP".parse(), Ok(CodecApplication::Voip));
        assert_eq!("lowdelay".parse(), Ok(CodecApplication::LowDelay));
        assert!("music".parse::<CodecApplication>().is_err());
    }
}
