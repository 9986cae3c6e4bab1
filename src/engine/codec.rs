//! Opus codec wrapper for voice encoding/decoding (mono, f32 samples)

use opus::{Application, Bitrate, Channels, Decoder, Encoder};

/// Maximum encoded frame size in bytes
const MAX_ENCODED_FRAME_SIZE: usize = 400;

/// Longest Opus frame is 120ms
const MAX_FRAME_MS: usize = 120;

/// Opus encoder for outgoing microphone audio
pub struct VoiceEncoder {
    encoder: Encoder,
}

impl VoiceEncoder {
    pub fn new(sample_rate: u32, bits_per_second: u32) -> Result<Self, String> {
        let mut encoder = Encoder::new(sample_rate, Channels::Mono, Application::Voip)
            .map_err(|e| format!("Failed to create Opus encoder: {}", e))?;

        encoder
            .set_bitrate(Bitrate::Bits(bits_per_second as i32))
            .map_err(|e| format!("Failed to set bitrate: {}", e))?;
        encoder
            .set_vbr(true)
            .map_err(|e| format!("Failed to enable VBR: {}", e))?;

        Ok(Self { encoder })
    }

    pub fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), String> {
        self.encoder
            .set_bitrate(Bitrate::Bits(bits_per_second as i32))
            .map_err(|e| format!("Failed to set bitrate: {}", e))
    }

    /// Encode one frame of samples normalized to [-1.0, 1.0]
    pub fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, String> {
        let mut output = vec![0u8; MAX_ENCODED_FRAME_SIZE];

        let len = self
            .encoder
            .encode_float(samples, &mut output)
            .map_err(|e| format!("Opus encode error: {}", e))?;

        output.truncate(len);
        Ok(output)
    }
}

/// Opus decoder for incoming voice packets
pub struct VoiceDecoder {
    decoder: Decoder,
    max_samples: usize,
}

impl VoiceDecoder {
    pub fn new(sample_rate: u32) -> Result<Self, String> {
        let decoder = Decoder::new(sample_rate, Channels::Mono)
            .map_err(|e| format!("Failed to create Opus decoder: {}", e))?;

        Ok(Self {
            decoder,
            max_samples: sample_rate as usize * MAX_FRAME_MS / 1000,
        })
    }

    pub fn decode(&mut self, packet: &[u8]) -> Result<Vec<f32>, String> {
        let mut output = vec![0f32; self.max_samples];

        let samples = self
            .decoder
            .decode_float(packet, &mut output, false)
            .map_err(|e| format!("Opus decode error: {}", e))?;

        output.truncate(samples);
        Ok(output)
    }
}
