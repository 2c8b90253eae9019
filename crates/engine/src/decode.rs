// Audio decoding using Symphonia

use crate::demux::Demuxer;
use reel_core::{Error, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

/// Interleaved f32 samples from one packet, in the stream's own format
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

pub struct AudioDecoder {
    decoder: Box<dyn Decoder>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    pub fn from_demuxer(demuxer: &Demuxer) -> Result<Self> {
        let track = demuxer
            .format_reader()
            .tracks()
            .iter()
            .find(|t| t.id == demuxer.track_id())
            .ok_or_else(|| Error::Decoding("Track not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedSource(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            decoder,
            sample_buf: None,
        })
    }

    /// Decode one packet. Corrupt packets are skipped and yield `None`.
    pub fn decode(&mut self, packet: &Packet) -> Result<Option<DecodedAudio>> {
        let decoded = match self.decoder.decode(packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet at ts {}: {}", packet.ts(), msg);
                return Ok(None);
            }
            Err(SymphoniaError::ResetRequired) => {
                log::debug!("Decoder reset required");
                self.reset();
                return Ok(None);
            }
            Err(e) => return Err(Error::Decoding(format!("Decoding failed: {}", e))),
        };

        let spec = *decoded.spec();
        let frames = decoded.capacity() as u64;
        let reuse = self
            .sample_buf
            .as_ref()
            .map_or(false, |buf| buf.capacity() >= decoded.capacity() * spec.channels.count());
        if !reuse {
            self.sample_buf = None;
        }
        let buf = self
            .sample_buf
            .get_or_insert_with(|| SampleBuffer::new(frames, spec));
        buf.copy_interleaved_ref(decoded);

        Ok(Some(DecodedAudio {
            samples: buf.samples().to_vec(),
            sample_rate: spec.rate,
            channels: spec.channels.count() as u16,
        }))
    }

    /// Forget codec state, e.g. after a seek.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }
}
