// Demuxing with Symphonia: probe, packet reading and time-based seeking

use reel_core::{Error, Result};
use std::io;
use std::time::Duration;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

const MICROS_PER_SEC: u64 = 1_000_000;

/// What the demuxer knows about the selected track
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub codec: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub time_base: Option<TimeBase>,
    pub duration: Option<Duration>,
}

impl TrackInfo {
    /// Convert a packet timestamp into microseconds of media time.
    pub fn ts_to_us(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => time_to_us(tb.calc_time(ts)),
            None => ts * MICROS_PER_SEC / self.sample_rate.max(1) as u64,
        }
    }
}

fn time_to_us(time: Time) -> u64 {
    time.seconds * MICROS_PER_SEC + (time.frac * MICROS_PER_SEC as f64) as u64
}

fn us_to_time(us: u64) -> Time {
    Time::new(
        us / MICROS_PER_SEC,
        (us % MICROS_PER_SEC) as f64 / MICROS_PER_SEC as f64,
    )
}

pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let stream = MediaSourceStream::new(media_source, Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::UnsupportedSource(format!("Failed to probe media: {}", e)))?;

        let format_reader = probed.format;
        let track = format_reader
            .default_track()
            .ok_or_else(|| Error::UnsupportedSource("No playable track found".to_string()))?;
        let track_id = track.id;

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Next packet of the selected track, or `None` at end of stream.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.format_reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => return Ok(Some(packet)),
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(e) => return Err(Error::Decoding(format!("Failed to read packet: {}", e))),
            }
        }
    }

    /// Seek so the next packet starts at or before `media_us`.
    pub fn seek_us(&mut self, media_us: u64) -> Result<()> {
        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: us_to_time(media_us),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::Decoding(format!("Seek to {}us failed: {}", media_us, e)))?;
        log::debug!(
            "Seeked to {}us (required ts {}, actual ts {})",
            media_us,
            seeked.required_ts,
            seeked.actual_ts
        );
        Ok(())
    }

    pub fn track_info(&self) -> Result<TrackInfo> {
        let track = self
            .format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| Error::Decoding("Track not found".to_string()))?;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::UnsupportedSource("Sample rate not specified".to_string()))?;
        let duration = match (params.time_base, params.n_frames) {
            (Some(tb), Some(n)) => Some(Duration::from_micros(time_to_us(tb.calc_time(n)))),
            (None, Some(n)) => Some(Duration::from_micros(n * MICROS_PER_SEC / sample_rate.max(1) as u64)),
            _ => None,
        };
        let codec = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|descriptor| descriptor.short_name.to_string());

        Ok(TrackInfo {
            codec,
            sample_rate,
            channels: params.channels.map(|c| c.count() as u16).unwrap_or(2),
            time_base: params.time_base,
            duration,
        })
    }

    pub fn format_reader(&self) -> &dyn FormatReader {
        &*self.format_reader
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}
