// Engine worker: walks the timeline, decodes into the output queue and
// reports state and renderer events. Owns the output stream.

use crate::convert::Converter;
use crate::cursor::{Placement, WindowCursor};
use crate::decode::{AudioDecoder, DecodedAudio};
use crate::demux::{Demuxer, TrackInfo};
use crate::output::{self, AudioOutput};
use crate::queue::PcmChunk;
use crate::{source, EngineConfig, EngineShared};
use reel_core::{
    DecoderCounters, Format, MediaSource, PlaybackError, PlaybackState, Result, Throttle,
};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Sleep while the queue is full or decoding has finished
const IDLE_POLL: Duration = Duration::from_millis(10);

static NEXT_AUDIO_SESSION_ID: AtomicI32 = AtomicI32::new(1);

pub(crate) fn run(shared: Arc<EngineShared>, source: MediaSource, config: EngineConfig) {
    let start = shared.apply_pending_seek().unwrap_or_else(|| shared.position());
    log::info!(
        "Engine worker started: {} at window {} +{:?}",
        source.uri(),
        start.0,
        start.1
    );

    match play(&shared, &source, &config, start) {
        Ok(()) => log::info!("Engine worker stopped"),
        Err(error) => {
            log::error!("Playback failed: {}", error);
            let report = PlaybackError {
                error,
                window_index: shared.position().0,
            };
            shared.listeners.dispatch(|l| l.on_player_error(&report));
            shared.set_state(PlaybackState::Idle);
        }
    }
}

fn play(
    shared: &Arc<EngineShared>,
    source: &MediaSource,
    config: &EngineConfig,
    start: (u32, Duration),
) -> Result<()> {
    let timeline = source.timeline();
    let (media, hint) = source::open(source)?;
    let mut demuxer = Demuxer::from_media_source(media, hint)?;
    let track = demuxer.track_info()?;

    let init_started = Instant::now();
    let decoder = AudioDecoder::from_demuxer(&demuxer)?;
    let counters = DecoderCounters {
        decoder_init_count: 1,
        ..Default::default()
    };
    let decoder_name = track.codec.clone().unwrap_or_else(|| "unknown".to_string());
    let init_ms = init_started.elapsed().as_millis() as u64;
    shared.audio_listeners.dispatch(|l| {
        l.on_audio_enabled(counters);
        l.on_audio_decoder_initialized(&decoder_name, epoch_ms(), init_ms);
    });
    let format = input_format(track.codec.as_deref(), track.sample_rate, track.channels);
    shared
        .audio_listeners
        .dispatch(|l| l.on_audio_input_format_changed(&format));

    let capacity = Duration::from_secs(config.ring_buffer_secs.max(1) as u64);
    let output = output::open(shared.clone(), capacity)?;
    let session_id = NEXT_AUDIO_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    shared
        .audio_listeners
        .dispatch(|l| l.on_audio_session_id(session_id));

    let cursor = WindowCursor::new(&timeline, start.0, start.1);
    if cursor.seek_target_us() > 0 {
        demuxer.seek_us(cursor.seek_target_us())?;
    }
    let offset = cursor.seek_offset();
    output.queue.lock().reset((cursor.index(), offset));
    shared.set_playhead((cursor.index(), offset));

    let converter = Converter::new(
        track.sample_rate,
        output.format.sample_rate,
        track.channels,
        output.format.channels,
    );
    let buffer_size =
        capacity.as_secs() as usize * output.format.sample_rate as usize * output.format.channels as usize;

    let mut playback = Playback {
        shared,
        config,
        demuxer,
        decoder,
        track,
        cursor,
        converter,
        output,
        counters,
        finished: false,
        underruns_seen: 0,
        underrun_throttle: Throttle::new(config.underrun_log_every),
        buffer_size,
        buffer_ms: capacity.as_millis() as u64,
        last_feed: Instant::now(),
    };
    shared.draining.store(false, Ordering::Release);

    let result = playback.run();

    shared.set_playhead(playback.output.queue.lock().playhead());
    playback.counters.decoder_release_count += 1;
    let counters = playback.counters;
    shared
        .audio_listeners
        .dispatch(|l| l.on_audio_disabled(counters));
    // The output stream is dropped here, on the thread that created it
    drop(playback);
    result
}

struct Playback<'a> {
    shared: &'a EngineShared,
    config: &'a EngineConfig,
    demuxer: Demuxer,
    decoder: AudioDecoder,
    track: TrackInfo,
    cursor: WindowCursor,
    converter: Converter,
    output: AudioOutput,
    counters: DecoderCounters,
    finished: bool,
    underruns_seen: u64,
    underrun_throttle: Throttle,
    buffer_size: usize,
    buffer_ms: u64,
    last_feed: Instant,
}

impl Playback<'_> {
    fn run(&mut self) -> Result<()> {
        while !self.shared.stop.load(Ordering::Acquire) {
            if let Some((window_index, position)) = self.shared.apply_pending_seek() {
                self.seek(window_index, position)?;
            }

            let (playhead, buffered, has_room, empty) = {
                let queue = self.output.queue.lock();
                (queue.playhead(), queue.buffered(), queue.has_room(), queue.is_empty())
            };
            self.shared.set_playhead(playhead);
            self.report_underruns();

            match self.shared.state() {
                PlaybackState::Buffering if self.finished || buffered >= self.config.prebuffer => {
                    self.shared.set_state(PlaybackState::Ready);
                }
                PlaybackState::Ready if empty && self.finished => {
                    self.shared.set_state(PlaybackState::Ended);
                }
                PlaybackState::Ready if empty => {
                    log::debug!("Output queue starved, rebuffering");
                    self.shared.set_state(PlaybackState::Buffering);
                }
                _ => {}
            }

            if self.finished || !has_room {
                thread::sleep(IDLE_POLL);
                continue;
            }
            self.feed()?;
        }
        Ok(())
    }

    fn seek(&mut self, window_index: u32, position: Duration) -> Result<()> {
        self.cursor.seek(window_index, position);
        let target = self.cursor.seek_target_us();
        self.demuxer.seek_us(target)?;
        self.decoder.reset();

        let playhead = (self.cursor.index(), self.cursor.seek_offset());
        self.output.queue.lock().reset(playhead);
        self.shared.set_playhead(playhead);
        self.set_finished(false);
        self.shared.set_state(PlaybackState::Buffering);
        log::debug!("Seeked to window {} +{:?}", playhead.0, playhead.1);
        Ok(())
    }

    /// Decode one packet and queue the part of it inside the current window.
    fn feed(&mut self) -> Result<()> {
        let Some(packet) = self.demuxer.next_packet()? else {
            // Media ran out inside an open-ended window
            return self.advance_window();
        };
        self.counters.input_buffer_count += 1;
        let ts_us = self.track.ts_to_us(packet.ts());

        let Some(decoded) = self.decoder.decode(&packet)? else {
            self.counters.skipped_output_buffer_count += 1;
            return Ok(());
        };
        self.check_input_format(&decoded);

        match self.cursor.place(ts_us, decoded.frames(), decoded.sample_rate) {
            Placement::Skip => {
                self.counters.skipped_output_buffer_count += 1;
                Ok(())
            }
            Placement::WindowEnd => self.advance_window(),
            Placement::Emit {
                window_index,
                start,
                skip_frames,
                take_frames,
                ends_window,
            } => {
                let channels = decoded.channels.max(1) as usize;
                let kept = &decoded.samples[skip_frames * channels..(skip_frames + take_frames) * channels];
                let samples = self.converter.process(kept);
                self.output.queue.lock().push(PcmChunk {
                    window_index,
                    start,
                    samples,
                });
                self.counters.rendered_output_buffer_count += 1;
                self.last_feed = Instant::now();

                if ends_window {
                    self.advance_window()
                } else {
                    Ok(())
                }
            }
        }
    }

    fn advance_window(&mut self) -> Result<()> {
        if self.cursor.advance() {
            log::debug!(
                "Window {} of {} starts at {}us",
                self.cursor.index(),
                self.cursor.window_count(),
                self.cursor.seek_target_us()
            );
            self.demuxer.seek_us(self.cursor.seek_target_us())?;
            self.decoder.reset();
        } else {
            log::debug!("Timeline exhausted, draining output");
            self.set_finished(true);
        }
        Ok(())
    }

    fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
        self.shared.draining.store(finished, Ordering::Release);
    }

    fn check_input_format(&mut self, decoded: &DecodedAudio) {
        if self.converter.accepts(decoded.sample_rate, decoded.channels) {
            return;
        }
        self.converter = Converter::new(
            decoded.sample_rate,
            self.output.format.sample_rate,
            decoded.channels,
            self.output.format.channels,
        );
        let format = input_format(self.track.codec.as_deref(), decoded.sample_rate, decoded.channels);
        self.shared
            .audio_listeners
            .dispatch(|l| l.on_audio_input_format_changed(&format));
    }

    fn report_underruns(&mut self) {
        let total = self.shared.underruns.load(Ordering::Relaxed);
        if total == self.underruns_seen {
            return;
        }
        self.underruns_seen = total;
        if !self.underrun_throttle.ready() {
            return;
        }
        let (buffer_size, buffer_ms) = (self.buffer_size, self.buffer_ms);
        let since_feed = self.last_feed.elapsed().as_millis() as u64;
        self.shared
            .audio_listeners
            .dispatch(|l| l.on_audio_sink_underrun(buffer_size, buffer_ms, since_feed));
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn mime_type_for_codec(codec: &str) -> Option<&'static str> {
    let mime = match codec {
        "mp1" | "mp2" | "mp3" => "audio/mpeg",
        "aac" => "audio/mp4a-latm",
        "alac" => "audio/alac",
        "flac" => "audio/flac",
        "vorbis" => "audio/vorbis",
        "opus" => "audio/opus",
        c if c.starts_with("pcm") => "audio/raw",
        _ => return None,
    };
    Some(mime)
}

fn input_format(codec: Option<&str>, sample_rate: u32, channels: u16) -> Format {
    Format {
        sample_mime_type: codec.and_then(mime_type_for_codec).map(str::to_string),
        codec: codec.map(str::to_string),
        sample_rate: Some(sample_rate),
        channel_count: Some(channels),
        ..Default::default()
    }
}
