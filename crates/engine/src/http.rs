// HTTP Range-backed byte source for progressive media
// Every transfer is reported to the data source's bandwidth meter

use parking_lot::Mutex;
use reel_core::{BandwidthMeter, DataSourceFactory, Error, Result};
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes fetched per Range request (256KB)
const CHUNK_SIZE: usize = 256 * 1024;

/// Bytes kept around for backwards seeks (8MB)
const MAX_CACHE_SIZE: usize = 8 * 1024 * 1024;

pub fn create_http_agent(user_agent: &str) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .timeout_read(Duration::from_secs(30))
        .timeout_write(Duration::from_secs(15))
        .user_agent(user_agent)
        .redirects(10)
        .build()
}

/// Total length from a `Content-Range: bytes a-b/total` header
pub fn parse_total_from_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse::<u64>().ok()
}

/// Inclusive byte range for a request starting at `offset`, clamped to the
/// known length. `None` means there is nothing left to fetch.
pub fn request_range(offset: u64, size: usize, total: Option<u64>) -> Option<(u64, u64)> {
    let want = size.max(CHUNK_SIZE) as u64;
    let mut end = offset + want - 1;
    if let Some(total) = total {
        if offset >= total {
            return None;
        }
        end = end.min(total - 1);
    }
    Some((offset, end))
}

struct CacheEntry {
    offset: u64,
    data: Vec<u8>,
}

impl CacheEntry {
    fn covers(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.offset + self.data.len() as u64
    }
}

struct RangeState {
    url: String,
    agent: ureq::Agent,
    meter: Option<Arc<BandwidthMeter>>,
    total_size: Option<u64>,
    position: u64,
    cache: VecDeque<CacheEntry>,
    cached_bytes: usize,
}

impl RangeState {
    fn probe_length(&mut self) -> Result<()> {
        match self.agent.head(&self.url).call() {
            Ok(response) => {
                self.total_size = response
                    .header("Content-Length")
                    .and_then(|s| s.parse::<u64>().ok());
            }
            Err(ureq::Error::Status(code, _)) if code == 404 || code == 410 => {
                return Err(Error::Network(format!("{} returned HTTP {}", self.url, code)));
            }
            Err(e) => {
                log::debug!("HEAD {} failed ({}), falling back to a Range probe", self.url, e);
                let response = self
                    .agent
                    .get(&self.url)
                    .set("Range", "bytes=0-0")
                    .call()
                    .map_err(|e| Error::Network(format!("Range probe failed: {}", e)))?;
                self.total_size = response
                    .header("Content-Range")
                    .and_then(parse_total_from_content_range);
            }
        }

        match self.total_size {
            Some(size) => log::info!("HTTP source {}: {} bytes", self.url, size),
            None => log::info!("HTTP source {}: length unknown", self.url),
        }
        Ok(())
    }

    fn read_cached(&self, offset: u64, buf: &mut [u8]) -> Option<usize> {
        let entry = self.cache.iter().find(|e| e.covers(offset))?;
        let start = (offset - entry.offset) as usize;
        let n = buf.len().min(entry.data.len() - start);
        buf[..n].copy_from_slice(&entry.data[start..start + n]);
        Some(n)
    }

    fn fetch(&mut self, offset: u64, size: usize) -> Result<()> {
        let Some((start, end)) = request_range(offset, size, self.total_size) else {
            return Ok(());
        };
        log::debug!("Fetching range: bytes={}-{}", start, end);

        let started = Instant::now();
        let response = match self
            .agent
            .get(&self.url)
            .set("Range", &format!("bytes={}-{}", start, end))
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(416, _)) => {
                // Range starts past the end of a resource of unknown length
                log::debug!("{} ends at byte {}", self.url, start);
                self.total_size = Some(start);
                return Ok(());
            }
            Err(e) => return Err(Error::Network(format!("Range request failed: {}", e))),
        };
        // A server that ignores Range sends the whole body from byte 0
        let start = if response.status() == 206 { start } else { 0 };

        let mut data = Vec::with_capacity((end - start + 1) as usize);
        response
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))?;

        if let Some(meter) = &self.meter {
            meter.on_transfer(data.len() as u64, started.elapsed());
        }

        self.cached_bytes += data.len();
        self.cache.push_back(CacheEntry { offset: start, data });
        while self.cached_bytes > MAX_CACHE_SIZE && self.cache.len() > 1 {
            if let Some(old) = self.cache.pop_front() {
                self.cached_bytes -= old.data.len();
            }
        }
        Ok(())
    }
}

/// Seekable reader over an HTTP resource using Range requests
pub struct HttpRangeSource {
    state: Mutex<RangeState>,
}

impl HttpRangeSource {
    pub fn open(url: &str, data_source: &DataSourceFactory) -> Result<Self> {
        let mut state = RangeState {
            url: url.to_string(),
            agent: create_http_agent(data_source.user_agent()),
            meter: data_source.bandwidth_meter().cloned(),
            total_size: None,
            position: 0,
            cache: VecDeque::new(),
            cached_bytes: 0,
        };
        state.probe_length()?;

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn byte_len(&self) -> Option<u64> {
        self.state.lock().total_size
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.lock();
        let offset = state.position;
        if state.total_size.map_or(false, |total| offset >= total) {
            return Ok(0);
        }

        let n = match state.read_cached(offset, buf) {
            Some(n) => n,
            None => {
                state
                    .fetch(offset, buf.len())
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                state.read_cached(offset, buf).unwrap_or(0)
            }
        };
        state.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.lock();
        let new_pos = match pos {
            SeekFrom::Start(pos) => pos,
            SeekFrom::Current(delta) => state.position.saturating_add_signed(delta),
            SeekFrom::End(delta) => match state.total_size {
                Some(total) => total.saturating_add_signed(delta),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "cannot seek from end: length unknown",
                    ))
                }
            },
        };
        state.position = new_pos;
        Ok(new_pos)
    }
}

impl symphonia::core::io::MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.state.lock().total_size
    }
}
