//! Decode-once buffer cache with an optional background decoder thread.
//!
//! Callers never wait on a decode. [`BufferCache::request`] queues work and
//! [`BufferCache::poll`] hands back whatever finished since the last call.
//! Without a worker the decode runs inside `request` itself, which keeps
//! offline tests deterministic; the finished outcome is still delivered
//! through `poll` so both modes share one completion path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::audio::resampler::resample_to;
use crate::audio::AudioDecoder;
use crate::error::DecodeError;
use crate::logging::OperationTimer;
use crate::models::{DecodedBuffer, TrackId};
use crate::queue::{Track, TrackSource};

/// Decodes slower than this are logged as warnings
const SLOW_DECODE_THRESHOLD: Duration = Duration::from_secs(2);

type SharedDecoder = Arc<Mutex<Box<dyn AudioDecoder>>>;

/// One track to decode at the graph's sample rate
#[derive(Debug, Clone)]
struct DecodeJob {
    track_id: TrackId,
    name: String,
    source: TrackSource,
    sample_rate: u32,
}

impl DecodeJob {
    fn new(track: &Track, sample_rate: u32) -> Self {
        Self {
            track_id: track.id,
            name: track.name.clone(),
            source: track.source.clone(),
            sample_rate,
        }
    }
}

/// A finished decode, successful or not
#[derive(Debug)]
pub struct DecodeOutcome {
    pub track_id: TrackId,
    pub name: String,
    pub result: Result<Arc<DecodedBuffer>, DecodeError>,
}

/// Channels to the background decoder thread
struct DecodeWorker {
    jobs: UnboundedSender<DecodeJob>,
    results: UnboundedReceiver<DecodeOutcome>,
}

/// Decode-once cache of track buffers, keyed by track identity.
///
/// Buffers are stored already converted to the graph's sample rate.
pub struct BufferCache {
    decoder: SharedDecoder,
    worker: Option<DecodeWorker>,
    buffers: HashMap<TrackId, Arc<DecodedBuffer>>,
    in_flight: HashSet<TrackId>,
    completed: VecDeque<DecodeOutcome>,
}

impl BufferCache {
    /// A cache that decodes inline, inside [`request`](Self::request)
    pub fn new(decoder: Box<dyn AudioDecoder>) -> Self {
        Self {
            decoder: Arc::new(Mutex::new(decoder)),
            worker: None,
            buffers: HashMap::new(),
            in_flight: HashSet::new(),
            completed: VecDeque::new(),
        }
    }

    /// Move decoding onto a dedicated thread. The cache keeps decoding
    /// inline if the thread cannot be spawned.
    pub fn start_worker(&mut self) -> std::io::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (job_tx, job_rx) = unbounded_channel();
        let (result_tx, result_rx) = unbounded_channel();
        let decoder = Arc::clone(&self.decoder);
        thread::Builder::new()
            .name("xfplay-decoder".to_string())
            .spawn(move || run_worker(decoder, job_rx, result_tx))?;

        self.worker = Some(DecodeWorker {
            jobs: job_tx,
            results: result_rx,
        });
        info!("Background decoder thread started");
        Ok(())
    }

    pub fn is_background(&self) -> bool {
        self.worker.is_some()
    }

    /// Ask for `track` to be decoded. Does nothing when its buffer is
    /// already cached or a decode for it is still running.
    pub fn request(&mut self, track: &Track, sample_rate: u32) {
        if self.ready(track.id, sample_rate).is_some() || self.in_flight.contains(&track.id) {
            return;
        }
        self.in_flight.insert(track.id);
        let job = DecodeJob::new(track, sample_rate);

        let immediate = match &self.worker {
            Some(worker) => match worker.jobs.send(job) {
                Ok(()) => {
                    debug!("Queued decode of '{}'", track.name);
                    None
                }
                Err(rejected) => {
                    error!("Decoder thread is gone; cannot decode '{}'", track.name);
                    let job = rejected.0;
                    Some(DecodeOutcome {
                        track_id: job.track_id,
                        name: job.name,
                        result: Err(DecodeError::DecodeFailed("decoder thread stopped".to_string())),
                    })
                }
            },
            None => Some(decode_job(&self.decoder, job)),
        };

        if let Some(outcome) = immediate.and_then(|outcome| self.finish(outcome)) {
            self.completed.push_back(outcome);
        }
    }

    /// Collect decodes that finished since the last call, caching every
    /// successful buffer. Outcomes for invalidated tracks are dropped.
    pub fn poll(&mut self) -> Vec<DecodeOutcome> {
        let mut outcomes: Vec<_> = self.completed.drain(..).collect();

        let received: Vec<_> = match &mut self.worker {
            Some(worker) => std::iter::from_fn(|| worker.results.try_recv().ok()).collect(),
            None => Vec::new(),
        };
        outcomes.extend(received.into_iter().filter_map(|outcome| self.finish(outcome)));
        outcomes
    }

    fn finish(&mut self, outcome: DecodeOutcome) -> Option<DecodeOutcome> {
        if !self.in_flight.remove(&outcome.track_id) {
            debug!("Dropping decode of '{}'; the track is no longer wanted", outcome.name);
            return None;
        }
        if let Ok(buffer) = &outcome.result {
            self.buffers.insert(outcome.track_id, Arc::clone(buffer));
        }
        Some(outcome)
    }

    /// The cached buffer for `id`, if it was decoded at `sample_rate`
    pub fn ready(&self, id: TrackId, sample_rate: u32) -> Option<Arc<DecodedBuffer>> {
        self.buffers
            .get(&id)
            .filter(|buffer| buffer.sample_rate == sample_rate)
            .cloned()
    }

    pub fn get(&self, id: TrackId) -> Option<Arc<DecodedBuffer>> {
        self.buffers.get(&id).cloned()
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// True while a requested decode has not been collected by [`poll`](Self::poll)
    pub fn is_loading(&self, id: TrackId) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop one cached buffer, e.g. when its track leaves the playlist.
    /// A decode still running for it is discarded when it finishes.
    pub fn invalidate(&mut self, id: TrackId) -> bool {
        self.in_flight.remove(&id);
        self.completed.retain(|outcome| outcome.track_id != id);
        self.buffers.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.in_flight.clear();
        self.completed.clear();
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

fn run_worker(decoder: SharedDecoder, mut jobs: UnboundedReceiver<DecodeJob>, results: UnboundedSender<DecodeOutcome>) {
    while let Some(job) = jobs.blocking_recv() {
        if results.send(decode_job(&decoder, job)).is_err() {
            break;
        }
    }
    debug!("Decoder thread exiting");
}

fn decode_job(decoder: &SharedDecoder, job: DecodeJob) -> DecodeOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| decode_track(decoder, &job))).unwrap_or_else(|_| {
        error!("Decoder panicked on '{}'", job.name);
        Err(DecodeError::DecodeFailed("decoder panicked".to_string()))
    });
    DecodeOutcome {
        track_id: job.track_id,
        name: job.name,
        result,
    }
}

fn decode_track(decoder: &SharedDecoder, job: &DecodeJob) -> Result<Arc<DecodedBuffer>, DecodeError> {
    let timer = OperationTimer::new(format!("decode '{}'", job.name));
    let bytes = job.source.read_bytes()?;
    let hint = job.source.extension_hint();
    let decoded = {
        let decoder = decoder.lock().unwrap_or_else(PoisonError::into_inner);
        decoder.decode(&bytes, hint.as_deref())?
    };
    let source_rate = decoded.sample_rate;
    let buffer = Arc::new(resample_to(decoded, job.sample_rate));

    let took = timer.finish_with_threshold(SLOW_DECODE_THRESHOLD);
    info!(
        "Decoded '{}' ({:.1}s, {} ch) in {}ms",
        job.name,
        buffer.duration_secs(),
        buffer.channels,
        took.as_millis()
    );
    if source_rate != job.sample_rate {
        debug!("Resampled '{}' from {} Hz to {} Hz", job.name, source_rate, job.sample_rate);
    }
    Ok(buffer)
}
