//! Playback controller.
//!
//! [`PlayerEngine`] owns everything that decides what is audible: the
//! playlist, the sequencer, the decode cache, the active-source session and
//! the scheduled tasks. It drives a shared [`AudioGraph`] that an
//! [`AudioOutput`] renders. All state changes happen on the caller's thread;
//! the audio thread only renders and queues natural-end notices, which
//! [`PlayerEngine::tick`] drains. With background decoding a `play` of an
//! undecoded track returns at once and the track starts on the tick that
//! collects its buffer; the track after the current one is decoded ahead so
//! a crossfade never waits on the decoder.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::audio::cache::BufferCache;
use crate::audio::crossfade::{self, CrossfadeStart};
use crate::audio::fade::{FadeCurve, GainParam};
use crate::audio::graph::{AudioGraph, SourceId};
use crate::audio::position::PositionTracker;
use crate::audio::scheduler::{Scheduler, TaskId, TaskKind};
use crate::audio::{AudioDecoder, AudioOutput};
use crate::config::{clamp_band_db, clamp_crossfade, clamp_volume, EqBand, PlayerConfig};
use crate::error::{AudioError, CrossfadeError, PlayerError, PlaylistError};
use crate::logging::PlaybackLogger;
use crate::models::{DecodedBuffer, EqSettings, PlaybackSnapshot, PlaybackState, TrackId};
use crate::queue::{NextPick, Playlist, Sequencer, Track, TrackSource};

/// A track must have played this long before the progress sampler may start
/// a crossfade out of it
pub const START_GUARD_SECS: f64 = 1.0;

/// How long a transient status message stays visible
pub const STATUS_TTL_SECS: f64 = 3.0;

/// One playing buffer and its dedicated gain in the graph
#[derive(Debug, Clone)]
pub struct ActiveSource {
    pub id: SourceId,
    pub track_id: TrackId,
    pub buffer: Arc<DecodedBuffer>,
    /// Set once the graph reported the natural end of the buffer
    pub ended: bool,
}

impl ActiveSource {
    pub fn new(id: SourceId, track_id: TrackId, buffer: Arc<DecodedBuffer>) -> Self {
        Self {
            id,
            track_id,
            buffer,
            ended: false,
        }
    }

    pub fn duration(&self) -> f64 {
        self.buffer.duration_secs()
    }
}

/// What is audible right now: zero sources when stopped, one when steady,
/// two between a crossfade's start and its retirement
#[derive(Debug, Default)]
pub struct PlaybackSession {
    pub sources: Vec<ActiveSource>,
    pub is_playing: bool,
    pub crossfade_in_progress: bool,
}

impl PlaybackSession {
    /// The source progress is measured against; the newest entry
    pub fn primary(&self) -> Option<&ActiveSource> {
        self.sources.last()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: SourceId) -> Option<usize> {
        self.sources.iter().position(|source| source.id == id)
    }

    pub fn is_primary(&self, id: SourceId) -> bool {
        self.primary().map_or(false, |source| source.id == id)
    }

    pub fn remove(&mut self, id: SourceId) -> Option<ActiveSource> {
        self.position(id).map(|index| self.sources.remove(index))
    }

    fn mark_ended(&mut self, id: SourceId) {
        if let Some(source) = self.sources.iter_mut().find(|source| source.id == id) {
            source.ended = true;
        }
    }
}

/// Notifications for front ends
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    TrackChanged { index: usize, name: String },
    CrossfadeStarted { to: usize, duration: f64 },
    CrossfadeFinished,
    Status(String),
    PlaylistEnded,
}

/// A hard start waiting for its track to finish decoding
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingStart {
    track_id: TrackId,
    offset: f64,
}

/// Live-adjustable playback settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// 0 disables crossfading
    pub crossfade_seconds: f64,
    pub fade_curve: FadeCurve,
    pub eq: EqSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for EngineSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            crossfade_seconds: clamp_crossfade(config.crossfade_seconds),
            fade_curve: config.fade_curve,
            eq: config.eq_settings(),
        }
    }
}

pub struct PlayerEngine {
    output: Box<dyn AudioOutput>,
    graph: Option<AudioGraph>,
    cache: BufferCache,
    playlist: Playlist,
    sequencer: Sequencer,
    session: PlaybackSession,
    position: PositionTracker,
    scheduler: Scheduler,
    settings: EngineSettings,
    status: Option<String>,
    status_task: Option<TaskId>,
    pending_start: Option<PendingStart>,
    prefetched: Option<TrackId>,
    paused: bool,
    logger: PlaybackLogger,
    subscribers: Vec<UnboundedSender<PlayerEvent>>,
}

impl PlayerEngine {
    pub fn new(output: Box<dyn AudioOutput>, decoder: Box<dyn AudioDecoder>, settings: EngineSettings) -> Self {
        Self {
            output,
            graph: None,
            cache: BufferCache::new(decoder),
            playlist: Playlist::new(),
            sequencer: Sequencer::new(),
            session: PlaybackSession::default(),
            position: PositionTracker::new(),
            scheduler: Scheduler::new(),
            settings,
            status: None,
            status_task: None,
            pending_start: None,
            prefetched: None,
            paused: false,
            logger: PlaybackLogger::new(),
            subscribers: Vec::new(),
        }
    }

    /// Seed the shuffle order
    pub fn with_seed(mut self, seed: u64) -> Self {
        let mut sequencer = Sequencer::with_seed(seed);
        sequencer.set_shuffle(self.sequencer.shuffle());
        sequencer.set_repeat(self.sequencer.repeat());
        self.sequencer = sequencer;
        self
    }

    /// Decode on a background thread so no call waits on the decoder
    pub fn with_background_decoding(mut self) -> Self {
        if let Err(e) = self.cache.start_worker() {
            warn!("Could not start the decoder thread, decoding inline: {}", e);
        }
        self
    }

    pub fn with_logger(mut self, logger: PlaybackLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Receive [`PlayerEvent`]s from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Build the graph and connect the output, once
    fn ensure_graph(&mut self) -> Result<AudioGraph, AudioError> {
        if let Some(graph) = &self.graph {
            return Ok(graph.clone());
        }

        let graph = AudioGraph::new(self.output.sample_rate(), self.output.channels(), &self.settings.eq);
        self.output.connect(graph.clone())?;
        info!(
            "Audio graph connected to '{}' ({} Hz, {} ch)",
            self.output.name(),
            graph.sample_rate(),
            graph.channels()
        );
        self.graph = Some(graph.clone());
        self.set_status("Audio output ready", STATUS_TTL_SECS);
        Ok(graph)
    }

    /// Audio clock in seconds; 0 before the graph exists
    pub fn current_time(&self) -> f64 {
        self.graph.as_ref().map_or(0.0, AudioGraph::current_time)
    }

    fn set_status(&mut self, message: impl Into<String>, ttl: f64) {
        let message = message.into();
        if let Some(task) = self.status_task.take() {
            self.scheduler.cancel(task);
        }
        let deadline = self.current_time() + ttl.max(0.0);
        self.status_task = Some(self.scheduler.schedule(deadline, TaskKind::ClearStatus, None));
        self.status = Some(message.clone());
        self.emit(PlayerEvent::Status(message));
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    // --- transport -------------------------------------------------------

    /// Hard-start `index` at `offset` seconds, replacing whatever plays.
    ///
    /// When the track still has to be decoded on the background thread this
    /// returns right away and the track starts on a later [`tick`](Self::tick).
    pub fn play(&mut self, index: usize, offset: f64) -> Result<(), PlayerError> {
        self.stop();

        let track = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(PlaylistError::InvalidIndex { index })?;
        self.sequencer.set_current(Some(index));

        let graph = self.ensure_graph()?;
        if let Some(buffer) = self.cache.ready(track.id, graph.sample_rate()) {
            self.start_buffer(&graph, index, track.id, &track.name, buffer, offset);
            return Ok(());
        }

        self.pending_start = Some(PendingStart {
            track_id: track.id,
            offset,
        });
        self.cache.request(&track, graph.sample_rate());
        if self.cache.is_loading(track.id) {
            debug!("Waiting for '{}' to decode", track.name);
            self.set_status(format!("Loading {}", track.name), STATUS_TTL_SECS);
        }
        self.drain_decodes()
    }

    fn start_buffer(
        &mut self,
        graph: &AudioGraph,
        index: usize,
        track_id: TrackId,
        name: &str,
        buffer: Arc<DecodedBuffer>,
        offset: f64,
    ) {
        let duration = buffer.duration_secs();
        let offset = if offset.is_finite() {
            offset.clamp(0.0, duration)
        } else {
            0.0
        };

        let id = graph.start_source(Arc::clone(&buffer), offset, GainParam::new(1.0));
        self.session.sources.push(ActiveSource::new(id, track_id, buffer));
        self.session.is_playing = true;
        self.session.crossfade_in_progress = false;
        self.paused = false;
        self.sequencer.set_current(Some(index));
        self.position.start(graph.current_time(), offset);
        self.position.set_paused_at(0.0);

        self.logger.log_track_changed(index, name);
        self.logger.log_playback_started(name, offset);
        self.emit(PlayerEvent::TrackChanged {
            index,
            name: name.to_string(),
        });
        self.emit(PlayerEvent::StateChanged(PlaybackState::Playing));
    }

    /// Act on finished decodes: start the track a `play` is waiting for, or
    /// report why it cannot start. Prefetch results only fill the cache.
    fn drain_decodes(&mut self) -> Result<(), PlayerError> {
        let mut result = Ok(());
        for outcome in self.cache.poll() {
            let waiting = self.pending_start.filter(|pending| pending.track_id == outcome.track_id);
            match (outcome.result, waiting) {
                (Ok(buffer), Some(pending)) => {
                    self.pending_start = None;
                    let target = self.playlist.position_of(outcome.track_id).zip(self.graph.clone());
                    if let Some((index, graph)) = target {
                        self.start_buffer(&graph, index, outcome.track_id, &outcome.name, buffer, pending.offset);
                    }
                }
                (Ok(_), None) => debug!("'{}' decoded ahead of time", outcome.name),
                (Err(err), Some(_)) => {
                    self.pending_start = None;
                    self.logger.log_decode_error(&outcome.name, &err.to_string());
                    self.set_status(format!("Error loading {}", outcome.name), STATUS_TTL_SECS);
                    keep_first(&mut result, Err(err.into()));
                }
                (Err(err), None) => warn!("Could not decode '{}' ahead of time: {}", outcome.name, err),
            }
        }
        result
    }

    /// Release every active source. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending_start.take() {
            debug!("Cancelled the pending start of {}", pending.track_id);
        }
        let sources = std::mem::take(&mut self.session.sources);
        let was_playing = self.session.is_playing;
        self.session.is_playing = false;
        self.session.crossfade_in_progress = false;
        self.paused = false;

        for source in &sources {
            self.scheduler.cancel_owned_by(source.id);
            if let Some(graph) = &self.graph {
                graph.stop_source(source.id);
            }
        }

        if was_playing {
            debug!("Released {} source(s)", sources.len());
            self.emit(PlayerEvent::StateChanged(PlaybackState::Stopped));
        }
    }

    /// The stop button: release everything and rewind to the start
    pub fn stop_and_rewind(&mut self) {
        let was_active = self.session.is_playing || self.paused;
        self.stop();
        self.position.set_paused_at(0.0);
        if was_active {
            self.logger.log_playback_stopped("user request");
        }
    }

    /// Pause if playing, returning the remembered position
    pub fn pause(&mut self) -> Option<f64> {
        if let Some(pending) = self.pending_start.take() {
            // Still loading: remember where it would have started.
            self.position.set_paused_at(pending.offset);
            self.paused = true;
            self.emit(PlayerEvent::StateChanged(PlaybackState::Paused));
            return Some(pending.offset);
        }
        if !self.session.is_playing {
            return None;
        }
        let at = self.position.pause(self.current_time());
        self.stop();
        self.position.set_paused_at(at);
        self.paused = true;
        self.logger.log_playback_paused(at);
        self.emit(PlayerEvent::StateChanged(PlaybackState::Paused));
        Some(at)
    }

    /// Continue from the remembered position, starting the first track when
    /// nothing is selected. A no-op while already playing or loading.
    pub fn resume(&mut self) -> Result<(), PlayerError> {
        if self.session.is_playing || self.pending_start.is_some() {
            return Ok(());
        }
        if self.playlist.is_empty() {
            return Err(PlaylistError::EmptyPlaylist.into());
        }
        let index = self
            .sequencer
            .current()
            .filter(|&index| index < self.playlist.len())
            .unwrap_or(0);
        let offset = self.position.take_paused();
        self.play(index, offset)
    }

    /// Jump to `seconds` in the current track
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlayerError> {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.logger.log_seek(seconds);
        self.position.set_paused_at(seconds);

        if let Some(pending) = self.pending_start.as_mut() {
            pending.offset = seconds;
            return Ok(());
        }
        if self.session.is_playing {
            if let Some(index) = self.sequencer.current() {
                return self.play(index, seconds);
            }
        }
        Ok(())
    }

    /// Jump to a fraction of the current track's length
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Result<(), PlayerError> {
        let Some(duration) = self.current_duration() else {
            return Ok(());
        };
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.seek(duration * fraction)
    }

    fn current_duration(&self) -> Option<f64> {
        if let Some(source) = self.session.primary() {
            return Some(source.duration());
        }
        let track = self.sequencer.current().and_then(|index| self.playlist.get(index))?;
        self.cache.get(track.id).map(|buffer| buffer.duration_secs())
    }

    /// Advance to the next track. `auto` transitions may crossfade.
    pub fn next_track(&mut self, auto: bool) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Ok(());
        }

        match self.sequencer.pick_next(self.playlist.len()) {
            NextPick::Index(index) => self.transition_to(index, auto),
            NextPick::EndOfPlaylist => {
                self.stop();
                self.position.set_paused_at(0.0);
                self.logger.log_playback_stopped("end of playlist");
                self.emit(PlayerEvent::PlaylistEnded);
                Ok(())
            }
        }
    }

    /// Back one track, always as a hard transition
    pub fn prev_track(&mut self) -> Result<(), PlayerError> {
        match self.sequencer.pick_previous(self.playlist.len()) {
            Some(index) => self.play(index, 0.0),
            None => Ok(()),
        }
    }

    fn transition_to(&mut self, index: usize, auto: bool) -> Result<(), PlayerError> {
        // A fade that starts late is shortened so it finishes with the outgoing track.
        let duration = self
            .settings
            .crossfade_seconds
            .min(self.primary_remaining().unwrap_or(0.0));
        let can_crossfade = auto
            && duration > 0.0
            && self.session.is_playing
            && self.session.primary().map_or(false, |source| !source.ended);

        if !can_crossfade {
            return self.play(index, 0.0);
        }

        match self.start_crossfade(index, duration) {
            Ok(_) => Ok(()),
            Err(err) => {
                let target = self
                    .playlist
                    .get(index)
                    .map_or_else(|| format!("#{}", index + 1), |track| track.name.clone());
                self.logger.log_transition_failed(&target, &err.to_string());
                self.session.crossfade_in_progress = false;
                self.set_status("Transition failed", STATUS_TTL_SECS);
                self.play(index, 0.0)
            }
        }
    }

    fn start_crossfade(&mut self, index: usize, duration: f64) -> Result<CrossfadeStart, CrossfadeError> {
        let track = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(CrossfadeError::InvalidTarget { index })?;
        let graph = self.graph.clone().ok_or(CrossfadeError::NoOutgoingSource)?;
        let buffer = self
            .cache
            .ready(track.id, graph.sample_rate())
            .ok_or(CrossfadeError::NotLoaded { index })?;

        let start = crossfade::begin_crossfade(
            &graph,
            &mut self.session,
            &mut self.scheduler,
            track.id,
            buffer,
            duration,
            self.settings.fade_curve,
        )?;

        self.sequencer.set_current(Some(index));
        self.position.rebase(start.started_at);

        self.logger.log_crossfade_started(&track.name, duration);
        self.logger.log_track_changed(index, &track.name);
        self.set_status(format!("Crossfading ({:.1}s)", duration), duration);
        self.emit(PlayerEvent::CrossfadeStarted { to: index, duration });
        self.emit(PlayerEvent::TrackChanged {
            index,
            name: track.name,
        });
        Ok(start)
    }

    // --- clock-driven work -----------------------------------------------

    /// Collect finished decodes, then process natural ends, due tasks, the
    /// prefetch of the next track and the crossfade trigger.
    ///
    /// Call on a steady cadence, roughly once per display frame. Every step
    /// runs even when an earlier one fails; the first error is returned.
    pub fn tick(&mut self) -> Result<(), PlayerError> {
        let Some(graph) = self.graph.clone() else {
            return Ok(());
        };
        let mut result = self.drain_decodes();

        for id in graph.take_ended() {
            if !self.session.contains(id) {
                continue;
            }
            self.session.mark_ended(id);
            if self.session.is_primary(id) && self.session.is_playing && !self.session.crossfade_in_progress {
                debug!("{} ended naturally", id);
                keep_first(&mut result, self.next_track(true));
            }
        }

        for task in self.scheduler.take_due(graph.current_time()) {
            match task.kind {
                TaskKind::RetireSource(id) => {
                    if crossfade::retire_outgoing(&graph, &mut self.session, &mut self.scheduler, id) {
                        self.logger.log_crossfade_finished(&id.to_string());
                        self.emit(PlayerEvent::CrossfadeFinished);
                    }
                    // The incoming track may already be over if it was shorter than the fade.
                    let primary_ended = self.session.primary().map_or(false, |source| source.ended);
                    if primary_ended && self.session.is_playing && !self.session.crossfade_in_progress {
                        keep_first(&mut result, self.next_track(true));
                    }
                }
                // Only the timer of the message on screen may clear it.
                TaskKind::ClearStatus if self.status_task == Some(task.id) => {
                    self.status_task = None;
                    self.status = None;
                }
                TaskKind::ClearStatus => {}
            }
        }

        self.prefetch_next(graph.sample_rate());
        keep_first(&mut result, self.maybe_start_crossfade());
        result
    }

    /// Seconds left in the primary source
    fn primary_remaining(&self) -> Option<f64> {
        let primary = self.session.primary()?;
        Some(primary.duration() - self.position.elapsed(self.current_time()))
    }

    /// Start decoding the track that plays after the current one
    fn prefetch_next(&mut self, sample_rate: u32) {
        if !self.session.is_playing || self.session.crossfade_in_progress {
            return;
        }
        let len = self.playlist.len();
        if !self.sequencer.has_next(len) {
            return;
        }
        let NextPick::Index(next) = self.sequencer.peek_next(len) else {
            return;
        };
        let Some(track) = self.playlist.get(next) else {
            return;
        };
        if self.prefetched == Some(track.id)
            || self.cache.ready(track.id, sample_rate).is_some()
            || self.cache.is_loading(track.id)
        {
            return;
        }

        debug!("Decoding '{}' ahead of its turn", track.name);
        self.prefetched = Some(track.id);
        self.cache.request(track, sample_rate);
    }

    fn maybe_start_crossfade(&mut self) -> Result<(), PlayerError> {
        let duration = self.settings.crossfade_seconds;
        if duration <= 0.0 || !self.session.is_playing || self.session.crossfade_in_progress {
            return Ok(());
        }
        if self.session.primary().map_or(true, |primary| primary.ended) {
            return Ok(());
        }

        let elapsed = self.position.elapsed(self.current_time());
        let remaining = self.primary_remaining().unwrap_or(0.0);
        let len = self.playlist.len();
        if remaining > duration || elapsed <= START_GUARD_SECS || len < 2 || !self.sequencer.has_next(len) {
            return Ok(());
        }

        if let NextPick::Index(next) = self.sequencer.peek_next(len) {
            if let Some(track) = self.playlist.get(next) {
                if self.cache.is_loading(track.id) {
                    trace!("Crossfade into '{}' waits for its decode", track.name);
                    return Ok(());
                }
            }
        }

        debug!("Crossfade trigger at {:.3}s ({:.3}s left)", elapsed, remaining);
        self.next_track(true)
    }

    /// Let an offline output render `elapsed` worth of audio
    pub fn pump_output(&mut self, elapsed: Duration) {
        self.output.pump(elapsed);
    }

    /// Everything a front end needs to draw the player
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let current_index = self.sequencer.current().filter(|&index| index < self.playlist.len());
        let track_label = current_index
            .and_then(|index| self.playlist.get(index))
            .map_or_else(|| "No track selected".to_string(), |track| track.name.clone());

        let state = if self.session.is_playing {
            PlaybackState::Playing
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Stopped
        };

        let duration = self.current_duration().unwrap_or(0.0);
        let elapsed = if self.session.is_playing {
            self.position.elapsed(self.current_time())
        } else {
            self.position.paused_at()
        };

        PlaybackSnapshot {
            state,
            track_label,
            current_index,
            elapsed: if duration > 0.0 { elapsed.min(duration) } else { elapsed },
            duration,
            shuffle: self.sequencer.shuffle(),
            repeat: self.sequencer.repeat(),
            crossfading: self.session.crossfade_in_progress,
            indicator_active: self.session.is_playing,
            status_message: self.status.clone(),
            active_sources: self.session.len(),
        }
    }

    // --- settings --------------------------------------------------------

    pub fn set_crossfade_seconds(&mut self, seconds: f64) {
        self.settings.crossfade_seconds = clamp_crossfade(seconds);
    }

    pub fn set_fade_curve(&mut self, curve: FadeCurve) {
        self.settings.fade_curve = curve;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.settings.eq.volume = clamp_volume(volume);
        self.apply_eq();
    }

    pub fn set_band(&mut self, band: EqBand, gain_db: f32) {
        self.settings.eq.set_band_db(band, clamp_band_db(gain_db));
        self.apply_eq();
    }

    pub fn set_bass(&mut self, gain_db: f32) {
        self.set_band(EqBand::Bass, gain_db);
    }

    pub fn set_mid(&mut self, gain_db: f32) {
        self.set_band(EqBand::Mid, gain_db);
    }

    pub fn set_treble(&mut self, gain_db: f32) {
        self.set_band(EqBand::Treble, gain_db);
    }

    fn apply_eq(&self) {
        if let Some(graph) = &self.graph {
            graph.set_eq(&self.settings.eq);
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.sequencer.toggle_shuffle()
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.sequencer.toggle_repeat()
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.sequencer.set_shuffle(enabled);
    }

    pub fn set_repeat(&mut self, enabled: bool) {
        self.sequencer.set_repeat(enabled);
    }

    // --- playlist --------------------------------------------------------

    pub fn add_file(&mut self, path: &Path) -> Result<TrackId, PlayerError> {
        Ok(self.playlist.add_file(path)?)
    }

    pub fn add_directory(&mut self, dir: &Path) -> Result<Vec<TrackId>, PlayerError> {
        Ok(self.playlist.add_directory(dir)?)
    }

    pub fn add_track(&mut self, name: impl Into<String>, source: TrackSource) -> TrackId {
        self.playlist.add_track(name, source)
    }

    /// Reorder the playlist, keeping the current marker on the same track
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        self.playlist.move_track(from, to)?;
        self.sequencer.track_moved(from, to);
        Ok(())
    }

    /// Remove a track; removing the playing track stops playback
    pub fn remove_track(&mut self, index: usize) -> Result<Track, PlayerError> {
        let removed = self.playlist.remove(index)?;
        if self.sequencer.track_removed(index) {
            self.stop();
            self.position.set_paused_at(0.0);
            self.logger.log_playback_stopped("current track removed");
        }
        self.cache.invalidate(removed.id);
        Ok(removed)
    }

    pub fn clear_playlist(&mut self) {
        self.stop();
        self.position.set_paused_at(0.0);
        self.prefetched = None;
        self.sequencer.set_current(None);
        self.playlist.clear();
        self.cache.clear();
    }

    // --- accessors -------------------------------------------------------

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn graph(&self) -> Option<&AudioGraph> {
        self.graph.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn logger(&self) -> &PlaybackLogger {
        &self.logger
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing
    }

    /// True while a `play` waits for its track to decode
    pub fn is_loading(&self) -> bool {
        self.pending_start.is_some()
    }

    /// Decodes requested but not yet collected
    pub fn decodes_in_flight(&self) -> usize {
        self.cache.in_flight()
    }

    pub fn output_name(&self) -> String {
        self.output.name()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }
}

fn keep_first(result: &mut Result<(), PlayerError>, next: Result<(), PlayerError>) {
    if result.is_ok() {
        *result = next;
    }
}

impl Drop for PlayerEngine {
    fn drop(&mut self) {
        self.stop();
        self.output.disconnect();
        if self.graph.is_some() {
            debug!("Audio output disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::OfflineOutput;
    use crate::error::DecodeError;

    /// Decodes "<seconds>" into a quiet mono buffer at 1 kHz
    struct SecondsDecoder;

    impl AudioDecoder for SecondsDecoder {
        fn decode(&self, bytes: &[u8], _hint: Option<&str>) -> Result<DecodedBuffer, DecodeError> {
            let seconds: f64 = std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| DecodeError::CorruptedFile("not a number".to_string()))?;
            Ok(DecodedBuffer::new(vec![0.1; (seconds * 1000.0) as usize], 1, 1000))
        }
    }

    fn engine(tracks: &[&str]) -> PlayerEngine {
        let mut engine = PlayerEngine::new(
            Box::new(OfflineOutput::new(1000, 1)),
            Box::new(SecondsDecoder),
            EngineSettings::default(),
        )
        .with_seed(7);
        for (i, body) in tracks.iter().enumerate() {
            engine.add_track(
                format!("track {}", i + 1),
                TrackSource::Memory {
                    bytes: Arc::from(body.as_bytes()),
                    extension: None,
                },
            );
        }
        engine
    }

    fn run(engine: &mut PlayerEngine, seconds: f64) {
        let steps = (seconds / 0.01).round() as usize;
        for _ in 0..steps {
            engine.pump_output(Duration::from_millis(10));
            engine.tick().unwrap();
        }
    }

    #[test]
    fn test_graph_is_built_lazily() {
        let mut engine = engine(&["5"]);
        assert!(engine.graph().is_none());
        assert_eq!(engine.current_time(), 0.0);

        engine.play(0, 0.0).unwrap();
        let graph = engine.graph().cloned().unwrap();
        engine.stop();
        engine.play(0, 0.0).unwrap();

        // Same graph: advancing the old handle moves the engine's clock.
        graph.advance(0.5);
        assert!((engine.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_play_sets_single_source() {
        let mut engine = engine(&["5", "5"]);
        engine.play(1, 2.0).unwrap();

        assert!(engine.is_playing());
        assert_eq!(engine.session().len(), 1);
        assert_eq!(engine.sequencer().current(), Some(1));
        let snap = engine.snapshot();
        assert_eq!(snap.track_label, "track 2");
        assert!((snap.elapsed - 2.0).abs() < 1e-6);
        assert!(snap.indicator_active);
    }

    #[test]
    fn test_play_invalid_index() {
        let mut engine = engine(&["5"]);
        let err = engine.play(4, 0.0).unwrap_err();
        assert!(matches!(err, PlayerError::Playlist(PlaylistError::InvalidIndex { index: 4 })));
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_offset_is_clamped_to_duration() {
        let mut engine = engine(&["2"]);
        engine.play(0, 99.0).unwrap();
        let snap = engine.snapshot();
        assert!((snap.elapsed - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = engine(&["5"]);
        engine.stop();
        engine.play(0, 0.0).unwrap();
        engine.stop();
        engine.stop();
        assert_eq!(engine.session().len(), 0);
        assert_eq!(engine.graph().unwrap().active_source_count(), 0);
        assert!(!engine.snapshot().indicator_active);
    }

    #[test]
    fn test_pause_only_while_playing() {
        let mut engine = engine(&["5"]);
        assert_eq!(engine.pause(), None);
        engine.play(0, 0.0).unwrap();
        run(&mut engine, 1.5);
        let at = engine.pause().unwrap();
        assert!((at - 1.5).abs() < 0.02);
        assert_eq!(engine.snapshot().state, PlaybackState::Paused);
        assert_eq!(engine.pause(), None);
    }

    #[test]
    fn test_seek_while_stopped_only_moves_position() {
        let mut engine = engine(&["5"]);
        engine.seek(3.0).unwrap();
        assert!(!engine.is_playing());
        engine.resume().unwrap();
        assert!((engine.snapshot().elapsed - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_seek_to_fraction_while_playing() {
        let mut engine = engine(&["4"]);
        engine.play(0, 0.0).unwrap();
        engine.seek_to_fraction(0.5).unwrap();
        assert_eq!(engine.session().len(), 1);
        assert!((engine.snapshot().elapsed - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_resume_on_empty_playlist() {
        let mut engine = engine(&[]);
        assert!(matches!(
            engine.resume(),
            Err(PlayerError::Playlist(PlaylistError::EmptyPlaylist))
        ));
    }

    #[test]
    fn test_prev_wraps_to_last() {
        let mut engine = engine(&["5", "5", "5"]);
        engine.play(0, 0.0).unwrap();
        engine.prev_track().unwrap();
        assert_eq!(engine.sequencer().current(), Some(2));
    }

    #[test]
    fn test_live_eq_updates_graph() {
        let mut engine = engine(&["5"]);
        engine.play(0, 0.0).unwrap();
        engine.set_volume(0.25);
        engine.set_bass(6.0);
        assert!((engine.graph().unwrap().master_gain() - 0.25).abs() < 1e-6);
        assert_eq!(engine.settings().eq.bass_db, 6.0);
        engine.set_treble(200.0);
        assert_eq!(engine.settings().eq.treble_db, crate::audio::eq::MAX_BAND_DB);
    }

    #[test]
    fn test_status_message_expires() {
        let mut engine = engine(&["5"]);
        engine.play(0, 0.0).unwrap();
        assert_eq!(engine.status(), Some("Audio output ready"));
        run(&mut engine, STATUS_TTL_SECS + 0.1);
        assert_eq!(engine.status(), None);
    }

    #[test]
    fn test_stale_status_timer_keeps_newer_message() {
        let mut engine = engine(&["10", "2", "oops"]);
        engine.set_crossfade_seconds(5.0);
        engine.play(0, 0.0).unwrap();
        run(&mut engine, 9.0);
        assert!(engine.session().crossfade_in_progress);

        // Expires at 10.2, after the outgoing source retires at 10.05.
        engine.set_status("Volume 50%", 1.2);

        // One long render makes the retirement and the expiry due in the
        // same tick. The retirement moves on to the undecodable track.
        engine.pump_output(Duration::from_millis(1500));
        let err = engine.tick().unwrap_err();
        assert!(matches!(err, PlayerError::Decode(DecodeError::CorruptedFile(_))));
        assert!(!engine.is_playing());
        assert_eq!(engine.status(), Some("Error loading track 3"));
        assert_eq!(engine.pending_tasks(), 1);

        run(&mut engine, STATUS_TTL_SECS + 0.1);
        assert_eq!(engine.status(), None);
    }

    #[test]
    fn test_move_keeps_current_track() {
        let mut engine = engine(&["5", "6", "7"]);
        engine.play(0, 0.0).unwrap();
        engine.move_track(0, 2).unwrap();
        assert_eq!(engine.sequencer().current(), Some(2));
        assert_eq!(engine.snapshot().track_label, "track 1");
    }

    #[test]
    fn test_removing_current_track_stops() {
        let mut engine = engine(&["5", "6"]);
        engine.play(1, 0.0).unwrap();
        let removed = engine.remove_track(1).unwrap();
        assert_eq!(removed.name, "track 2");
        assert!(!engine.is_playing());
        assert_eq!(engine.session().len(), 0);
        assert_eq!(engine.sequencer().current(), None);
    }

    #[test]
    fn test_events_are_delivered() {
        let mut engine = engine(&["5"]);
        let mut rx = engine.subscribe();
        engine.play(0, 0.0).unwrap();
        engine.pause();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&PlayerEvent::TrackChanged {
            index: 0,
            name: "track 1".to_string()
        }));
        assert!(events.contains(&PlayerEvent::StateChanged(PlaybackState::Playing)));
        assert_eq!(events.last(), Some(&PlayerEvent::StateChanged(PlaybackState::Paused)));
    }

    #[test]
    fn test_settings_from_config() {
        let config = PlayerConfig {
            crossfade_seconds: 6.0,
            fade_curve: FadeCurve::Linear,
            volume: 0.3,
            ..PlayerConfig::default()
        };
        let settings = EngineSettings::from(&config);
        assert_eq!(settings.crossfade_seconds, 6.0);
        assert_eq!(settings.fade_curve, FadeCurve::Linear);
        assert_eq!(settings.eq.volume, 0.3);
    }
}
