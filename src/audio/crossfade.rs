//! Gain-envelope crossfades between the playing source and the next track.
//!
//! The outgoing source fades out while the incoming one fades in over the
//! same window on the audio clock. Retirement of the outgoing source is a
//! [`Scheduler`] task owned by that source, so releasing it early (a manual
//! stop, a skip) cancels the retirement with it.

use std::sync::Arc;

use log::debug;

use crate::audio::engine::{ActiveSource, PlaybackSession};
use crate::audio::fade::{FadeCurve, FadeDirection, GainParam};
use crate::audio::graph::{AudioGraph, SourceId};
use crate::audio::scheduler::{Scheduler, TaskKind};
use crate::error::CrossfadeError;
use crate::models::{DecodedBuffer, TrackId};

/// Extra time after the fade before the outgoing source is released
pub const RETIRE_GUARD_SECS: f64 = 0.05;

/// What a successful [`begin_crossfade`] set up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeStart {
    pub incoming: SourceId,
    pub outgoing: SourceId,
    pub started_at: f64,
    pub retire_at: f64,
}

/// Fade from the session's only source into `buffer` over `duration` seconds.
///
/// On error nothing has been started and the session is unchanged, apart
/// from the crossfade flag which is always left cleared.
pub fn begin_crossfade(
    graph: &AudioGraph,
    session: &mut PlaybackSession,
    scheduler: &mut Scheduler,
    track_id: TrackId,
    buffer: Arc<DecodedBuffer>,
    duration: f64,
    curve: FadeCurve,
) -> Result<CrossfadeStart, CrossfadeError> {
    let outgoing = match session.primary() {
        Some(source) if session.len() == 1 && !source.ended => source.id,
        _ => {
            session.crossfade_in_progress = false;
            return Err(CrossfadeError::NoOutgoingSource);
        }
    };
    let duration = duration.max(0.0);

    let prepared = graph.with_gain(outgoing, |gain, now| {
        gain.cancel_scheduled_values(now);
        gain.set_value(1.0);
        gain.schedule_fade(now, duration, curve, FadeDirection::Out);
    });
    if let Err(err) = prepared {
        session.crossfade_in_progress = false;
        return Err(CrossfadeError::Graph(err));
    }

    let now = graph.current_time();
    let mut incoming_gain = GainParam::new(0.0);
    incoming_gain.schedule_fade(now, duration, curve, FadeDirection::In);
    let incoming = graph.start_source(Arc::clone(&buffer), 0.0, incoming_gain);

    session.sources.push(ActiveSource::new(incoming, track_id, buffer));
    session.crossfade_in_progress = true;

    let retire_at = now + duration + RETIRE_GUARD_SECS;
    scheduler.schedule(retire_at, TaskKind::RetireSource(outgoing), Some(outgoing));

    debug!(
        "Crossfade {} -> {} over {:.2}s ({}), retire at {:.3}",
        outgoing, incoming, duration, curve, retire_at
    );

    Ok(CrossfadeStart {
        incoming,
        outgoing,
        started_at: now,
        retire_at,
    })
}

/// Stop and release the outgoing source of a finished crossfade.
///
/// Returns false when the source had already been released.
pub fn retire_outgoing(
    graph: &AudioGraph,
    session: &mut PlaybackSession,
    scheduler: &mut Scheduler,
    id: SourceId,
) -> bool {
    scheduler.cancel_owned_by(id);
    graph.stop_source(id);
    let removed = session.remove(id).is_some();
    if removed {
        session.crossfade_in_progress = false;
    }
    removed
}
