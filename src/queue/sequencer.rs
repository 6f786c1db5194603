//! Chooses which playlist index plays next.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Result of asking for the next track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPick {
    Index(usize),
    /// Past the last track with repeat off
    EndOfPlaylist,
}

/// Current-track marker plus shuffle and repeat modes
#[derive(Debug)]
pub struct Sequencer {
    current: Option<usize>,
    shuffle: bool,
    repeat: bool,
    rng: StdRng,
    /// Shuffle pick drawn early by `peek_next`, handed out by `pick_next`
    queued: Option<usize>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffle order, for tests and reproducible sessions
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            current: None,
            shuffle: false,
            repeat: false,
            rng,
            queued: None,
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, index: Option<usize>) {
        self.current = index;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
        self.queued = None;
    }

    pub fn set_repeat(&mut self, enabled: bool) {
        self.repeat = enabled;
    }

    /// Flip shuffle, returning the new state
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.queued = None;
        self.shuffle
    }

    /// Flip repeat, returning the new state
    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    /// Pick the index after the current one for a playlist of `len` tracks.
    ///
    /// Shuffle draws uniformly and redraws while the pick equals the current
    /// track, unless there is only one track. Otherwise the order is linear,
    /// wrapping to 0 only with repeat on.
    pub fn pick_next(&mut self, len: usize) -> NextPick {
        let pick = self.peek_next(len);
        self.queued = None;
        pick
    }

    /// The pick [`pick_next`](Self::pick_next) will return next, without
    /// advancing. A shuffle draw made here is kept until it is consumed, so
    /// the track decoded ahead of time is the one that plays.
    pub fn peek_next(&mut self, len: usize) -> NextPick {
        if len == 0 {
            return NextPick::EndOfPlaylist;
        }

        if self.shuffle {
            if len == 1 {
                return NextPick::Index(0);
            }
            if let Some(queued) = self.queued.filter(|&queued| queued < len && Some(queued) != self.current) {
                return NextPick::Index(queued);
            }
            let candidate = loop {
                let candidate = self.rng.gen_range(0..len);
                if Some(candidate) != self.current {
                    break candidate;
                }
            };
            self.queued = Some(candidate);
            return NextPick::Index(candidate);
        }

        let next = self.current.map_or(0, |current| current + 1);
        if next < len {
            NextPick::Index(next)
        } else if self.repeat {
            NextPick::Index(0)
        } else {
            NextPick::EndOfPlaylist
        }
    }

    /// Like [`pick_next`](Self::pick_next) but without consuming randomness
    /// for linear order; used to decide whether a crossfade has a target.
    pub fn has_next(&self, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        if self.shuffle || self.repeat {
            return true;
        }
        self.current.map_or(0, |current| current + 1) < len
    }

    /// Index before the current one, wrapping from the first to the last
    pub fn pick_previous(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self.current {
            Some(0) | None => Some(len - 1),
            Some(current) => Some((current - 1).min(len - 1)),
        }
    }

    /// Keep the marker on the same track after a playlist move
    pub fn track_moved(&mut self, from: usize, to: usize) {
        self.queued = None;
        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && current <= to {
                current - 1
            } else if to <= current && current < from {
                current + 1
            } else {
                current
            });
        }
    }

    /// Keep the marker consistent after a removal. Returns true when the
    /// removed track was the current one.
    pub fn track_removed(&mut self, index: usize) -> bool {
        self.queued = None;
        match self.current {
            Some(current) if current == index => {
                self.current = None;
                true
            }
            Some(current) if current > index => {
                self.current = Some(current - 1);
                false
            }
            _ => false,
        }
    }
}
