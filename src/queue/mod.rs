use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::decoder::is_supported_extension;
use crate::error::PlaylistError;
use crate::models::TrackId;

pub mod sequencer;

pub use sequencer::{NextPick, Sequencer};

/// Where a track's encoded bytes come from
#[derive(Debug, Clone)]
pub enum TrackSource {
    File(PathBuf),
    Memory {
        bytes: Arc<[u8]>,
        extension: Option<String>,
    },
}

impl TrackSource {
    /// Read the encoded bytes. In-memory sources are borrowed, files are read whole.
    pub fn read_bytes(&self) -> io::Result<Cow<'_, [u8]>> {
        match self {
            TrackSource::File(path) => fs::read(path).map(Cow::Owned),
            TrackSource::Memory { bytes, .. } => Ok(Cow::Borrowed(&bytes[..])),
        }
    }

    /// Extension used to hint the decoder's format probe
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            TrackSource::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_lowercase()),
            TrackSource::Memory { extension, .. } => extension.clone(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            TrackSource::File(path) => Some(path),
            TrackSource::Memory { .. } => None,
        }
    }
}

/// A playlist entry
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub source: TrackSource,
}

impl Track {
    pub fn display_name(&self) -> &str {
        &self.name
    }
}

/// Ordered, reorderable list of tracks.
///
/// Ids are handed out once and never reused, so they stay valid across
/// moves and removals.
#[derive(Debug, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    next_id: u64,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> TrackId {
        self.next_id += 1;
        TrackId(self.next_id)
    }

    /// Append a track from any source
    pub fn add_track(&mut self, name: impl Into<String>, source: TrackSource) -> TrackId {
        let id = self.allocate_id();
        self.tracks.push(Track {
            id,
            name: name.into(),
            source,
        });
        id
    }

    /// Append an audio file after checking it exists and has a playable extension
    pub fn add_file(&mut self, path: &Path) -> Result<TrackId, PlaylistError> {
        if !path.is_file() {
            return Err(PlaylistError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        if !is_supported_extension(extension) {
            return Err(PlaylistError::UnsupportedFormat {
                path: path.to_string_lossy().to_string(),
            });
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();
        Ok(self.add_track(name, TrackSource::File(path.to_path_buf())))
    }

    /// Append every playable file below `dir`, sorted by path
    pub fn add_directory(&mut self, dir: &Path) -> Result<Vec<TrackId>, PlaylistError> {
        if !dir.is_dir() {
            return Err(PlaylistError::FileNotFound {
                path: dir.to_string_lossy().to_string(),
            });
        }

        let mut files = Vec::new();
        scan_directory(dir, &mut files);
        files.sort();

        let mut added = Vec::with_capacity(files.len());
        for file in files {
            match self.add_file(&file) {
                Ok(id) => added.push(id),
                Err(err) => log::debug!("Skipping {}: {}", file.display(), err),
            }
        }
        Ok(added)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    /// Move the track at `from` so it ends up at `to`
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<(), PlaylistError> {
        let len = self.tracks.len();
        if from >= len {
            return Err(PlaylistError::InvalidIndex { index: from });
        }
        if to >= len {
            return Err(PlaylistError::InvalidIndex { index: to });
        }
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Track, PlaylistError> {
        if index >= self.tracks.len() {
            return Err(PlaylistError::InvalidIndex { index });
        }
        Ok(self.tracks.remove(index))
    }

    /// Drop every track, returning them
    pub fn clear(&mut self) -> Vec<Track> {
        std::mem::take(&mut self.tracks)
    }
}

fn scan_directory(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Cannot read directory {}: {}", dir.display(), err);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_directory(&path, files);
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, is_supported_extension)
        {
            files.push(path);
        }
    }
}
