//! Ambient ("elevator") playlists.
//!
//! Every sub-directory of the configured directory is one playlist; its audio
//! files, ordered by name, are the playlist entries.

use anyhow::Result;
use rand::seq::SliceRandom;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::session::state::{AmbientFile, Playlist};

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "m4a", "opus"];

#[derive(Debug, Default)]
pub struct AmbientLibrary {
    playlists: Vec<Vec<AmbientFile>>,
}

impl AmbientLibrary {
    /// Empty playlists are dropped.
    pub fn from_playlists(playlists: Vec<Vec<AmbientFile>>) -> Self {
        Self {
            playlists: playlists.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// Carga las playlists desde disco. Un directorio inexistente da una
    /// biblioteca vacía.
    pub async fn load(dir: &Path) -> Result<Self> {
        if fs::metadata(dir).await.is_err() {
            warn!(
                "🛗 Directorio de música ambiental no encontrado: {}",
                dir.display()
            );
            return Ok(Self::default());
        }

        let mut playlist_dirs = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                playlist_dirs.push(entry.path());
            }
        }
        playlist_dirs.sort();

        let mut playlists = Vec::new();
        for playlist_dir in playlist_dirs {
            let files = load_playlist(&playlist_dir).await?;
            if files.is_empty() {
                warn!("🛗 Playlist vacía ignorada: {}", playlist_dir.display());
                continue;
            }
            playlists.push(files);
        }

        info!(
            "🛗 {} playlists ambientales cargadas desde {}",
            playlists.len(),
            dir.display()
        );
        Ok(Self { playlists })
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Elige una playlist al azar.
    pub fn pick_random(&self) -> Option<Playlist> {
        let mut rng = rand::thread_rng();
        let files = self.playlists.choose(&mut rng)?;
        Playlist::new(files.iter().cloned())
    }
}

async fn load_playlist(dir: &Path) -> Result<Vec<AmbientFile>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if !is_audio || !entry.file_type().await?.is_file() {
            continue;
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(AmbientFile::new(name, path));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn loads_one_playlist_per_directory() {
        let root = tempfile::tempdir().unwrap();
        let lobby = root.path().join("lobby");
        std::fs::create_dir(&lobby).unwrap();
        std::fs::write(lobby.join("02-bossa.mp3"), b"").unwrap();
        std::fs::write(lobby.join("01-intro.ogg"), b"").unwrap();
        std::fs::write(lobby.join("notes.txt"), b"").unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();

        let library = AmbientLibrary::load(root.path()).await.unwrap();

        assert_eq!(library.len(), 1);
        let playlist = library.pick_random().unwrap();
        assert_eq!(
            playlist.files().map(|f| f.name.clone()).collect::<Vec<_>>(),
            vec!["01-intro".to_string(), "02-bossa".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_directory_gives_empty_library() {
        let root = tempfile::tempdir().unwrap();
        let library = AmbientLibrary::load(&root.path().join("nope")).await.unwrap();

        assert!(library.is_empty());
        assert!(library.pick_random().is_none());
    }

    #[test]
    fn empty_playlists_are_dropped() {
        let library = AmbientLibrary::from_playlists(vec![
            Vec::new(),
            vec![AmbientFile::new("a", "/a.mp3")],
        ]);
        assert_eq!(library.len(), 1);
    }
}
