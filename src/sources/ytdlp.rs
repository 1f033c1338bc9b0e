use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use super::{MediaResolver, ResolveError};
use crate::{connector::AudioResource, session::Track};

/// Resolvedor basado en yt-dlp (URLs, playlists y búsquedas de YouTube)
pub struct YtDlpResolver {
    binary: String,
    max_playlist_size: usize,
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, max_playlist_size: usize) -> Self {
        Self {
            binary: binary.into(),
            max_playlist_size,
        }
    }

    /// Convierte la entrada del usuario en un objetivo para yt-dlp.
    fn target(query: &str) -> Result<String, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::Unsupported(query.to_string()));
        }

        // Texto libre: búsqueda
        if !query.contains("://") {
            return Ok(format!("ytsearch1:{query}"));
        }

        let url = Url::parse(query).map_err(|_| ResolveError::Unsupported(query.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url.to_string()),
            _ => Err(ResolveError::Unsupported(query.to_string())),
        }
    }

    /// Parsea la salida `--dump-json` (un objeto JSON por línea).
    fn parse_entries(stdout: &str, limit: usize) -> Vec<Track> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Línea de yt-dlp ignorada: {}", e);
                    None
                }
            })
            .filter_map(|entry| {
                let url = entry.webpage_url.or(entry.url)?;
                let thumbnail = entry
                    .thumbnail
                    .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url));
                Some(Track {
                    title: entry.title.unwrap_or_else(|| "Desconocido".to_string()),
                    url,
                    thumbnail,
                })
            })
            .take(limit)
            .collect()
    }

    fn is_unsupported(stderr: &str) -> bool {
        stderr.contains("Unsupported URL") || stderr.contains("is not a valid URL")
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify(&self) -> anyhow::Result<()> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no disponible");
        }
        info!(
            "✅ yt-dlp versión: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, ResolveError> {
        let target = Self::target(query)?;
        info!("🔍 Resolviendo con yt-dlp: {}", target);

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "--dump-json",
                "--flat-playlist",
                "--no-warnings",
                "--socket-timeout",
                "15",
                "--playlist-end",
            ])
            .arg(self.max_playlist_size.to_string())
            .arg(&target)
            .output()
            .await
            .map_err(|e| anyhow!("No se pudo ejecutar yt-dlp: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló para {}: {}", target, stderr.trim());
            if Self::is_unsupported(&stderr) {
                return Err(ResolveError::Unsupported(query.to_string()));
            }
            return Err(anyhow!("yt-dlp falló: {}", stderr.trim()).into());
        }

        let tracks = Self::parse_entries(
            &String::from_utf8_lossy(&output.stdout),
            self.max_playlist_size,
        );
        if tracks.is_empty() {
            return Err(anyhow!("Sin resultados para: {}", query).into());
        }

        info!("✅ {} tracks resueltos", tracks.len());
        Ok(tracks)
    }

    async fn open_audio_stream(&self, url: &str) -> Result<AudioResource, ResolveError> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map(AudioResource::File)
                .map_err(|_| ResolveError::Unsupported(url.to_string())),
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                Ok(AudioResource::Remote(url.to_string()))
            }
            Ok(_) => Err(ResolveError::Unsupported(url.to_string())),
            Err(_) => Ok(AudioResource::File(PathBuf::from(url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_becomes_search() {
        assert_eq!(
            YtDlpResolver::target("  lofi beats ").unwrap(),
            "ytsearch1:lofi beats"
        );
    }

    #[test]
    fn non_http_urls_are_unsupported() {
        assert!(matches!(
            YtDlpResolver::target("ftp://example.com/song.mp3"),
            Err(ResolveError::Unsupported(_))
        ));
        assert!(matches!(
            YtDlpResolver::target("   "),
            Err(ResolveError::Unsupported(_))
        ));
    }

    #[test]
    fn parses_playlist_lines() {
        let stdout = r#"{"title":"Uno","webpage_url":"https://www.youtube.com/watch?v=1","thumbnail":"https://i.ytimg.com/1.jpg"}
{"title":"Dos","url":"https://www.youtube.com/watch?v=2","thumbnails":[{"url":"small.jpg"},{"url":"big.jpg"}]}
not json
{"title":"Sin url"}
{"webpage_url":"https://www.youtube.com/watch?v=3"}
"#;

        let tracks = YtDlpResolver::parse_entries(stdout, 10);

        assert_eq!(
            tracks,
            vec![
                Track::new("Uno", "https://www.youtube.com/watch?v=1")
                    .with_thumbnail("https://i.ytimg.com/1.jpg"),
                Track::new("Dos", "https://www.youtube.com/watch?v=2").with_thumbnail("big.jpg"),
                Track::new("Desconocido", "https://www.youtube.com/watch?v=3"),
            ]
        );
    }

    #[test]
    fn playlist_size_is_capped() {
        let stdout = (0..5)
            .map(|i| format!(r#"{{"title":"T{i}","url":"https://x/{i}"}}"#))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(YtDlpResolver::parse_entries(&stdout, 2).len(), 2);
    }

    #[test]
    fn detects_unsupported_url_errors() {
        assert!(YtDlpResolver::is_unsupported(
            "ERROR: Unsupported URL: https://example.com"
        ));
        assert!(!YtDlpResolver::is_unsupported("ERROR: HTTP Error 403"));
    }

    #[tokio::test]
    async fn streams_map_to_resources() {
        let resolver = YtDlpResolver::new("yt-dlp", 10);

        assert_eq!(
            resolver
                .open_audio_stream("https://youtu.be/abc")
                .await
                .unwrap(),
            AudioResource::Remote("https://youtu.be/abc".to_string())
        );
        assert_eq!(
            resolver
                .open_audio_stream("/music/a.mp3")
                .await
                .unwrap(),
            AudioResource::File(PathBuf::from("/music/a.mp3"))
        );
        assert!(matches!(
            resolver.open_audio_stream("ftp://x/y").await,
            Err(ResolveError::Unsupported(_))
        ));
    }
}
