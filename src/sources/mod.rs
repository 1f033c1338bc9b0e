pub mod ambient;
pub mod ytdlp;

use async_trait::async_trait;
use thiserror::Error;

use crate::{connector::AudioResource, session::Track};

pub use ambient::AmbientLibrary;
pub use ytdlp::YtDlpResolver;

/// Fallos del resolvedor de medios.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// La URL o la fuente no están soportadas.
    #[error("fuente no soportada: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ResolveError {
    /// Mensaje para el usuario que distingue URL inválida de error genérico.
    pub fn user_message(&self) -> &'static str {
        match self {
            ResolveError::Unsupported(_) => "❌ URL no válida o fuente no soportada",
            ResolveError::Failed(_) => "❌ Error al procesar la canción, inténtalo de nuevo",
        }
    }
}

/// Turns user input into playable tracks and audio streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync + 'static {
    /// Resolves a URL or search string. Playlists expand to many tracks.
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, ResolveError>;

    async fn open_audio_stream(&self, url: &str) -> Result<AudioResource, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_distinguish_invalid_urls() {
        let unsupported = ResolveError::Unsupported("ftp://x".to_string());
        let failed = ResolveError::Failed(anyhow::anyhow!("timeout"));

        assert_ne!(unsupported.user_message(), failed.user_message());
        assert!(unsupported.user_message().contains("URL no válida"));
    }
}
