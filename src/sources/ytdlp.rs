//! Resolución de búsquedas y URLs mediante yt-dlp.
//!
//! Caja negra para el resto del bot: recibe un término o URL y devuelve un
//! [`TrackRequest`] listo para encolar, o un error de resolución que se
//! muestra tal cual al solicitante, sin reintentos.

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serenity::model::id::{ChannelId, UserId};
use tracing::{error, info};
use url::Url;

use crate::error::PlayerError;
use crate::player::TrackRequest;

/// Campos que nos interesan del JSON de `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    webpage_url: String,
    /// URL del stream del formato seleccionado.
    url: String,
}

pub struct YtDlpResolver;

impl YtDlpResolver {
    pub fn new() -> Self {
        Self
    }

    /// Verifica que yt-dlp esté disponible en el PATH.
    pub async fn verify_dependencies(&self) -> Result<()> {
        let output = tokio::process::Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
                Ok(())
            }
            _ => {
                error!("❌ yt-dlp no encontrado. Instala con: pip install yt-dlp");
                anyhow::bail!("yt-dlp no disponible")
            }
        }
    }

    /// Resuelve `query` (URL o término de búsqueda) a una petición de
    /// reproducción para `requested_by`.
    pub async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
        requested_by_name: String,
        announce_channel: ChannelId,
    ) -> Result<TrackRequest, PlayerError> {
        // Una URL se resuelve tal cual; un término va como búsqueda
        let target = if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        let output = tokio::process::Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--format",
                "bestaudio/best",
                "--no-playlist",
                "--no-warnings",
                "--socket-timeout",
                "30",
                "--retries",
                "3",
            ])
            .arg(&target)
            .output()
            .await
            .map_err(|e| PlayerError::Resolution(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("sin resultados")
                .to_string();
            return Err(PlayerError::Resolution(reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| PlayerError::Resolution("sin resultados".to_string()))?;

        let info: VideoInfo = serde_json::from_str(line)
            .map_err(|e| PlayerError::Resolution(format!("respuesta de yt-dlp malformada: {e}")))?;

        info!("🔎 Resuelto «{}» → {}", query, info.webpage_url);

        Ok(TrackRequest {
            title: info.title,
            stream_url: info.url,
            webpage_url: info.webpage_url,
            requested_by,
            requested_by_name,
            announce_channel,
            enqueued_at: Utc::now(),
        })
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Distingue URLs http(s) de términos de búsqueda.
pub fn is_url(query: &str) -> bool {
    Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/file"));
    }

    #[test]
    fn test_video_info_parsing() {
        let json = r#"{
            "title": "Never Gonna Give You Up",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "url": "https://cdn.example/stream",
            "duration": 212.0
        }"#;

        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.url, "https://cdn.example/stream");
    }
}
