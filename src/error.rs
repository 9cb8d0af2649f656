use thiserror::Error;

/// Errores de dominio del reproductor.
///
/// Cada variante lleva un mensaje pensado para el usuario que disparó el
/// comando; cualquier otro error se propaga como [`anyhow::Error`] y se
/// responde de forma genérica.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("permiso denegado: {0}")]
    PermissionDenied(String),

    #[error("fallo de resolución: {0}")]
    Resolution(String),

    #[error("fallo de transporte de voz: {0}")]
    Transport(String),

    #[error("el bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("el solicitante no está en un canal de voz")]
    NotInVoiceChannel,

    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("no hay nada pausado")]
    NothingPaused,

    #[error("voto duplicado")]
    AlreadyVoted,

    #[error("volumen inválido: {0}")]
    InvalidVolume(i64),
}

impl PlayerError {
    /// Mensaje con el que se responde la interacción que provocó el error.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied(reason) => format!("🛑 **Permiso denegado:** {reason}"),
            Self::Resolution(reason) => {
                format!("❌ No se pudo resolver la búsqueda: `{reason}`")
            }
            Self::Transport(reason) => format!("❌ Error de conexión de voz: `{reason}`"),
            Self::NotConnected => "❌ No estoy en un canal de voz.".to_string(),
            Self::NotInVoiceChannel => {
                "❌ Debes estar en un canal de voz o indicar uno.".to_string()
            }
            Self::NothingPlaying => "❌ No hay nada reproduciéndose.".to_string(),
            Self::NothingPaused => "❌ No hay nada pausado.".to_string(),
            Self::AlreadyVoted => "🗳️ Ya votaste para saltar esta canción.".to_string(),
            Self::InvalidVolume(v) => {
                format!("❌ El volumen debe estar entre 0 y 100 (recibido: {v}).")
            }
        }
    }
}
