use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use crate::player::TrackRequest;
use crate::player::votes::VoteStatus;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🐢 Tune Turtle";

/// Embed de "reproduciendo ahora" que el loop anuncia al arrancar una pista.
pub fn now_playing(track: &TrackRequest) -> CreateEmbed {
    CreateEmbed::default()
        .title("▶️ Reproduciendo Ahora")
        .description(format!("[{}]({})", track.title, track.webpage_url))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!(
            "Pedida por {}",
            track.requested_by_name
        )))
}

/// Embed de confirmación al encolar una pista.
pub fn track_added(track: &TrackRequest) -> CreateEmbed {
    CreateEmbed::default()
        .title("➕ Agregada a la Cola")
        .description(format!("[{}]({})", track.title, track.webpage_url))
        .color(colors::SUCCESS_GREEN)
        .field("👤 Pedida por", format!("<@{}>", track.requested_by), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con la pista actual y la cola pendiente en orden FIFO.
pub fn queue(current: Option<&TrackRequest>, pending: &[TrackRequest]) -> CreateEmbed {
    let description = if pending.is_empty() {
        "La cola está vacía.".to_string()
    } else {
        pending
            .iter()
            .enumerate()
            .map(|(i, track)| {
                format!(
                    "**{}.** [{}]({}) — pedida por {}",
                    i + 1,
                    track.title,
                    track.webpage_url,
                    track.requested_by_name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut embed = CreateEmbed::default()
        .title("🎧 Cola de Reproducción")
        .description(description)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(track) = current {
        embed = embed.field(
            "▶️ Sonando",
            format!("[{}]({})", track.title, track.webpage_url),
            false,
        );
    }

    embed
}

/// Embed de progreso de la votación de skip.
pub fn skip_vote_progress(status: &VoteStatus) -> CreateEmbed {
    let remaining = status.required.saturating_sub(status.votes);

    CreateEmbed::default()
        .title("🗳️ Voto para Saltar")
        .description(format!(
            "**{}/{}** votos. Faltan {}.",
            status.votes, status.required, remaining
        ))
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
