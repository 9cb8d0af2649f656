//! # Bot Module
//!
//! Main Discord handler for Tune Turtle.
//!
//! The bot is built around the [`TuneTurtleBot`] struct, which implements
//! Serenity's [`EventHandler`] trait. It owns:
//!
//! - The per-guild player registry ([`PlayerRegistry`])
//! - The media resolver ([`YtDlpResolver`])
//! - The guild allowlist enforcement (startup cleanup + new invites)
//!
//! Every mutating command goes through the role-hierarchy checks in
//! [`crate::player::authority`] before touching a guild's player.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, Guild, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    config::Config, error::PlayerError, player::GuildPlayer, player::PlayerRegistry,
    sources::YtDlpResolver,
};

pub struct TuneTurtleBot {
    /// Configuración cargada de variables de entorno
    pub config: Arc<Config>,
    /// Registro proceso-global de reproductores por guild
    pub registry: Arc<PlayerRegistry>,
    /// Resolución de búsquedas/URLs a streams reproducibles
    pub resolver: YtDlpResolver,
}

impl TuneTurtleBot {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(PlayerRegistry::new(
            config.default_volume,
            Duration::from_secs(config.idle_timeout_secs),
        ));

        Self {
            config: Arc::new(config),
            registry,
            resolver: YtDlpResolver::new(),
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("🌐 Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta (o mueve) la sesión de voz de la guild al canal indicado y
    /// guarda el handle en su reproductor.
    pub async fn join_voice(
        &self,
        ctx: &Context,
        player: &GuildPlayer,
        channel_id: ChannelId,
    ) -> Result<(), PlayerError> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| PlayerError::Transport("Songbird no inicializado".to_string()))?;

        match manager.join(player.guild_id(), channel_id).await {
            Ok(call) => {
                player.set_call(call, channel_id);
                info!(
                    "🔊 Conectado al canal {} en guild {}",
                    channel_id,
                    player.guild_id()
                );
                Ok(())
            }
            Err(e) => {
                error!("Error al conectar al canal de voz: {:?}", e);
                Err(PlayerError::Transport(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EventHandler for TuneTurtleBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🐢 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        // Limpieza al arrancar: salir de guilds fuera de la lista autorizada
        for guild in &ready.guilds {
            if !self.config.is_guild_allowed(guild.id.get()) {
                warn!("🚫 Guild no autorizada {}, saliendo", guild.id);
                if let Err(e) = ctx.http.leave_guild(guild.id).await {
                    error!("Error al salir de la guild {}: {:?}", guild.id, e);
                }
            }
        }

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new != Some(true) {
            return;
        }

        if self.config.is_guild_allowed(guild.id.get()) {
            info!("✅ Invitado a guild autorizada «{}» ({})", guild.name, guild.id);
        } else {
            warn!(
                "❌ Invitación no autorizada, saliendo de «{}» ({})",
                guild.name, guild.id
            );
            if let Err(e) = ctx.http.leave_guild(guild.id).await {
                error!("Error al salir de la guild {}: {:?}", guild.id, e);
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Mantiene el estado del reproductor en sincronía con la sesión de voz
    /// real: desmonta todo si expulsan al bot y registra el canal nuevo si
    /// lo mueven.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        if old.is_some() && new.channel_id.is_none() {
            // Bot expulsado o desconectado desde fuera
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.registry.destroy(guild_id).await;
        } else if let Some(channel_id) = new.channel_id {
            if let Some(player) = self.registry.get(guild_id) {
                player.update_voice_channel(Some(channel_id));
            }
        }
    }
}
