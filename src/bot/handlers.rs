use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        guild::{Guild, Member},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    bot::TuneTurtleBot,
    error::PlayerError,
    player::authority::{self, Actor, Participant},
    ui::embeds,
};

/// Despacha un comando slash y traduce los errores de dominio a respuestas
/// específicas; lo inesperado se loguea y se responde genérico.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let result = match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot).await,
        "leave" => handle_leave(ctx, &command, bot).await,
        "play" => handle_play(ctx, &command, bot).await,
        "skip" => handle_skip(ctx, &command, bot).await,
        "queue" => handle_queue(ctx, &command, bot).await,
        "volume" => handle_volume(ctx, &command, bot).await,
        "pause" => handle_pause(ctx, &command, bot).await,
        "resume" => handle_resume(ctx, &command, bot).await,
        _ => respond_text(ctx, &command, "❌ Comando no reconocido").await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<PlayerError>() {
            Some(player_error) => {
                respond_text(ctx, &command, &player_error.user_message()).await?;
            }
            None => {
                error!("Error inesperado en /{}: {:?}", command.data.name, e);
                respond_text(ctx, &command, "❌ Ocurrió un error interno.").await?;
            }
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: &CommandInteraction, bot: &TuneTurtleBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let target = match command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "channel")
        .and_then(|opt| opt.value.as_channel_id())
    {
        Some(channel) => channel,
        None => user_voice_channel(ctx, guild_id, command.user.id)?,
    };

    let player = bot.registry.get_or_create(guild_id, ctx.http.clone());

    if let Some(current) = player.voice_channel() {
        if current == target {
            return respond_text(ctx, command, "✅ ¡Ya estoy ahí!").await;
        }
        // Mover la sesión exige control sobre el canal actual
        ensure_can_override(ctx, guild_id, command, bot)?;
    }

    bot.join_voice(ctx, &player, target).await?;

    respond_text(ctx, command, &format!("✅ Conectado a <#{target}>")).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    ensure_can_override(ctx, guild_id, command, bot)?;

    let connected = bot
        .registry
        .get(guild_id)
        .map(|p| p.is_connected())
        .unwrap_or(false);
    if !connected {
        return Err(PlayerError::NotConnected.into());
    }

    bot.registry.destroy(guild_id).await;

    // Purgar también el Call del manager de songbird
    if let Some(manager) = songbird::get(ctx).await {
        let _ = manager.remove(guild_id).await;
    }

    respond_text(ctx, command, "👋 ¡Desconectado y cola limpiada!").await
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &TuneTurtleBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Defer: la resolución puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let player = bot.registry.get_or_create(guild_id, ctx.http.clone());

    // Auto-join al canal del solicitante si no hay sesión de voz
    if !player.is_connected() {
        let channel = user_voice_channel(ctx, guild_id, command.user.id)?;
        bot.join_voice(ctx, &player, channel).await?;
    }

    let requester_name = command
        .member
        .as_ref()
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| command.user.name.clone());

    let request = bot
        .resolver
        .resolve(query, command.user.id, requester_name, command.channel_id)
        .await?;

    let embed = embeds::track_added(&request);
    player.enqueue(request);

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &TuneTurtleBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let player = bot
        .registry
        .get(guild_id)
        .ok_or(PlayerError::NothingPlaying)?;
    if !player.is_playing() {
        return Err(PlayerError::NothingPlaying.into());
    }

    let channel = player.voice_channel().ok_or(PlayerError::NotConnected)?;
    let actor = actor_snapshot(ctx, guild_id, command);
    let participants = channel_participants(ctx, guild_id, channel);

    // Dueño/administrador salta sin votación
    if actor.is_owner || actor.is_admin {
        player.stop_current()?;
        return respond_text(ctx, command, "⏩ **Saltada** por un administrador.").await;
    }

    // Un rango inferior no puede ni abrir la votación mientras haya
    // alguien por encima presente
    if !authority::may_initiate_skip_vote(&actor, &participants) {
        return Err(PlayerError::PermissionDenied(
            "no puedes iniciar una votación de skip mientras haya alguien con rango superior en el canal.".to_string(),
        )
        .into());
    }

    let listeners = participants.iter().filter(|p| !p.is_bot).count();
    let status = player.register_skip_vote(actor.user_id, listeners)?;

    if status.skipped {
        player.stop_current()?;
        respond_text(ctx, command, "⏩ ¡Votación exitosa! **Saltando** la canción actual.").await
    } else {
        respond_embed(ctx, command, embeds::skip_vote_progress(&status)).await
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, "La cola está vacía.").await;
    };

    let current = player.current();
    let pending = player.pending();

    if current.is_none() && pending.is_empty() {
        return respond_text(ctx, command, "La cola está vacía.").await;
    }

    respond_embed(ctx, command, embeds::queue(current.as_ref(), &pending)).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let can_manage = command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.manage_channels())
        .unwrap_or(false);
    if !can_manage {
        return Err(PlayerError::PermissionDenied(
            "necesitas el permiso **Gestionar Canales** para cambiar el volumen.".to_string(),
        )
        .into());
    }

    let player = bot
        .registry
        .get(guild_id)
        .filter(|p| p.is_connected())
        .ok_or(PlayerError::NotConnected)?;

    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Nivel no proporcionado"))?;

    player.set_volume(level)?;

    respond_text(ctx, command, &format!("🔊 Volumen ajustado a **{level}%**.")).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    ensure_can_override(ctx, guild_id, command, bot)?;

    let player = bot
        .registry
        .get(guild_id)
        .ok_or(PlayerError::NothingPlaying)?;
    player.pause().await?;

    respond_text(ctx, command, "⏸️ Pausado.").await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    ensure_can_override(ctx, guild_id, command, bot)?;

    let player = bot
        .registry
        .get(guild_id)
        .ok_or(PlayerError::NothingPaused)?;
    player.resume().await?;

    respond_text(ctx, command, "▶️ Reanudado.").await
}

// Funciones auxiliares

/// Responde la interacción; si ya fue diferida o respondida, edita la
/// respuesta original.
async fn respond_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(content),
    );

    if command.create_response(&ctx.http, response).await.is_err() {
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await?;
    }

    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: serenity::builder::CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

/// Canal de voz donde está el usuario, según la caché.
fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, PlayerError> {
    let guild = ctx
        .cache
        .guild(guild_id)
        .ok_or(PlayerError::NotInVoiceChannel)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(PlayerError::NotInVoiceChannel)
}

/// Posición del rol más alto del miembro; sin roles cuenta como 0.
fn top_role_rank(guild: &Guild, member: &Member) -> u16 {
    member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Snapshot inmutable de los presentes en un canal de voz, tomado de la
/// caché en el momento del comando.
fn channel_participants(
    ctx: &Context,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Vec<Participant> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };

    guild
        .voice_states
        .values()
        .filter(|vs| vs.channel_id == Some(channel_id))
        .map(|vs| {
            let (is_bot, top_role_rank) = guild
                .members
                .get(&vs.user_id)
                .map(|m| (m.user.bot, top_role_rank(&guild, m)))
                .unwrap_or((false, 0));

            Participant {
                user_id: vs.user_id,
                is_bot,
                top_role_rank,
            }
        })
        .collect()
}

/// Snapshot del autor del comando con sus privilegios resueltos.
fn actor_snapshot(ctx: &Context, guild_id: GuildId, command: &CommandInteraction) -> Actor {
    let user_id = command.user.id;

    // Permisos ya calculados por Discord para la interacción
    let is_admin = command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.administrator())
        .unwrap_or(false);

    let (is_owner, top_role_rank) = ctx
        .cache
        .guild(guild_id)
        .map(|guild| {
            let rank = guild
                .members
                .get(&user_id)
                .map(|m| top_role_rank(&guild, m))
                .unwrap_or(0);
            (guild.owner_id == user_id, rank)
        })
        .unwrap_or((false, 0));

    Actor {
        user_id,
        top_role_rank,
        is_owner,
        is_admin,
    }
}

/// Exige que el autor pueda tomar el control del canal de voz del bot.
fn ensure_can_override(
    ctx: &Context,
    guild_id: GuildId,
    command: &CommandInteraction,
    bot: &TuneTurtleBot,
) -> Result<(), PlayerError> {
    let actor = actor_snapshot(ctx, guild_id, command);

    let channel = bot
        .registry
        .get(guild_id)
        .and_then(|player| player.voice_channel());
    let connected = channel.is_some();
    let participants = channel
        .map(|c| channel_participants(ctx, guild_id, c))
        .unwrap_or_default();

    if authority::can_override(&actor, connected, &participants) {
        Ok(())
    } else {
        Err(PlayerError::PermissionDenied(
            "hay un usuario con rango igual o superior controlando el canal de voz.".to_string(),
        ))
    }
}
