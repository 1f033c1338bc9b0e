use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    bot::SessionBot,
    session::{Completion, SessionError},
    ui::{buttons::ButtonAction, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SessionBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "skip" => {
            defer(ctx, &command).await?;
            let session = bot.sessions.get_or_create(guild_id);
            let outcome = settle(session.play_next_track(command.user.id)).await;
            reply(ctx, &command, outcome, &SKIP_REPLY).await
        }
        "pause" => {
            defer(ctx, &command).await?;
            let session = bot.sessions.get_or_create(guild_id);
            let outcome = settle(session.play_pause_track()).await;
            reply(ctx, &command, outcome, &PAUSE_REPLY).await
        }
        "elevator" => handle_elevator(ctx, &command, bot, guild_id).await,
        "stop" => {
            defer(ctx, &command).await?;
            let session = bot.sessions.get_or_create(guild_id);
            let outcome = settle(session.request_disconnect()).await;
            reply(ctx, &command, outcome, &STOP_REPLY).await
        }
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok(())
        }
    }
}

/// Maneja los botones del mensaje de estado
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &SessionBot,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };
    let Some(action) = ButtonAction::from_custom_id(&component.data.custom_id) else {
        warn!("Botón desconocido: {}", component.data.custom_id);
        return Ok(());
    };

    // El mensaje de estado se actualiza solo cuando la transición se confirma
    component
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    let session = bot.sessions.get_or_create(guild_id);
    let outcome = match action {
        ButtonAction::PlayPause => session.play_pause_track().map(drop),
        ButtonAction::Skip => session.play_next_track(component.user.id).map(drop),
        ButtonAction::Stop => session.disconnect().await,
    };

    if let Err(e) = outcome {
        warn!("⚠️ Botón {:?} rechazado en guild {}: {}", action, guild_id, e);
    }
    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SessionBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Defer la respuesta ya que puede tomar tiempo
    defer(ctx, command).await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_error(ctx, command, "Debes estar en un canal de voz").await;
    };

    let tracks = match bot.resolver.resolve(query).await {
        Ok(tracks) => tracks,
        Err(e) => {
            warn!("❌ No se pudo resolver '{}': {}", query, e);
            return edit_error(ctx, command, e.user_message()).await;
        }
    };

    let count = tracks.len();
    let first_title = tracks.first().map(|t| t.title.clone()).unwrap_or_default();

    let session = bot.sessions.get_or_create(guild_id);
    let outcome = settle(session.queue_tracks(
        command.user.id,
        voice_channel_id,
        command.channel_id,
        tracks,
    ))
    .await;

    match outcome {
        Ok(_) => {
            let description = if count == 1 {
                format!("**{}**", first_title)
            } else {
                format!("{} canciones", count)
            };
            let embed = embeds::create_success_embed("Agregado a la cola", &description);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            Ok(())
        }
        Err(e) => edit_error(ctx, command, session_error_message(&e)).await,
    }
}

async fn handle_elevator(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SessionBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, command).await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_error(ctx, command, "Debes estar en un canal de voz").await;
    };

    let session = bot.sessions.get_or_create(guild_id);
    let outcome = settle(session.start_elevator(voice_channel_id, command.channel_id)).await;
    reply(ctx, command, outcome, &ELEVATOR_REPLY).await
}

/// Texto de respuesta según si la transición se aplicó o no.
struct Replies {
    applied: &'static str,
    ignored: &'static str,
}

const SKIP_REPLY: Replies = Replies {
    applied: "⏭️ Canción saltada",
    ignored: "⚠️ No hay ninguna canción que saltar",
};

const PAUSE_REPLY: Replies = Replies {
    applied: "⏯️ Reproducción pausada/reanudada",
    ignored: "⚠️ No hay música que pausar o reanudar",
};

const STOP_REPLY: Replies = Replies {
    applied: "⏹️ Reproducción detenida",
    ignored: "⚠️ No hay nada reproduciéndose",
};

const ELEVATOR_REPLY: Replies = Replies {
    applied: "🛗 Modo ascensor",
    ignored: "⚠️ Ya hay una sesión activa en este servidor",
};

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

/// Espera la confirmación de una transición encolada; `true` si cambió el estado.
async fn settle(submitted: Result<Completion, SessionError>) -> Result<bool, SessionError> {
    submitted?.applied().await
}

/// Contenido final de una respuesta diferida: `Err` se muestra como error.
fn reply_text(
    outcome: &Result<bool, SessionError>,
    replies: &Replies,
) -> Result<&'static str, &'static str> {
    match outcome {
        Ok(true) => Ok(replies.applied),
        Ok(false) => Ok(replies.ignored),
        Err(e) => Err(session_error_message(e)),
    }
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    outcome: Result<bool, SessionError>,
    replies: &Replies,
) -> Result<()> {
    match reply_text(&outcome, replies) {
        Ok(text) => {
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
                .await?;
            Ok(())
        }
        Err(message) => edit_error(ctx, command, message).await,
    }
}

async fn edit_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed("Error", message)),
        )
        .await?;
    Ok(())
}

fn session_error_message(error: &SessionError) -> &'static str {
    match error {
        SessionError::Overloaded { .. } => {
            "⏳ Hay demasiadas operaciones pendientes, inténtalo en unos segundos"
        }
        SessionError::Closed => "❌ La sesión ya no está disponible",
        SessionError::TransitionFailed(_) => "❌ No se pudo completar la operación",
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
