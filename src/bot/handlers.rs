use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{bot::JukeboxBot, error::PlaybackResult, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, "❌ This command only works inside a server", true).await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "pause" => {
            let result = bot.player.pause(guild_id).await;
            respond_result(ctx, &command, result, "⏸️ Paused").await?
        }
        "resume" => {
            let result = bot.player.resume(guild_id).await;
            respond_result(ctx, &command, result, "▶️ Resumed").await?
        }
        "skip" => {
            let result = bot.player.skip(guild_id).await;
            respond_result(ctx, &command, result, "⏭️ Skipped").await?
        }
        "stop" => {
            let result = bot.player.stop(guild_id).await;
            respond_result(ctx, &command, result, "⏹️ Stopped and cleared the queue").await?
        }
        "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "leave" => {
            let result = bot.player.leave(guild_id).await;
            respond_result(ctx, &command, result, "👋 Disconnected from the voice channel").await?
        }
        "help" => handle_help(ctx, &command).await?,
        _ => respond(ctx, &command, "❌ Unknown command", true).await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .unwrap_or_default();

    if query.is_empty() {
        return respond(ctx, command, "❌ Tell me what to play", true).await;
    }

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id);
    let edit = match bot.player.play(guild_id, voice_channel, query).await {
        Ok(outcome) => EditInteractionResponse::new().content(embeds::play_message(&outcome)),
        Err(e) => {
            warn!("❌ /play falló en guild {}: {}", guild_id, e);
            EditInteractionResponse::new().embed(embeds::create_error_embed(&e.to_string()))
        }
    };

    command.edit_response(&ctx.http, edit).await?;
    Ok(())
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    match bot.player.toggle_loop(guild_id).await {
        Ok(true) => respond(ctx, command, "🔂 Loop enabled", false).await,
        Ok(false) => respond(ctx, command, "➡️ Loop disabled", false).await,
        Err(e) => respond(ctx, command, &format!("❌ {}", e), true).await,
    }
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let status = bot.player.status(guild_id).await;
    let embed = embeds::create_queue_embed(&status);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

async fn handle_help(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

/// Errores de precondición y de conexión se muestran tal cual a quien pidió
async fn respond_result(
    ctx: &Context,
    command: &CommandInteraction,
    result: PlaybackResult<()>,
    success: &str,
) -> Result<()> {
    match result {
        Ok(()) => respond(ctx, command, success, false).await,
        Err(e) => respond(ctx, command, &format!("❌ {}", e), e.is_precondition()).await,
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
