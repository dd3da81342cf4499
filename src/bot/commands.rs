use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Nombre y descripción de cada comando, en el orden en que se registran.
/// `/help` se arma a partir de esta misma lista.
pub const COMMANDS: &[(&str, &str)] = &[
    ("play", "Play a song, a link or a playlist"),
    ("pause", "Pause the current song"),
    ("resume", "Resume the paused song"),
    ("skip", "Skip to the next song in the queue"),
    ("stop", "Stop playback and clear the queue"),
    ("loop", "Toggle looping of the current song"),
    ("queue", "Show the current queue"),
    ("leave", "Disconnect from the voice channel"),
    ("help", "Show every command"),
];

fn all_commands() -> Vec<CreateCommand> {
    COMMANDS
        .iter()
        .map(|(name, description)| {
            let command = CreateCommand::new(*name).description(*description);
            match *name {
                "play" => command.add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "query",
                        "Search text, YouTube/Spotify link or playlist",
                    )
                    .required(true),
                ),
                _ => command,
            }
        })
        .collect()
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}
