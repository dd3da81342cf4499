use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{player::PlayOutcome, session::SessionStatus},
    bot::commands::COMMANDS,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Respuesta a `/play`
pub fn play_message(outcome: &PlayOutcome) -> String {
    if outcome.nothing_found() {
        return match &outcome.collection {
            Some(name) => format!("❌ Nothing playable found in **{}**", name),
            None => "❌ Song not found".to_string(),
        };
    }

    match (&outcome.collection, &outcome.first_title) {
        (Some(name), _) if outcome.failed() > 0 => format!(
            "✅ Added {} of {} songs from **{}** ({} failed)",
            outcome.added,
            outcome.attempted,
            name,
            outcome.failed()
        ),
        (Some(name), _) => format!(
            "✅ Added {} of {} songs from **{}**",
            outcome.added, outcome.attempted, name
        ),
        (None, Some(title)) if outcome.started => format!("🎵 Now playing: **{}**", title),
        (None, Some(title)) => format!("✅ Added: **{}**", title),
        (None, None) => format!("✅ Added {} songs", outcome.added),
    }
}

/// Lista numerada de las próximas canciones (máximo 10) más el total
pub fn format_upcoming(status: &SessionStatus) -> String {
    let mut description: String = status
        .upcoming
        .iter()
        .enumerate()
        .map(|(i, track)| format!("**{}**. {}\n", i + 1, track.title()))
        .collect();

    let hidden = status.upcoming_total.saturating_sub(status.upcoming.len());
    if hidden > 0 {
        description.push_str(&format!("...and {} more\n", hidden));
    }

    description
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(status: &SessionStatus) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now());

    if status.is_empty() {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let mut embed = embed;
    if let Some(current) = &status.now_playing {
        let icon = if status.loop_enabled { "🔂" } else { "▶️" };
        embed = embed.field(
            format!("{} Now playing", icon),
            format!("**{}**\n{}", current.title(), current.canonical_uri()),
            false,
        );
    }

    if status.upcoming_total > 0 {
        embed = embed.field(
            format!("Up next ({})", status.upcoming_total),
            format_upcoming(status),
            false,
        );
    }

    embed.footer(CreateEmbedFooter::new(format!(
        "Loop: {} • {}",
        if status.loop_enabled { "on" } else { "off" },
        STANDARD_FOOTER
    )))
}

/// Texto de ayuda con un comando por línea
pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, description)| match *name {
            "play" => format!("• `/play <query>` - {}", description),
            _ => format!("• `/{}` - {}", name, description),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Crea un embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Jukebox - Commands")
        .color(colors::INFO_BLUE)
        .description(help_text())
        .field(
            "🎵 Supported input",
            "• Search text\n\
            • YouTube links and playlists\n\
            • Spotify tracks, playlists and albums\n\
            • Direct audio links",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::session::PlayerState, sources::Track};
    use pretty_assertions::assert_eq;

    fn titled(n: usize) -> Vec<Track> {
        (1..=n)
            .filter_map(|i| Track::new(format!("https://cdn/{}", i), format!("Song {}", i), ""))
            .collect()
    }

    #[test]
    fn single_item_feedback() {
        let mut outcome = PlayOutcome {
            added: 1,
            attempted: 1,
            collection: None,
            first_title: Some("Around the World".into()),
            started: false,
        };
        assert_eq!(play_message(&outcome), "✅ Added: **Around the World**");

        outcome.started = true;
        assert_eq!(play_message(&outcome), "🎵 Now playing: **Around the World**");
    }

    #[test]
    fn collection_feedback_counts_failures() {
        let outcome = PlayOutcome {
            added: 2,
            attempted: 4,
            collection: Some("Discovery".into()),
            first_title: Some("One More Time".into()),
            started: true,
        };
        assert_eq!(
            play_message(&outcome),
            "✅ Added 2 of 4 songs from **Discovery** (2 failed)"
        );
    }

    #[test]
    fn complete_collection_has_no_failure_note() {
        let outcome = PlayOutcome {
            added: 3,
            attempted: 3,
            collection: Some("Homework".into()),
            first_title: Some("Da Funk".into()),
            started: false,
        };
        assert_eq!(play_message(&outcome), "✅ Added 3 of 3 songs from **Homework**");
    }

    #[test]
    fn nothing_found_feedback() {
        let outcome = PlayOutcome {
            attempted: 1,
            ..PlayOutcome::default()
        };
        assert_eq!(play_message(&outcome), "❌ Song not found");
    }

    #[test]
    fn upcoming_is_numbered_from_one() {
        let upcoming = titled(3);
        let status = SessionStatus {
            state: PlayerState::Playing,
            now_playing: None,
            upcoming_total: upcoming.len(),
            upcoming,
            loop_enabled: false,
            connected: true,
        };

        assert_eq!(format_upcoming(&status), "**1**. Song 1\n**2**. Song 2\n**3**. Song 3\n");
    }

    #[test]
    fn upcoming_mentions_hidden_tracks() {
        let status = SessionStatus {
            state: PlayerState::Playing,
            now_playing: None,
            upcoming: titled(10),
            upcoming_total: 25,
            loop_enabled: true,
            connected: true,
        };

        let text = format_upcoming(&status);
        assert_eq!(text.lines().count(), 11);
        assert!(text.ends_with("...and 15 more\n"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for (name, _) in COMMANDS {
            assert!(help.contains(&format!("`/{}", name)), "missing /{}", name);
        }
    }
}
