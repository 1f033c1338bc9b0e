use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::connector::{StatusView, ViewMode};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const ELEVATOR_TEAL: Colour = Colour::from_rgb(23, 162, 184);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Music Bot";

/// Embed del mensaje de estado de la sesión
pub fn status_embed(view: &StatusView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(status_heading(view))
        .description(format!("**{}**", view.title))
        .color(status_color(view))
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(url) = &view.url {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = &view.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    let label = match view.mode {
        ViewMode::Music => "📋 A continuación",
        ViewMode::Elevator => "🛗 Siguientes en la playlist",
    };
    embed.field(label, format_up_next(&view.up_next, view.remaining), false)
}

fn status_heading(view: &StatusView) -> &'static str {
    match (view.mode, view.connecting, view.is_paused) {
        (_, true, _) => "🔌 Conectando al canal de voz",
        (ViewMode::Music, false, true) => "⏸️ En pausa",
        (ViewMode::Music, false, false) => "🎵 Reproduciendo ahora",
        (ViewMode::Elevator, false, _) => "🛗 Música de ascensor",
    }
}

fn status_color(view: &StatusView) -> serenity::all::Colour {
    match (view.mode, view.connecting, view.is_paused) {
        (_, true, _) => colors::INFO_BLUE,
        (_, false, true) => colors::WARNING_ORANGE,
        (ViewMode::Music, false, false) => colors::MUSIC_PURPLE,
        (ViewMode::Elevator, false, false) => colors::ELEVATOR_TEAL,
    }
}

/// Lista numerada de lo que viene, con el resto resumido.
fn format_up_next(up_next: &[String], remaining: usize) -> String {
    if up_next.is_empty() {
        return "La cola está vacía".to_string();
    }

    let mut lines: Vec<String> = up_next
        .iter()
        .enumerate()
        .map(|(i, title)| format!("`{}.` {}", i + 1, title))
        .collect();

    let hidden = remaining.saturating_sub(up_next.len());
    if hidden > 0 {
        lines.push(format!("… y {} más", hidden));
    }
    lines.join("\n")
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view(mode: ViewMode) -> StatusView {
        StatusView {
            mode,
            connecting: false,
            is_paused: false,
            title: "Song".to_string(),
            url: None,
            thumbnail: None,
            up_next: Vec::new(),
            remaining: 0,
        }
    }

    #[test]
    fn empty_queue_is_spelled_out() {
        assert_eq!(format_up_next(&[], 0), "La cola está vacía");
    }

    #[test]
    fn long_queues_are_summarised() {
        let up_next = vec!["A".to_string(), "B".to_string()];
        assert_eq!(format_up_next(&up_next, 7), "`1.` A\n`2.` B\n… y 5 más");
        assert_eq!(format_up_next(&up_next, 2), "`1.` A\n`2.` B");
    }

    #[test]
    fn heading_follows_stage_and_pause() {
        let mut v = view(ViewMode::Music);
        assert_eq!(status_heading(&v), "🎵 Reproduciendo ahora");

        v.is_paused = true;
        assert_eq!(status_heading(&v), "⏸️ En pausa");

        v.connecting = true;
        assert_eq!(status_heading(&v), "🔌 Conectando al canal de voz");

        assert_eq!(status_heading(&view(ViewMode::Elevator)), "🛗 Música de ascensor");
    }
}
