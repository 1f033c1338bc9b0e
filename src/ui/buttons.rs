use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::connector::{StatusView, ViewMode};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "session_play_pause";
    pub const SKIP: &str = "session_skip";
    pub const STOP: &str = "session_stop";
}

/// Acción asociada a un botón del mensaje de estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    PlayPause,
    Skip,
    Stop,
}

impl ButtonAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::PLAY_PAUSE => Some(Self::PlayPause),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::STOP => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Controles del mensaje de estado. En modo ascensor solo se puede detener.
pub fn status_buttons(view: &StatusView) -> Vec<CreateActionRow> {
    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger)
        .disabled(view.connecting);

    let buttons = match view.mode {
        ViewMode::Music => {
            let play_pause_emoji = if view.is_paused { '▶' } else { '⏸' };
            vec![
                CreateButton::new(button_ids::PLAY_PAUSE)
                    .emoji(play_pause_emoji)
                    .style(ButtonStyle::Primary)
                    .disabled(view.connecting),
                CreateButton::new(button_ids::SKIP)
                    .emoji('⏭')
                    .style(ButtonStyle::Secondary)
                    .disabled(view.connecting),
                stop_btn,
            ]
        }
        ViewMode::Elevator => vec![stop_btn],
    };

    vec![CreateActionRow::Buttons(buttons)]
}
