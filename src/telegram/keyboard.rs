//! Format keyboard rendering and callback data.
//!
//! Buttons carry `dl:<video_id>:<info_id>`. For providers whose format ids are
//! long or unstable (VK) they carry `ix:<video_id>:<n>` instead, resolved through
//! the user's [`ChoiceTable`].

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::types::ProviderKind;
use crate::storage::registry::Info;
use crate::telegram::session::ChoiceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCallback {
    /// Direct registry reference
    Info { video_id: i64, info_id: i64 },
    /// 1-based index into the rendered keyboard
    Index { video_id: i64, index: usize },
}

impl FormatCallback {
    pub fn video_id(&self) -> i64 {
        match self {
            FormatCallback::Info { video_id, .. } | FormatCallback::Index { video_id, .. } => *video_id,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            FormatCallback::Info { video_id, info_id } => format!("dl:{}:{}", video_id, info_id),
            FormatCallback::Index { video_id, index } => format!("ix:{}:{}", video_id, index),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let (prefix, rest) = data.split_once(':')?;
        let (video, value) = rest.split_once(':')?;
        let video_id = video.parse().ok()?;
        match prefix {
            "dl" => Some(FormatCallback::Info {
                video_id,
                info_id: value.parse().ok()?,
            }),
            "ix" => Some(FormatCallback::Index {
                video_id,
                index: value.parse().ok()?,
            }),
            _ => None,
        }
    }
}

/// Button text, with ✅ for formats already delivered once.
pub fn button_label(info: &Info) -> String {
    let mut label = String::new();
    if info.materialized {
        label.push_str("✅ ");
    }
    if info.kind.is_audio() {
        label.push_str("Скачать 🎶 аудио");
    } else {
        label.push_str(&format!("Скачать 🎥 {}", info.resolution.as_deref().unwrap_or("видео")));
    }
    if let Some(size) = &info.approx_size {
        label.push_str(&format!(" 💾 {}", size));
    }
    label
}

/// One button per format, one per row, in the order given.
pub fn format_keyboard(provider: ProviderKind, video_id: i64, infos: &[Info]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = infos
        .iter()
        .enumerate()
        .map(|(i, info)| {
            let callback = if provider.uses_indexed_choices() {
                FormatCallback::Index { video_id, index: i + 1 }
            } else {
                FormatCallback::Info {
                    video_id,
                    info_id: info.id,
                }
            };
            vec![InlineKeyboardButton::callback(button_label(info), callback.encode())]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Keyboard plus the choice table that resolves its buttons.
pub fn render(provider: ProviderKind, video_id: i64, infos: &[Info]) -> (InlineKeyboardMarkup, ChoiceTable) {
    (format_keyboard(provider, video_id, infos), ChoiceTable::new(video_id, infos))
}
