use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Video-sharing service a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    YouTube,
    TikTok,
    Vk,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::YouTube, ProviderKind::TikTok, ProviderKind::Vk];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::YouTube => "youtube",
            ProviderKind::TikTok => "tiktok",
            ProviderKind::Vk => "vk",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::YouTube => "YouTube",
            ProviderKind::TikTok => "TikTok",
            ProviderKind::Vk => "VK Video",
        }
    }

    /// VK only exposes bandwidth-estimated formats, so its keyboard is keyed by
    /// a per-render index instead of the provider format id.
    pub fn uses_indexed_choices(&self) -> bool {
        matches!(self, ProviderKind::Vk)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(ProviderKind::YouTube),
            "tiktok" => Ok(ProviderKind::TikTok),
            "vk" => Ok(ProviderKind::Vk),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Whether a rendition carries picture or only sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    Audio,
    Video,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Audio => "Audio",
            FormatKind::Video => "Video",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, FormatKind::Audio)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Audio" | "audio" => Ok(FormatKind::Audio),
            "Video" | "video" => Ok(FormatKind::Video),
            _ => Err(format!("Unknown format kind: {}", s)),
        }
    }
}

macro_rules! text_column {
    ($ty:ty) => {
        impl rusqlite::types::FromSql for $ty {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::from_str(s).map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e))))
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
                    self.as_str().as_bytes(),
                )))
            }
        }
    };
}

text_column!(ProviderKind);
text_column!(FormatKind);

/// One rendition as reported by a provider probe, before it is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Provider's own format id ("140", "hls-1080p", ...)
    pub format_id: String,
    pub kind: FormatKind,
    /// "audio", "WxH" or unknown
    pub resolution: Option<String>,
    /// Human-readable approximate size ("12.34 MB"), advisory only
    pub approx_size: Option<String>,
}

impl FormatDescriptor {
    pub fn audio(format_id: impl Into<String>, approx_size: Option<String>) -> Self {
        Self {
            format_id: format_id.into(),
            kind: FormatKind::Audio,
            resolution: Some("audio".to_string()),
            approx_size,
        }
    }

    pub fn video(format_id: impl Into<String>, resolution: Option<String>, approx_size: Option<String>) -> Self {
        Self {
            format_id: format_id.into(),
            kind: FormatKind::Video,
            resolution,
            approx_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_str(kind.as_str()), Ok(kind));
        }
        assert!(ProviderKind::from_str("rutube").is_err());
    }

    #[test]
    fn test_format_kind_accepts_lowercase() {
        assert_eq!(FormatKind::from_str("audio"), Ok(FormatKind::Audio));
        assert_eq!(FormatKind::from_str("Video"), Ok(FormatKind::Video));
        assert!(FormatKind::Audio.is_audio());
        assert!(!FormatKind::Video.is_audio());
    }

    #[test]
    fn test_only_vk_uses_indexed_choices() {
        assert!(ProviderKind::Vk.uses_indexed_choices());
        assert!(!ProviderKind::YouTube.uses_indexed_choices());
        assert!(!ProviderKind::TikTok.uses_indexed_choices());
    }
}
