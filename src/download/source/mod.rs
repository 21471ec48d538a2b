//! Provider backends.
//!
//! All three supported services are extracted with yt-dlp; `formats` holds the
//! per-service URL routing and rendition selection.

pub mod formats;
pub mod ytdlp;

pub use formats::{is_playlist_url, parse_link, provider_for_url};
pub use ytdlp::YtDlpProvider;
