use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vidrelay")]
#[command(author, version, about = "Telegram bot that delivers YouTube, TikTok and VK videos without downloading them twice", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot with long polling (default)
    Run,

    /// Probe a link with its provider and print the result as JSON
    Probe {
        /// Video link
        url: String,
    },

    /// Register a link and print its formats in keyboard order as JSON
    Formats {
        /// Video link
        url: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
