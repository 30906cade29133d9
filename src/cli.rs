use clap::{Parser, Subcommand};

/// Streamwatch: live alerts for Twitch creators
#[derive(Parser)]
#[command(name = "streamwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Run one poll tick for a creator (for crontab-style scheduling)
    Poll {
        /// Creator login to poll
        creator: String,
    },

    /// Print the stored monitor record for a creator
    Status {
        /// Creator login to inspect
        creator: String,
    },
}
