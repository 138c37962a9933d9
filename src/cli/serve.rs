//! Serve subcommand implementation.

use crate::config::AppSettings;
use crate::echo::{serve_echo, ws, ReplyMode};
use crate::error::CliResult;
use crate::output;
use clap::Parser;

/// Start a line or WebSocket echo server for testing.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Port to listen on [default: from settings, 5000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Reply sent for every line; ECHO answers "Echo: <line>"
    #[arg(short, long, default_value = "ECHO")]
    pub reply: String,

    /// Serve WebSocket clients instead of raw TCP lines
    #[arg(short = 'w', long = "wsmode")]
    pub websocket: bool,
}

impl ServeCommand {
    /// Execute the serve command. Runs until interrupted.
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        let port = self.port.unwrap_or(settings.echo_port);
        let flavour = if self.websocket { "WebSocket" } else { "TCP" };
        output::print_info(&format!(
            "Serving {} on port {} (reply: {})",
            flavour, port, self.reply
        ));

        let mode = ReplyMode::from_reply(&self.reply);
        if self.websocket {
            ws::serve_websocket(port, mode).await?;
        } else {
            serve_echo(port, mode).await?;
        }
        Ok(())
    }
}
