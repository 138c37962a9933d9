//! Client subcommand implementation.

use crate::config::AppSettings;
use crate::echo::{run_client, ws};
use crate::error::CliResult;
use crate::output;
use clap::Parser;
use tokio::io::{self, BufReader};

/// Talk to a line or WebSocket server from the terminal.
#[derive(Parser, Debug)]
pub struct ClientCommand {
    /// Server host name or address
    #[arg(short, long, default_value = "localhost")]
    pub server: String,

    /// Server port [default: from settings, 5000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Connect over WebSocket instead of raw TCP lines
    #[arg(short = 'w', long = "wsmode")]
    pub websocket: bool,

    /// Request path of the WebSocket endpoint
    #[arg(short = 'f', long, default_value = "/")]
    pub wspath: String,
}

impl ClientCommand {
    /// Execute the client command. Reads lines from stdin until EOF.
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        let port = self.port.unwrap_or(settings.echo_port);
        output::print_info("Type the lines to send; send EOF or press Ctrl-D to stop.");

        let mut stdout = io::stdout();
        let input = BufReader::new(io::stdin());
        let replies = if self.websocket {
            ws::run_client(&self.server, port, &self.wspath, input, &mut stdout).await?
        } else {
            run_client(&self.server, port, input, &mut stdout).await?
        };

        output::print_success(&format!("{} replies received", replies));
        Ok(())
    }
}
