//! Test servers and clients.
//!
//! Handy for checking what a port scan reports: start `serve` on a port,
//! scan it, then talk to it with `client`. The plain flavour speaks lines
//! over TCP; [`ws`] speaks WebSocket text messages.

pub mod ws;

use crate::error::ScanResult;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// A client line that closes its connection.
pub const CLOSE_LINE: &str = "EOF";

/// How the server answers each line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMode {
    /// Answer `Echo: <line>`.
    Echo,
    /// Answer the same text every time.
    Fixed(String),
}

impl ReplyMode {
    /// `ECHO` selects echo mode; anything else is a fixed reply.
    pub fn from_reply(reply: &str) -> Self {
        if reply == "ECHO" {
            Self::Echo
        } else {
            Self::Fixed(reply.to_string())
        }
    }

    fn reply_to(&self, line: &str) -> String {
        match self {
            Self::Echo => format!("Echo: {}", line),
            Self::Fixed(reply) => reply.clone(),
        }
    }
}

/// Listen on every interface at `port` and serve until an accept fails.
pub async fn serve_echo(port: u16, mode: ReplyMode) -> ScanResult<()> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    info!(port, ?mode, "echo server listening");
    serve(listener, mode).await?;
    Ok(())
}

/// Serve connections from an already bound listener, one task each.
pub async fn serve(listener: TcpListener, mode: ReplyMode) -> io::Result<()> {
    let mode = Arc::new(mode);
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "client connected");
        let mode = Arc::clone(&mode);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &mode).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
            debug!(%peer, "client disconnected");
        });
    }
}

async fn handle_connection(stream: TcpStream, mode: &ReplyMode) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if line == CLOSE_LINE {
            break;
        }
        info!("<- {}", line);
        let mut reply = mode.reply_to(line);
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
    }
    writer.shutdown().await
}

/// Send each line of `input` to `host:port` and write every answer to
/// `output` as `-> <reply>`.
///
/// Stops at the end of input, after sending `EOF`, or when the server
/// closes. Returns the number of replies received.
pub async fn run_client<R, W>(host: &str, port: u16, input: R, output: &mut W) -> ScanResult<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let stream = TcpStream::connect((host, port)).await?;
    info!(host, port, "connected to server");

    let (reader, mut writer) = stream.into_split();
    let mut replies = BufReader::new(reader).lines();
    let mut input = input.lines();
    let mut received = 0u64;

    while let Some(line) = input.next_line().await? {
        writer.write_all(format!("{}\n", line).as_bytes()).await?;
        if line.trim_end_matches('\r') == CLOSE_LINE {
            break;
        }

        match replies.next_line().await? {
            Some(reply) => {
                output.write_all(format!("-> {}\n", reply).as_bytes()).await?;
                received += 1;
            }
            None => {
                debug!("server closed the connection");
                break;
            }
        }
    }

    output.flush().await?;
    Ok(received)
}
