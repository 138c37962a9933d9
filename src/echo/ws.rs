//! WebSocket test server and client.
//!
//! The server answers every text or binary message in the same
//! [`ReplyMode`] as the line server and accepts any request path.

use super::ReplyMode;
use crate::error::{ScanError, ScanResult};
use futures::{SinkExt, StreamExt};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Listen on every interface at `port` and serve WebSocket clients.
pub async fn serve_websocket(port: u16, mode: ReplyMode) -> ScanResult<()> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    info!(port, ?mode, "websocket server listening");
    serve(listener, mode).await?;
    Ok(())
}

/// Serve WebSocket sessions from an already bound listener.
pub async fn serve(listener: TcpListener, mode: ReplyMode) -> io::Result<()> {
    let mode = Arc::new(mode);
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "websocket client connected");
        let mode = Arc::clone(&mode);
        tokio::spawn(async move {
            if let Err(e) = handle_session(stream, &mode).await {
                warn!(%peer, error = %e, "websocket session ended with error");
            }
            debug!(%peer, "websocket client disconnected");
        });
    }
}

async fn handle_session(stream: TcpStream, mode: &ReplyMode) -> ScanResult<()> {
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(ws_error)?;

    while let Some(message) = ws.next().await {
        let reply = match message.map_err(ws_error)? {
            Message::Text(text) => {
                info!("<- {}", text);
                Message::Text(mode.reply_to(&text))
            }
            Message::Binary(data) => {
                let text = String::from_utf8_lossy(&data);
                info!("<- {}", text);
                Message::Binary(mode.reply_to(&text).into_bytes())
            }
            Message::Close(_) => break,
            // Pings are answered by the protocol layer.
            _ => continue,
        };
        ws.send(reply).await.map_err(ws_error)?;
    }
    Ok(())
}

/// Send each line of `input` as a text message to `ws://host:port<path>`
/// and write every answer to `output` as `-> <reply>`.
///
/// Stops at the end of input or when the server closes. Returns the number
/// of replies received.
pub async fn run_client<R, W>(
    host: &str,
    port: u16,
    path: &str,
    input: R,
    output: &mut W,
) -> ScanResult<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let url = format!("ws://{}:{}{}", host, port, path);
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(ws_error)?;
    info!(%url, "connected to websocket server");

    let mut input = input.lines();
    let mut received = 0u64;

    while let Some(line) = input.next_line().await? {
        ws.send(Message::Text(line)).await.map_err(ws_error)?;

        match next_reply(&mut ws).await? {
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

    if let Err(e) = ws.close(None).await {
        debug!(error = %e, "websocket close failed");
    }
    output.flush().await?;
    Ok(received)
}

/// Next data message from the server, or `None` once it closes.
async fn next_reply<S>(ws: &mut WebSocketStream<S>) -> ScanResult<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = ws.next().await {
        match message.map_err(ws_error)? {
            Message::Text(text) => return Ok(Some(text)),
            Message::Binary(data) => return Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

fn ws_error(e: tungstenite::Error) -> ScanError {
    ScanError::WebSocket(e.to_string())
}
