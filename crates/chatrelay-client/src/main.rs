//! Interactive terminal client for the chat relay.
//!
//! Reads lines from stdin and sends each as a chat message; prints every
//! message relayed from other clients as `[HH:MM:SS] sender: text`.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::core::{ChatMessage, ErrorFrame};

#[derive(Debug, Parser)]
#[command(name = "chatrelay-client", about = "Join a chatrelay room from the terminal")]
struct Args {
    /// Relay WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:8080/v1/chat")]
    url: String,

    /// Display name. Prompted for when omitted.
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let name = match args.name {
        Some(n) => n,
        None => prompt_name(&mut stdin).await?,
    };

    let (ws, _) = tokio_tungstenite::connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;
    tracing::info!(url = %args.url, %name, "connected");
    let (mut ws_tx, mut ws_rx) = ws.split();

    let mut printer = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(s)) => println!("{}", render(&s)),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "receive failed");
                    break;
                }
            }
        }
        println!("server closed the stream");
    });

    println!("Connected as {name}. Type messages and press Enter to send. Type 'exit' to quit.");
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else { break };
                let text = line.trim_end();
                if text == "exit" {
                    break;
                }
                if text.is_empty() {
                    continue;
                }
                let json = ChatMessage::new(name.as_str(), text).to_json()?;
                ws_tx.send(Message::Text(json)).await.context("send failed")?;
            }
            _ = &mut printer => break,
        }
    }

    let _ = ws_tx.send(Message::Close(None)).await;
    printer.abort();
    Ok(())
}

async fn prompt_name<R>(stdin: &mut tokio::io::Lines<R>) -> Result<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut out = tokio::io::stdout();
    out.write_all(b"Enter your username: ").await?;
    out.flush().await?;
    let input = stdin
        .next_line()
        .await?
        .context("stdin closed before a username was entered")?;
    Ok(format!("User-{}", input.trim()))
}

fn render(raw: &str) -> String {
    if let Ok(msg) = ChatMessage::from_json(raw) {
        let at = Local
            .timestamp_opt(msg.timestamp, 0)
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".into());
        return format!("[{at}] {}: {}", msg.sender, msg.text);
    }
    match serde_json::from_str::<ErrorFrame>(raw) {
        Ok(frame) => format!("! {}: {}", frame.error.code, frame.error.msg),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_chat_line() {
        let line = render(r#"{"sender":"User-bob","text":"hi","timestamp":0}"#);
        assert!(line.ends_with("] User-bob: hi"), "{line}");
        assert!(line.starts_with('['));
    }

    #[test]
    fn renders_error_frame() {
        let line = render(r#"{"error":{"code":"BAD_REQUEST","msg":"bad request: x"}}"#);
        assert_eq!(line, "! BAD_REQUEST: bad request: x");
    }

    #[test]
    fn passes_unknown_text_through() {
        assert_eq!(render("plain"), "plain");
    }
}
