//! Line-delimited JSON command intake
//!
//! Each input line is one [`RumbleCommand`]; each output line is the
//! matching [`CommandReply`]. Malformed lines get a rejected reply and the
//! stream keeps going.

use crate::commands::{CommandHandler, CommandReply, RumbleCommand};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Serve commands until the reader is exhausted; returns the lines handled
pub async fn serve_json_lines<R, W>(
    handler: &CommandHandler,
    reader: R,
    mut writer: W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read command")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<RumbleCommand>(line) {
            Ok(command) => handler.handle(command).await,
            Err(e) => {
                warn!("Malformed command ({} bytes): {}", line.len(), e);
                malformed(&e)
            }
        };

        let mut json = serde_json::to_string(&reply).context("Failed to serialize reply")?;
        json.push('\n');
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write reply")?;
        writer.flush().await.context("Failed to flush reply")?;
        handled += 1;
    }

    debug!("Command intake closed after {} lines", handled);
    Ok(handled)
}

fn malformed(error: &serde_json::Error) -> CommandReply {
    CommandReply {
        ok: false,
        message: format!("Could not understand that command: {}", error),
        view: None,
        roster: None,
        error: Some("malformed".to_string()),
    }
}
