use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_transport::RemoteEntry;

/// Write half of a client's control connection, shared by the command loop
/// and the transfer tasks it spawns.
pub type ControlWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Sends a response to the client.
pub async fn send_response(writer: &ControlWriter, message: &[u8]) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Sends a single-line `CODE message` reply.
pub async fn reply(writer: &ControlWriter, code: u16, message: &str) -> Result<(), std::io::Error> {
    send_response(writer, format!("{} {}\r\n", code, message).as_bytes()).await
}

/// Sends a multi-line reply: `CODE-first`, indented body lines, `CODE last`.
pub async fn reply_multiline(
    writer: &ControlWriter,
    code: u16,
    first: &str,
    lines: &[&str],
    last: &str,
) -> Result<(), std::io::Error> {
    let mut message = format!("{}-{}\r\n", code, first);
    for line in lines {
        message.push_str(&format!(" {}\r\n", line));
    }
    message.push_str(&format!("{} {}\r\n", code, last));
    send_response(writer, message.as_bytes()).await
}

/// Collapses `.`, `..` and repeated slashes. The result always starts with
/// a single `/` and never climbs above the root.
pub fn normalize_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }
    format!("/{}", stack.join("/"))
}

/// Resolves a command argument against the session's working directory.
pub fn resolve_path(current_dir: &str, arg: &str) -> String {
    let arg = arg.trim();
    if arg.starts_with('/') {
        normalize_path(arg)
    } else {
        normalize_path(&format!("{}/{}", current_dir, arg))
    }
}

/// Formats one directory entry as an `ls -l` line, without the line ending.
pub fn format_list_line(entry: &RemoteEntry, now: DateTime<Utc>) -> String {
    let permissions = if entry.is_directory {
        "drwxr-xr-x"
    } else {
        "-rw-r--r--"
    };
    let modified = entry
        .modified
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(now);
    // Recent entries show the time of day, older ones the year.
    let date = if modified.year() == now.year() {
        modified.format("%b %d %H:%M")
    } else {
        modified.format("%b %d  %Y")
    };
    format!(
        "{} 1 owner group {:>12} {} {}",
        permissions, entry.size, date, entry.name
    )
}

/// MDTM timestamp: `YYYYMMDDHHMMSS` in UTC.
pub fn format_mdtm(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.format("%Y%m%d%H%M%S").to_string())
}
