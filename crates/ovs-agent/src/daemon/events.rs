//! JSON-lines policy event source.

use crate::qos::QosEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Parses one [`QosEvent`] per line of `reader` and sends it on `events`.
///
/// Blank lines and lines starting with `#` are skipped; malformed lines are
/// logged and skipped. Returns the number of events sent, stopping early if
/// the receiver is gone.
pub async fn read_events<R>(reader: R, events: mpsc::Sender<QosEvent>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<QosEvent>(line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    debug!("event receiver closed");
                    break;
                }
                sent += 1;
            }
            Err(err) => warn!(line = line_no, error = %err, "skipping malformed event"),
        }
    }
    Ok(sent)
}
