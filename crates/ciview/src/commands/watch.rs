//! Live notification stream.
//!
//! Prints one line per notification as it arrives, until `--duration-ms`
//! elapses. Structured formats emit one compact JSON object per line.

use std::time::Duration;

use owo_colors::OwoColorize;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, warn};

use ciview_core::{Controller, Notification};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct WatchLine {
    kind: &'static str,
    detail: String,
}

impl From<&Notification> for WatchLine {
    fn from(n: &Notification) -> Self {
        let detail = match n {
            Notification::ConnectionsChanged(snap) => format!("{} connection(s)", snap.len()),
            Notification::ProfilesChanged(snap) => {
                let enabled = snap.iter().filter(|p| p.item.enabled).count();
                format!("{} profile(s), {enabled} enabled", snap.len())
            }
            Notification::PropertiesChanged(snap) => format!("{} property value(s)", snap.len()),
            Notification::LocalPropertiesChanged(snap) => {
                format!("{} local property(ies)", snap.len())
            }
            Notification::LogAppended(entry) => format!("{} {}", entry.direction, entry.message),
            Notification::LogsCleared => String::new(),
            Notification::Diagnostic(d) => format!("{}: {}", d.kind, d.message),
        };
        Self {
            kind: n.kind(),
            detail,
        }
    }
}

fn render(line: &WatchLine, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(line, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(line).trim_end()),
        OutputFormat::Table | OutputFormat::Plain => {
            let kind = format!("{:<16}", line.kind);
            if color {
                format!("{} {}", kind.bold(), line.detail)
            } else {
                format!("{kind} {}", line.detail)
            }
        }
    }
}

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut rx = controller.notifications();
    let color = output::should_color(&global.color);
    let deadline = Instant::now() + Duration::from_millis(args.duration_ms);

    controller.send_discovery().await?;
    if let Some(property_id) = &args.subscribe {
        controller.subscribe_property(property_id, None).await?;
    }

    loop {
        let next = tokio::time::timeout_at(deadline, rx.recv()).await;
        match next {
            Err(_) => {
                debug!("watch duration elapsed");
                break;
            }
            Ok(Ok(notification)) => {
                let line = WatchLine::from(&notification);
                output::print_output(&render(&line, &global.output, color), global.quiet);
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "watch fell behind; notifications dropped");
            }
            Ok(Err(RecvError::Closed)) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_aligned() {
        let line = WatchLine {
            kind: "log",
            detail: "Out Discovery inquiry sent".into(),
        };
        let out = render(&line, &OutputFormat::Plain, false);
        assert!(out.starts_with("log "));
        assert!(out.ends_with("Out Discovery inquiry sent"));
    }

    #[test]
    fn json_lines_are_compact() {
        let line = WatchLine {
            kind: "logs_cleared",
            detail: String::new(),
        };
        let out = render(&line, &OutputFormat::Json, false);
        assert_eq!(out, r#"{"kind":"logs_cleared","detail":""}"#);
    }
}
