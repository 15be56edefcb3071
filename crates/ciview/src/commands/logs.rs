//! Transport log command handler.

use std::sync::Arc;

use tabled::Tabled;

use ciview_core::{Controller, LogEntry};

use crate::cli::{GlobalOpts, LogsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Dir")]
    direction: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn row(e: &Arc<LogEntry>, color: bool) -> LogRow {
    LogRow {
        time: e.timestamp.format("%H:%M:%S%.3f").to_string(),
        direction: output::direction_label(e.direction, color),
        message: e.message.clone(),
    }
}

pub async fn handle(
    controller: &Controller,
    args: LogsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::discover(controller).await?;

    if args.clear {
        controller.clear_logs().await?;
        output::print_output("Log cleared", global.quiet);
        return Ok(());
    }

    let snap = controller.logs_snapshot();
    let skip = args.tail.map_or(0, |n| snap.len().saturating_sub(n));
    let entries = &snap[skip..];

    let color = output::should_color(&global.color);
    let out = output::render_list(&global.output, entries, |e| row(e, color), |e| {
        format!("{} {}", e.direction, e.message)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
