//! Discovery and connection command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ciview_core::{ConnectionSnapshot, Controller};

use crate::cli::{ConnectionsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ConnectionRow {
    #[tabled(rename = "MUID")]
    muid: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Profiles")]
    profiles: usize,
    #[tabled(rename = "Properties")]
    properties: usize,
}

fn row(c: &Arc<ConnectionSnapshot>) -> ConnectionRow {
    let info = &c.connection.device_info;
    ConnectionRow {
        muid: c.target().to_string(),
        product: c.connection.product_instance_id.clone(),
        manufacturer: info.manufacturer.label(),
        model: info.model.label(),
        version: info.version.label(),
        profiles: c.profiles.len(),
        properties: c.properties.len(),
    }
}

fn detail(c: &Arc<ConnectionSnapshot>) -> String {
    let conn = &c.connection;
    let info = &conn.device_info;
    let mut lines = vec![
        format!("MUID:         {}", conn.target_muid),
        format!("Product:      {}", conn.product_instance_id),
        format!("Manufacturer: {}", info.manufacturer.label()),
        format!("Family:       {}", info.family.label()),
        format!("Model:        {}", info.model.label()),
        format!("Version:      {}", info.version.label()),
        format!(
            "Serial:       {}",
            info.serial_number.as_deref().unwrap_or("-")
        ),
        format!("Max requests: {}", conn.max_simultaneous_property_requests),
        format!("Profiles:     {}", c.profiles.len()),
    ];
    for p in &c.profiles {
        lines.push(format!(
            "  [{}] group {} / {} ({})",
            p.profile_id,
            p.group,
            p.address,
            if p.enabled { "enabled" } else { "disabled" }
        ));
    }
    lines.push(format!("Properties:   {}", c.properties.len()));
    for p in &c.properties {
        let state = c
            .subscription(&p.id)
            .map_or_else(|| "unsubscribed".to_owned(), |s| s.state.to_string());
        lines.push(format!("  {} [{}] {state}", p.id, p.media_type));
    }
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn discover(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = util::discover(controller).await?;
    let out = output::render_list(&global.output, &snap, row, |c| c.target().to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    controller: &Controller,
    args: ConnectionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let snap = util::discover(controller).await?;

    let out = match args.target {
        Some(target) => {
            let conn = util::resolve_connection(controller, &target)?;
            controller.select_connection(conn.target()).await?;
            output::render_single(&global.output, &conn, detail, |c| c.target().to_string())
        }
        None => output::render_list(&global.output, &snap, row, |c| c.target().to_string()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
