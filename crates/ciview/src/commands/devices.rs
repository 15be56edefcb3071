//! MIDI endpoint command handlers.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use ciview_config::Config;
use ciview_core::{DeviceEnumerator, MockDevices};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct EndpointView {
    direction: &'static str,
    id: String,
    name: String,
    selected: bool,
}

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Selected")]
    selected: String,
}

fn row(v: &EndpointView) -> EndpointRow {
    EndpointRow {
        direction: v.direction.into(),
        id: v.id.clone(),
        name: v.name.clone(),
        selected: if v.selected { "*".into() } else { String::new() },
    }
}

pub async fn handle(
    args: DevicesArgs,
    config: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let devices = MockDevices::default();
    apply_preferences(&devices, config).await?;

    if let DevicesCommand::Select {
        input,
        output_device,
    } = args.command
    {
        if let Some(id) = input {
            select(&devices, &id, Direction::Input).await?;
        }
        if let Some(id) = output_device {
            select(&devices, &id, Direction::Output).await?;
        }
    }

    let views = endpoints(&devices).await?;
    let out = output::render_list(&global.output, &views, row, |v| v.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

async fn select(
    devices: &impl DeviceEnumerator,
    id: &str,
    direction: Direction,
) -> Result<(), CliError> {
    let found = match direction {
        Direction::Input => devices.set_input_device(id).await,
        Direction::Output => devices.set_output_device(id).await,
    }
    .map_err(ciview_core::CoreError::from)?;

    if found {
        Ok(())
    } else {
        Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: id.into(),
            list_command: "devices list".into(),
        })
    }
}

/// Open the endpoints named in `[devices]`; a stale preference only warns.
async fn apply_preferences(
    devices: &impl DeviceEnumerator,
    config: &Config,
) -> Result<(), CliError> {
    let wanted = [
        (config.devices.input.as_deref(), Direction::Input),
        (config.devices.output.as_deref(), Direction::Output),
    ];
    for (id, direction) in wanted {
        let Some(id) = id else { continue };
        match select(devices, id, direction).await {
            Ok(()) => {}
            Err(CliError::NotFound { .. }) => {
                warn!(device = id, "configured MIDI device not available");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

async fn endpoints(devices: &impl DeviceEnumerator) -> Result<Vec<EndpointView>, CliError> {
    let available = devices
        .available_devices()
        .await
        .map_err(ciview_core::CoreError::from)?;
    let current_in = devices.current_input_device().await;
    let current_out = devices.current_output_device().await;

    let inputs = available.inputs.into_iter().map(|d| EndpointView {
        direction: "input",
        selected: current_in.as_deref() == Some(d.id.as_str()),
        id: d.id,
        name: d.name,
    });
    let outputs = available.outputs.into_iter().map(|d| EndpointView {
        direction: "output",
        selected: current_out.as_deref() == Some(d.id.as_str()),
        id: d.id,
        name: d.name,
    });
    Ok(inputs.chain(outputs).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ciview_config::DeviceSettings;

    use super::*;

    #[tokio::test]
    async fn preferences_mark_selected_endpoints() {
        let devices = MockDevices::default();
        let config = Config {
            devices: DeviceSettings {
                input: Some("mock-in-2".into()),
                output: Some("gone".into()),
            },
            ..Config::default()
        };
        apply_preferences(&devices, &config).await.unwrap();

        let views = endpoints(&devices).await.unwrap();
        let selected: Vec<&str> = views
            .iter()
            .filter(|v| v.selected)
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(selected, vec!["mock-in-2"]);
    }

    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let devices = MockDevices::default();
        let err = select(&devices, "nope", Direction::Output).await.unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
    }
}
