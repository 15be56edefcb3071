// ── MIDI device enumeration ──
//
// Choosing which MIDI ports the protocol engine talks through. This sits
// beside the port contract; it never produces events.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::PortError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MidiDevice {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailableDevices {
    pub inputs: Vec<MidiDevice>,
    pub outputs: Vec<MidiDevice>,
}

#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn available_devices(&self) -> Result<AvailableDevices, PortError>;

    /// Open `device_id` for input. `false` if no such input exists.
    async fn set_input_device(&self, device_id: &str) -> Result<bool, PortError>;

    /// Open `device_id` for output. `false` if no such output exists.
    async fn set_output_device(&self, device_id: &str) -> Result<bool, PortError>;

    async fn current_input_device(&self) -> Option<String>;

    async fn current_output_device(&self) -> Option<String>;
}

// ── MockDevices ──────────────────────────────────────────────────────

/// In-memory device list for tests and the CLI.
pub struct MockDevices {
    available: AvailableDevices,
    current: Mutex<(Option<String>, Option<String>)>,
}

impl MockDevices {
    pub fn new(available: AvailableDevices) -> Self {
        Self {
            available,
            current: Mutex::new((None, None)),
        }
    }
}

impl Default for MockDevices {
    fn default() -> Self {
        Self::new(AvailableDevices {
            inputs: vec![
                MidiDevice {
                    id: "mock-in-1".into(),
                    name: "Mock MIDI In".into(),
                },
                MidiDevice {
                    id: "mock-in-2".into(),
                    name: "Mock Loopback In".into(),
                },
            ],
            outputs: vec![MidiDevice {
                id: "mock-out-1".into(),
                name: "Mock MIDI Out".into(),
            }],
        })
    }
}

#[async_trait]
impl DeviceEnumerator for MockDevices {
    async fn available_devices(&self) -> Result<AvailableDevices, PortError> {
        Ok(self.available.clone())
    }

    async fn set_input_device(&self, device_id: &str) -> Result<bool, PortError> {
        if !self.available.inputs.iter().any(|d| d.id == device_id) {
            return Ok(false);
        }
        self.current.lock().await.0 = Some(device_id.to_owned());
        debug!(device = device_id, "input device selected");
        Ok(true)
    }

    async fn set_output_device(&self, device_id: &str) -> Result<bool, PortError> {
        if !self.available.outputs.iter().any(|d| d.id == device_id) {
            return Ok(false);
        }
        self.current.lock().await.1 = Some(device_id.to_owned());
        debug!(device = device_id, "output device selected");
        Ok(true)
    }

    async fn current_input_device(&self) -> Option<String> {
        self.current.lock().await.0.clone()
    }

    async fn current_output_device(&self) -> Option<String> {
        self.current.lock().await.1.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn selecting_unknown_device_returns_false() {
        let devices = MockDevices::default();
        assert!(!devices.set_input_device("nope").await.unwrap());
        assert!(devices.current_input_device().await.is_none());
    }

    #[tokio::test]
    async fn selecting_known_devices_updates_current() {
        let devices = MockDevices::default();
        assert!(devices.set_input_device("mock-in-2").await.unwrap());
        assert!(devices.set_output_device("mock-out-1").await.unwrap());
        assert_eq!(
            devices.current_input_device().await.as_deref(),
            Some("mock-in-2")
        );
        assert_eq!(
            devices.current_output_device().await.as_deref(),
            Some("mock-out-1")
        );
    }

    #[tokio::test]
    async fn inputs_and_outputs_are_separate_namespaces() {
        let devices = MockDevices::default();
        assert!(!devices.set_output_device("mock-in-1").await.unwrap());
    }
}
