use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use honkwatch_foundation::AudioError;

/// Wraps the cpal host for input device selection.
pub struct DeviceManager {
    host: Host,
}

#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host.id()
    }

    /// Opens the named input device, or the OS default when no name is
    /// given. A requested name that matches nothing is an error; there is
    /// no silent fallback past an explicit selection.
    pub fn open_input(&self, name: Option<&str>) -> Result<Device, AudioError> {
        if let Some(preferred) = name {
            if let Some(device) = self.find_device_by_name(preferred) {
                return Ok(device);
            }
            // Case-insensitive substring match as a convenience for long
            // ALSA/PipeWire device names.
            if let Some(device) = self.find_device_by_predicate(|n| {
                n.to_lowercase().contains(&preferred.to_lowercase())
            }) {
                tracing::warn!(
                    "Input device '{}' not found exactly; using closest match '{}'",
                    preferred,
                    device.name().unwrap_or_default()
                );
                return Ok(device);
            }
            return Err(AudioError::DeviceNotFound {
                name: Some(preferred.to_string()),
            });
        }

        self.host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })
    }

    /// All input devices the host exposes, default first-marked.
    pub fn list_inputs(&self) -> Vec<InputDeviceInfo> {
        let default_name = self.default_input_device_name();

        let mut infos = Vec::new();
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    infos.push(InputDeviceInfo { name, is_default });
                }
            }
        }
        infos
    }

    pub fn default_input_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    fn find_device_by_name(&self, name: &str) -> Option<Device> {
        self.find_device_by_predicate(|n| n == name)
    }

    fn find_device_by_predicate<F>(&self, pred: F) -> Option<Device>
    where
        F: Fn(&str) -> bool,
    {
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if pred(&name) {
                        return Some(device);
                    }
                }
            }
        }
        None
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_name_is_an_error() {
        let manager = DeviceManager::new();
        let result = manager.open_input(Some("no-such-device-9f3a"));
        match result {
            Err(AudioError::DeviceNotFound { name }) => {
                assert_eq!(name.as_deref(), Some("no-such-device-9f3a"));
            }
            Ok(_) => panic!("nonexistent device should not open"),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(feature = "live-hardware-tests")]
    #[test]
    fn default_device_opens() {
        let manager = DeviceManager::new();
        let device = manager.open_input(None).expect("default input device");
        assert!(device.name().is_ok());
    }

    #[cfg(feature = "live-hardware-tests")]
    #[test]
    fn listed_devices_include_the_default() {
        let manager = DeviceManager::new();
        let inputs = manager.list_inputs();
        assert!(!inputs.is_empty());
        assert!(inputs.iter().any(|d| d.is_default));
    }
}
