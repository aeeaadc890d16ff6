// Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

#[derive(Clone, Debug)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List every output device of the host
pub fn list_output_devices(host: &Host) -> Vec<AudioDeviceInfo> {
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let Ok(devices) = host.output_devices() else {
        return Vec::new();
    };

    devices
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDeviceInfo {
            is_default: name == default_name,
            name,
        })
        .collect()
}

/// Pick the named output device, falling back to the default one
pub fn find_output_device(host: &Host, preferred: Option<&str>) -> Option<Device> {
    if let Some(wanted) = preferred {
        if let Ok(mut devices) = host.output_devices() {
            if let Some(device) = devices.find(|d| d.name().is_ok_and(|name| name == wanted)) {
                return Some(device);
            }
        }
        let available: Vec<String> = list_output_devices(host)
            .into_iter()
            .map(|d| {
                if d.is_default {
                    format!("{} (default)", d.name)
                } else {
                    d.name
                }
            })
            .collect();
        tracing::warn!(device = wanted, ?available, "output device not found, using default");
    }
    host.default_output_device()
}
