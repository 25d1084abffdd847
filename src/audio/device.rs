use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat};
use log::{debug, warn};

use crate::error::WriteError;

/// Summary of one output device for listing.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub default_sample_rate: Option<u32>,
    pub default_sample_format: Option<String>,
    pub max_channels: u16,
    pub supported_sample_rates: Vec<u32>,
}

/// Enumerates and selects cpal output devices.
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, WriteError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| WriteError::StreamError(format!("Failed to enumerate devices: {}", e)))?;

        let mut infos: Vec<DeviceInfo> = devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let is_default = default_name.as_deref() == Some(name.as_str());
                Some(describe_device(&device, name, is_default))
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    pub fn find_device(&self, name: &str) -> Result<Option<Device>, WriteError> {
        let mut devices = self
            .host
            .output_devices()
            .map_err(|e| WriteError::StreamError(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.find(|d| d.name().map(|n| n == name).unwrap_or(false)))
    }

    pub fn default_device(&self) -> Result<Device, WriteError> {
        self.host
            .default_output_device()
            .ok_or_else(|| WriteError::DeviceNotFound {
                device: "default".to_string(),
            })
    }

    /// The named device, or the default device when it is missing.
    pub fn select_device_with_fallback(&self, name: Option<&str>) -> Result<Device, WriteError> {
        let Some(name) = name else {
            return self.default_device();
        };
        match self.find_device(name)? {
            Some(device) => {
                debug!(target: "output", "using output device '{}'", name);
                Ok(device)
            }
            None => {
                warn!(target: "output", "output device '{}' not found, using default", name);
                self.default_device().map_err(|_| WriteError::DeviceNotFound {
                    device: name.to_string(),
                })
            }
        }
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_device(device: &Device, name: String, is_default: bool) -> DeviceInfo {
    let default_config = device.default_output_config().ok();
    let mut rates = Vec::new();
    let mut max_channels = default_config.as_ref().map(|c| c.channels()).unwrap_or(0);

    if let Ok(configs) = device.supported_output_configs() {
        for range in configs {
            let (min, max) = (range.min_sample_rate().0, range.max_sample_rate().0);
            for &rate in &[22_050, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000] {
                if rate >= min && rate <= max && !rates.contains(&rate) {
                    rates.push(rate);
                }
            }
            max_channels = max_channels.max(range.channels());
        }
    }
    rates.sort_unstable();

    DeviceInfo {
        name,
        is_default,
        default_sample_rate: default_config.as_ref().map(|c| c.sample_rate().0),
        default_sample_format: default_config
            .as_ref()
            .map(|c| describe_sample_format(c.sample_format())),
        max_channels,
        supported_sample_rates: rates,
    }
}

pub fn describe_sample_format(format: SampleFormat) -> String {
    match bit_depth(format) {
        Some(bits) => format!("{} ({}-bit)", format, bits),
        None => format.to_string(),
    }
}

pub fn bit_depth(format: SampleFormat) -> Option<u16> {
    match format {
        SampleFormat::I8 | SampleFormat::U8 => Some(8),
        SampleFormat::I16 | SampleFormat::U16 => Some(16),
        SampleFormat::I32 | SampleFormat::U32 | SampleFormat::F32 => Some(32),
        SampleFormat::I64 | SampleFormat::U64 | SampleFormat::F64 => Some(64),
        _ => None,
    }
}
