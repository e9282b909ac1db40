//! Daemon configuration file.
//!
//! Loaded from YAML. Every section is optional:
//!
//! ```yaml
//! class:
//!   clear_count_when_reading: false
//!   max_devices: 16
//! platform:
//!   compatible: gpio-pulse-counter
//!   children:
//!     - name: water-meter
//!       gpios: [4]
//! simulation:
//!   gpio_lines: 32
//!   irq_base: 64
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use counters_class::ClassConfig;

use crate::description::DeviceTree;
use crate::error::ConfigError;

/// Default number of simulated GPIO lines.
pub const DEFAULT_GPIO_LINES: u32 = 32;

/// Default interrupt number of simulated GPIO 0.
pub const DEFAULT_IRQ_BASE: u32 = 64;

/// Simulated controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Interrupt of GPIO 0; `None` disables GPIO-to-interrupt mapping.
    pub irq_base: Option<u32>,
    pub gpio_lines: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            irq_base: Some(DEFAULT_IRQ_BASE),
            gpio_lines: DEFAULT_GPIO_LINES,
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub class: ClassConfig,
    /// Hardware description; `None` means the platform has none.
    pub platform: Option<DeviceTree>,
    pub simulation: SimulationConfig,
}

impl DaemonConfig {
    /// Reads and parses a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class.max_devices == Some(0) {
            return Err(ConfigError::Invalid(
                "class.max_devices must be > 0".to_string(),
            ));
        }

        if self.simulation.gpio_lines == 0 {
            return Err(ConfigError::Invalid(
                "simulation.gpio_lines must be > 0".to_string(),
            ));
        }

        if self.simulation.irq_base == Some(0) {
            return Err(ConfigError::Invalid(
                "simulation.irq_base must be > 0".to_string(),
            ));
        }

        if let Some(tree) = &self.platform {
            let mut seen = HashSet::new();
            for node in &tree.children {
                if node.name.is_empty() {
                    return Err(ConfigError::Invalid(
                        "platform node with empty name".to_string(),
                    ));
                }
                if !seen.insert(node.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate platform node '{}'",
                        node.name
                    )));
                }
            }
        }

        Ok(())
    }
}
