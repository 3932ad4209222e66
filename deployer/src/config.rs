//! Version pins and task sizing.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

/// Version of Go used to build the proxy image
pub const GO_VERSION: &str = "1.24.3";

/// Version of Caddy used to build the proxy image
pub const CADDY_VERSION: &str = "2.10.0";

/// Toolchain versions passed to the image build.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Versions {
    pub go: String,
    pub caddy: String,
}

/// Fargate sizing for the proxy task.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskSizing {
    /// CPU units (1024 = 1 vCPU)
    pub cpu: u32,
    /// Memory in MiB
    pub memory: u32,
    /// Number of tasks the service keeps running
    pub count: u32,
}

/// Immutable configuration passed into [crate::proxy::build].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub versions: Versions,
    pub task: TaskSizing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            versions: Versions {
                go: GO_VERSION.to_string(),
                caddy: CADDY_VERSION.to_string(),
            },
            task: TaskSizing {
                memory: 512,
                cpu: 256,
                count: 2,
            },
        }
    }
}

impl Config {
    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the sizing is a combination Fargate accepts.
    pub fn validate(&self) -> Result<(), Error> {
        let TaskSizing { cpu, memory, count } = self.task;
        if count == 0 {
            return Err(Error::InvalidTaskCount);
        }
        let valid = match cpu {
            256 => matches!(memory, 512 | 1024 | 2048),
            512 => (1024..=4096).contains(&memory) && memory % 1024 == 0,
            1024 => (2048..=8192).contains(&memory) && memory % 1024 == 0,
            2048 => (4096..=16384).contains(&memory) && memory % 1024 == 0,
            4096 => (8192..=30720).contains(&memory) && memory % 1024 == 0,
            _ => false,
        };
        if !valid {
            return Err(Error::InvalidSizing { cpu, memory });
        }
        Ok(())
    }
}
