//! Session configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tickbridge_shmem::{SegmentLocation, validate_name};

use crate::error::{Result, SessionError};
use crate::labels::LabelOrder;

/// Default number of attempts a reader makes before reporting a torn read.
pub const DEFAULT_READ_ATTEMPTS: u32 = 64;

/// Name and backing of the shared segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Segment name
    pub name: String,
    /// Backing store
    #[serde(default)]
    pub location: SegmentLocation,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            name: format!("tickbridge_{}", std::process::id()),
            location: SegmentLocation::Posix,
        }
    }
}

/// Screen geometry and which optional buffers are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Screen width in pixels
    pub screen_width: u32,
    /// Screen height in pixels
    pub screen_height: u32,
    /// Bytes per screen row
    pub screen_pitch: u32,
    /// Screen buffer size in bytes
    pub screen_size: u64,
    /// Pixel format code
    pub screen_format: u32,
    /// Publish a depth buffer
    pub depth: bool,
    /// Publish a label buffer
    pub labels: bool,
    /// Publish an automap buffer
    pub automap: bool,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::rgb24(320, 240)
    }
}

impl BufferSettings {
    /// Packed 24-bit RGB geometry for a screen of `width` x `height`.
    pub fn rgb24(width: u32, height: u32) -> Self {
        let pitch = width * 3;
        Self {
            screen_width: width,
            screen_height: height,
            screen_pitch: pitch,
            screen_size: u64::from(pitch) * u64::from(height),
            screen_format: 0,
            depth: false,
            labels: false,
            automap: false,
        }
    }

    /// Enable or disable the depth buffer
    #[must_use]
    pub const fn with_depth(mut self, enable: bool) -> Self {
        self.depth = enable;
        self
    }

    /// Enable or disable the label buffer
    #[must_use]
    pub const fn with_labels(mut self, enable: bool) -> Self {
        self.labels = enable;
        self
    }

    /// Enable or disable the automap buffer
    #[must_use]
    pub const fn with_automap(mut self, enable: bool) -> Self {
        self.automap = enable;
        self
    }

    /// Bytes in one single-channel plane (depth, labels, automap).
    pub fn plane_size(&self) -> u64 {
        u64::from(self.screen_width) * u64::from(self.screen_height)
    }
}

/// Configuration for a writing session and its readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Shared segment
    #[serde(default)]
    pub segment: SegmentConfig,
    /// Screen geometry and buffer flags
    #[serde(default)]
    pub buffers: BufferSettings,
    /// Label copy order
    #[serde(default)]
    pub label_order: LabelOrder,
    /// Inventory class published as armor
    #[serde(default = "default_armor_class")]
    pub armor_class: String,
    /// Reader attempts before a torn read is reported
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
}

fn default_armor_class() -> String {
    "BasicArmor".to_string()
}

const fn default_read_attempts() -> u32 {
    DEFAULT_READ_ATTEMPTS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            buffers: BufferSettings::default(),
            label_order: LabelOrder::default(),
            armor_class: default_armor_class(),
            read_attempts: DEFAULT_READ_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Configuration for a POSIX segment called `name`
    pub fn new(name: &str) -> Self {
        Self {
            segment: SegmentConfig {
                name: name.to_string(),
                location: SegmentLocation::Posix,
            },
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the segment backing
    #[must_use]
    pub fn with_location(mut self, location: SegmentLocation) -> Self {
        self.segment.location = location;
        self
    }

    /// Set the buffer settings
    #[must_use]
    pub fn with_buffers(mut self, buffers: BufferSettings) -> Self {
        self.buffers = buffers;
        self
    }

    /// Set the label copy order
    #[must_use]
    pub const fn with_label_order(mut self, order: LabelOrder) -> Self {
        self.label_order = order;
        self
    }

    /// Set the class published as armor
    #[must_use]
    pub fn with_armor_class(mut self, class: &str) -> Self {
        self.armor_class = class.to_string();
        self
    }

    /// Set the reader attempt limit
    #[must_use]
    pub const fn with_read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = attempts;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if:
    /// - the segment name is not usable
    /// - the screen pitch is narrower than one byte per pixel
    /// - the screen size does not cover `pitch * height`
    /// - `read_attempts` is 0
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.segment.name).map_err(|e| SessionError::Config(e.to_string()))?;

        let b = &self.buffers;
        if b.screen_pitch < b.screen_width {
            return Err(SessionError::Config(format!(
                "screen pitch {} is smaller than width {}",
                b.screen_pitch, b.screen_width
            )));
        }
        let needed = u64::from(b.screen_pitch) * u64::from(b.screen_height);
        if b.screen_size < needed {
            return Err(SessionError::Config(format!(
                "screen size {} does not cover pitch * height ({needed})",
                b.screen_size
            )));
        }
        if self.read_attempts == 0 {
            return Err(SessionError::Config(
                "read_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
