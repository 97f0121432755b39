//! Configuration and frame source of the `frame_probe` binary.

use std::path::{Path, PathBuf};

use frame::config::{ChannelConfig, ConfigError, SharedConfig};
use frame::consts::MAX_DATA;
use serde::{Deserialize, Serialize};

/// Complete probe configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "cam0-probe"
///
/// [channel]
/// base_name = "cam0"
/// remove_on_close = true
///
/// [producer]
/// fps = 60
/// frame_bytes = 614400
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Service identity and log level.
    pub shared: SharedConfig,
    /// Channel to produce into or consume from.
    pub channel: ChannelConfig,
    /// Synthetic producer parameters.
    #[serde(default)]
    pub producer: ProducerConfig,
}

impl ProbeConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.channel.validate()?;
        self.producer.validate()
    }
}

/// Pick the configuration file to load.
///
/// An explicit path always wins. Otherwise `fallback` is used if it is an
/// existing file, and `None` means built-in defaults.
pub fn config_path(explicit: Option<&Path>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if fallback.is_file() => Some(fallback.to_path_buf()),
        None => None,
    }
}

/// Synthetic frame parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Frames per second.
    pub fps: u32,
    /// Reported frame width.
    pub width: u32,
    /// Reported frame height.
    pub height: u32,
    /// Reported format tag.
    pub format: u32,
    /// Payload size of every frame.
    pub frame_bytes: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 640,
            height: 480,
            format: 0,
            frame_bytes: 640 * 480 * 2,
        }
    }
}

impl ProducerConfig {
    /// Validate the producer section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 || self.fps > 1000 {
            return Err(ConfigError::ValidationError(format!(
                "fps must be in 1..=1000, got {}",
                self.fps
            )));
        }
        if self.frame_bytes > MAX_DATA {
            return Err(ConfigError::ValidationError(format!(
                "frame_bytes {} exceeds slot capacity {}",
                self.frame_bytes, MAX_DATA
            )));
        }
        Ok(())
    }
}

/// Reusable buffer of synthetic frames.
///
/// Each frame starts with its sequence number (little-endian `u64`) so a
/// consumer can tell which frame it received; the rest is a fill byte
/// derived from the sequence number.
pub struct SyntheticFrames {
    buf: Vec<u8>,
    seq: u64,
}

impl SyntheticFrames {
    /// Frames of `frame_bytes` bytes each.
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            buf: vec![0; frame_bytes],
            seq: 0,
        }
    }

    /// Sequence number of the last frame returned by `next_frame`.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Fill the buffer with the next frame.
    pub fn next_frame(&mut self) -> &[u8] {
        self.seq += 1;
        let fill = self.seq as u8;
        let header = self.seq.to_le_bytes();
        let split = header.len().min(self.buf.len());

        self.buf[..split].copy_from_slice(&header[..split]);
        self.buf[split..].fill(fill);
        &self.buf
    }

    /// Sequence number embedded in a frame produced by this type.
    pub fn seq_of(frame: &[u8]) -> Option<u64> {
        let header: [u8; 8] = frame.get(..8)?.try_into().ok()?;
        Some(u64::from_le_bytes(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_defaults_are_valid() {
        assert!(ProducerConfig::default().validate().is_ok());
    }

    #[test]
    fn producer_rejects_bad_values() {
        let zero_fps = ProducerConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(zero_fps.validate().is_err());

        let too_big = ProducerConfig {
            frame_bytes: MAX_DATA + 1,
            ..Default::default()
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn probe_config_from_toml() {
        let config: ProbeConfig = toml::from_str(
            r#"
[shared]
service_name = "cam0-probe"

[channel]
base_name = "cam0"

[producer]
fps = 60
"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.producer.fps, 60);
        assert_eq!(config.producer.width, 640);
        assert_eq!(config.channel.base_name, "cam0");
    }

    #[test]
    fn explicit_config_path_wins() {
        let explicit = Path::new("/nonexistent/probe.toml");
        let fallback = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        assert_eq!(
            config_path(Some(explicit), fallback),
            Some(explicit.to_path_buf())
        );
    }

    #[test]
    fn fallback_config_path_only_if_present() {
        let present = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        assert_eq!(config_path(None, present), Some(present.to_path_buf()));

        let missing = Path::new("/nonexistent/frame_channel/probe.toml");
        assert_eq!(config_path(None, missing), None);
    }

    #[test]
    fn synthetic_frames_carry_sequence() {
        let mut frames = SyntheticFrames::new(32);
        let first = frames.next_frame().to_vec();
        let second = frames.next_frame().to_vec();

        assert_eq!(SyntheticFrames::seq_of(&first), Some(1));
        assert_eq!(SyntheticFrames::seq_of(&second), Some(2));
        assert!(second[8..].iter().all(|&b| b == 2));
        assert_eq!(frames.seq(), 2);
    }

    #[test]
    fn tiny_frames_are_truncated_header() {
        let mut frames = SyntheticFrames::new(3);
        assert_eq!(frames.next_frame(), &[1, 0, 0]);
        assert_eq!(SyntheticFrames::seq_of(&[1, 0, 0]), None);
    }
}
