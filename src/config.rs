//! Configuration management for usbcam
//!
//! Loads and saves the camera, storage and recording defaults a front end
//! starts with. Command-line flags override what the file says.

use crate::controls::ParamSet;
use crate::convert::ColorMode;
use crate::device::CameraKind;
use crate::errors::CameraError;
use crate::naming::{ImageExtension, NamingPolicy};
use crate::recording::{RecordingMode, VideoCodec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbcamConfig {
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Index N of /dev/videoN
    pub device: u32,
    pub kind: CameraKind,
    pub color: ColorMode,
    /// Which controls are activated after discovery
    pub params: ParamSet,
}

/// Storage and file management configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Default output directory for captures
    pub output_directory: PathBuf,
    /// Still image format (png, jpg, pgm, tiff)
    pub image_extension: String,
    pub naming: NamingPolicy,
    /// Create the output directory when it does not exist
    pub create_directory: bool,
}

/// Video recording configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub codec: VideoCodec,
    pub container_extension: String,
    /// Frame rate written to the file; the device rate when unset
    pub fps: Option<f64>,
    pub mode: RecordingMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            kind: CameraKind::UsbCam,
            color: ColorMode::Rgb,
            params: ParamSet::Full,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            image_extension: ImageExtension::Png.as_str().to_string(),
            naming: NamingPolicy::Sequential,
            create_directory: true,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            container_extension: VideoCodec::H264.container_extension().to_string(),
            fps: None,
            mode: RecordingMode::RecordOnly,
        }
    }
}

impl UsbcamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("Failed to read config file: {}", e)))?;

        let config: UsbcamConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("usbcam.toml")
    }

    /// Parsed still image extension
    pub fn image_extension(&self) -> Result<ImageExtension, CameraError> {
        self.storage
            .image_extension
            .parse()
            .map_err(|_| CameraError::Config(format!(
                "Unsupported image extension {:?} (expected png, jpg, pgm or tiff)",
                self.storage.image_extension
            )))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), CameraError> {
        self.image_extension()?;

        if let Some(fps) = self.recording.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(CameraError::Config(format!(
                    "Recording fps must be positive, got {}",
                    fps
                )));
            }
        }

        if self.recording.container_extension.trim_start_matches('.').is_empty() {
            return Err(CameraError::Config(
                "Recording container extension is empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UsbcamConfig::default();
        assert_eq!(config.camera.device, 0);
        assert_eq!(config.storage.naming, NamingPolicy::Sequential);
        assert_eq!(config.recording.container_extension, "mp4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_ext = UsbcamConfig::default();
        bad_ext.storage.image_extension = "bmp".to_string();
        assert!(matches!(bad_ext.validate(), Err(CameraError::Config(_))));

        let mut bad_fps = UsbcamConfig::default();
        bad_fps.recording.fps = Some(0.0);
        assert!(bad_fps.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = UsbcamConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("kind = \"usb_cam\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: UsbcamConfig = toml::from_str("[camera]\ndevice = 2\nkind = \"uvcam\"\n").unwrap();
        assert_eq!(config.camera.device, 2);
        assert_eq!(config.camera.kind, CameraKind::UvCam);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = UsbcamConfig::load_from_file("nonexistent_usbcam.toml");
        assert_eq!(result.unwrap(), UsbcamConfig::default());
    }
}
