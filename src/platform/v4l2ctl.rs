use super::{CapabilityBackend, ControlBackend};
use crate::errors::CameraError;
use crate::formats::listing;
use crate::fourcc::FourCc;
use std::process::Command;

/// Control and capability collaborator backed by the `v4l2-ctl` tool.
#[derive(Debug, Clone)]
pub struct V4l2Ctl {
    device: u32,
    program: String,
}

impl V4l2Ctl {
    pub fn new(device: u32) -> Self {
        Self::with_program(device, "v4l2-ctl")
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(device: u32, program: impl Into<String>) -> Self {
        Self {
            device,
            program: program.into(),
        }
    }

    pub fn device(&self) -> u32 {
        self.device
    }

    fn run(&self, args: &[String]) -> Result<String, CameraError> {
        let mut command = vec![self.program.clone(), "-d".to_string(), self.device.to_string()];
        command.extend_from_slice(args);
        log::debug!("Running {}", command.join(" "));

        let output = Command::new(&command[0])
            .args(&command[1..])
            .output()
            .map_err(|e| CameraError::external_tool(&command, "failed to start", e.to_string().as_bytes()))?;

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(CameraError::external_tool(&command, status, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Raw `--list-formats-ext` output.
    pub fn list_formats_ext(&self) -> Result<String, CameraError> {
        self.run(&["--list-formats-ext".to_string()])
    }

    /// Raw `-L` output: controls with their menu entries.
    pub fn list_controls_with_menus(&self) -> Result<String, CameraError> {
        self.run(&["-L".to_string()])
    }
}

impl ControlBackend for V4l2Ctl {
    fn list_controls(&self) -> Result<String, CameraError> {
        self.run(&["-l".to_string()])
    }

    fn set_control(&self, name: &str, value: i64) -> Result<(), CameraError> {
        self.run(&["--set-ctrl".to_string(), format!("{name}={value}")])
            .map(|_| ())
    }
}

impl CapabilityBackend for V4l2Ctl {
    fn pixel_formats(&self) -> Result<Vec<FourCc>, CameraError> {
        let text = self.run(&["--list-formats".to_string()])?;
        Ok(listing::parse_pixel_formats(&text))
    }

    fn frame_sizes(&self, fourcc: FourCc) -> Result<Vec<(u32, u32)>, CameraError> {
        let text = self.run(&[format!("--list-framesizes={fourcc}")])?;
        Ok(listing::parse_frame_sizes(&text))
    }

    fn frame_rates(&self, fourcc: FourCc, width: u32, height: u32) -> Result<Vec<f64>, CameraError> {
        let text = self.run(&[format!(
            "--list-frameintervals=width={width},height={height},pixelformat={fourcc}"
        )])?;
        Ok(listing::parse_frame_rates(&text))
    }
}
