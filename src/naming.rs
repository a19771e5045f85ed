//! Output file naming
//!
//! Three policies pick where a still or clip is written:
//! - `Sequential`: first free `00000.<ext>` .. `99999.<ext>` in the directory
//! - `Timestamp`: local time as `YYMMDD-HHMMSS.<ext>`. Two saves within the
//!   same second get the same name and the second overwrites the first.
//! - `Manual`: a [`PathChooser`] asks the user

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::CameraError;

/// Sequential names are tried up to this many indices.
pub const SEQUENTIAL_LIMIT: u32 = 100_000;

const TIMESTAMP_FORMAT: &str = "%y%m%d-%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamingPolicy {
    #[default]
    Sequential,
    Timestamp,
    Manual,
}

impl NamingPolicy {
    /// The policy after this one when the user cycles through them.
    pub fn next(self) -> Self {
        match self {
            NamingPolicy::Timestamp => NamingPolicy::Manual,
            NamingPolicy::Manual => NamingPolicy::Sequential,
            NamingPolicy::Sequential => NamingPolicy::Timestamp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NamingPolicy::Sequential => "Sequential",
            NamingPolicy::Timestamp => "Timestamp",
            NamingPolicy::Manual => "Manual",
        }
    }
}

impl FromStr for NamingPolicy {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(NamingPolicy::Sequential),
            "timestamp" => Ok(NamingPolicy::Timestamp),
            "manual" => Ok(NamingPolicy::Manual),
            other => Err(CameraError::InvalidArgument(format!(
                "unknown naming policy: {other} (expected sequential, timestamp or manual)"
            ))),
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Still image formats a frame can be saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    #[default]
    Png,
    Jpg,
    Pgm,
    Tiff,
}

impl ImageExtension {
    pub const ALL: [ImageExtension; 4] = [
        ImageExtension::Png,
        ImageExtension::Jpg,
        ImageExtension::Pgm,
        ImageExtension::Tiff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageExtension::Png => "png",
            ImageExtension::Jpg => "jpg",
            ImageExtension::Pgm => "pgm",
            ImageExtension::Tiff => "tiff",
        }
    }

    /// Recognise the extension of `path`, if it is one of ours.
    pub fn of_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl FromStr for ImageExtension {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageExtension::Png),
            "jpg" | "jpeg" => Ok(ImageExtension::Jpg),
            "pgm" => Ok(ImageExtension::Pgm),
            "tif" | "tiff" => Ok(ImageExtension::Tiff),
            other => Err(CameraError::InvalidArgument(format!(
                "unsupported image extension: {other} (expected png, jpg, pgm or tiff)"
            ))),
        }
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asks the user for a destination, e.g. through a save dialog.
pub trait PathChooser {
    /// `None` when the user cancelled.
    fn choose(&mut self, directory: &Path, extension: &str) -> Option<PathBuf>;
}

/// A chooser for front ends without dialogs: every request is cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChooser;

impl PathChooser for NoChooser {
    fn choose(&mut self, _directory: &Path, _extension: &str) -> Option<PathBuf> {
        None
    }
}

impl<F> PathChooser for F
where
    F: FnMut(&Path, &str) -> Option<PathBuf>,
{
    fn choose(&mut self, directory: &Path, extension: &str) -> Option<PathBuf> {
        self(directory, extension)
    }
}

/// Pick the next output path. `Ok(None)` means the user cancelled a
/// manual choice.
pub fn next_name(
    policy: NamingPolicy,
    extension: &str,
    directory: &Path,
    chooser: &mut dyn PathChooser,
) -> Result<Option<PathBuf>, CameraError> {
    let extension = extension.trim_start_matches('.');
    match policy {
        NamingPolicy::Sequential => sequential_name(extension, directory).map(Some),
        NamingPolicy::Timestamp => Ok(Some(timestamp_name(
            extension,
            directory,
            Local::now().naive_local(),
        ))),
        NamingPolicy::Manual => Ok(chooser
            .choose(directory, extension)
            .map(|chosen| normalize_extension(chosen, extension))),
    }
}

/// First `NNNNN.<ext>` in `directory` that does not exist yet.
pub fn sequential_name(extension: &str, directory: &Path) -> Result<PathBuf, CameraError> {
    for index in 0..SEQUENTIAL_LIMIT {
        let candidate = directory.join(format!("{index:05}.{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(CameraError::FilenameExhausted {
        directory: directory.to_path_buf(),
        attempts: SEQUENTIAL_LIMIT,
    })
}

pub fn timestamp_name(extension: &str, directory: &Path, at: NaiveDateTime) -> PathBuf {
    directory.join(format!("{}.{}", at.format(TIMESTAMP_FORMAT), extension))
}

/// Append `.<extension>` unless the path already ends in a recognised
/// image suffix.
pub fn normalize_extension(path: PathBuf, extension: &str) -> PathBuf {
    if ImageExtension::of_path(&path).is_some() {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
