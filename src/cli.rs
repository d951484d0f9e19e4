use clap::Parser;
use std::path::PathBuf;

use crate::entities::project::{ProjectUpdate, Resolution};

/// Retarget an effect project to a new resolution or orientation.
///
/// Centered positions are snapped to the new canvas center; every other
/// position is scaled proportionally.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Project JSON file to load
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Target resolution: name (fhd, 4k, square_1080, ...) or landscape width (1920)
    #[arg(short = 'r', long = "resolution", value_name = "RES")]
    pub resolution: Option<Resolution>,

    /// Switch to portrait orientation
    #[arg(long = "vertical", conflicts_with = "horizontal")]
    pub vertical: bool,

    /// Switch to landscape orientation
    #[arg(long = "horizontal")]
    pub horizontal: bool,

    /// Set the project length in frames
    #[arg(long = "frames", value_name = "N")]
    pub frames: Option<u32>,

    /// Output file (default: overwrite the input)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Validate and print a summary without writing anything
    #[arg(long = "check")]
    pub check: bool,

    /// Enable logging to file (default: fxproject.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Requested orientation, if any flag was given.
    pub fn orientation(&self) -> Option<bool> {
        match (self.horizontal, self.vertical) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Settings change described by the flags.
    pub fn project_update(&self) -> ProjectUpdate {
        ProjectUpdate {
            target_resolution: self.resolution,
            is_horizontal: self.orientation(),
            number_of_frames: self.frames,
            ..Default::default()
        }
    }
}
