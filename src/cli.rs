use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::DuplicateMode;
use crate::entities::DragEdge;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Host:   offline (JSON composition)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Beat-grid timeline for composition layers
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Composition JSON (host query reply or exported file)
    #[arg(value_name = "COMP")]
    pub comp_path: Option<PathBuf>,

    /// Tempo in beats per minute (overrides saved settings)
    #[arg(short = 'b', long = "bpm", value_name = "BPM")]
    pub bpm: Option<f64>,

    /// Grid subdivision: 2, 4, 8 or 16 beats per bar
    #[arg(long = "beats-per-bar", value_name = "N")]
    pub beats_per_bar: Option<u32>,

    /// Timeline width in pixels at zoom 1.0
    #[arg(short = 'w', long = "width", value_name = "PX")]
    pub width: Option<f64>,

    /// Zoom steps (positive zooms in, negative zooms out)
    #[arg(short = 'z', long = "zoom", value_name = "STEPS", allow_hyphen_values = true)]
    pub zoom: Option<i32>,

    /// Snap drags to the nearest grid line
    #[arg(short = 's', long = "snap")]
    pub snap: bool,

    /// Move a layer: INDEX:BEATS (repeatable, applied in order)
    #[arg(short = 'm', long = "move", value_name = "INDEX:BEATS", allow_hyphen_values = true)]
    pub moves: Vec<MoveOp>,

    /// Trim a layer edge: INDEX:start|end:BEATS (repeatable)
    #[arg(long = "scale", value_name = "INDEX:EDGE:BEATS", allow_hyphen_values = true)]
    pub scales: Vec<ScaleOp>,

    /// Duplicate a layer on the beat grid: INDEX:COUNT[:beat|bar]
    #[arg(short = 'd', long = "duplicate", value_name = "INDEX:COUNT[:MODE]")]
    pub duplicates: Vec<DuplicateOp>,

    /// Write the resulting composition to a JSON file
    #[arg(short = 'e', long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Save tempo/grid/snap options as the new defaults
    #[arg(long = "save-settings")]
    pub save_settings: bool,

    /// Enable debug logging to file (default: soundsync.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// `--move INDEX:BEATS`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveOp {
    pub layer_index: u32,
    pub beats: i64,
}

/// `--scale INDEX:EDGE:BEATS`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleOp {
    pub layer_index: u32,
    pub edge: DragEdge,
    pub beats: i64,
}

/// `--duplicate INDEX:COUNT[:MODE]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuplicateOp {
    pub layer_index: u32,
    pub count: u32,
    pub mode: DuplicateMode,
}

fn parse_num<T: FromStr>(part: Option<&str>, what: &str) -> Result<T, String> {
    let part = part.ok_or_else(|| format!("missing {}", what))?;
    part.trim()
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, part))
}

impl FromStr for MoveOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, ':');
        Ok(Self {
            layer_index: parse_num(parts.next(), "layer index")?,
            beats: parse_num(parts.next(), "beat count")?,
        })
    }
}

impl FromStr for ScaleOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let layer_index = parse_num(parts.next(), "layer index")?;
        let edge = match parts.next().map(|p| p.trim().to_ascii_lowercase()).as_deref() {
            Some("start" | "in") => DragEdge::Start,
            Some("end" | "out") => DragEdge::End,
            Some(other) => return Err(format!("invalid edge '{}' (expected start|end)", other)),
            None => return Err("missing edge".to_string()),
        };
        Ok(Self {
            layer_index,
            edge,
            beats: parse_num(parts.next(), "beat count")?,
        })
    }
}

impl FromStr for DuplicateOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let layer_index = parse_num(parts.next(), "layer index")?;
        let count = parse_num(parts.next(), "copy count")?;
        let mode = match parts.next() {
            Some(m) => m.parse()?,
            None => DuplicateMode::Beat,
        };
        Ok(Self { layer_index, count, mode })
    }
}
