//! `fidmark` CLI: decode markers in a still image, optionally with poses.
//!
//! Calibration file handling lives here, not in the library crates: the
//! core consumes an already-validated camera matrix and distortion vector,
//! and this binary owns the JSON schema those arrive in.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use fidmark::convert::gray_view;
use fidmark::dict::{Dictionary, DictionaryError};
use fidmark::pose::{Calibration, CalibrationError};
use fidmark::{DetectorSession, SessionParams};

#[derive(Parser)]
#[command(name = "fidmark", version, about = "Square fiducial marker detection")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging to stderr.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Detect markers in an image and print a JSON report.
    Detect(DetectArgs),
}

#[derive(Args)]
struct DetectArgs {
    /// Input image (any format the `image` crate reads).
    image: PathBuf,

    /// Dictionary bits per side.
    #[arg(long, default_value_t = 6)]
    bits: usize,

    /// Dictionary size (number of marker ids).
    #[arg(long, default_value_t = 250)]
    dict_size: usize,

    /// Minimum Hamming distance of the generated dictionary.
    #[arg(long, default_value_t = 9)]
    min_distance: u32,

    /// Load the dictionary from a JSON codeword file instead of generating.
    #[arg(long, conflicts_with_all = ["bits", "dict_size", "min_distance"])]
    dictionary: Option<PathBuf>,

    /// Bit-error tolerance (defaults to the dictionary maximum).
    #[arg(long)]
    max_bit_errors: Option<u32>,

    /// Calibration JSON (camera_matrix 3x3 row-major + dist_coeffs).
    /// Enables pose estimation.
    #[arg(long)]
    calib: Option<PathBuf>,

    /// Physical marker side length; pose translation uses the same unit.
    #[arg(long, default_value_t = 0.05)]
    marker_size: f64,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("invalid calibration JSON: {0}")]
    CalibrationJson(#[from] serde_json::Error),
}

/// On-disk calibration schema owned by this binary.
#[derive(Deserialize)]
struct CalibrationFile {
    camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    dist_coeffs: Vec<f64>,
}

#[derive(Serialize)]
struct PoseReport {
    rvec: [f64; 3],
    tvec: [f64; 3],
}

#[derive(Serialize)]
struct MarkerReport {
    id: u32,
    corners: [[f32; 2]; 4],
    hamming: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pose: Option<PoseReport>,
}

#[derive(Serialize)]
struct Report {
    image: String,
    width: u32,
    height: u32,
    markers: Vec<MarkerReport>,
    rejected: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = fidmark::core::init_with_level(level);

    let result = match &cli.command {
        Command::Detect(args) => detect(args),
    };

    match result {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn detect(args: &DetectArgs) -> Result<String, CliError> {
    let img = image::ImageReader::open(&args.image)
        .map_err(|source| CliError::Read {
            path: args.image.clone(),
            source,
        })?
        .decode()?
        .to_luma8();

    let dictionary = match &args.dictionary {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            Dictionary::from_json_str(&json)?
        }
        None => Dictionary::generate(args.dict_size, args.bits, args.min_distance)?,
    };

    let params = SessionParams {
        max_bit_errors: args.max_bit_errors,
        marker_side: args.marker_size,
        ..SessionParams::default()
    };
    let mut session = DetectorSession::new(Arc::new(dictionary), params);

    if let Some(path) = &args.calib {
        let json = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let file: CalibrationFile = serde_json::from_str(&json)?;
        let mut matrix = Matrix3::zeros();
        for (r, row) in file.camera_matrix.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                matrix[(r, c)] = *v;
            }
        }
        session.set_calibration(Calibration::new(matrix, &file.dist_coeffs)?);
    }

    session.detect(&gray_view(&img));
    session.estimate_poses();

    let poses = session.poses();
    let markers = session
        .markers()
        .iter()
        .enumerate()
        .map(|(i, m)| MarkerReport {
            id: m.id,
            corners: m.corners.map(|c| [c.x, c.y]),
            hamming: m.hamming,
            pose: poses.get(i).copied().flatten().map(|p| PoseReport {
                rvec: [p.rvec.x, p.rvec.y, p.rvec.z],
                tvec: [p.tvec.x, p.tvec.y, p.tvec.z],
            }),
        })
        .collect();

    let report = Report {
        image: args.image.display().to_string(),
        width: img.width(),
        height: img.height(),
        markers,
        rejected: session.rejected().len(),
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }?;
    Ok(json)
}
