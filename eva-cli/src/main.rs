//! eva: load a run, apply corrections and summarise or export the result.
#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use eva_core::{
    CorrectionRequest, CorrectionSettings, EnergyCorrection, Normalisation, PlotMode, Run,
};
use eva_io::{ChannelMap, ExportFormat, LoadFlags, LoadOutcome, NexusLocator, SpectrumWriter};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    EvaIo(#[from] eva_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] eva_core::Error),

    #[error("no data found for run {0}")]
    NoRun(String),

    #[error("invalid calibration '{0}', expected DETECTOR:GRADIENT:OFFSET")]
    Calibration(String),
}

/// Muonic X-ray / gamma spectroscopy run loader.
#[derive(Parser)]
#[command(name = "eva")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a run from per-channel histogram files and comment.dat
    Histogram {
        /// Run number
        run: String,

        /// Working directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        #[command(flatten)]
        corrections: CorrectionArgs,
    },

    /// Load a run from a per-event Nexus file
    Nexus {
        /// Run number
        run: String,

        /// Working directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// File name prefix before the run number
        #[arg(long, default_value = "")]
        prefix: String,

        /// Plot mode, e.g. "Manual Prompt Spectrum"
        #[arg(long)]
        plot_mode: Option<PlotMode>,

        /// Prompt/delayed time boundary
        #[arg(long)]
        prompt_limit: Option<f64>,

        /// Raw histogram bin count at a binning rate of 1
        #[arg(long)]
        default_bin: Option<usize>,

        #[command(flatten)]
        corrections: CorrectionArgs,
    },

    /// Show which Nexus file a run resolves to
    Locate {
        /// Run number
        run: String,

        /// Working directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// File name prefix before the run number
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

#[derive(Args)]
struct CorrectionArgs {
    /// JSON file with default corrections
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Energy calibration DETECTOR:GRADIENT:OFFSET (repeatable)
    #[arg(long = "calibrate")]
    calibrations: Vec<String>,

    /// Normalisation: none, counts or events
    #[arg(long)]
    normalisation: Option<Normalisation>,

    /// Detectors to normalise (comma separated)
    #[arg(long, value_delimiter = ',')]
    normalise_which: Option<Vec<String>>,

    /// Binning rate
    #[arg(long)]
    bin_rate: Option<f64>,

    /// Write the corrected spectra to this file (.csv or .json)
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl CorrectionArgs {
    /// Settings file values overridden by command line flags.
    fn to_request(&self) -> Result<CorrectionRequest> {
        let settings = match &self.settings {
            Some(path) => eva_io::load_settings(path)?,
            None => CorrectionSettings::default(),
        };
        let mut request = settings.to_request()?;

        if !self.calibrations.is_empty() {
            let mut corrections = request.energy_corrections.take().unwrap_or_default();
            for spec in &self.calibrations {
                let (detector, correction) = parse_calibration(spec)?;
                corrections.insert(detector, correction);
            }
            request = request.with_energy_corrections(corrections);
        }
        if let Some(normalisation) = self.normalisation {
            request = request.with_normalisation(normalisation);
        }
        if let Some(which) = &self.normalise_which {
            request = request.with_normalise_which(which.iter().cloned());
        }
        if let Some(bin_rate) = self.bin_rate {
            request = request.with_bin_rate(bin_rate);
        }
        Ok(request)
    }
}

fn parse_calibration(spec: &str) -> Result<(String, EnergyCorrection)> {
    let invalid = || CliError::Calibration(spec.to_string());
    let mut parts = spec.split(':');
    let (Some(detector), Some(gradient), Some(offset), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    let gradient: f64 = gradient.trim().parse().map_err(|_| invalid())?;
    let offset: f64 = offset.trim().parse().map_err(|_| invalid())?;
    Ok((
        detector.trim().to_string(),
        EnergyCorrection::new(gradient, offset),
    ))
}

fn report<R: Run>(outcome: LoadOutcome<R>, run_num: &str, export: Option<&Path>) -> Result<()> {
    print_flags(outcome.flags);
    let run = outcome.run.ok_or_else(|| CliError::NoRun(run_num.to_string()))?;

    println!("Loaded detectors: {}", run.loaded_detectors().join(", "));
    println!("Normalisation: {}", run.normalisation());
    println!();
    println!("{}", run.read_comment_data().run_info);
    println!();
    for spectrum in run.data() {
        println!(
            "  {:<8} {:>6} points  total {:.6}",
            spectrum.detector,
            spectrum.len(),
            spectrum.total()
        );
    }

    if let Some(path) = export {
        let mut writer = SpectrumWriter::create(path)?;
        writer.write(run.data(), ExportFormat::from_path(path))?;
        log::info!("Exported spectra to {}", path.display());
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_flags(flags: LoadFlags) {
    if flags.no_files_found {
        eprintln!("warning: no data files found");
    }
    if flags.comment_not_found {
        eprintln!("warning: run metadata not found");
    }
    if flags.norm_by_spills_error {
        eprintln!("warning: normalisation by events unavailable, data left un-normalised");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Histogram {
            run,
            dir,
            corrections,
        } => {
            let request = corrections.to_request()?;
            let outcome =
                eva_io::load_histogram_run(&dir, &run, &ChannelMap::default(), &request)?;
            report(outcome, &run, corrections.export.as_deref())?;
        }

        Commands::Nexus {
            run,
            dir,
            prefix,
            plot_mode,
            prompt_limit,
            default_bin,
            corrections,
        } => {
            let mut request = corrections.to_request()?;
            if let Some(mode) = plot_mode {
                request = request.with_plot_mode(mode);
            }
            if let Some(limit) = prompt_limit {
                request = request.with_prompt_limit(limit);
            }
            if let Some(bins) = default_bin {
                request = request.with_default_bin(bins);
            }
            let locator = NexusLocator::new(&dir).with_prefix(prefix);
            let outcome = eva_io::load_event_run(&locator, &run, &request)?;
            report(outcome, &run, corrections.export.as_deref())?;
        }

        Commands::Locate { run, dir, prefix } => {
            let locator = NexusLocator::new(&dir).with_prefix(prefix);
            match locator.locate(&run) {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("No file for run {run}; tried:");
                    for candidate in locator.candidates(&run) {
                        eprintln!("  {}", candidate.display());
                    }
                    return Err(CliError::NoRun(run));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calibration() {
        let (detector, correction) = parse_calibration("GE1:2.0:-10.5").unwrap();
        assert_eq!(detector, "GE1");
        assert_eq!(correction, EnergyCorrection::new(2.0, -10.5));
        assert!(parse_calibration("GE1:2.0").is_err());
        assert!(parse_calibration("GE1:a:1").is_err());
        assert!(parse_calibration("GE1:1:1:1").is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "eva",
            "histogram",
            "2630",
            "--normalisation",
            "counts",
            "--bin-rate",
            "2",
            "--calibrate",
            "GE2:1.5:3",
            "--normalise-which",
            "GE1,GE2",
        ]);
        let Commands::Histogram { corrections, .. } = cli.command else {
            panic!("expected histogram command");
        };
        let request = corrections.to_request().unwrap();
        assert_eq!(request.normalisation, Some(Normalisation::Counts));
        assert_eq!(request.bin_rate, Some(2.0));
        assert_eq!(
            request.normalise_which,
            Some(vec!["GE1".to_string(), "GE2".to_string()])
        );
        assert_eq!(
            request.energy_corrections.unwrap()["GE2"],
            EnergyCorrection::new(1.5, 3.0)
        );
        assert_eq!(request.plot_mode, Some(PlotMode::IbexPrompt));
    }

    #[test]
    fn test_plot_mode_argument() {
        let cli = Cli::parse_from([
            "eva",
            "nexus",
            "3000",
            "--plot-mode",
            "Manual Delayed Spectrum",
        ]);
        let Commands::Nexus { plot_mode, .. } = cli.command else {
            panic!("expected nexus command");
        };
        assert_eq!(plot_mode, Some(PlotMode::ManualDelayed));
    }
}
