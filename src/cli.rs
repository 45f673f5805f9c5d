use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::data::loader::ReadOptions;
use crate::data::writer::OutputFormat;
use crate::transform::{ErrorMode, GridSpec};

pub const DEFAULT_AMPLITUDE_SUFFIX: &str = "_output.ipac";
pub const DEFAULT_ID_HEADER: &str = "#aorkey";

#[derive(Parser, Debug)]
#[command(
    name = "rusty-redshift",
    version,
    about = "Deredshift and resample IR spectra onto a common grid"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deredshift and resample every matching input.
    Resample(ResampleArgs),
    /// Merge per-object line-fit tables into one amplitude CSV.
    Aggregate(AggregateArgs),
    /// Print the first rows of one spectrum as the readers see it.
    Inspect(InspectArgs),
}

/// Reader knobs shared by `resample` and `inspect`.
#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    #[arg(long, help = "Header keyword holding the object identifier [default: AORKEY]")]
    pub id_keyword: Option<String>,
    #[arg(long, help = "Identifier truncation width, 0 to disable [default: 9]")]
    pub key_width: Option<usize>,
    #[arg(long, help = "Sort samples by wavelength instead of rejecting unsorted input")]
    pub sort_wavelength: bool,
}

impl ReadArgs {
    pub fn apply(&self, opts: &mut ReadOptions) {
        if let Some(keyword) = &self.id_keyword {
            opts.id_keyword = keyword.clone();
        }
        if let Some(width) = self.key_width {
            opts.key.width = width;
        }
        if self.sort_wavelength {
            opts.sort_wavelength = true;
        }
    }

    pub fn options(&self) -> ReadOptions {
        let mut opts = ReadOptions::default();
        self.apply(&mut opts);
        opts
    }
}

#[derive(Args, Debug)]
pub struct ResampleArgs {
    #[arg(long, help = "JSON config file; flags override its fields")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Input file, directory or glob pattern")]
    pub input: Option<PathBuf>,
    #[arg(long = "match", help = "Keep inputs whose file name contains this")]
    pub name_filter: Option<String>,
    #[arg(long, help = "Output directory")]
    pub out: Option<PathBuf>,
    #[arg(long, allow_hyphen_values = true, help = "First grid wavelength (rest frame)")]
    pub start: Option<f64>,
    #[arg(long, allow_hyphen_values = true, help = "Last grid wavelength (rest frame)")]
    pub end: Option<f64>,
    #[arg(long, help = "Grid points [default: input sample count]")]
    pub num: Option<usize>,
    #[arg(long, conflicts_with = "redshift", help = "Target catalog (CSV or JSON)")]
    pub catalog: Option<PathBuf>,
    #[arg(long, allow_hyphen_values = true, help = "Fixed redshift for every input")]
    pub redshift: Option<f64>,
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    #[arg(long, value_enum)]
    pub error_mode: Option<ErrorMode>,
    #[arg(long, help = "Replace existing outputs")]
    pub overwrite: bool,
    #[command(flatten)]
    pub read: ReadArgs,
}

impl ResampleArgs {
    /// Config file first, then flags on top.
    pub fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => {
                let (Some(input), Some(out), Some(start), Some(end)) =
                    (self.input.clone(), self.out.clone(), self.start, self.end)
                else {
                    anyhow::bail!(
                        "--input, --out, --start and --end are required without --config"
                    );
                };
                PipelineConfig::new(
                    input,
                    out,
                    GridSpec {
                        start,
                        end,
                        num: self.num,
                    },
                )
            }
        };

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(out) = self.out {
            config.output_dir = out;
        }
        if self.name_filter.is_some() {
            config.name_filter = self.name_filter;
        }
        if let Some(start) = self.start {
            config.grid.start = start;
        }
        if let Some(end) = self.end {
            config.grid.end = end;
        }
        if self.num.is_some() {
            config.grid.num = self.num;
        }
        if let Some(catalog) = self.catalog {
            config.catalog = Some(catalog);
            config.redshift = None;
        }
        if let Some(z) = self.redshift {
            config.redshift = Some(z);
            config.catalog = None;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(mode) = self.error_mode {
            config.error_mode = mode;
        }
        if self.overwrite {
            config.overwrite = true;
        }
        self.read.apply(&mut config.read);
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    #[arg(long, help = "Directory or glob of fit tables")]
    pub input: PathBuf,
    #[arg(long, help = "Output CSV path")]
    pub out: PathBuf,
    #[arg(long, default_value = DEFAULT_AMPLITUDE_SUFFIX)]
    pub suffix: String,
    #[arg(long, default_value = DEFAULT_ID_HEADER)]
    pub id_header: String,
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    pub path: PathBuf,
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rusty-redshift").chain(args.iter().copied()))
            .unwrap()
    }

    fn resample(cli: Cli) -> ResampleArgs {
        match cli.command {
            Command::Resample(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_build_a_config() {
        let cli = parse(&[
            "resample", "--input", "spectra", "--out", "out", "--start", "5", "--end", "35",
            "--format", "ipac", "--key-width", "0", "--error-mode", "offset",
        ]);
        let config = resample(cli).into_config().unwrap();
        assert_eq!(config.grid.start, 5.0);
        assert_eq!(config.grid.num, None);
        assert_eq!(config.format, OutputFormat::Ipac);
        assert_eq!(config.read.key.width, 0);
        assert_eq!(config.read.id_keyword, "AORKEY");
        assert_eq!(config.error_mode, ErrorMode::Offset);
    }

    #[test]
    fn missing_grid_without_config_fails() {
        let cli = parse(&["resample", "--input", "spectra", "--out", "out"]);
        assert!(resample(cli).into_config().is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"input": "a", "output_dir": "b", "grid": {"start": 5, "end": 35, "num": 100},
                "catalog": "targets.csv"}"#,
        )
        .unwrap();
        let cli = parse(&[
            "resample",
            "--config",
            path.to_str().unwrap(),
            "--num",
            "50",
            "--redshift",
            "0.1",
        ]);
        let config = resample(cli).into_config().unwrap();
        assert_eq!(config.input, PathBuf::from("a"));
        assert_eq!(config.grid.num, Some(50));
        assert_eq!(config.redshift, Some(0.1));
        assert_eq!(config.catalog, None);
    }

    #[test]
    fn catalog_and_redshift_conflict() {
        let res = Cli::try_parse_from([
            "rusty-redshift", "resample", "--catalog", "c.csv", "--redshift", "0.1",
        ]);
        assert!(res.is_err());
    }
}
