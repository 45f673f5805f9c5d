use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use rusty_redshift::catalog::open_source;
use rusty_redshift::cli::{AggregateArgs, Cli, Command, InspectArgs, ResampleArgs};
use rusty_redshift::data::amplitude::collect_amplitudes;
use rusty_redshift::data::loader::load_spectrum;
use rusty_redshift::data::writer::{unit_tagged_batch, WriteMode};
use rusty_redshift::pipeline::Pipeline;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let json = cli.json;
    let outcome = match cli.command {
        Command::Resample(args) => resample(args, json),
        Command::Aggregate(args) => aggregate(args, json),
        Command::Inspect(args) => inspect(args),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when at least one input failed.
fn resample(args: ResampleArgs, json: bool) -> anyhow::Result<bool> {
    let config = args.into_config()?;
    let redshifts = open_source(config.catalog.as_deref(), config.redshift)?;
    let report = Pipeline::new(&config, redshifts.as_ref())
        .run()
        .context("resample run aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        for written in &report.written {
            println!("{}\t{}", written.id, written.output.display());
        }
    }
    Ok(report.is_clean())
}

fn aggregate(args: AggregateArgs, json: bool) -> anyhow::Result<bool> {
    let table = collect_amplitudes(&args.input, &args.suffix)
        .with_context(|| format!("collecting amplitudes from {}", args.input.display()))?;
    table.store(
        &args.out,
        &args.id_header,
        WriteMode::from_overwrite(args.overwrite),
    )?;
    info!(
        "wrote {} objects x {} components to {}",
        table.rows().len(),
        table.components().len(),
        args.out.display()
    );
    if json {
        let summary = serde_json::json!({
            "output": args.out.display().to_string(),
            "objects": table.rows().len(),
            "components": table.components(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(true)
}

fn inspect(args: InspectArgs) -> anyhow::Result<bool> {
    let record = load_spectrum(&args.path, &args.read.options())
        .with_context(|| format!("reading {}", args.path.display()))?;
    let (lo, hi) = record.wavelength_range();
    println!(
        "id: {}\nsamples: {}\nwavelength: {lo} .. {hi}",
        record.id(),
        record.sample_count()
    );
    for (key, value) in record.metadata() {
        println!("{key}: {value}");
    }

    let batch = unit_tagged_batch(
        record.id(),
        record.wavelength(),
        record.flux(),
        record.error(),
    )?;
    let shown = batch.slice(0, args.rows.min(batch.num_rows()));
    println!("{}", arrow::util::pretty::pretty_format_batches(&[shown])?);
    Ok(true)
}
