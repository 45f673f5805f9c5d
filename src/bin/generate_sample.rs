use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use rusty_redshift::data::ipac::{IpacColumn, IpacTable};
use rusty_redshift::data::writer::format_value;

/// Rest-frame mid-IR lines: (name, centre in micron, sigma in micron).
const LINES: [(&str, f64, f64); 5] = [
    ("H2 S(3)", 9.665, 0.05),
    ("[NeII]", 12.814, 0.06),
    ("H2 S(1)", 17.035, 0.08),
    ("[SIII]", 18.713, 0.08),
    ("H2 S(0)", 28.221, 0.12),
];

#[derive(Parser, Debug)]
#[command(about = "Write synthetic observed-frame IRS spectra plus a target catalog")]
struct Args {
    #[arg(long, default_value = "sample_data")]
    out: PathBuf,
    #[arg(long, default_value_t = 6)]
    count: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 400)]
    samples: usize,
    #[arg(long, help = "Also write per-object line-fit tables under fits/")]
    fits: bool,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Target {
    aorkey: String,
    name: String,
    z: f64,
    amplitudes: Vec<f64>,
}

/// Observed-frame spectrum: power-law continuum plus lines shifted by
/// `(1 + z)`, with Gaussian noise.
fn spectrum_table(target: &Target, samples: usize, rng: &mut SimpleRng) -> IpacTable {
    let (lo, hi) = (5.2, 38.0);
    let step = (hi - lo) / (samples - 1) as f64;
    let stretch = 1.0 + target.z;

    let rows = (0..samples)
        .map(|i| {
            let w = lo + i as f64 * step;
            let continuum = 0.05 * (w / 10.0).powf(1.5);
            let lines: f64 = LINES
                .iter()
                .zip(&target.amplitudes)
                .map(|(&(_, mu, sigma), &amp)| gaussian(w, mu * stretch, sigma * stretch, amp))
                .sum();
            let sigma = 0.002 + 0.02 * continuum;
            let flux = continuum + lines + rng.gauss(0.0, sigma);
            vec![format!("{w:.4}"), format_value(flux), format_value(sigma)]
        })
        .collect();

    IpacTable {
        keywords: vec![
            ("AORKEY".to_string(), target.aorkey.clone()),
            ("OBJECT".to_string(), target.name.clone()),
        ],
        columns: vec![
            IpacColumn::new("wavelength").typed("double").with_unit("micron"),
            IpacColumn::new("flux_density").typed("double").with_unit("Jy"),
            IpacColumn::new("error").typed("double").with_unit("Jy"),
        ],
        rows,
    }
}

fn fit_table(target: &Target) -> IpacTable {
    IpacTable {
        keywords: Vec::new(),
        columns: vec![
            IpacColumn::new("Name").typed("char"),
            IpacColumn::new("x_0").typed("double").with_unit("micron"),
            IpacColumn::new("amp").typed("double").with_unit("Jy"),
        ],
        rows: LINES
            .iter()
            .zip(&target.amplitudes)
            .map(|(&(name, mu, _), &amp)| {
                vec![name.to_string(), format_value(mu), format_value(amp)]
            })
            .collect(),
    }
}

fn write(path: &Path, text: &str) -> anyhow::Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.samples >= 2, "--samples must be at least 2");
    let mut rng = SimpleRng::new(args.seed);

    let targets: Vec<Target> = (0..args.count)
        .map(|i| Target {
            aorkey: format!("{}", 10_000_000 + 1_234_567 * (i as u64 + 1)),
            name: format!("SYN-{:03}", i + 1),
            z: rng.uniform(0.0, 0.3),
            amplitudes: LINES.iter().map(|_| rng.uniform(0.01, 0.4)).collect(),
        })
        .collect();

    let spectra_dir = args.out.join("spectra");
    std::fs::create_dir_all(&spectra_dir)?;
    for target in &targets {
        let table = spectrum_table(target, args.samples, &mut rng);
        let path = spectra_dir.join(format!("SPITZER_S5_{}_spec.tbl", target.aorkey));
        write(&path, &table.render())?;
        log::debug!("wrote {}", path.display());
    }

    let mut catalog = csv::Writer::from_path(args.out.join("catalog.csv"))?;
    catalog.write_record(["key", "name", "z"])?;
    for target in &targets {
        let z = format!("{:.5}", target.z);
        catalog.write_record([target.aorkey.as_str(), target.name.as_str(), z.as_str()])?;
    }
    catalog.flush()?;

    if args.fits {
        let fits_dir = args.out.join("fits");
        std::fs::create_dir_all(&fits_dir)?;
        for target in &targets {
            let path = fits_dir.join(format!("{}_output.ipac", target.aorkey));
            write(&path, &fit_table(target).render())?;
        }
    }

    println!(
        "Wrote {} spectra ({} samples each) and catalog.csv to {}",
        targets.len(),
        args.samples,
        args.out.display()
    );
    Ok(())
}
