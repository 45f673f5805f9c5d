use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use super::ipac::{IpacColumn, IpacTable};
use super::loader::OBJECT_ID_KEY;
use super::model::ResampledSpectrum;
use crate::error::{Result, SpectrumError};

/// Output table shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab separated, `#wave flux error` header.
    #[default]
    Tab,
    /// Space separated, `#wavelength flux sigma` header.
    Space,
    /// IPAC table with typed, unit-tagged columns.
    Ipac,
    /// Parquet with unit metadata on each field.
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tab => "ascii",
            OutputFormat::Space => "txt",
            OutputFormat::Ipac => "ipac",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// What to do when the target already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    CreateNew,
    Overwrite,
}

impl WriteMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::CreateNew
        }
    }
}

/// `<dir>/<id>.<ext>`. The identifier must be a single plain file-name
/// component so the result stays inside `dir`.
pub fn output_path(dir: &Path, id: &str, format: OutputFormat) -> Result<PathBuf> {
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
        && Path::new(id).components().count() == 1;
    if !plain {
        return Err(SpectrumError::InvalidIdentifier { id: id.to_string() });
    }
    Ok(dir.join(format!("{id}.{}", format.extension())))
}

/// Write through a temporary file in the target directory and move it into
/// place. On any error the temporary is removed and `path` is untouched.
pub fn write_atomic<F>(path: &Path, mode: WriteMode, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    if mode == WriteMode::CreateNew && path.exists() {
        return Err(SpectrumError::OutputExists {
            path: path.to_path_buf(),
        });
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().sync_all()?;

    match mode {
        WriteMode::Overwrite => {
            tmp.persist(path).map_err(|e| SpectrumError::Io(e.error))?;
        }
        WriteMode::CreateNew => {
            tmp.persist_noclobber(path).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    SpectrumError::OutputExists {
                        path: path.to_path_buf(),
                    }
                } else {
                    SpectrumError::Io(e.error)
                }
            })?;
        }
    }
    Ok(())
}

/// Persist a resampled spectrum.
pub fn store(
    path: &Path,
    spectrum: &ResampledSpectrum,
    format: OutputFormat,
    mode: WriteMode,
) -> Result<()> {
    write_atomic(path, mode, |file| match format {
        OutputFormat::Tab => write_delimited(file, spectrum, b'\t', ["#wave", "flux", "error"]),
        OutputFormat::Space => {
            write_delimited(file, spectrum, b' ', ["#wavelength", "flux", "sigma"])
        }
        OutputFormat::Ipac => {
            file.write_all(ipac_table(spectrum).render().as_bytes())?;
            Ok(())
        }
        OutputFormat::Parquet => write_parquet(file, spectrum),
    })
}

/// Plain notation in the usual range, exponent notation outside it. Both
/// parse back losslessly.
pub fn format_value(v: f64) -> String {
    let a = v.abs();
    if a == 0.0 || (1e-4..1e15).contains(&a) {
        format!("{v}")
    } else {
        format!("{v:e}")
    }
}

fn write_delimited(
    file: &mut File,
    spectrum: &ResampledSpectrum,
    delimiter: u8,
    header: [&str; 3],
) -> Result<()> {
    let mut w = csv::WriterBuilder::new().delimiter(delimiter).from_writer(file);
    w.write_record(header)?;
    for (wave, flux, err) in spectrum.rows() {
        w.write_record([format_value(wave), format_value(flux), format_value(err)])?;
    }
    w.flush()?;
    Ok(())
}

fn ipac_table(spectrum: &ResampledSpectrum) -> IpacTable {
    IpacTable {
        keywords: vec![("OBJECT_ID".to_string(), spectrum.id().to_string())],
        columns: vec![
            IpacColumn::new("wavelength").typed("double").with_unit("micron"),
            IpacColumn::new("flux").typed("double").with_unit("Jy"),
            IpacColumn::new("sigma").typed("double").with_unit("Jy"),
        ],
        rows: spectrum
            .rows()
            .map(|(w, f, e)| vec![format_value(w), format_value(f), format_value(e)])
            .collect(),
    }
}

/// Three unit-tagged Float64 columns with the identifier in the schema
/// metadata.
pub fn unit_tagged_batch(
    id: &str,
    wavelength: &[f64],
    flux: &[f64],
    sigma: &[f64],
) -> Result<RecordBatch> {
    let field = |name: &str, unit: &str| {
        Field::new(name, DataType::Float64, false)
            .with_metadata(HashMap::from([("unit".to_string(), unit.to_string())]))
    };
    let schema = Schema::new(vec![
        field("wavelength", "micron"),
        field("flux", "Jy"),
        field("sigma", "Jy"),
    ])
    .with_metadata(HashMap::from([(
        OBJECT_ID_KEY.to_string(),
        id.to_string(),
    )]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(wavelength.to_vec())),
        Arc::new(Float64Array::from(flux.to_vec())),
        Arc::new(Float64Array::from(sigma.to_vec())),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

fn write_parquet(file: &mut File, spectrum: &ResampledSpectrum) -> Result<()> {
    let batch = unit_tagged_batch(
        spectrum.id(),
        spectrum.grid(),
        spectrum.flux(),
        spectrum.error(),
    )?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load_spectrum, ReadOptions};
    use crate::data::model::SpectrumRecord;
    use crate::transform::{Resampler, UniformGrid};

    fn spectrum() -> ResampledSpectrum {
        let record = SpectrumRecord::new(
            "12345678",
            vec![5.0, 6.0, 7.0, 8.0],
            vec![0.25, 0.5, 1.5e-5, 3.0],
            vec![0.01, 0.02, 0.03, 0.04],
        )
        .unwrap();
        Resampler::new(UniformGrid::new(5.0, 8.0, 7).unwrap())
            .resample(&record)
            .unwrap()
    }

    #[test]
    fn tab_output_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "12345678", OutputFormat::Tab).unwrap();
        store(&path, &spectrum(), OutputFormat::Tab, WriteMode::CreateNew).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("#wave\tflux\terror"));
        assert_eq!(lines.next(), Some("5\t0.25\t0.01"));
        assert_eq!(text.lines().count(), 8);
    }

    #[test]
    fn space_output_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "x", OutputFormat::Space).unwrap();
        store(&path, &spectrum(), OutputFormat::Space, WriteMode::CreateNew).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#wavelength flux sigma\n5 0.25 0.01\n"));
    }

    #[test]
    fn ipac_output_carries_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "x", OutputFormat::Ipac).unwrap();
        store(&path, &spectrum(), OutputFormat::Ipac, WriteMode::CreateNew).unwrap();

        let table = IpacTable::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let units: Vec<_> = table.columns.iter().map(|c| c.unit.as_deref()).collect();
        assert_eq!(units, vec![Some("micron"), Some("Jy"), Some("Jy")]);
        assert_eq!(table.keyword("OBJECT_ID"), Some("12345678"));
    }

    #[test]
    fn every_format_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let expected = spectrum();
        let opts = ReadOptions {
            id_keyword: "OBJECT_ID".into(),
            ..Default::default()
        };
        for format in [
            OutputFormat::Tab,
            OutputFormat::Space,
            OutputFormat::Ipac,
            OutputFormat::Parquet,
        ] {
            let path = output_path(dir.path(), expected.id(), format).unwrap();
            store(&path, &expected, format, WriteMode::CreateNew).unwrap();
            let back = load_spectrum(&path, &opts).unwrap();
            assert_eq!(back.id(), "12345678", "{format:?}");
            assert_eq!(back.wavelength(), expected.grid(), "{format:?}");
            assert_eq!(back.flux(), expected.flux(), "{format:?}");
            assert_eq!(back.error(), expected.error(), "{format:?}");
        }
    }

    #[test]
    fn parquet_fields_carry_unit_metadata() {
        let batch = unit_tagged_batch("a", &[1.0, 2.0], &[3.0, 4.0], &[0.1, 0.1]).unwrap();
        let schema = batch.schema();
        assert_eq!(
            schema.field(0).metadata().get("unit").map(String::as_str),
            Some("micron")
        );
        assert_eq!(
            schema.metadata().get(OBJECT_ID_KEY).map(String::as_str),
            Some("a")
        );
    }

    #[test]
    fn refuses_to_clobber_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, "original").unwrap();

        let err = store(&path, &spectrum(), OutputFormat::Space, WriteMode::CreateNew).unwrap_err();
        assert!(matches!(err, SpectrumError::OutputExists { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");

        store(&path, &spectrum(), OutputFormat::Space, WriteMode::Overwrite).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with("#wavelength"));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let err = write_atomic(&path, WriteMode::CreateNew, |file| {
            file.write_all(b"partial")?;
            Err(SpectrumError::InvalidGrid("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidGrid(_)));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(5.0), "5");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(1.5e-5), "1.5e-5");
        assert_eq!(format_value(-0.25), "-0.25");
    }

    #[test]
    fn output_path_rejects_path_like_identifiers() {
        let dir = Path::new("/data/out");
        for id in ["", ".", "..", "a/b", "../x", "/tmp/evil", "a\\b"] {
            let err = output_path(dir, id, OutputFormat::Tab).unwrap_err();
            assert_eq!(err.kind(), "invalid-identifier", "{id:?}");
        }
        assert_eq!(
            output_path(dir, "12345678", OutputFormat::Tab).unwrap(),
            Path::new("/data/out/12345678.ascii")
        );
    }
}
