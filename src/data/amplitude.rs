use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::discover::discover_inputs;
use super::ipac::IpacTable;
use super::writer::{format_value, write_atomic, WriteMode};
use crate::error::{Result, SpectrumError};

/// Fitted line amplitudes for one object, as read from one fit table.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeRecord {
    pub id: String,
    pub source: PathBuf,
    pub components: Vec<String>,
    pub amplitudes: Vec<Option<f64>>,
}

impl AmplitudeRecord {
    /// Read an IPAC fit table. Only the `Name` and `amp` columns are used;
    /// anything else the fitter wrote (`x_0`, widths) is ignored.
    pub fn load(path: &Path, id: impl Into<String>) -> Result<Self> {
        let table = IpacTable::parse(&std::fs::read_to_string(path)?)?;
        let components = table
            .string_column("Name")?
            .into_iter()
            .enumerate()
            .map(|(row, name)| {
                name.ok_or_else(|| {
                    SpectrumError::parse(
                        format!("row {row}, column 'Name'"),
                        "empty component name",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: id.into(),
            source: path.to_path_buf(),
            components,
            amplitudes: table.float_column("amp")?,
        })
    }
}

/// File name minus `suffix`, if the name ends with it.
pub fn key_from_file_name(path: &Path, suffix: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let key = name.strip_suffix(suffix)?;
    (!key.is_empty()).then(|| key.to_string())
}

/// One row per object, one column per line component.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeTable {
    components: Vec<String>,
    rows: Vec<(String, Vec<Option<f64>>)>,
}

impl AmplitudeTable {
    /// Align records by component name. Rows are sorted by id; columns
    /// follow the first record's order. Every record must carry the same
    /// component set.
    pub fn from_records(mut records: Vec<AmplitudeRecord>) -> Result<Self> {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let Some(first) = records.first() else {
            return Err(SpectrumError::EmptyInput {
                pattern: "amplitude tables".to_string(),
            });
        };
        let components = first.components.clone();

        let mut rows = Vec::with_capacity(records.len());
        let mut previous: Option<&AmplitudeRecord> = None;
        for record in &records {
            if let Some(prev) = previous.filter(|p| p.id == record.id) {
                return Err(SpectrumError::DuplicateIdentifier {
                    id: record.id.clone(),
                    first: prev.source.clone(),
                });
            }
            previous = Some(record);

            let mut by_name: BTreeMap<&str, Option<f64>> = BTreeMap::new();
            for (name, amp) in record.components.iter().zip(&record.amplitudes) {
                if by_name.insert(name, *amp).is_some() {
                    return Err(SpectrumError::parse(
                        format!("object {}", record.id),
                        format!("component '{name}' listed twice"),
                    ));
                }
            }
            if let Some(extra) = record.components.iter().find(|c| !components.contains(c)) {
                return Err(SpectrumError::SchemaMismatch {
                    column: extra.clone(),
                });
            }
            let values = components
                .iter()
                .map(|c| {
                    by_name
                        .get(c.as_str())
                        .copied()
                        .ok_or_else(|| SpectrumError::SchemaMismatch { column: c.clone() })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push((record.id.clone(), values));
        }
        Ok(Self { components, rows })
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn rows(&self) -> &[(String, Vec<Option<f64>>)] {
        &self.rows
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W, id_header: &str) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        let mut header = vec![id_header.to_string()];
        header.extend(self.components.iter().cloned());
        csv.write_record(&header)?;
        for (id, values) in &self.rows {
            let mut record = vec![id.clone()];
            record.extend(values.iter().map(|v| v.map(format_value).unwrap_or_default()));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn store(&self, path: &Path, id_header: &str, mode: WriteMode) -> Result<()> {
        write_atomic(path, mode, |file| self.write_csv(file, id_header))
    }
}

/// Collect every `*<suffix>` fit table under `input` into one table.
pub fn collect_amplitudes(input: &Path, suffix: &str) -> Result<AmplitudeTable> {
    let paths = discover_inputs(input, None, &[])?;
    let mut records = Vec::new();
    for path in paths {
        let Some(id) = key_from_file_name(&path, suffix) else {
            debug!("skipping {}", path.display());
            continue;
        };
        records.push(AmplitudeRecord::load(&path, id)?);
    }
    info!("aggregating {} amplitude tables", records.len());
    AmplitudeTable::from_records(records)
}
