use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array};
use log::{debug, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use super::ipac::IpacTable;
use super::model::{MetadataValue, SpectrumRecord};
use crate::error::{Result, SpectrumError};

// ---------------------------------------------------------------------------
// Read options
// ---------------------------------------------------------------------------

/// Candidate names for each required column; the first one present wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub wavelength: Vec<String>,
    pub flux: Vec<String>,
    pub error: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        let names = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            wavelength: names(&["wavelength", "wave"]),
            flux: names(&["flux_density", "flux"]),
            error: names(&["error", "sigma", "err"]),
        }
    }
}

/// Turns a raw header value into a record key: trim, keep the first
/// `width` characters, trim again. `width == 0` keeps everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyNormalizer {
    pub width: usize,
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self { width: 9 }
    }
}

impl KeyNormalizer {
    pub fn normalize(&self, raw: &str) -> String {
        let raw = raw.trim();
        if self.width == 0 {
            return raw.to_string();
        }
        raw.chars()
            .take(self.width)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub columns: ColumnNames,
    /// Header keyword holding the object identifier.
    pub id_keyword: String,
    pub key: KeyNormalizer,
    /// Sort samples by wavelength instead of rejecting unsorted input.
    pub sort_wavelength: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            id_keyword: "AORKEY".to_string(),
            key: KeyNormalizer::default(),
            sort_wavelength: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader plumbing
// ---------------------------------------------------------------------------

/// One input table format.
pub trait SpectrumReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower-case file extensions this reader claims.
    fn extensions(&self) -> &'static [&'static str];

    /// Content check used when the extension is unknown.
    fn sniff(&self, _first_line: &str) -> bool {
        false
    }

    fn read(&self, path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord>;
}

/// Ordered set of readers. Dispatch is by extension first, then by the
/// first line of content.
pub struct ReaderRegistry {
    readers: Vec<Box<dyn SpectrumReader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::empty()
            .with(IpacReader)
            .with(DelimitedReader)
            .with(ParquetReader)
    }
}

impl ReaderRegistry {
    pub fn empty() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    pub fn with(mut self, reader: impl SpectrumReader + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    /// Every extension any reader claims.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.readers
            .iter()
            .flat_map(|r| r.extensions().iter().copied())
            .collect()
    }

    pub fn select(&self, path: &Path) -> Result<&dyn SpectrumReader> {
        let ext = extension(path);
        if let Some(reader) = self
            .readers
            .iter()
            .find(|r| r.extensions().contains(&ext.as_str()))
        {
            return Ok(reader.as_ref());
        }

        let first_line = first_line(path)?;
        self.readers
            .iter()
            .find(|r| r.sniff(&first_line))
            .map(|r| r.as_ref())
            .ok_or_else(|| SpectrumError::UnsupportedFormat(format!("{}", path.display())))
    }

    pub fn load(&self, path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord> {
        let reader = self.select(path)?;
        debug!("reading {} as {}", path.display(), reader.name());
        reader.read(path, opts)
    }
}

/// Load a spectrum with the default readers.
pub fn load_spectrum(path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord> {
    ReaderRegistry::default().load(path, opts)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// First non-empty line, or "" for binary content.
fn first_line(path: &Path) -> Result<String> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => return Ok(line),
            Err(_) => break,
        }
    }
    Ok(String::new())
}

/// Resolve the first candidate accepted by `has`.
fn pick<'a>(candidates: &'a [String], has: impl Fn(&str) -> bool) -> Result<&'a str> {
    candidates
        .iter()
        .map(String::as_str)
        .find(|c| has(c))
        .ok_or_else(|| SpectrumError::SchemaMismatch {
            column: candidates.first().cloned().unwrap_or_default(),
        })
}

/// Drop incomplete rows, then build the record.
fn assemble(
    path: &Path,
    id: String,
    wavelength: Vec<Option<f64>>,
    flux: Vec<Option<f64>>,
    error: Vec<Option<f64>>,
    metadata: BTreeMap<String, MetadataValue>,
    opts: &ReadOptions,
) -> Result<SpectrumRecord> {
    let total = wavelength.len();
    let mut w = Vec::with_capacity(total);
    let mut f = Vec::with_capacity(total);
    let mut e = Vec::with_capacity(total);
    for ((wv, fv), ev) in wavelength.into_iter().zip(flux).zip(error) {
        if let (Some(wv), Some(fv), Some(ev)) = (wv, fv, ev) {
            if wv.is_finite() && fv.is_finite() && ev.is_finite() {
                w.push(wv);
                f.push(fv);
                e.push(ev);
            }
        }
    }
    let dropped = total - w.len();
    if dropped > 0 {
        warn!(
            "{}: dropped {dropped} of {total} rows with null or non-finite values",
            path.display()
        );
    }

    let record = if opts.sort_wavelength {
        SpectrumRecord::from_unsorted(id, w, f, e)?
    } else {
        SpectrumRecord::new(id, w, f, e)?
    };
    Ok(record.with_metadata(metadata))
}

/// Normalize a raw identifier; an empty result counts as missing.
fn record_id(raw: &str, opts: &ReadOptions) -> Result<String> {
    let id = opts.key.normalize(raw);
    if id.is_empty() {
        return Err(SpectrumError::MissingMetadata {
            keyword: opts.id_keyword.clone(),
        });
    }
    Ok(id)
}

fn stem_id(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SpectrumError::MissingMetadata {
            keyword: "file name".to_string(),
        })
}

// ---------------------------------------------------------------------------
// IPAC reader
// ---------------------------------------------------------------------------

/// IPAC tables as distributed with IRS enhanced products. The identifier
/// comes from a header keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpacReader;

impl SpectrumReader for IpacReader {
    fn name(&self) -> &'static str {
        "ipac"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tbl", "ipac"]
    }

    fn sniff(&self, first_line: &str) -> bool {
        first_line.starts_with('\\') || first_line.starts_with('|')
    }

    fn read(&self, path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord> {
        let table = IpacTable::parse(&std::fs::read_to_string(path)?)?;

        let raw_id = table
            .keyword(&opts.id_keyword)
            .ok_or_else(|| SpectrumError::MissingMetadata {
                keyword: opts.id_keyword.clone(),
            })?;
        let id = record_id(raw_id, opts)?;

        let has = |name: &str| table.column_index(name).is_some();
        let wavelength = table.float_column(pick(&opts.columns.wavelength, has)?)?;
        let flux = table.float_column(pick(&opts.columns.flux, has)?)?;
        let error = table.float_column(pick(&opts.columns.error, has)?)?;

        let metadata = table
            .keywords
            .iter()
            .map(|(k, v)| (k.clone(), MetadataValue::guess(v)))
            .collect();
        assemble(path, id, wavelength, flux, error, metadata, opts)
    }
}

// ---------------------------------------------------------------------------
// Delimited ASCII reader
// ---------------------------------------------------------------------------

/// Tab, comma or whitespace separated columns with an optional `#` header
/// row. Without a header the first three columns are wavelength, flux,
/// error. The identifier is the file stem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedReader;

/// Field rows with their 1-based line numbers.
type Rows = Vec<(usize, Vec<String>)>;

/// Tab or comma, judged from the first non-blank line. `None` means runs of
/// whitespace.
fn sniff_delimiter(text: &str) -> Option<u8> {
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    if line.contains('\t') {
        Some(b'\t')
    } else if line.contains(',') {
        Some(b',')
    } else {
        None
    }
}

fn csv_rows(text: &str, delimiter: u8) -> Result<Rows> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

// csv cannot collapse repeated separators, so space-aligned files are split
// by hand.
fn whitespace_rows(text: &str) -> Rows {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.split_whitespace().map(str::to_string).collect()))
        .collect()
}

impl SpectrumReader for DelimitedReader {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ascii", "txt", "dat", "tsv"]
    }

    fn sniff(&self, first_line: &str) -> bool {
        first_line.starts_with('#')
    }

    fn read(&self, path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord> {
        let text = std::fs::read_to_string(path)?;
        let rows = match sniff_delimiter(&text) {
            Some(delimiter) => csv_rows(&text, delimiter)?,
            None => whitespace_rows(&text),
        };
        let mut rows = rows
            .into_iter()
            .filter(|(_, fields)| fields.iter().any(|f| !f.is_empty()))
            .peekable();

        let header: Vec<String> = match rows.peek() {
            Some((_, fields)) if fields[0].starts_with('#') => {
                let names = fields
                    .iter()
                    .map(|f| f.trim_start_matches('#').trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
                rows.next();
                names
            }
            _ => vec!["wavelength".into(), "flux".into(), "error".into()],
        };

        let has = |name: &str| header.iter().any(|h| h == name);
        let index_of = |name: &str| header.iter().position(|h| h == name).unwrap_or(0);
        let wi = index_of(pick(&opts.columns.wavelength, has)?);
        let fi = index_of(pick(&opts.columns.flux, has)?);
        let ei = index_of(pick(&opts.columns.error, has)?);

        let mut wavelength = Vec::new();
        let mut flux = Vec::new();
        let mut error = Vec::new();
        for (line, fields) in rows {
            if fields[0].starts_with('#') {
                continue;
            }
            let value = |i: usize| -> Result<Option<f64>> {
                let Some(tok) = fields.get(i).filter(|t| !t.is_empty()) else {
                    return Ok(None);
                };
                tok.parse::<f64>().map(Some).map_err(|e| {
                    SpectrumError::parse(format!("line {line}"), format!("'{tok}': {e}"))
                })
            };
            wavelength.push(value(wi)?);
            flux.push(value(fi)?);
            error.push(value(ei)?);
        }

        assemble(
            path,
            stem_id(path)?,
            wavelength,
            flux,
            error,
            BTreeMap::new(),
            opts,
        )
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Flat Parquet tables with one float column per quantity. The identifier
/// comes from the Arrow schema metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetReader;

pub const OBJECT_ID_KEY: &str = "object_id";

impl SpectrumReader for ParquetReader {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["parquet", "pq"]
    }

    fn read(&self, path: &Path, opts: &ReadOptions) -> Result<SpectrumRecord> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();

        let schema_meta = schema.metadata();
        let raw_id = schema_meta
            .get(&opts.id_keyword)
            .or_else(|| schema_meta.get(OBJECT_ID_KEY))
            .ok_or_else(|| SpectrumError::MissingMetadata {
                keyword: opts.id_keyword.clone(),
            })?;
        let id = record_id(raw_id, opts)?;

        let has = |name: &str| schema.index_of(name).is_ok();
        let wi = schema.index_of(pick(&opts.columns.wavelength, has)?)?;
        let fi = schema.index_of(pick(&opts.columns.flux, has)?)?;
        let ei = schema.index_of(pick(&opts.columns.error, has)?)?;

        let mut wavelength = Vec::new();
        let mut flux = Vec::new();
        let mut error = Vec::new();
        for batch in builder.build()? {
            let batch = batch?;
            extend_f64(&mut wavelength, batch.column(wi))?;
            extend_f64(&mut flux, batch.column(fi))?;
            extend_f64(&mut error, batch.column(ei))?;
        }

        let metadata = schema_meta
            .iter()
            .filter(|(k, _)| !k.starts_with("ARROW:"))
            .map(|(k, v)| (k.clone(), MetadataValue::guess(v)))
            .collect();
        assemble(path, id, wavelength, flux, error, metadata, opts)
    }
}

/// Append a Float64 or Float32 column, keeping nulls as `None`.
fn extend_f64(out: &mut Vec<Option<f64>>, col: &Arc<dyn Array>) -> Result<()> {
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        out.extend(arr.iter());
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        out.extend(arr.iter().map(|v| v.map(f64::from)));
    } else {
        return Err(SpectrumError::parse(
            "parquet column",
            format!("expected Float64 or Float32, got {:?}", col.data_type()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TBL: &str = "\
\\char AORKEY = '  123456789012'
\\char OBJECT = 'NGC 1068'
|wavelength|flux_density|error |
|double    |double      |double|
|micron    |Jy          |Jy    |
       5.0          1.0    0.1
       6.0          2.0    0.1
       7.0          null   0.1
       8.0          4.0    0.2
";

    #[test]
    fn key_normalizer_truncates_and_trims() {
        let key = KeyNormalizer::default();
        assert_eq!(key.normalize("  123456789012"), "123456789");
        assert_eq!(key.normalize("1234 "), "1234");
        assert_eq!(key.normalize("12345678 X"), "12345678");
        assert_eq!(KeyNormalizer { width: 0 }.normalize(" abc def "), "abc def");
    }

    #[test]
    fn ipac_reader_drops_null_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPITZER_S5_spec.tbl");
        fs::write(&path, TBL).unwrap();

        let record = load_spectrum(&path, &ReadOptions::default()).unwrap();
        assert_eq!(record.id(), "123456789");
        assert_eq!(record.wavelength(), &[5.0, 6.0, 8.0]);
        assert_eq!(record.flux(), &[1.0, 2.0, 4.0]);
        assert_eq!(
            record.metadata().get("OBJECT"),
            Some(&MetadataValue::String("NGC 1068".into()))
        );
    }

    #[test]
    fn ipac_reader_requires_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.tbl");
        fs::write(&path, TBL.replace("AORKEY", "OTHER")).unwrap();
        let err = load_spectrum(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, SpectrumError::MissingMetadata { keyword } if keyword == "AORKEY"));
    }

    #[test]
    fn ipac_reader_reports_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.tbl");
        fs::write(&path, TBL.replace("flux_density", "f_nu        ")).unwrap();
        let err = load_spectrum(&path, &ReadOptions::default()).unwrap_err();
        assert!(
            matches!(err, SpectrumError::SchemaMismatch { column } if column == "flux_density")
        );
    }

    #[test]
    fn unsorted_input_rejected_unless_opted_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.txt");
        fs::write(&path, "#wavelength flux sigma\n2 20 1\n1 10 1\n3 30 1\n").unwrap();

        let err = load_spectrum(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, SpectrumError::NonMonotonicWavelength { index: 1 }));

        let opts = ReadOptions {
            sort_wavelength: true,
            ..Default::default()
        };
        let record = load_spectrum(&path, &opts).unwrap();
        assert_eq!(record.id(), "obj");
        assert_eq!(record.flux(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn unknown_extension_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectrum.out");
        fs::write(&path, TBL).unwrap();
        let registry = ReaderRegistry::default();
        assert_eq!(registry.select(&path).unwrap().name(), "ipac");

        let bogus = dir.path().join("notes.md");
        fs::write(&bogus, "hello\n").unwrap();
        assert!(matches!(
            registry.select(&bogus),
            Err(SpectrumError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn delimited_reader_handles_tab_and_comma() {
        let dir = tempfile::tempdir().unwrap();
        let tab = dir.path().join("tab.ascii");
        fs::write(&tab, "#wave\tflux\terror\n1\t10\t0.5\n2\t\t0.5\n3\t30\t0.5\n").unwrap();
        let record = load_spectrum(&tab, &ReadOptions::default()).unwrap();
        assert_eq!(record.wavelength(), &[1.0, 3.0]);
        assert_eq!(record.flux(), &[10.0, 30.0]);

        let comma = dir.path().join("comma.dat");
        fs::write(&comma, "# flux, wavelength, sigma\n10, 1, 0.1\n20, 2, 0.2\n").unwrap();
        let record = load_spectrum(&comma, &ReadOptions::default()).unwrap();
        assert_eq!(record.id(), "comma");
        assert_eq!(record.wavelength(), &[1.0, 2.0]);
        assert_eq!(record.error(), &[0.1, 0.2]);

        let bad = dir.path().join("bad.dat");
        fs::write(&bad, "1,10,0.1\n2,x,0.1\n").unwrap();
        let err = load_spectrum(&bad, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, SpectrumError::Parse { context, .. } if context == "line 2"));
    }

    #[test]
    fn parquet_reader_rejects_blank_identifier() {
        use crate::data::model::ResampledSpectrum;
        use crate::data::writer::{store, OutputFormat, WriteMode};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.parquet");
        let blank =
            ResampledSpectrum::new("   ".into(), vec![1.0, 2.0], vec![1.0, 2.0], vec![0.1; 2]);
        store(&path, &blank, OutputFormat::Parquet, WriteMode::CreateNew).unwrap();

        let err = load_spectrum(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, SpectrumError::MissingMetadata { .. }));
    }
}
