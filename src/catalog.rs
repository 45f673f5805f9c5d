use std::path::Path;

use anyhow::Context;
use log::debug;

use crate::data::model::TargetRecord;
use crate::error::{Result, SpectrumError};

/// Single-value redshift resolution for a record key.
///
/// Implementations must return exactly one redshift or fail; a list of
/// candidates is never handed to the transform.
pub trait RedshiftSource: Send + Sync {
    fn resolve_redshift(&self, key: &str) -> Result<f64>;
}

/// Same redshift for every key. `FixedRedshift(0.0)` leaves spectra in the
/// observed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRedshift(pub f64);

impl RedshiftSource for FixedRedshift {
    fn resolve_redshift(&self, _key: &str) -> Result<f64> {
        Ok(self.0)
    }
}

/// In-memory target list loaded from CSV or JSON.
#[derive(Debug, Clone, Default)]
pub struct TargetCatalog {
    targets: Vec<TargetRecord>,
}

impl TargetCatalog {
    pub fn new(targets: Vec<TargetRecord>) -> Self {
        Self { targets }
    }

    /// Load a catalog. Dispatch by extension: `.json` is an array of
    /// `{key, name, z}` objects, everything else is CSV with a
    /// `key,name,z` header.
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let catalog = match ext.as_str() {
            "json" => Self::from_json(&std::fs::read_to_string(path)?)?,
            _ => Self::from_csv_reader(std::fs::File::open(path)?)?,
        };
        debug!("loaded {} catalog targets from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);
        let targets = reader
            .deserialize()
            .collect::<std::result::Result<Vec<TargetRecord>, _>>()?;
        Ok(Self::new(targets))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    /// All entries whose trimmed key equals `key`.
    pub fn matches<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a TargetRecord> + 'a {
        let key = key.trim();
        self.targets.iter().filter(move |t| t.key.trim() == key)
    }
}

impl RedshiftSource for TargetCatalog {
    fn resolve_redshift(&self, key: &str) -> Result<f64> {
        let mut found = self.matches(key);
        match (found.next(), found.next()) {
            (Some(target), None) => Ok(target.z),
            (None, _) => Err(SpectrumError::RedshiftLookup {
                key: key.to_string(),
            }),
            (Some(_), Some(_)) => Err(SpectrumError::AmbiguousRedshift {
                key: key.to_string(),
                matches: 2 + found.count(),
            }),
        }
    }
}

/// Either a catalog file or a fixed redshift, as configured.
pub fn open_source(
    catalog: Option<&Path>,
    fixed: Option<f64>,
) -> anyhow::Result<Box<dyn RedshiftSource>> {
    match (catalog, fixed) {
        (Some(_), Some(_)) => anyhow::bail!("--catalog and --redshift are mutually exclusive"),
        (Some(path), None) => {
            let catalog = TargetCatalog::load(path)
                .with_context(|| format!("loading catalog {}", path.display()))?;
            Ok(Box::new(catalog))
        }
        (None, z) => Ok(Box::new(FixedRedshift(z.unwrap_or(0.0)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
# key, name, z
key,name,z
12345678, NGC 1068, 0.00379
87654321, Arp 220, 0.0181
55555555, dup-a, 0.1
55555555, dup-b, 0.1
";

    #[test]
    fn resolves_single_match() {
        let cat = TargetCatalog::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(cat.len(), 4);
        assert_eq!(cat.resolve_redshift("87654321").unwrap(), 0.0181);
        assert_eq!(cat.resolve_redshift(" 12345678 ").unwrap(), 0.00379);
    }

    #[test]
    fn missing_key_is_lookup_error() {
        let cat = TargetCatalog::from_csv_reader(CSV.as_bytes()).unwrap();
        let err = cat.resolve_redshift("00000000").unwrap_err();
        assert!(matches!(err, SpectrumError::RedshiftLookup { .. }));
    }

    #[test]
    fn duplicate_key_is_ambiguous_even_when_equal() {
        let cat = TargetCatalog::from_csv_reader(CSV.as_bytes()).unwrap();
        let err = cat.resolve_redshift("55555555").unwrap_err();
        assert!(matches!(err, SpectrumError::AmbiguousRedshift { matches: 2, .. }));
    }

    #[test]
    fn json_accepts_redshift_alias() {
        let cat = TargetCatalog::from_json(r#"[{"key": "1", "name": "a", "redshift": 0.5}]"#)
            .unwrap();
        assert_eq!(cat.resolve_redshift("1").unwrap(), 0.5);
    }

    #[test]
    fn fixed_source_ignores_key() {
        assert_eq!(FixedRedshift(0.2).resolve_redshift("x").unwrap(), 0.2);
    }

    #[test]
    fn open_source_rejects_both() {
        assert!(open_source(Some(Path::new("c.csv")), Some(0.1)).is_err());
    }
}
