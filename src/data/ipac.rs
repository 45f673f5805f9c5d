use std::fmt::Write as _;

use crate::error::{Result, SpectrumError};

// ---------------------------------------------------------------------------
// IPAC ASCII tables
// ---------------------------------------------------------------------------
//
//   \AORKEY = '12345678'
//   \ free-form comment
//   |wavelength|flux_density|error |
//   |double    |double      |double|
//   |micron    |Jy          |Jy    |
//     5.2101     0.0123      0.0004
//
// Keyword lines start with `\`; a `\` followed by a blank is a comment.
// Up to four `|` header rows follow: names, types, units, nulls. Data rows
// are fixed width, each column spanning the characters between two pipes.

/// One column header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IpacColumn {
    pub name: String,
    pub dtype: Option<String>,
    pub unit: Option<String>,
    pub null: Option<String>,
}

impl IpacColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn typed(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Parsed table: keywords, column headers and raw cell text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IpacTable {
    pub keywords: Vec<(String, String)>,
    pub columns: Vec<IpacColumn>,
    pub rows: Vec<Vec<String>>,
}

impl IpacTable {
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = IpacTable::default();
        let mut header: Vec<Vec<String>> = Vec::new();
        let mut pipes: Vec<usize> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(body) = line.strip_prefix('\\') {
                if header.is_empty() {
                    if let Some(kw) = parse_keyword(body) {
                        table.keywords.push(kw);
                    }
                }
                continue;
            }
            if line.starts_with('|') && table.rows.is_empty() {
                let (positions, cells) = split_header(line).ok_or_else(|| {
                    SpectrumError::parse(format!("line {lineno}"), "malformed column header")
                })?;
                if header.is_empty() {
                    pipes = positions;
                } else if cells.len() != pipes.len() - 1 {
                    return Err(SpectrumError::parse(
                        format!("line {lineno}"),
                        format!("expected {} header cells, found {}", pipes.len() - 1, cells.len()),
                    ));
                }
                if header.len() == 4 {
                    return Err(SpectrumError::parse(
                        format!("line {lineno}"),
                        "more than four header rows",
                    ));
                }
                header.push(cells);
                continue;
            }
            if header.is_empty() {
                return Err(SpectrumError::parse(
                    format!("line {lineno}"),
                    "data row before column header",
                ));
            }
            let ncols = pipes.len() - 1;
            let row = split_fixed(line, &pipes)
                .or_else(|| {
                    let tokens: Vec<String> =
                        line.split_whitespace().map(str::to_string).collect();
                    (tokens.len() == ncols).then_some(tokens)
                })
                .ok_or_else(|| {
                    SpectrumError::parse(
                        format!("line {lineno}"),
                        format!("expected {ncols} cells"),
                    )
                })?;
            table.rows.push(row);
        }

        let Some(names) = header.first() else {
            return Err(SpectrumError::parse("header", "no column header found"));
        };
        table.columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| IpacColumn {
                name: name.clone(),
                dtype: header_cell(&header, 1, i),
                unit: header_cell(&header, 2, i),
                null: header_cell(&header, 3, i),
            })
            .collect();
        Ok(table)
    }

    /// Keyword value, matched case-insensitively.
    pub fn keyword(&self, name: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell text, or `None` for blanks and null markers.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        let text = self.rows.get(row)?.get(col)?.as_str();
        let null = self.columns.get(col).and_then(|c| c.null.as_deref());
        if text.is_empty() || Some(text) == null || text.eq_ignore_ascii_case("null") {
            None
        } else {
            Some(text)
        }
    }

    pub fn string_column(&self, name: &str) -> Result<Vec<Option<String>>> {
        let col = self.require(name)?;
        Ok((0..self.rows.len())
            .map(|row| self.cell(row, col).map(str::to_string))
            .collect())
    }

    pub fn float_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.require(name)?;
        (0..self.rows.len())
            .map(|row| {
                self.cell(row, col)
                    .map(|text| {
                        text.parse::<f64>().map_err(|e| {
                            SpectrumError::parse(
                                format!("row {row}, column '{name}'"),
                                format!("'{text}': {e}"),
                            )
                        })
                    })
                    .transpose()
            })
            .collect()
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SpectrumError::SchemaMismatch {
                column: name.to_string(),
            })
    }

    /// Render with column widths fitted to the widest cell.
    pub fn render(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let header = [Some(&c.name), c.dtype.as_ref(), c.unit.as_ref(), c.null.as_ref()]
                    .into_iter()
                    .flatten()
                    .map(String::len)
                    .max()
                    .unwrap_or(0);
                let cells = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(String::len)
                    .max()
                    .unwrap_or(0);
                header.max(cells)
            })
            .collect();

        let mut out = String::new();
        for (key, value) in &self.keywords {
            let _ = writeln!(out, "\\{key} = '{value}'");
        }

        push_header_row(&mut out, &self.columns, &widths, |c| Some(c.name.as_str()));
        if self.columns.iter().any(|c| c.dtype.is_some()) {
            push_header_row(&mut out, &self.columns, &widths, |c| c.dtype.as_deref());
        }
        if self.columns.iter().any(|c| c.unit.is_some()) {
            push_header_row(&mut out, &self.columns, &widths, |c| c.unit.as_deref());
        }
        if self.columns.iter().any(|c| c.null.is_some()) {
            push_header_row(&mut out, &self.columns, &widths, |c| c.null.as_deref());
        }

        for row in &self.rows {
            for (cell, w) in row.iter().zip(&widths) {
                let _ = write!(out, " {:>w$}", cell, w = *w);
            }
            out.push_str(" \n");
        }
        out
    }
}

fn push_header_row(
    out: &mut String,
    columns: &[IpacColumn],
    widths: &[usize],
    pick: impl Fn(&IpacColumn) -> Option<&str>,
) {
    out.push('|');
    for (c, w) in columns.iter().zip(widths) {
        let _ = write!(out, "{:<w$}|", pick(c).unwrap_or(""), w = *w);
    }
    out.push('\n');
}

/// `KEY = value`, with an optional type word before the key
/// (`char AORKEY = 123`). Quotes around the value are removed.
fn parse_keyword(body: &str) -> Option<(String, String)> {
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    let (lhs, rhs) = body.split_once('=')?;
    let key = lhs.split_whitespace().last()?;
    Some((key.to_string(), unquote(rhs.trim()).trim().to_string()))
}

fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn split_header(line: &str) -> Option<(Vec<usize>, Vec<String>)> {
    let positions: Vec<usize> = line
        .char_indices()
        .filter(|&(_, c)| c == '|')
        .map(|(i, _)| i)
        .collect();
    if positions.len() < 2 {
        return None;
    }
    let cells = positions
        .windows(2)
        .map(|w| line[w[0] + 1..w[1]].trim().to_string())
        .collect();
    Some((positions, cells))
}

/// Slice a data row at the header's pipe positions. Returns `None` when a
/// value straddles a column boundary or a boundary falls inside a
/// multi-byte character, i.e. the row is not aligned to the header.
fn split_fixed(line: &str, pipes: &[usize]) -> Option<Vec<String>> {
    let ncols = pipes.len() - 1;
    let bytes = line.as_bytes();
    let occupied = |at: usize| bytes.get(at).is_some_and(|b| !b.is_ascii_whitespace());
    if pipes[1..ncols].iter().any(|&p| occupied(p - 1) && occupied(p)) {
        return None;
    }
    let mut cells = Vec::with_capacity(ncols);
    for i in 0..ncols {
        let start = pipes[i].min(line.len());
        let end = if i + 1 == ncols {
            line.len()
        } else {
            pipes[i + 1].min(line.len())
        };
        cells.push(line.get(start..end.max(start))?.trim().to_string());
    }
    Some(cells)
}

fn header_cell(header: &[Vec<String>], row: usize, col: usize) -> Option<String> {
    header
        .get(row)
        .and_then(|cells| cells.get(col))
        .filter(|s| !s.is_empty())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPITZER: &str = "\
\\char AORKEY = '12345678  extra'
\\ generated by the enhanced pipeline
\\fixlen = T
|wavelength|flux_density|error |
|double    |double      |double|
|micron    |Jy          |Jy    |
|null      |null        |null  |
    5.2101       0.0123 0.0004
    5.2700         null 0.0004
    5.3300       0.0150 0.0005
";

    #[test]
    fn parses_keywords_and_header_rows() {
        let table = IpacTable::parse(SPITZER).unwrap();
        assert_eq!(table.keyword("aorkey"), Some("12345678  extra"));
        assert_eq!(table.keyword("fixlen"), Some("T"));
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[1].name, "flux_density");
        assert_eq!(table.columns[1].unit.as_deref(), Some("Jy"));
        assert_eq!(table.columns[0].dtype.as_deref(), Some("double"));
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn null_cells_are_none() {
        let table = IpacTable::parse(SPITZER).unwrap();
        let flux = table.float_column("flux_density").unwrap();
        assert_eq!(flux, vec![Some(0.0123), None, Some(0.0150)]);
    }

    #[test]
    fn fixed_width_keeps_spaces_inside_strings() {
        let text = "\
|Name       |x_0   |amp  |
|char       |double|double|
 H2 S(3)     9.665  0.20
 [NeII]     12.814  0.05
";
        let table = IpacTable::parse(text).unwrap();
        let names = table.string_column("Name").unwrap();
        assert_eq!(names, vec![Some("H2 S(3)".into()), Some("[NeII]".into())]);
        assert_eq!(table.float_column("amp").unwrap(), vec![Some(0.20), Some(0.05)]);
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let table = IpacTable::parse(SPITZER).unwrap();
        let err = table.float_column("sigma").unwrap_err();
        assert!(matches!(err, SpectrumError::SchemaMismatch { column } if column == "sigma"));
    }

    #[test]
    fn bad_number_reports_row() {
        let text = "|a|b|\n 1 x\n";
        let table = IpacTable::parse(text).unwrap();
        let err = table.float_column("b").unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn misaligned_rows_fall_back_to_whitespace() {
        let text = "|wavelength|flux|error|\n12.5 0.0012345 0.0001\n 13.0      0.2  0.01\n";
        let table = IpacTable::parse(text).unwrap();
        assert_eq!(table.rows[0], vec!["12.5", "0.0012345", "0.0001"]);
        assert_eq!(table.float_column("flux").unwrap(), vec![Some(0.0012345), Some(0.2)]);

        // straddles a boundary and has too many tokens to split any other way
        assert!(IpacTable::parse("|a|b|\n 12 2 3\n").is_err());
    }

    #[test]
    fn data_before_header_fails() {
        assert!(IpacTable::parse("1 2 3\n|a|b|c|\n").is_err());
        assert!(IpacTable::parse("\\KEY = 1\n").is_err());
    }

    #[test]
    fn rendered_table_parses_back() {
        let table = IpacTable {
            keywords: vec![("OBJECT_ID".into(), "12345678".into())],
            columns: vec![
                IpacColumn::new("wavelength").typed("double").with_unit("micron"),
                IpacColumn::new("flux").typed("double").with_unit("Jy"),
            ],
            rows: vec![
                vec!["5.5".into(), "0.001".into()],
                vec!["10.25".into(), "-0.5".into()],
            ],
        };
        let text = table.render();
        assert!(text.starts_with("\\OBJECT_ID = '12345678'\n|wavelength|flux  |\n"));
        assert_eq!(IpacTable::parse(&text).unwrap(), table);
    }
}
