//! Row normalization for raw verbal-autopsy CSV exports
//!
//! The source files are wide CSVs where the narrative lives in one column
//! and the raw cause label in the last. Narratives contain commas and
//! doubled quotes, so rows are split on commas outside double quotes
//! rather than through a strict CSV parser. Bad rows are skipped with a
//! warning, never fatal.

use crate::data::category_map::CategoryMap;
use crate::data::record::{Record, RejectReason, RejectionSummary};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Column layout of the raw export. The label is always the last column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    /// Minimum number of columns a row must have
    pub min_columns: usize,
    /// Zero-based index of the narrative column
    pub text_column: usize,
}

impl Default for RowSchema {
    fn default() -> Self {
        // PHMRC export layout: narrative in column 5, cause in column 6
        Self {
            min_columns: 7,
            text_column: 5,
        }
    }
}

/// Whether rows carry a raw cause label to map, or are inference data.
#[derive(Debug, Clone, Copy)]
pub enum LabelMode<'a> {
    Labeled(&'a CategoryMap),
    Unlabeled,
}

/// Normalize one data row.
///
/// Rows with fewer than `min_columns` fields are rejected. Rows with more
/// fold the surplus back into the narrative column, comma-joined in order,
/// on the assumption that unquoted commas inside the narrative caused the
/// extra splits. The label stays the final field.
pub fn normalize_row(
    line: &str,
    schema: &RowSchema,
    mode: LabelMode<'_>,
) -> Result<Record, RejectReason> {
    let fields = split_row(line);
    if fields.len() < schema.min_columns {
        return Err(RejectReason::MalformedRow {
            found: fields.len(),
            required: schema.min_columns,
        });
    }

    let surplus = fields.len() - schema.min_columns;
    let text = clean_text(&fields[schema.text_column..=schema.text_column + surplus].join(","));

    let label = match mode {
        LabelMode::Labeled(map) => {
            let raw = canonical_label(&fields[fields.len() - 1]);
            match map.lookup(&raw) {
                Some(category) => Some(category.to_string()),
                None => return Err(RejectReason::UnmappedLabel(raw)),
            }
        }
        LabelMode::Unlabeled => None,
    };

    let raw_fields = fields.iter().map(|f| f.trim().to_string()).collect();
    Ok(Record::new(text, label, raw_fields))
}

/// Normalize a batch of data rows, skipping and counting rejects.
pub fn normalize_batch<'a, I>(
    lines: I,
    schema: &RowSchema,
    mode: LabelMode<'_>,
) -> (Vec<Record>, RejectionSummary)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut records = Vec::new();
    let mut summary = RejectionSummary::default();

    for (i, line) in lines.into_iter().enumerate() {
        match normalize_row(line, schema, mode) {
            Ok(record) => {
                summary.count_kept();
                records.push(record);
            }
            Err(reason) => {
                warn!("skipping row {}: {}", i + 1, reason);
                summary.count_rejected(&reason);
            }
        }
    }

    (records, summary)
}

/// Load and normalize a labeled CSV export. The header row must itself
/// satisfy the schema; a wrong-shaped header means a wrong file.
pub fn load_labeled(
    path: &Path,
    schema: &RowSchema,
    map: &CategoryMap,
) -> Result<(Vec<Record>, RejectionSummary)> {
    load_rows(path, schema, LabelMode::Labeled(map))
}

/// Load and normalize an unlabeled CSV export for inference.
pub fn load_unlabeled(path: &Path, schema: &RowSchema) -> Result<(Vec<Record>, RejectionSummary)> {
    load_rows(path, schema, LabelMode::Unlabeled)
}

fn load_rows(
    path: &Path,
    schema: &RowSchema,
    mode: LabelMode<'_>,
) -> Result<(Vec<Record>, RejectionSummary)> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .with_context(|| format!("{} is empty", path.display()))?
        .with_context(|| format!("failed to read header of {}", path.display()))?;
    let header_fields = split_row(&header);
    if header_fields.len() < schema.min_columns {
        anyhow::bail!(
            "header of {} has {} columns, expected at least {}",
            path.display(),
            header_fields.len(),
            schema.min_columns
        );
    }

    let mut records = Vec::new();
    let mut summary = RejectionSummary::default();
    for (i, line) in lines.enumerate() {
        let line =
            line.with_context(|| format!("failed to read {} line {}", path.display(), i + 2))?;
        match normalize_row(&line, schema, mode) {
            Ok(record) => {
                summary.count_kept();
                records.push(record);
            }
            Err(reason) => {
                warn!("skipping {} row {}: {}", path.display(), i + 2, reason);
                summary.count_rejected(&reason);
            }
        }
    }

    Ok((records, summary))
}

/// Split on commas that sit outside double quotes.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Trim, unwrap surrounding double quotes and collapse doubled quotes.
fn clean_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    inner.replace("\"\"", "\"")
}

/// Trim, strip one surrounding single or double quote, lowercase.
fn canonical_label(raw: &str) -> String {
    let mut s = raw.trim();
    s = s.strip_prefix(|c| c == '\'' || c == '"').unwrap_or(s);
    s = s.strip_suffix(|c| c == '\'' || c == '"').unwrap_or(s);
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_map() -> CategoryMap {
        CategoryMap::from_entries(vec![
            ("malaria", "Infectious"),
            ("stroke", "Circulatory"),
            ("asthma", "Respiratory"),
        ])
    }

    fn row(text: &str, label: &str) -> String {
        format!("id1,site,2021,a,b,{},{}", text, label)
    }

    #[test]
    fn test_quoted_narrative_with_commas_and_quotes() {
        let map = test_map();
        let line = row("\"fever, chills and \"\"sweating\"\"\"", "Malaria");

        let record =
            normalize_row(&line, &RowSchema::default(), LabelMode::Labeled(&map)).unwrap();
        assert_eq!(record.text, "fever, chills and \"sweating\"");
        assert_eq!(record.label.as_deref(), Some("Infectious"));
        assert_eq!(record.raw_fields.len(), 7);
    }

    #[test]
    fn test_label_canonicalisation() {
        let map = test_map();
        let line = row("cough", "'Stroke' ");

        let record =
            normalize_row(&line, &RowSchema::default(), LabelMode::Labeled(&map)).unwrap();
        assert_eq!(record.label.as_deref(), Some("Circulatory"));
    }

    #[test]
    fn test_too_few_columns_rejected() {
        let map = test_map();
        let err = normalize_row("a,b,c", &RowSchema::default(), LabelMode::Labeled(&map))
            .unwrap_err();
        assert_eq!(
            err,
            RejectReason::MalformedRow {
                found: 3,
                required: 7
            }
        );
    }

    #[test]
    fn test_unmapped_label_rejected() {
        let map = test_map();
        let line = row("fever", "hypertension");
        let err =
            normalize_row(&line, &RowSchema::default(), LabelMode::Labeled(&map)).unwrap_err();
        assert_eq!(err, RejectReason::UnmappedLabel("hypertension".to_string()));
    }

    #[test]
    fn test_surplus_columns_fold_into_text() {
        let map = test_map();
        // unquoted comma in the narrative splits it across two fields
        let line = "id1,site,2021,a,b,fever with chills, then vomiting,malaria";

        let record =
            normalize_row(line, &RowSchema::default(), LabelMode::Labeled(&map)).unwrap();
        assert_eq!(record.text, "fever with chills, then vomiting");
        assert_eq!(record.label.as_deref(), Some("Infectious"));
    }

    #[test]
    fn test_unlabeled_mode_skips_lookup() {
        let line = row("fever", "hypertension");
        let record = normalize_row(&line, &RowSchema::default(), LabelMode::Unlabeled).unwrap();
        assert_eq!(record.text, "fever");
        assert_eq!(record.label, None);
    }

    #[test]
    fn test_batch_skips_and_counts() {
        let map = test_map();
        let good1 = row("fever and chills", "malaria");
        let good2 = row("wheezing", "asthma");
        let bad_label = row("x", "unknown cause");
        let lines = vec![
            good1.as_str(),
            "short,row",
            good2.as_str(),
            bad_label.as_str(),
        ];

        let (records, summary) =
            normalize_batch(lines, &RowSchema::default(), LabelMode::Labeled(&map));

        assert_eq!(records.len(), 2);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.unmapped, 1);
        assert_eq!(records[0].text, "fever and chills");
        assert_eq!(records[1].label.as_deref(), Some("Respiratory"));
    }

    #[test]
    fn test_load_labeled_rejects_short_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,text,label").unwrap();
        writeln!(file, "{}", row("fever", "malaria")).unwrap();
        file.flush().unwrap();

        let map = test_map();
        assert!(load_labeled(file.path(), &RowSchema::default(), &map).is_err());
    }

    #[test]
    fn test_load_labeled_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,site,year,c4,c5,narrative,cause").unwrap();
        writeln!(file, "{}", row("fever and chills", "malaria")).unwrap();
        writeln!(file, "{}", row("slurred speech", "stroke")).unwrap();
        file.flush().unwrap();

        let map = test_map();
        let (records, summary) =
            load_labeled(file.path(), &RowSchema::default(), &map).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(summary.rejected(), 0);
        assert_eq!(records[1].label.as_deref(), Some("Circulatory"));
    }
}
