use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use log::{debug, warn};
use std::{fs, io::Cursor, path::Path};

/// File extensions offered by the interactive file prompt.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

const SNIFF_SAMPLE_BYTES: usize = 1024;
const DELIMITER_CANDIDATES: [char; 3] = [',', '\t', ';'];
const FALLBACK_DELIMITER: u8 = b',';

/// One parsed row of the import file. `datasets` holds the comma-separated
/// names from the `dataset` cell, trimmed, de-duplicated and with empties
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: u64,
    pub groups: String,
    pub project: String,
    pub datasets: Vec<String>,
}

/// Lazy row source over a delimited text file.
///
/// The whole file is decoded up front (BOM-tolerant), the delimiter is
/// sniffed from the first 1024 bytes, and header names are trimmed and
/// lower-cased before use.
pub struct RowReader {
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    groups_index: Option<usize>,
    project_index: Option<usize>,
    dataset_index: Option<usize>,
}

impl RowReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(&path)
            .with_context(|| format!("Could not read `{}`", path.as_ref().display()))?;
        let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(&bytes);
        if had_errors {
            warn!(
                "`{}` contains byte sequences that are not valid {}; they were replaced",
                path.as_ref().display(),
                encoding.name()
            );
        }
        Self::from_text(&text)
    }

    pub(crate) fn from_text(text: &str) -> Result<Self> {
        let delimiter = detect_delimiter(text).unwrap_or(FALLBACK_DELIMITER);
        debug!("Using delimiter {:?}", delimiter as char);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(Cursor::new(text.as_bytes().to_vec()));

        let headers: Vec<String> = reader
            .headers()
            .context("Could not read the header row")?
            .iter()
            .map(|header| header.trim().to_lowercase())
            .collect();
        debug!("Normalized headers: {headers:?}");
        let position = |name: &str| headers.iter().position(|header| header == name);

        Ok(Self {
            groups_index: position("groups"),
            project_index: position("project"),
            dataset_index: position("dataset"),
            records: reader.into_records(),
        })
    }
}

impl Iterator for RowReader {
    type Item = Result<ImportRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(error) => {
                    return Some(Err(error).context("Failed to read a row from the input file"))
                }
            };
            let line = record.position().map_or(0, |position| position.line());

            if record.iter().all(str::is_empty) {
                continue;
            }

            let groups = match self.groups_index.and_then(|index| record.get(index)) {
                Some(value) => value.trim().to_owned(),
                None => {
                    warn!("Row at line {line} has no `groups` field, skipping");
                    continue;
                }
            };

            let project = match self.project_index.and_then(|index| record.get(index)) {
                Some(value) => value.trim().to_owned(),
                None => {
                    return Some(Err(anyhow!("Row at line {line} has no `project` field")));
                }
            };

            let datasets = match self.dataset_index.and_then(|index| record.get(index)) {
                Some(value) => value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unique()
                    .map(str::to_owned)
                    .collect(),
                None => {
                    return Some(Err(anyhow!("Row at line {line} has no `dataset` field")));
                }
            };

            return Some(Ok(ImportRow {
                line,
                groups,
                project,
                datasets,
            }));
        }
    }
}

/// Pick the delimiter that splits the sampled lines into a consistent number
/// of fields. Ambiguous samples return `None` and the caller falls back to
/// comma parsing.
fn detect_delimiter(text: &str) -> Option<u8> {
    let sample = sample_of(text);
    let truncated = sample.len() < text.len();

    let mut lines: Vec<&str> = sample.lines().collect();
    // The sample may end mid-line; only count complete lines.
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    lines.retain(|line| !line.is_empty());
    if lines.is_empty() {
        return None;
    }

    DELIMITER_CANDIDATES
        .iter()
        .filter_map(|&candidate| {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| line.matches(candidate).count())
                .collect();
            let first = counts[0];
            (first > 0 && counts.iter().all(|&count| count == first))
                .then_some((candidate as u8, first))
        })
        .max_by_key(|&(_, count)| count)
        .map(|(delimiter, _)| delimiter)
}

fn sample_of(text: &str) -> &str {
    if text.len() <= SNIFF_SAMPLE_BYTES {
        return text;
    }
    let mut end = SNIFF_SAMPLE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
