// CSV/TSV import/export of tables

use std::io::Write;
use std::path::Path;

use munimerge_recon::{PipelineError, Table};

/// Read a delimited file into a table named `name`. The first record is the
/// header; the delimiter is sniffed.
pub fn read_table(path: &Path, name: &str) -> Result<Table, PipelineError> {
    let content = read_file_as_utf8(path).map_err(|reason| unavailable(path, reason))?;
    let delimiter = sniff_delimiter(&content);
    parse(path, name, &content, delimiter)
}

fn parse(path: &Path, name: &str, content: &str, delimiter: u8) -> Result<Table, PipelineError> {
    Table::from_csv(name, content, delimiter).map_err(|e| match e {
        PipelineError::SourceUnavailable { reason, .. } => unavailable(path, reason),
        other => other,
    })
}

fn unavailable(path: &Path, reason: String) -> PipelineError {
    PipelineError::SourceUnavailable {
        source: path.display().to_string(),
        reason,
    }
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];

/// Pick the delimiter of a municipality export from its first non-blank lines.
///
/// IBGE and Receita sheets use `;` with decimal commas, older registries use
/// `,`. A candidate must split the header into several fields; among those,
/// the one whose header width repeats on the most lines wins, weighted by
/// that width. Earlier candidates win ties. Falls back to `,`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();
    let Some(header) = sample.first() else {
        return b',';
    };

    let mut chosen = (b',', 0usize);
    for delim in DELIMITERS {
        let width = field_count(header, delim);
        if width < 2 {
            continue;
        }
        let agreeing = sample.iter().filter(|line| field_count(line, delim) == width).count();
        if agreeing * width > chosen.1 {
            chosen = (delim, agreeing * width);
        }
    }
    chosen.0
}

/// Fields on one line, honoring quotes.
fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// File contents as UTF-8. Downloads from the statistics and tax portals
/// are frequently Windows-1252; bytes that are not valid UTF-8 are decoded
/// as such. A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => encoding_rs::WINDOWS_1252.decode(e.as_bytes()).0.into_owned(),
    };
    Ok(match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

pub fn write_table(table: &Table, path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_table_to(table, file)
}

/// Write header + rows as comma-separated UTF-8. Numbers use their shortest
/// round-trip form; empty cells are empty fields.
pub fn write_table_to<W: Write>(table: &Table, out: W) -> std::io::Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
