use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::args::{Cli, InputFormat};

/// Raw addresses in input order. Blank rows are skipped, everything else is
/// passed through untouched so the report echoes what the user supplied.
pub fn read_addresses(cli: &Cli) -> Result<Vec<String>> {
    let has_header = !cli.no_header;
    if cli.stdin {
        let format = match cli.input_format {
            InputFormat::Auto => InputFormat::Lines,
            other => other,
        };
        return read_from(io::stdin().lock(), format, has_header).context("read stdin");
    }

    let Some(path) = cli.input.as_deref() else {
        bail!("no input: pass a file or --stdin");
    };
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_from(
        BufReader::new(file),
        resolve_format(cli.input_format, path),
        has_header,
    )
    .with_context(|| format!("read {}", path.display()))
}

fn resolve_format(format: InputFormat, path: &Path) -> InputFormat {
    match format {
        InputFormat::Auto => {
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv {
                InputFormat::Csv
            } else {
                InputFormat::Lines
            }
        }
        other => other,
    }
}

fn read_from<R: BufRead>(reader: R, format: InputFormat, has_header: bool) -> Result<Vec<String>> {
    match format {
        InputFormat::Csv => read_csv(reader, has_header),
        InputFormat::Lines | InputFormat::Auto => read_lines(reader),
    }
}

fn read_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !is_blank(&line) {
            rows.push(line);
        }
    }
    Ok(rows)
}

/// First column of every record.
#[cfg(feature = "with-csv")]
fn read_csv<R: Read>(reader: R, has_header: bool) -> Result<Vec<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if let Some(first) = record.get(0) {
            if !is_blank(first) {
                rows.push(first.to_string());
            }
        }
    }
    Ok(rows)
}

#[cfg(not(feature = "with-csv"))]
fn read_csv<R: Read>(_reader: R, _has_header: bool) -> Result<Vec<String>> {
    bail!("CSV input requires the 'with-csv' feature")
}

fn is_blank(raw: &str) -> bool {
    mailprobe_lib::normalize_address(raw).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_skip_blank_rows() {
        let input = "a@x.com\n\n   \n\u{FEFF}\nB@Y.COM\n";
        let rows = read_from(input.as_bytes(), InputFormat::Lines, true).unwrap();
        assert_eq!(rows, vec!["a@x.com", "B@Y.COM"]);
    }

    #[cfg(feature = "with-csv")]
    #[test]
    fn csv_takes_first_column_after_header() {
        let input = "email,name\na@x.com,Alice\n,nobody\nb@y.com\n";
        let rows = read_from(input.as_bytes(), InputFormat::Csv, true).unwrap();
        assert_eq!(rows, vec!["a@x.com", "b@y.com"]);
    }

    #[cfg(feature = "with-csv")]
    #[test]
    fn csv_without_header_keeps_first_row() {
        let input = "a@x.com,1\nb@y.com,2\n";
        let rows = read_from(input.as_bytes(), InputFormat::Csv, false).unwrap();
        assert_eq!(rows, vec!["a@x.com", "b@y.com"]);
    }

    #[test]
    fn auto_picks_csv_by_extension() {
        assert_eq!(
            resolve_format(InputFormat::Auto, Path::new("list.CSV")),
            InputFormat::Csv
        );
        assert_eq!(
            resolve_format(InputFormat::Auto, Path::new("list.txt")),
            InputFormat::Lines
        );
        assert_eq!(
            resolve_format(InputFormat::Lines, Path::new("list.csv")),
            InputFormat::Lines
        );
    }
}
