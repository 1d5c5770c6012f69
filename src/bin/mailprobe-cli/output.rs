use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
#[cfg(not(feature = "with-csv"))]
use anyhow::bail;
use mailprobe_lib::{BatchResult, Status};

use crate::args::{Cli, OutputFormat};

pub fn write_report(batch: &BatchResult, cli: &Cli) -> Result<()> {
    let bytes = render(batch, cli.format)?;
    match &cli.out {
        Some(path) => write_all_atomically(path, &bytes)
            .with_context(|| format!("write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn render(batch: &BatchResult, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Human => Ok(render_human(batch).into_bytes()),
        OutputFormat::Json => {
            let mut s = serde_json::to_string_pretty(batch)?;
            s.push('\n');
            Ok(s.into_bytes())
        }
        OutputFormat::Ndjson => {
            let mut buf = Vec::new();
            for record in &batch.results {
                serde_json::to_writer(&mut buf, record)?;
                buf.push(b'\n');
            }
            Ok(buf)
        }
        OutputFormat::Csv => render_csv(batch),
    }
}

fn render_human(batch: &BatchResult) -> String {
    let mut out = String::new();
    for record in &batch.results {
        let tag = if record.status.is_valid() { "[OK]" } else { "[--]" };
        out.push_str(&format!("{tag:<6}{:<16}{}\n", record.status.as_str(), record.email));
    }
    let counts: Vec<String> = Status::ALL
        .iter()
        .map(|status| format!("{status}={}", batch.count(*status)))
        .collect();
    out.push_str(&format!("total={} {}\n", batch.total, counts.join(" ")));
    out
}

#[cfg(feature = "with-csv")]
fn render_csv(batch: &BatchResult) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["email", "status"])?;
    for record in &batch.results {
        wtr.write_record([record.email.as_str(), record.status.as_str()])?;
    }
    Ok(wtr.into_inner()?)
}

#[cfg(not(feature = "with-csv"))]
fn render_csv(_: &BatchResult) -> Result<Vec<u8>> {
    bail!("format=csv requires the 'with-csv' feature")
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
