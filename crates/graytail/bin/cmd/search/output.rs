use eyre::{Result, WrapErr};
use graytail::search::SearchClient;
use graytail::{Formatter, LogMessage, SearchQuery, StreamDirectory};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub(crate) const EXPORT_FILE: &str = "export.csv";

/// Writes one formatted message followed by a newline and flushes, so
/// tail output shows up immediately.
pub(crate) fn write_message<W: Write>(
    out: &mut W,
    formatter: &Formatter,
    message: &LogMessage,
) -> Result<()> {
    writeln!(out, "{}", formatter.format(message))?;
    out.flush()?;
    Ok(())
}

pub(crate) fn print_streams(directory: &StreamDirectory) -> Result<()> {
    let mut stdout = io::stdout().lock();
    directory.to_table().print(&mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Streams a CSV export into `export.csv` in the working directory. The
/// previous `export.csv` is only replaced once the export succeeded.
pub(crate) fn export_to_file(client: &SearchClient, query: &SearchQuery) -> Result<()> {
    let path = Path::new(EXPORT_FILE);
    let mut partial = NamedTempFile::new_in(".")
        .wrap_err_with(|| format!("failed to create a temporary file for {}", EXPORT_FILE))?;

    let written = {
        let mut writer = BufWriter::new(&mut partial);
        client.export_csv(query, &mut writer)?
    };
    partial
        .persist(path)
        .wrap_err_with(|| format!("failed to write {}", EXPORT_FILE))?;
    tracing::info!(bytes = written, path = %path.display(), "export finished");
    eprintln!("Exported {} bytes to {}", written, EXPORT_FILE);
    Ok(())
}

/// True when the error comes from writing into a closed pipe, e.g. `| head`.
pub fn is_broken_pipe(error: &eyre::Report) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
