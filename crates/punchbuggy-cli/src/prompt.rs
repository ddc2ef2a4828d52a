use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Ask for a backup folder on stderr. Empty input or a closed stdin means the
/// user backed out.
pub(crate) fn prompt_directory() -> Option<PathBuf> {
    let stdin = io::stdin();
    match read_directory(&mut stdin.lock(), &mut io::stderr()) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "unable to read backup folder");
            None
        }
    }
}

fn read_directory(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Option<PathBuf>> {
    write!(output, "Backup folder (leave empty to cancel): ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(output)?;
        return Ok(None);
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(punchbuggy_core::config::expand_tilde(trimmed))))
}
