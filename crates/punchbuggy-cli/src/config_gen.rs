use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use punchbuggy_core::config;

pub(crate) fn run_config_generate(dest: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match dest {
        Some(d) => PathBuf::from(config::expand_tilde(d)),
        None => {
            let choices = config::default_config_search_paths();
            choose_location(&choices, &mut io::stdin().lock(), &mut io::stderr())?
        }
    };
    write_template(&path)?;
    println!("Config written to: {}", path.display());
    println!("Edit it to choose where backups and exports are kept.");
    Ok(())
}

/// Write the starter template, never replacing an existing file.
fn write_template(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!("file already exists: {}", path.display()).into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config::minimal_config_template())?;
    Ok(())
}

fn choose_location(
    choices: &[(PathBuf, &'static str)],
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    writeln!(output, "Where should the config file live?")?;
    for (i, (path, level)) in choices.iter().enumerate() {
        writeln!(output, "  [{}] {} ({level})", i + 1, path.display())?;
    }
    write!(output, "Choice [1]: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    let index = if answer.is_empty() {
        0
    } else {
        answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| format!("invalid choice: '{answer}'"))?
    };
    choices
        .get(index)
        .map(|(path, _)| path.clone())
        .ok_or_else(|| format!("choice out of range: {}", index + 1).into())
}
