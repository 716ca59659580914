use anyhow::Result;
use clap::Command;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

/// Print the completion script for `shell` to stdout
pub fn execute(shell: Shell, cmd: &mut Command) -> Result<()> {
    let mut stdout = io::stdout().lock();
    generate(shell, cmd, "changetracker", &mut stdout);
    stdout.flush()?;
    Ok(())
}
