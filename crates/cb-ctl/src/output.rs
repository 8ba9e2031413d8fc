//! Renderers and formatting helpers.

use serde::Serialize;

use crate::client::{CliError, CliResult};

/// Print a serializable record as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(record: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(record).map_err(CliError::failure)?;
    println!("{rendered}");
    Ok(())
}

/// Print raw text on stdout without any decoration.
pub(crate) fn print_raw(content: &str) {
    println!("{content}");
}
