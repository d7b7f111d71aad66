//! CLI command implementations.

pub mod migrate;
pub mod pipeline;
pub mod profile;

use serde::Serialize;

/// Write `value` to stdout as pretty JSON.
pub fn emit<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}
