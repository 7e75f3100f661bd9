//! Human-readable error reporting for the daemon binary.

use std::error::Error;
use std::io::{self, Write};

/// Writes `error` and each of its sources, one per line.
pub fn write_error_chain(writer: &mut impl Write, error: &dyn Error) -> io::Result<()> {
    writeln!(writer, "spindled: {error}")?;
    let mut source = error.source();
    while let Some(cause) = source {
        writeln!(writer, "  caused by: {cause}")?;
        source = cause.source();
    }
    Ok(())
}
