//! Command Line Arguments
//!
//! The binary takes exactly one positional argument: the instrument to
//! subscribe to. Anything else is a usage error, reported before any
//! configuration is read or connection attempted.

use std::ffi::OsString;

use crate::domain::subscription::Instrument;

/// Usage text shown on a usage error.
pub const USAGE: &str = "Usage: deribit-book-stream <instrument>\n\
                         Example: deribit-book-stream BTC-PERPETUAL";

/// Argument validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// Not exactly one argument.
    #[error("expected 1 argument, got {0}")]
    WrongArgumentCount(usize),

    /// The argument is not valid UTF-8.
    #[error("argument is not valid UTF-8: {0:?}")]
    NotUnicode(OsString),
}

/// Extract the instrument from the process arguments, program name
/// excluded.
///
/// # Errors
///
/// Returns an error unless exactly one argument is given and it is valid
/// UTF-8.
pub fn parse_args<I>(args: I) -> Result<Instrument, UsageError>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match args.len() {
        1 => args.remove(0).into_string().map_err(UsageError::NotUnicode),
        n => Err(UsageError::WrongArgumentCount(n)),
    }
}
