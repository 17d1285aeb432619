//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | Cells ended in an error state (only with `--strict`) |
//! | 2    | Usage error (bad arguments, unknown cell id)         |
//! | 3    | I/O error (missing file, unwritable output)          |
//! | 4    | Parse error (malformed document or settings file)    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one cell shows an error and `--strict` was given.
/// Also used when a plot cannot be sampled.
pub const EXIT_EVAL_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// Matches clap's own exit code for argument errors.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO_ERROR: u8 = 3;

/// Document or settings file is malformed.
pub const EXIT_PARSE_ERROR: u8 = 4;
