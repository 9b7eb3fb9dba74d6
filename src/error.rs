//! Crate-wide error type and the `err_at!` construction macro.
//!
//! Every fallible path returns a named variant stamped with the call
//! site, so a log line or a `Debug` print always says *where* the
//! failure originated, not just *what* it was.
//!
//! Contention retries (CAS failures on an index slot or a bucket's
//! `col_map`) are never surfaced through `Error` — they are handled by
//! internal retry loops in `store`.

use std::{fmt, result};

/// Result alias used by every fallible operation in this crate.
pub type Result<T> = result::Result<T, Error>;

/// Error variants surfaced by the HTrie engine.
#[derive(Debug)]
pub enum Error {
    /// The allocator returned no block for a bucket, index-node, or
    /// data-payload request. Any data allocated earlier in the same
    /// operation has already been rolled back.
    OutOfMemory(String),
    /// Burst would need to consume key bits beyond the word width;
    /// the key space is exhausted at the current depth.
    KeySpaceExhausted(String),
    /// Rejected at `open`: a `Config` value failed validation.
    InvalidConfig(String),
    /// Caller passed a value `open`/`insert`/`extend_rec` cannot accept,
    /// e.g. a zero-length record body.
    InvalidInput(String),
    /// A structural invariant of the trie did not hold; if this is
    /// ever returned, it indicates a bug in the engine, not caller misuse.
    Fatal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OutOfMemory(msg) => write!(f, "out-of-memory: {}", msg),
            Error::KeySpaceExhausted(msg) => write!(f, "key-space exhausted: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Build an `Err(Error::Variant(..))` with a formatted message, stamped
/// with the file/line of the call site. Two forms:
///
/// `err_at!(OutOfMemory, msg: "need {} bytes", n)` formats a message.
/// `err_at!(OutOfMemory, some_result)` forwards an inner `Result`,
/// wrapping its error with file/line context.
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let msg = format!($($arg),+);
        Err($crate::error::Error::$v(format!("{}:{} {}", file!(), line!(), msg)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => Err($crate::error::Error::$v(format!(
                "{}:{} {}",
                file!(),
                line!(),
                err
            ))),
        }
    }};
}
