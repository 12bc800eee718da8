use thiserror::Error;

use crate::{
    diagnostics::MessageCategory,
    metadata::token::{TableId, Token},
};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into three groups:
///
/// ## Graph Construction Errors
/// - [`Error::Malformed`] - The entity graph handed to the builder is structurally inconsistent
/// - [`Error::DuplicateToken`] - Two rows were registered under the same token
/// - [`Error::EntityNotFound`] - A referenced graph token does not exist
/// - [`Error::WrongEntityKind`] - A reference points at an entity of the wrong table
///
/// ## Contract Violations
/// - [`Error::InvalidMessageCode`] - A diagnostic was constructed with a code outside its category range
///
/// ## Engine Defects
/// - [`Error::DanglingReference`] - Sweep found a surviving entity referencing a removed one
///
/// Directive resolution failures are deliberately **not** part of this enum: they are
/// recoverable, reported through the diagnostics sink, and modelled by
/// [`crate::linker::ResolutionError`].
///
/// # Examples
///
/// ```rust
/// use dottrim::{diagnostics::Message, Error};
///
/// match Message::error("bad", 500, "", None) {
///     Err(Error::InvalidMessageCode { code, .. }) => assert_eq!(code, 500),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The entity graph is damaged and could not be frozen.
    ///
    /// Raised by the graph builder when rows contradict each other, e.g. a method listed
    /// by two declaring types. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A row was registered twice under the same token.
    #[error("Duplicate entity token - {0}")]
    DuplicateToken(Token),

    /// A token that should name an entity of the graph does not.
    #[error("Failed to find entity in graph - {0}")]
    EntityNotFound(Token),

    /// A reference names an entity of a different table than required.
    #[error("Token {token} does not reference a {expected} entity")]
    WrongEntityKind {
        /// The offending token
        token: Token,
        /// The table the reference was required to point into
        expected: TableId,
    },

    /// A diagnostic message was constructed with a code outside its category's range.
    ///
    /// Errors use `[1000, 2000]`, warnings use `(2000, 6000]`. This is a programming
    /// contract violation on the caller's side; the value is never clamped.
    #[error("The provided code '{code}' does not fall into the {category} category, which is in the range of {range}")]
    InvalidMessageCode {
        /// Category the caller attempted to create
        category: MessageCategory,
        /// The rejected code
        code: u32,
        /// Human readable description of the valid range
        range: &'static str,
    },

    /// Sweep found a surviving entity that references a removed one.
    ///
    /// This indicates a defect in the marking engine: every dependency of a marked
    /// entity must itself be marked. The sweep is aborted rather than producing an
    /// inconsistent graph.
    #[error("Surviving entity {from} references removed entity {to}")]
    DanglingReference {
        /// The surviving entity holding the reference
        from: Token,
        /// The removed entity it points at
        to: Token,
    },
}
