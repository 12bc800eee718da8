//! Structured diagnostic messages.
//!
//! A [`Message`] is an immutable value: its equality and hash are derived from
//! `(category, text, code, subcategory, origin)` and nothing else. Errors and warnings are
//! range checked when constructed; a code outside its category's range is a contract
//! violation on the caller's side and is rejected, never clamped.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    diagnostics::{
        codes::{ERROR_CODES, WARNING_CODES},
        suppression::SuppressionPolicy,
    },
    metadata::token::Token,
    Error, Result,
};

/// Label used in place of an origin when a message has none.
pub const DEFAULT_ORIGIN: &str = "dottrim";

/// Closed set of message categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum MessageCategory {
    /// Something went wrong; the output may be incorrect
    Error,
    /// Something looks suspicious; may be suppressed by policy
    Warning,
    /// Progress information
    Info,
    /// Verbose tracing of engine decisions
    Diagnostic,
}

#[allow(non_snake_case)]
/// Well known subcategories.
pub mod MessageSubCategory {
    /// No subcategory
    pub const NONE: &str = "";
    /// Messages produced by trim analysis
    pub const TRIM_ANALYSIS: &str = "Trim analysis";
}

/// Where a message originates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageOrigin {
    /// A position in a source or IL file
    Location {
        /// File name or path
        file: String,
        /// 1-based line
        line: Option<u32>,
        /// 1-based column; only rendered together with a line
        column: Option<u32>,
    },
    /// An entity of the graph
    Member {
        /// Token of the entity
        token: Token,
        /// Rendered name of the entity
        name: String,
    },
}

impl MessageOrigin {
    /// An origin naming a whole file.
    pub fn file(file: impl Into<String>) -> Self {
        MessageOrigin::Location {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// An origin naming a line and column of a file.
    pub fn location(file: impl Into<String>, line: u32, column: u32) -> Self {
        MessageOrigin::Location {
            file: file.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// An origin naming an entity of the graph.
    pub fn member(token: Token, name: impl Into<String>) -> Self {
        MessageOrigin::Member {
            token,
            name: name.into(),
        }
    }
}

impl fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOrigin::Location { file, line, column } => {
                write!(f, "{file}")?;
                if let Some(line) = line {
                    write!(f, ":{line}")?;
                    if let Some(column) = column {
                        write!(f, ":{column}")?;
                    }
                }
                Ok(())
            }
            MessageOrigin::Member { name, .. } => write!(f, "{name}"),
        }
    }
}

/// A diagnostic message.
///
/// The default value is the *empty* message, which every field reports as absent. It is
/// what a suppressed warning turns into, and sinks drop it silently.
///
/// # Examples
///
/// ```rust
/// use dottrim::diagnostics::{Message, MessageOrigin, MessageSubCategory, NoSuppression};
///
/// let origin = MessageOrigin::location("foo.il", 12, 3);
/// let message = Message::warning(&NoSuppression, "unused field", 2042, origin, MessageSubCategory::NONE)?;
/// assert_eq!(message.to_string(), "foo.il:12:3: warning IL2042: unused field");
/// # Ok::<(), dottrim::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Message {
    category: Option<MessageCategory>,
    text: String,
    code: Option<u32>,
    subcategory: String,
    origin: Option<MessageOrigin>,
}

impl Message {
    /// The empty message.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an error message.
    ///
    /// # Arguments
    ///
    /// * `text` - Human readable description
    /// * `code` - Error code, within `[1000, 2000]`
    /// * `subcategory` - Further categorization, usually [`MessageSubCategory::NONE`]
    /// * `origin` - Where the error was found, if known
    ///
    /// # Errors
    /// Returns [`Error::InvalidMessageCode`] if `code` is outside the error range.
    pub fn error(
        text: impl Into<String>,
        code: u32,
        subcategory: &str,
        origin: Option<MessageOrigin>,
    ) -> Result<Self> {
        if !ERROR_CODES.contains(&code) {
            return Err(Error::InvalidMessageCode {
                category: MessageCategory::Error,
                code,
                range: "1000 to 2000 (inclusive)",
            });
        }

        Ok(Self {
            category: Some(MessageCategory::Error),
            text: text.into(),
            code: Some(code),
            subcategory: subcategory.to_string(),
            origin,
        })
    }

    /// Creates a warning message, or the empty message if `policy` suppresses it.
    ///
    /// The range check happens before the policy is consulted, so an out of range code
    /// is rejected even when it would have been suppressed.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMessageCode`] if `code` is outside `(2000, 6000]`.
    pub fn warning(
        policy: &dyn SuppressionPolicy,
        text: impl Into<String>,
        code: u32,
        origin: MessageOrigin,
        subcategory: &str,
    ) -> Result<Self> {
        if !WARNING_CODES.contains(&code) {
            return Err(Error::InvalidMessageCode {
                category: MessageCategory::Warning,
                code,
                range: "2001 to 6000 (inclusive)",
            });
        }

        if policy.is_suppressed(code, &origin) {
            return Ok(Self::empty());
        }

        Ok(Self {
            category: Some(MessageCategory::Warning),
            text: text.into(),
            code: Some(code),
            subcategory: subcategory.to_string(),
            origin: Some(origin),
        })
    }

    /// Creates an informational message.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            category: Some(MessageCategory::Info),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Creates a verbose diagnostic message.
    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self {
            category: Some(MessageCategory::Diagnostic),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns `true` for the empty message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
    }

    /// Category, `None` for the empty message.
    #[must_use]
    pub fn category(&self) -> Option<MessageCategory> {
        self.category
    }

    /// Text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Code, present for errors and warnings.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        self.code
    }

    /// Subcategory, empty when none was given.
    #[must_use]
    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }

    /// Origin.
    #[must_use]
    pub fn origin(&self) -> Option<&MessageOrigin> {
        self.origin.as_ref()
    }
}

impl fmt::Display for Message {
    /// `<origin>: [<subcategory> ]<error|warning> IL<code>: <text>` for errors and
    /// warnings, `<origin>: [<subcategory> ]<text>` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{origin}:")?,
            None => write!(f, "{DEFAULT_ORIGIN}:")?,
        }

        if !self.subcategory.is_empty() {
            write!(f, " {}", self.subcategory)?;
        }

        let label = match self.category {
            Some(MessageCategory::Error) => Some("error"),
            Some(MessageCategory::Warning) => Some("warning"),
            Some(MessageCategory::Info | MessageCategory::Diagnostic) | None => None,
        };

        match (label, self.code) {
            (Some(label), Some(code)) => {
                write!(f, " {label} IL{code:04}")?;
                if !self.text.is_empty() {
                    write!(f, ": {}", self.text)?;
                }
                Ok(())
            }
            _ => write!(f, " {}", self.text),
        }
    }
}
