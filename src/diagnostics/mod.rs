//! Diagnostics produced while marking and sweeping.
//!
//! The marking core never prints anything. It hands structured [`Message`]s to a
//! [`DiagnosticsSink`] supplied by the caller, consulting an explicit
//! [`SuppressionPolicy`] before constructing warnings.
//!
//! # Key Components
//!
//! - [`Message`] - Immutable message value with structural equality
//! - [`MessageOrigin`] - File position or graph entity a message is about
//! - [`SuppressionPolicy`] - Capability deciding whether a warning is dropped
//! - [`DiagnosticsSink`] - Where messages go
//! - [`Diagnostics`] - Thread-safe collecting sink
//!
//! # Thread Safety
//!
//! [`Diagnostics`] uses `boxcar::Vec` internally, which provides lock-free concurrent
//! append operations. Multiple threads can safely emit simultaneously.
//!
//! # Examples
//!
//! ```rust
//! use dottrim::diagnostics::{codes, Diagnostics, DiagnosticsSink, Message, MessageOrigin};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.emit(Message::error(
//!     "Could not resolve 'Foo'",
//!     codes::UNRESOLVED_PRESERVE_TARGET,
//!     "",
//!     Some(MessageOrigin::file("app.il")),
//! )?);
//! diagnostics.emit(Message::empty());
//!
//! assert_eq!(diagnostics.count(), 1);
//! assert!(diagnostics.has_errors());
//! # Ok::<(), dottrim::Error>(())
//! ```

pub mod codes;
mod message;
mod suppression;

pub use message::{Message, MessageCategory, MessageOrigin, MessageSubCategory, DEFAULT_ORIGIN};
pub use suppression::{NoSuppression, SuppressionPolicy, SuppressionSet};

use std::fmt::{self, Write};

use tracing::{debug, error, info, warn};

/// Receives the messages the linker raises.
pub trait DiagnosticsSink: Send + Sync {
    /// Accepts one message. Implementations drop [`Message::is_empty`] messages.
    fn emit(&self, message: Message);
}

/// Thread-safe collecting sink.
///
/// Every accepted message is mirrored to `tracing` at the level matching its
/// category.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Message>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink for Diagnostics {
    fn emit(&self, message: Message) {
        self.push(message);
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds a message. Empty messages are dropped.
    pub fn push(&self, message: Message) {
        let Some(category) = message.category() else {
            return;
        };
        match category {
            MessageCategory::Error => error!("{message}"),
            MessageCategory::Warning => warn!("{message}"),
            MessageCategory::Info => info!("{message}"),
            MessageCategory::Diagnostic => debug!("{message}"),
        }
        self.entries.push(message);
    }

    /// Returns true if any messages have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any errors have been collected.
    pub fn has_errors(&self) -> bool {
        self.iter()
            .any(|m| m.category() == Some(MessageCategory::Error))
    }

    /// Returns the total number of messages.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of messages of one category.
    pub fn count_of(&self, category: MessageCategory) -> usize {
        self.iter()
            .filter(|m| m.category() == Some(category))
            .count()
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.count_of(MessageCategory::Error)
    }

    /// Returns the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.count_of(MessageCategory::Warning)
    }

    /// Returns an iterator over all messages in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|(_, m)| m)
    }

    /// Returns the messages of one category.
    pub fn by_category(&self, category: MessageCategory) -> Vec<&Message> {
        self.iter()
            .filter(|m| m.category() == Some(category))
            .collect()
    }

    /// Returns the messages carrying one code.
    pub fn by_code(&self, code: u32) -> Vec<&Message> {
        self.iter().filter(|m| m.code() == Some(code)).collect()
    }

    /// Formats errors and warnings, one rendered message per line.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        );

        for message in self.iter().filter(|m| {
            matches!(
                m.category(),
                Some(MessageCategory::Error | MessageCategory::Warning)
            )
        }) {
            let _ = writeln!(output, "  {message}");
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
