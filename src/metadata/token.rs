use std::fmt;
use std::hash::{Hash, Hasher};

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// Identifiers for the metadata tables the entity graph knows about.
///
/// The numeric values are the ECMA-335 table ids, so a token read from an assembly
/// keeps its table byte unchanged. [`TableId::PreserveDirective`] is private to the
/// linker: preserve directives are decoded from custom attribute blobs and get their
/// own token space so they can carry an independent Mark State. Directive tokens are
/// never handed to the serializer.
///
/// Only the *graph tables* ([`TableId::is_graph_table`]) hold entities. `TypeRef` and
/// `MemberRef` tokens name things defined in other assemblies; the engine never marks
/// or sweeps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// Reference to a type defined in another assembly
    TypeRef = 0x01,
    /// Type definitions (classes, interfaces, value types)
    TypeDef = 0x02,
    /// Field definitions
    Field = 0x04,
    /// Method definitions
    MethodDef = 0x06,
    /// Interface implementation edges
    InterfaceImpl = 0x09,
    /// Reference to a member defined in another assembly
    MemberRef = 0x0A,
    /// Custom attribute usages
    CustomAttribute = 0x0C,
    /// Linker-private preserve directives
    PreserveDirective = 0x70,
}

impl TableId {
    /// Maps a raw table byte to a known table id.
    #[must_use]
    pub fn from_raw(value: u8) -> Option<Self> {
        TableId::iter().find(|table| *table as u8 == value)
    }

    /// Returns `true` for tables whose rows are entities of the graph.
    #[must_use]
    pub const fn is_graph_table(self) -> bool {
        !matches!(self, TableId::TypeRef | TableId::MemberRef)
    }
}

/// A metadata token representing a reference to a metadata table entry.
///
/// Tokens in .NET metadata consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a 1-based row index
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the table this token points into, if it is one the graph understands
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_raw(self.table())
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the token names something outside the entity graph.
    ///
    /// External tokens are never marked, swept, or reported as dangling.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !self.table_id().is_some_and(TableId::is_graph_table)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
