//! DOT format utilities for graph visualization.
//!
//! This module provides utilities for generating DOT format output,
//! which can be rendered using Graphviz tools.

use std::fmt::Write;

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// This function handles all characters that have special meaning in DOT format,
/// including quotes, backslashes, newlines, and angle brackets.
///
/// # Examples
///
/// ```rust
/// use dottrim::utils::escape_dot;
///
/// let escaped = escape_dot("Method<T>");
/// assert_eq!(escaped, "Method\\<T\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Incremental writer for a `digraph`.
#[derive(Debug)]
pub struct DotWriter {
    out: String,
}

impl DotWriter {
    /// Opens a digraph with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(name));
        let _ = writeln!(out, "    node [shape=box, fontname=\"monospace\"];");
        Self { out }
    }

    /// Emits a node.
    pub fn node(&mut self, id: &str, label: &str) {
        let _ = writeln!(
            self.out,
            "    \"{}\" [label=\"{}\"];",
            escape_dot(id),
            escape_dot(label)
        );
    }

    /// Emits an edge, optionally labelled.
    pub fn edge(&mut self, from: &str, to: &str, label: Option<&str>) {
        let _ = write!(
            self.out,
            "    \"{}\" -> \"{}\"",
            escape_dot(from),
            escape_dot(to)
        );
        if let Some(label) = label {
            let _ = write!(self.out, " [label=\"{}\"]", escape_dot(label));
        }
        self.out.push_str(";\n");
    }

    /// Closes the digraph and returns its text.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_quotes() {
        assert_eq!(escape_dot("say \"hello\""), "say \\\"hello\\\"");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_escape_dot_combined() {
        assert_eq!(
            escape_dot("Method<T>(\"arg\")"),
            "Method\\<T\\>(\\\"arg\\\")"
        );
    }

    #[test]
    fn test_writer_output() {
        let mut dot = DotWriter::new("marks");
        dot.node("a", "List<T>");
        dot.node("b", "Foo()");
        dot.edge("a", "b", Some("calls"));
        dot.edge("b", "a", None);
        let text = dot.finish();

        assert!(text.starts_with("digraph \"marks\" {\n"));
        assert!(text.contains("\"a\" [label=\"List\\<T\\>\"];"));
        assert!(text.contains("\"a\" -> \"b\" [label=\"calls\"];"));
        assert!(text.contains("\"b\" -> \"a\";"));
        assert!(text.ends_with("}\n"));
    }
}
