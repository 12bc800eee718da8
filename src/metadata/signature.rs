//! Method signatures as seen by the linker.
//!
//! The binary reader decodes full ECMA-335 signature blobs; the marking core only needs
//! a stable textual form to compare members by signature. Types are rendered with their
//! fully qualified names (`System.Int32`, `System.String`, `MyApp.Widget`), which is the
//! form preserve directives are written in.

use std::fmt;

/// A method signature reduced to its rendered return and parameter types.
///
/// # Examples
///
/// ```rust
/// use dottrim::metadata::signature::MethodSignature;
///
/// let sig = MethodSignature::new("System.Void", ["System.Int32", "System.String"]);
/// assert_eq!(sig.parameter_list(), "(System.Int32,System.String)");
/// assert_eq!(sig.to_string(), "System.Void(System.Int32,System.String)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MethodSignature {
    /// Rendered return type
    pub return_type: String,
    /// Rendered parameter types, in declaration order
    pub parameters: Vec<String>,
}

impl MethodSignature {
    /// Creates a signature from a return type and parameter types.
    pub fn new<R, I, P>(return_type: R, parameters: I) -> Self
    where
        R: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            return_type: return_type.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Signature of a parameterless method returning `System.Void`.
    #[must_use]
    pub fn void() -> Self {
        Self::new("System.Void", std::iter::empty::<String>())
    }

    /// Renders the parameter list as `(p1,p2)`, without whitespace.
    ///
    /// Two methods with the same name and the same parameter list occupy the same slot;
    /// this is the key used for signature matching.
    #[must_use]
    pub fn parameter_list(&self) -> String {
        format!("({})", self.parameters.join(","))
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.return_type, self.parameter_list())
    }
}

/// Normalizes a user-written parameter list for comparison with [`MethodSignature::parameter_list`].
///
/// Whitespace is dropped and missing parentheses are added, so `"System.Int32, System.String"`
/// and `"(System.Int32,System.String)"` compare equal.
#[must_use]
pub fn normalize_parameter_list(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('(') && compact.ends_with(')') {
        compact
    } else {
        format!("({compact})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_signature() {
        let sig = MethodSignature::void();
        assert_eq!(sig.parameter_list(), "()");
        assert_eq!(sig.to_string(), "System.Void()");
    }

    #[test]
    fn test_normalize_parameter_list() {
        assert_eq!(normalize_parameter_list("()"), "()");
        assert_eq!(normalize_parameter_list(""), "()");
        assert_eq!(
            normalize_parameter_list("System.Int32, System.String"),
            "(System.Int32,System.String)"
        );
        assert_eq!(
            normalize_parameter_list(" ( System.Int32 ) "),
            "(System.Int32)"
        );
    }

    #[test]
    fn test_normalized_matches_signature() {
        let sig = MethodSignature::new("System.Boolean", ["System.Object", "System.Int64"]);
        assert_eq!(
            normalize_parameter_list("System.Object, System.Int64"),
            sig.parameter_list()
        );
    }
}
