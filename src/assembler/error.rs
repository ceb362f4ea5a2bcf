//! Error taxonomy for the assembler core.
//!
//! Every failure aborts the whole run; errors carry the offending source
//! line (1-based number plus raw text) whenever one is known.

use std::error::Error;
use std::fmt;

/// The kind of assembly failure.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AsmErrorKind {
    /// A line cannot be split into its structural parts.
    Syntax,
    /// Mnemonic matches no recognized instruction or pseudo-op.
    UnknownMnemonic,
    /// A required operand is absent (or a forbidden one is present).
    OperandCount,
    /// An operand is not an addressing mode accepted by the mnemonic.
    InvalidOperand,
    /// An expression references a label that is still unbound.
    UnresolvedSymbol,
    /// The directive is parsed but explicitly not implemented (`PROG`).
    UnsupportedDirective,
    /// `DAT` reached pass 2 with no `LOC` address in force.
    MissingLocAddress,
    /// A label was bound twice with different meanings in one run.
    DuplicateLabel,
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AsmErrorKind::Syntax => "syntax error",
            AsmErrorKind::UnknownMnemonic => "unknown mnemonic",
            AsmErrorKind::OperandCount => "operand count error",
            AsmErrorKind::InvalidOperand => "invalid operand",
            AsmErrorKind::UnresolvedSymbol => "unresolved symbol",
            AsmErrorKind::UnsupportedDirective => "unsupported directive",
            AsmErrorKind::MissingLocAddress => "missing LOC address",
            AsmErrorKind::DuplicateLabel => "duplicate label",
        };
        write!(f, "{}", name)
    }
}

/// An assembly failure, optionally attached to the source line it came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub message: String,
    /// (1-based line number, raw source text), filled in by the driver.
    pub line: Option<(usize, String)>,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>) -> Self {
        AsmError {
            kind,
            message: message.into(),
            line: None,
        }
    }

    /// Attaches source-line context, keeping any context already present.
    pub fn at_line(mut self, number: usize, raw: &str) -> Self {
        if self.line.is_none() {
            self.line = Some((number, raw.to_owned()));
        }
        self
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.line {
            Some((number, raw)) => {
                write!(f, "{} on line {}: {} (`{}`)", self.kind, number, self.message, raw.trim())
            }
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_line() {
        let e = AsmError::new(AsmErrorKind::UnknownMnemonic, "invalid mnemonic 'FOO'");
        assert_eq!(e.to_string(), "unknown mnemonic: invalid mnemonic 'FOO'");
    }

    #[test]
    fn test_display_with_line() {
        let e = AsmError::new(AsmErrorKind::MissingLocAddress, "address for LOC is not defined")
            .at_line(3, "  DAT 1");
        assert_eq!(
            e.to_string(),
            "missing LOC address on line 3: address for LOC is not defined (`DAT 1`)"
        );
    }

    #[test]
    fn test_at_line_keeps_first_context() {
        let e = AsmError::new(AsmErrorKind::Syntax, "bad").at_line(1, "a").at_line(2, "b");
        assert_eq!(e.line, Some((1, "a".to_owned())));
    }
}
