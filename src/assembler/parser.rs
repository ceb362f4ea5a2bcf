//! Per-line tokenization of KueChip assembly source.
//!
//! A line is split into `{label, mnemonic, operand1, operand2, comment}`
//! with no knowledge of instruction semantics. Absent parts yield absent
//! fields, never an error; operand *shape* analysis lives in [`Operand`]
//! and is invoked later, by the encoder.

use regex::Regex;

use super::error::{AsmError, AsmErrorKind};

/// One source line after structural tokenization.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParsedLine {
    /// 1-based source line number.
    pub number: usize,
    /// The raw line text, untrimmed, as read from the source.
    pub raw: String,
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub op1: Option<String>,
    pub op2: Option<String>,
    pub comment: Option<String>,
}

impl ParsedLine {
    /// A line with neither label nor mnemonic contributes nothing to
    /// addresses (blank or comment-only).
    pub fn is_blank(&self) -> bool {
        self.label.is_none() && self.mnemonic.is_none()
    }
}

/// Splits raw lines into [`ParsedLine`]s. Holds the compiled patterns so
/// they are built once per assembly run.
pub struct LineParser {
    comment: Regex,
    label: Regex,
}

impl LineParser {
    pub fn new() -> Self {
        // Both patterns are fixed literals; construction cannot fail.
        LineParser {
            comment: Regex::new(r"(#|;;|//)(?P<comment>.*)$").unwrap(),
            label: Regex::new(r"^(?P<label>[A-Za-z0-9_]+)\s*:").unwrap(),
        }
    }

    /// Tokenizes one raw line. Rules are applied in a fixed order:
    /// comment first, then a leading label, then mnemonic and operands.
    pub fn parse(&self, raw: &str, number: usize) -> ParsedLine {
        let mut buf = raw.trim().to_owned();

        let mut comment = None;
        if let Some(caps) = self.comment.captures(&buf) {
            comment = Some(caps["comment"].to_owned());
            buf = self.comment.replace(&buf, "").trim().to_owned();
        }

        let mut label = None;
        if let Some(caps) = self.label.captures(&buf) {
            label = Some(caps["label"].to_uppercase());
            buf = self.label.replace(&buf, "").trim().to_owned();
        }

        let mut tokens = buf.split_whitespace();
        let mnemonic = tokens.next().map(str::to_uppercase);
        // The first operand may carry a trailing comma when two are given.
        let op1 = tokens
            .next()
            .map(|t| t.trim_end_matches(',').to_uppercase());
        // The second operand may contain spaces (e.g. `[SP+ 2]`), so the
        // remaining tokens are re-joined.
        let rest: Vec<&str> = tokens.collect();
        let op2 = if rest.is_empty() {
            None
        } else {
            Some(rest.join(" ").to_uppercase())
        };

        ParsedLine {
            number,
            raw: raw.to_owned(),
            label,
            mnemonic,
            op1,
            op2,
            comment,
        }
    }
}

/// The three programmer-visible registers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    Acc,
    Ix,
    Sp,
}

/// An operand parsed into its addressing shape. Expressions are kept as
/// text and evaluated by the expression evaluator once the symbol table
/// is complete.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    Register(Register),
    /// A bare value: decimal/hex literal, label, or arithmetic expression.
    Immediate(String),
    /// `[d]` — absolute indirect.
    Indirect(String),
    /// `[SP+d]` / `[SP]` — stack-relative.
    SpRelative(String),
    /// `[IX+d]` / `[IX]` — index-relative.
    IxRelative(String),
    /// `(d)` — legacy indirect form.
    LegacyIndirect(String),
    /// `(IX+d)` / `(IX)` — legacy index-indirect form.
    LegacyIxRelative(String),
}

/// True if `s` is drawn from the expression alphabet: identifier
/// characters plus the four arithmetic operators.
fn is_expression(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '*' | '/'))
}

/// Splits a `REG+d` / `REG-d` body into its offset expression; a missing
/// or empty offset (`[SP]`, `[SP+]`) reads as zero.
fn relative_offset(body: &str) -> Option<String> {
    if body.is_empty() {
        return Some("0".to_owned());
    }
    if let Some(rest) = body.strip_prefix('+') {
        return if rest.is_empty() {
            Some("0".to_owned())
        } else if is_expression(rest) {
            Some(rest.to_owned())
        } else {
            None
        };
    }
    // A negative offset keeps its sign for the evaluator.
    if body.starts_with('-') && is_expression(&body[1..]) {
        return Some(body.to_owned());
    }
    None
}

impl Operand {
    /// Parses one (already uppercased) operand field into its shape.
    pub fn parse(text: &str) -> Result<Operand, AsmError> {
        // Operands may carry embedded spaces after token re-joining.
        let t: String = text.chars().filter(|c| !c.is_whitespace()).collect();

        match t.as_str() {
            "ACC" => return Ok(Operand::Register(Register::Acc)),
            "IX" => return Ok(Operand::Register(Register::Ix)),
            "SP" => return Ok(Operand::Register(Register::Sp)),
            _ => {}
        }

        let invalid = || {
            AsmError::new(
                AsmErrorKind::InvalidOperand,
                format!("invalid operand '{}'", text),
            )
        };

        if t.starts_with('[') && t.ends_with(']') {
            let inner = &t[1..t.len() - 1];
            if let Some(body) = inner.strip_prefix("SP") {
                if let Some(offset) = relative_offset(body) {
                    return Ok(Operand::SpRelative(offset));
                }
            }
            if let Some(body) = inner.strip_prefix("IX") {
                if let Some(offset) = relative_offset(body) {
                    return Ok(Operand::IxRelative(offset));
                }
            }
            if is_expression(inner) {
                return Ok(Operand::Indirect(inner.to_owned()));
            }
            return Err(invalid());
        }

        if t.starts_with('(') && t.ends_with(')') {
            let inner = &t[1..t.len() - 1];
            if let Some(body) = inner.strip_prefix("IX") {
                if let Some(offset) = relative_offset(body) {
                    return Ok(Operand::LegacyIxRelative(offset));
                }
            }
            if is_expression(inner) {
                return Ok(Operand::LegacyIndirect(inner.to_owned()));
            }
            return Err(invalid());
        }

        if is_expression(&t) {
            return Ok(Operand::Immediate(t));
        }

        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedLine {
        LineParser::new().parse(raw, 1)
    }

    #[test]
    fn test_parse_plain_instruction() {
        let line = parse("        LD  ACC, 12H");
        assert_eq!(line.label, None);
        assert_eq!(line.mnemonic, Some("LD".to_owned()));
        assert_eq!(line.op1, Some("ACC".to_owned()));
        assert_eq!(line.op2, Some("12H".to_owned()));
        assert_eq!(line.comment, None);
    }

    #[test]
    fn test_parse_label_and_comment() {
        let line = parse("loop:  add acc, ix  # spin");
        assert_eq!(line.label, Some("LOOP".to_owned()));
        assert_eq!(line.mnemonic, Some("ADD".to_owned()));
        assert_eq!(line.op1, Some("ACC".to_owned()));
        assert_eq!(line.op2, Some("IX".to_owned()));
        assert_eq!(line.comment, Some(" spin".to_owned()));
    }

    #[test]
    fn test_parse_comment_markers() {
        assert_eq!(parse("NOP ;; note").comment, Some(" note".to_owned()));
        assert_eq!(parse("NOP // note").comment, Some(" note".to_owned()));
        assert_eq!(parse("# whole line").mnemonic, None);
        assert!(parse("# whole line").is_blank());
    }

    #[test]
    fn test_parse_label_only_line() {
        let line = parse("WAIT:");
        assert_eq!(line.label, Some("WAIT".to_owned()));
        assert_eq!(line.mnemonic, None);
        assert!(!line.is_blank());
    }

    #[test]
    fn test_parse_operand_with_embedded_space() {
        let line = parse("        LD  ACC, [SP+ 2]");
        assert_eq!(line.op2, Some("[SP+ 2]".to_owned()));
    }

    #[test]
    fn test_parse_blank_line() {
        let line = parse("   ");
        assert!(line.is_blank());
        assert_eq!(line.raw, "   ");
    }

    #[test]
    fn test_operand_registers() {
        assert_eq!(Operand::parse("ACC"), Ok(Operand::Register(Register::Acc)));
        assert_eq!(Operand::parse("IX"), Ok(Operand::Register(Register::Ix)));
        assert_eq!(Operand::parse("SP"), Ok(Operand::Register(Register::Sp)));
    }

    #[test]
    fn test_operand_immediate_forms() {
        assert_eq!(Operand::parse("12H"), Ok(Operand::Immediate("12H".to_owned())));
        assert_eq!(Operand::parse("-1"), Ok(Operand::Immediate("-1".to_owned())));
        assert_eq!(
            Operand::parse("FOO+1"),
            Ok(Operand::Immediate("FOO+1".to_owned()))
        );
    }

    #[test]
    fn test_operand_bracketed_forms() {
        assert_eq!(
            Operand::parse("[100]"),
            Ok(Operand::Indirect("100".to_owned()))
        );
        assert_eq!(
            Operand::parse("[SP]"),
            Ok(Operand::SpRelative("0".to_owned()))
        );
        assert_eq!(
            Operand::parse("[SP+ 2]"),
            Ok(Operand::SpRelative("2".to_owned()))
        );
        assert_eq!(
            Operand::parse("[IX+BUF]"),
            Ok(Operand::IxRelative("BUF".to_owned()))
        );
        assert_eq!(
            Operand::parse("[IX]"),
            Ok(Operand::IxRelative("0".to_owned()))
        );
        assert_eq!(
            Operand::parse("[SP-2]"),
            Ok(Operand::SpRelative("-2".to_owned()))
        );
        // A bracketed SP-prefixed label is still plain indirection.
        assert_eq!(
            Operand::parse("[SPOOL]"),
            Ok(Operand::Indirect("SPOOL".to_owned()))
        );
    }

    #[test]
    fn test_operand_legacy_forms() {
        assert_eq!(
            Operand::parse("(10H)"),
            Ok(Operand::LegacyIndirect("10H".to_owned()))
        );
        assert_eq!(
            Operand::parse("(IX+2)"),
            Ok(Operand::LegacyIxRelative("2".to_owned()))
        );
        assert_eq!(
            Operand::parse("(IX)"),
            Ok(Operand::LegacyIxRelative("0".to_owned()))
        );
    }

    #[test]
    fn test_operand_invalid() {
        assert_eq!(
            Operand::parse("[").map_err(|e| e.kind),
            Err(AsmErrorKind::InvalidOperand)
        );
        assert_eq!(
            Operand::parse("A@B").map_err(|e| e.kind),
            Err(AsmErrorKind::InvalidOperand)
        );
        assert_eq!(
            Operand::parse("").map_err(|e| e.kind),
            Err(AsmErrorKind::InvalidOperand)
        );
    }
}
