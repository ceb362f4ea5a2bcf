//! Expression evaluation for operand fields.
//!
//! Accepts decimal literals, `NNNH` hexadecimal literals, symbol names,
//! and left-to-right `+ - * /` arithmetic over those terms, with the
//! ordinary precedence of multiplication/division over addition and
//! subtraction. Integers are signed; two's-complement sizing happens at
//! render time, not here.

use super::error::{AsmError, AsmErrorKind};
use super::symbol::SymbolTable;

#[derive(Clone, PartialEq, Eq, Debug)]
enum Token {
    Term(String),
    Op(char),
}

/// Evaluates an expression against the symbol table. A reference to a
/// still-unbound symbol is an `UnresolvedSymbol` error; in the two-pass
/// design that is terminal by the time the final encode runs.
pub fn evaluate(expression: &str, symbols: &SymbolTable) -> Result<i64, AsmError> {
    let expression: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

    if expression.chars().any(|c| matches!(c, '+' | '-' | '*' | '/')) {
        let mut values = Vec::new();
        for token in split_terms(&expression) {
            match token {
                Token::Op(op) => values.push(Token::Op(op)),
                Token::Term(term) => {
                    // Each non-operator term is itself an expression
                    // (literal or symbol); recurse to evaluate it.
                    let value = evaluate(&term, symbols)?;
                    trace!("evaluate term: {} -> {}", term, value);
                    values.push(Token::Term(value.to_string()));
                }
            }
        }
        let value = fold(&values, &expression)?;
        trace!("evaluate expression: {} -> {}", expression, value);
        return Ok(value);
    }

    if is_hex_literal(&expression) {
        let digits = &expression[..expression.len() - 1];
        // The literal alphabet is checked above; radix parse cannot fail
        // except on overflow.
        return i64::from_str_radix(digits, 16).map_err(|_| {
            AsmError::new(
                AsmErrorKind::Syntax,
                format!("hexadecimal literal '{}' out of range", expression),
            )
        });
    }

    if let Ok(value) = expression.parse::<i64>() {
        return Ok(value);
    }

    if let Some(value) = symbols.resolve(&expression) {
        return Ok(value);
    }

    Err(AsmError::new(
        AsmErrorKind::UnresolvedSymbol,
        format!("'{}' cannot be evaluated", expression),
    ))
}

/// `^[0-9A-F]+H$`, case-insensitive.
fn is_hex_literal(s: &str) -> bool {
    let body = match s.len() {
        0 | 1 => return false,
        n => &s[..n - 1],
    };
    (s.ends_with('H') || s.ends_with('h')) && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Cuts the expression into terms, each operator occurrence becoming its
/// own token. Empty terms (e.g. around a leading sign) are dropped.
fn split_terms(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut term = String::new();
    for c in expression.chars() {
        if matches!(c, '+' | '-' | '*' | '/') {
            if !term.is_empty() {
                tokens.push(Token::Term(std::mem::take(&mut term)));
            }
            tokens.push(Token::Op(c));
        } else {
            term.push(c);
        }
    }
    if !term.is_empty() {
        tokens.push(Token::Term(term));
    }
    tokens
}

/// Evaluates an alternating value/operator sequence whose terms are all
/// numeric, honoring `* /` before `+ -` and leading `+`/`-` signs.
fn fold(tokens: &[Token], expression: &str) -> Result<i64, AsmError> {
    let malformed = || {
        AsmError::new(
            AsmErrorKind::Syntax,
            format!("malformed expression '{}'", expression),
        )
    };

    // Resolve unary signs into the values themselves.
    let mut values: Vec<i64> = Vec::new();
    let mut binary_ops: Vec<char> = Vec::new();
    let mut sign = 1i64;
    let mut expect_value = true;
    for token in tokens {
        match token {
            Token::Op(op) if expect_value => match op {
                '+' => {}
                '-' => sign = -sign,
                _ => return Err(malformed()),
            },
            Token::Op(op) => {
                binary_ops.push(*op);
                expect_value = true;
            }
            Token::Term(term) => {
                if !expect_value {
                    return Err(malformed());
                }
                let n: i64 = term.parse().map_err(|_| malformed())?;
                values.push(sign * n);
                sign = 1;
                expect_value = false;
            }
        }
    }
    if expect_value || values.len() != binary_ops.len() + 1 {
        return Err(malformed());
    }

    // First pass: multiplication and division.
    let mut folded_values = vec![values[0]];
    let mut folded_ops = Vec::new();
    for (op, value) in binary_ops.iter().zip(&values[1..]) {
        match op {
            '*' => {
                let last = folded_values.last_mut().ok_or_else(malformed)?;
                *last *= value;
            }
            '/' => {
                if *value == 0 {
                    return Err(AsmError::new(
                        AsmErrorKind::Syntax,
                        format!("division by zero in '{}'", expression),
                    ));
                }
                let last = folded_values.last_mut().ok_or_else(malformed)?;
                *last /= value;
            }
            _ => {
                folded_ops.push(*op);
                folded_values.push(*value);
            }
        }
    }

    // Second pass: addition and subtraction, left to right.
    let mut result = folded_values[0];
    for (op, value) in folded_ops.iter().zip(&folded_values[1..]) {
        match op {
            '+' => result += value,
            '-' => result -= value,
            _ => return Err(malformed()),
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Result<i64, AsmError> {
        evaluate(expr, &SymbolTable::new())
    }

    #[test]
    fn test_decimal_literals() {
        assert_eq!(eval("1"), Ok(1));
        assert_eq!(eval("121"), Ok(121));
        assert_eq!(eval("-1000"), Ok(-1000));
    }

    #[test]
    fn test_hex_literals() {
        assert_eq!(eval("12H"), Ok(18));
        assert_eq!(eval("12h"), Ok(18));
        assert_eq!(eval("FFH"), Ok(255));
        assert_eq!(eval("0H"), Ok(0));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1+1"), Ok(2));
        assert_eq!(eval("2*1+3*3"), Ok(11));
        assert_eq!(eval("10-2-3"), Ok(5));
        assert_eq!(eval("7/2"), Ok(3));
        assert_eq!(eval("10H+1"), Ok(17));
        assert_eq!(eval("2*-3"), Ok(-6));
    }

    #[test]
    fn test_symbols() {
        let mut symbols = SymbolTable::new();
        symbols.bind("FOO", 10).unwrap();
        symbols.bind("_BAR", 2).unwrap();
        symbols.bind("B_A_Z", 5).unwrap();
        assert_eq!(evaluate("FOO+1", &symbols), Ok(11));
        assert_eq!(evaluate("FOO*_BAR+B_A_Z", &symbols), Ok(25));
        assert_eq!(evaluate("FOO", &symbols), Ok(10));
    }

    #[test]
    fn test_unresolved_symbol() {
        assert_eq!(eval("NOWHERE").map_err(|e| e.kind), Err(AsmErrorKind::UnresolvedSymbol));
        assert_eq!(eval("NOWHERE+1").map_err(|e| e.kind), Err(AsmErrorKind::UnresolvedSymbol));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(eval("1+").map_err(|e| e.kind), Err(AsmErrorKind::Syntax));
        assert_eq!(eval("1/0").map_err(|e| e.kind), Err(AsmErrorKind::Syntax));
        assert_eq!(eval("*1").map_err(|e| e.kind), Err(AsmErrorKind::Syntax));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(eval(" 1 + 1 "), Ok(2));
    }
}
