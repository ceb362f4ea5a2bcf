//! Listing output. Each source line becomes one output line: the
//! address/opcode/operand fields padded to a fixed column, then a `#`
//! and the original source text.

use super::driver::Line;
use super::Mode;

const COMMENT_COLUMN: usize = 17;

/// Hex-formats `num` to exactly `digits` digits. Negative values are
/// masked to 16 bits first, and overly wide values keep only their low
/// digits, so `-1` renders as `FFFF` (or `FF`) and `256` with two digits
/// renders as `00`.
pub fn dec2hex(num: i64, digits: usize) -> String {
    let masked = if num < 0 { num & 0xFFFF } else { num };
    let mut hex = format!("{:X}", masked);
    if hex.len() > digits {
        hex = hex.split_off(hex.len() - digits);
    }
    format!("{:0>width$}", hex, width = digits)
}

/// Renders the assembled line list into the final listing text,
/// newline-terminated.
pub fn render(lines: &[Line], mode: Mode) -> String {
    let digits = mode.hex_digits();
    let mut out = String::new();

    for line in lines {
        let addr = match line.addr {
            Some(a) => format!("{}:", dec2hex(a, digits)),
            None => String::new(),
        };
        let opcode = match line.opcode {
            Some(o) => dec2hex(o, digits),
            None => String::new(),
        };
        let operand = match line.operand {
            Some(o) => dec2hex(o, digits),
            None => String::new(),
        };

        let body = format!("{} {} {}", addr, opcode, operand);
        out.push_str(&format!("{:<width$}#", body, width = COMMENT_COLUMN));
        if !line.parsed.raw.is_empty() {
            out.push(' ');
            out.push_str(&line.parsed.raw);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dec2hex_basic() {
        assert_eq!(dec2hex(0, 4), "0000");
        assert_eq!(dec2hex(18, 4), "0012");
        assert_eq!(dec2hex(255, 2), "FF");
    }

    #[test]
    fn test_dec2hex_negative_masks_to_16_bits() {
        assert_eq!(dec2hex(-1, 4), "FFFF");
        assert_eq!(dec2hex(-1, 2), "FF");
        assert_eq!(dec2hex(-2, 2), "FE");
    }

    #[test]
    fn test_dec2hex_truncates_to_low_digits() {
        assert_eq!(dec2hex(256, 2), "00");
        assert_eq!(dec2hex(0x1234, 2), "34");
    }
}
