//! Instruction encoding: mnemonic dispatch, opcode tables, and the
//! addressing-mode offsets.
//!
//! The encoder runs in two modes. In allocation mode (pass 1) it decides
//! only the required width in address units; in full-encode mode (pass 2)
//! it produces the concrete opcode byte and operand word. Both modes share
//! one shape analysis, so the width decided in pass 1 is the width encoded
//! in pass 2 by construction.

use super::error::{AsmError, AsmErrorKind};
use super::expr;
use super::parser::{Operand, ParsedLine, Register};
use super::symbol::SymbolTable;

/// Every recognized instruction and pseudo-op, as a closed enumeration.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    // Pseudo-ops (handled by the driver, not the encoder).
    Equ,
    Loc,
    Dat,
    End,
    // Parsed but explicitly unsupported.
    Prog,
    // Register-register arithmetic/logic (the regular opcode table).
    Ld,
    St,
    Sbc,
    Adc,
    Sub,
    Add,
    Eor,
    Or,
    And,
    Cmp,
    // Branches.
    Ba,
    Bvf,
    Bnz,
    Bzp,
    Bp,
    Bni,
    Bnc,
    Bge,
    Bgt,
    Bzn,
    Bno,
    Bz,
    Bn,
    Bc,
    Blt,
    Ble,
    // Stack and subroutine.
    Psh,
    Pop,
    Cal,
    Ret,
    Inc,
    Dec,
    // Shift/rotate.
    Sra,
    Sla,
    Srl,
    Sll,
    Rra,
    Rla,
    Rrl,
    Rll,
    // Zero-operand fixed opcodes.
    Nop,
    Hlt,
    Rcf,
    Scf,
    Out,
    In,
}

impl Mnemonic {
    /// Resolves an uppercased source token; `None` is an unknown mnemonic.
    pub fn from_token(token: &str) -> Option<Mnemonic> {
        use Mnemonic::*;
        let m = match token {
            "EQU" => Equ,
            "LOC" => Loc,
            "DAT" => Dat,
            "END" => End,
            "PROG" => Prog,
            "LD" => Ld,
            "ST" => St,
            "SBC" => Sbc,
            "ADC" => Adc,
            "SUB" => Sub,
            "ADD" => Add,
            "EOR" => Eor,
            "OR" => Or,
            "AND" => And,
            "CMP" => Cmp,
            "BA" => Ba,
            "BVF" => Bvf,
            "BNZ" => Bnz,
            "BZP" => Bzp,
            "BP" => Bp,
            "BNI" => Bni,
            "BNC" => Bnc,
            "BGE" => Bge,
            "BGT" => Bgt,
            "BZN" => Bzn,
            "BNO" => Bno,
            "BZ" => Bz,
            "BN" => Bn,
            "BC" => Bc,
            "BLT" => Blt,
            "BLE" => Ble,
            "PSH" => Psh,
            "POP" => Pop,
            "CAL" => Cal,
            "RET" => Ret,
            "INC" => Inc,
            "DEC" => Dec,
            "SRA" => Sra,
            "SLA" => Sla,
            "SRL" => Srl,
            "SLL" => Sll,
            "RRA" => Rra,
            "RLA" => Rla,
            "RRL" => Rrl,
            "RLL" => Rll,
            "NOP" => Nop,
            "HLT" => Hlt,
            "RCF" => Rcf,
            "SCF" => Scf,
            "OUT" => Out,
            "IN" => In,
            _ => return None,
        };
        Some(m)
    }

    pub fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Equ => "EQU",
            Loc => "LOC",
            Dat => "DAT",
            End => "END",
            Prog => "PROG",
            Ld => "LD",
            St => "ST",
            Sbc => "SBC",
            Adc => "ADC",
            Sub => "SUB",
            Add => "ADD",
            Eor => "EOR",
            Or => "OR",
            And => "AND",
            Cmp => "CMP",
            Ba => "BA",
            Bvf => "BVF",
            Bnz => "BNZ",
            Bzp => "BZP",
            Bp => "BP",
            Bni => "BNI",
            Bnc => "BNC",
            Bge => "BGE",
            Bgt => "BGT",
            Bzn => "BZN",
            Bno => "BNO",
            Bz => "BZ",
            Bn => "BN",
            Bc => "BC",
            Blt => "BLT",
            Ble => "BLE",
            Psh => "PSH",
            Pop => "POP",
            Cal => "CAL",
            Ret => "RET",
            Inc => "INC",
            Dec => "DEC",
            Sra => "SRA",
            Sla => "SLA",
            Srl => "SRL",
            Sll => "SLL",
            Rra => "RRA",
            Rla => "RLA",
            Rrl => "RRL",
            Rll => "RLL",
            Nop => "NOP",
            Hlt => "HLT",
            Rcf => "RCF",
            Scf => "SCF",
            Out => "OUT",
            In => "IN",
        }
    }

    /// Row base in the regular arithmetic/logic opcode table.
    fn table_base(self) -> Option<u8> {
        use Mnemonic::*;
        match self {
            Ld => Some(0x60),
            St => Some(0x70),
            Sbc => Some(0x80),
            Adc => Some(0x90),
            Sub => Some(0xA0),
            Add => Some(0xB0),
            Eor => Some(0xC0),
            Or => Some(0xD0),
            And => Some(0xE0),
            Cmp => Some(0xF0),
            _ => None,
        }
    }

    fn branch_opcode(self) -> Option<u8> {
        use Mnemonic::*;
        match self {
            Ba => Some(0x30),
            Bnz => Some(0x31),
            Bzp => Some(0x32),
            Bp => Some(0x33),
            Bni => Some(0x34),
            Bnc => Some(0x35),
            Bge => Some(0x36),
            Bgt => Some(0x37),
            Bvf => Some(0x38),
            Bz => Some(0x39),
            Bn => Some(0x3A),
            Bzn => Some(0x3B),
            Bno => Some(0x3C),
            Bc => Some(0x3D),
            Blt => Some(0x3E),
            Ble => Some(0x3F),
            _ => None,
        }
    }

    fn shift_base(self) -> Option<u8> {
        use Mnemonic::*;
        match self {
            Sra => Some(0x40),
            Sla => Some(0x41),
            Srl => Some(0x42),
            Sll => Some(0x43),
            Rra => Some(0x44),
            Rla => Some(0x45),
            Rrl => Some(0x46),
            Rll => Some(0x47),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Allocation mode (pass 1, widths only) or full encode against a complete
/// symbol table (pass 2).
#[derive(Copy, Clone)]
pub enum EncodeMode<'a> {
    Allocate,
    Full(&'a SymbolTable),
}

/// A fully encoded instruction: opcode byte plus optional operand word.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Encoded {
    pub opcode: u8,
    pub operand: Option<i64>,
}

impl Encoded {
    pub fn width(&self) -> usize {
        if self.operand.is_some() {
            2
        } else {
            1
        }
    }
}

/// The encoder's result per mode.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Encoding {
    /// Required width in address units (allocation mode).
    Width(usize),
    /// Concrete opcode/operand (full-encode mode).
    Code(Encoded),
}

impl Encoding {
    pub fn width(&self) -> usize {
        match self {
            Encoding::Width(w) => *w,
            Encoding::Code(encoded) => encoded.width(),
        }
    }
}

/// Opcode plus the not-yet-evaluated operand expression.
type Shape = (u8, Option<String>);

/// Encodes one machine-instruction line. Operand validation happens in
/// both modes; expression evaluation only in full-encode mode.
pub fn encode(mnemonic: Mnemonic, line: &ParsedLine, mode: EncodeMode) -> Result<Encoding, AsmError> {
    let (opcode, operand_expr) = shape(mnemonic, line)?;
    match mode {
        EncodeMode::Allocate => {
            let width = if operand_expr.is_some() { 2 } else { 1 };
            debug!("{}: allocate {} unit(s)", mnemonic, width);
            Ok(Encoding::Width(width))
        }
        EncodeMode::Full(symbols) => {
            let operand = match operand_expr {
                Some(expr) => Some(expr::evaluate(&expr, symbols)?),
                None => None,
            };
            Ok(Encoding::Code(Encoded { opcode, operand }))
        }
    }
}

fn operand_count_error(mnemonic: Mnemonic, expected: usize) -> AsmError {
    AsmError::new(
        AsmErrorKind::OperandCount,
        format!("expected {} operand(s) for {}", expected, mnemonic),
    )
}

fn invalid_operand_error(mnemonic: Mnemonic, operand: &str) -> AsmError {
    AsmError::new(
        AsmErrorKind::InvalidOperand,
        format!("invalid operand '{}' for {}", operand, mnemonic),
    )
}

fn one_operand(mnemonic: Mnemonic, line: &ParsedLine) -> Result<&str, AsmError> {
    line.op1
        .as_deref()
        .ok_or_else(|| operand_count_error(mnemonic, 1))
}

fn two_operands<'a>(mnemonic: Mnemonic, line: &'a ParsedLine) -> Result<(&'a str, &'a str), AsmError> {
    match (line.op1.as_deref(), line.op2.as_deref()) {
        (Some(op1), Some(op2)) => Ok((op1, op2)),
        _ => Err(operand_count_error(mnemonic, 2)),
    }
}

fn shape(mnemonic: Mnemonic, line: &ParsedLine) -> Result<Shape, AsmError> {
    use Mnemonic::*;

    match mnemonic {
        Prog => Err(AsmError::new(
            AsmErrorKind::UnsupportedDirective,
            "'PROG' is not supported",
        )),

        Equ | Loc | Dat | End => Err(AsmError::new(
            AsmErrorKind::Syntax,
            format!("internal error: pseudo-op {} reached the encoder", mnemonic),
        )),

        Nop => Ok((0x00, None)),
        Hlt => Ok((0x0F, None)),
        Out => Ok((0x10, None)),
        In => Ok((0x1F, None)),
        Rcf => Ok((0x20, None)),
        Scf => Ok((0x28, None)),
        Ret => Ok((0x0D, None)),

        Inc | Dec => {
            let op1 = one_operand(mnemonic, line)?;
            match Operand::parse(op1)? {
                Operand::Register(Register::Sp) => {
                    Ok((if mnemonic == Inc { 0x04 } else { 0x05 }, None))
                }
                _ => Err(invalid_operand_error(mnemonic, op1)),
            }
        }

        Psh | Pop => {
            let op1 = one_operand(mnemonic, line)?;
            let base = if mnemonic == Psh { 0x08 } else { 0x0A };
            match Operand::parse(op1)? {
                Operand::Register(Register::Acc) => Ok((base, None)),
                Operand::Register(Register::Ix) => Ok((base + 1, None)),
                _ => Err(invalid_operand_error(mnemonic, op1)),
            }
        }

        Sra | Sla | Srl | Sll | Rra | Rla | Rrl | Rll => {
            let op1 = one_operand(mnemonic, line)?;
            // Checked by the arm pattern above.
            let base = mnemonic.shift_base().unwrap_or(0x40);
            match Operand::parse(op1)? {
                Operand::Register(Register::Acc) => Ok((base, None)),
                Operand::Register(Register::Ix) => Ok((base + 8, None)),
                _ => Err(invalid_operand_error(mnemonic, op1)),
            }
        }

        Ba | Bvf | Bnz | Bzp | Bp | Bni | Bnc | Bge | Bgt | Bzn | Bno | Bz | Bn | Bc | Blt
        | Ble | Cal => {
            let op1 = one_operand(mnemonic, line)?;
            let opcode = match mnemonic {
                Cal => 0x0C,
                _ => mnemonic.branch_opcode().unwrap_or(0x30),
            };
            match Operand::parse(op1)? {
                Operand::Immediate(expr) => Ok((opcode, Some(expr))),
                _ => Err(invalid_operand_error(mnemonic, op1)),
            }
        }

        Ld => {
            let (op1, op2) = two_operands(mnemonic, line)?;
            match (Operand::parse(op1)?, Operand::parse(op2)?) {
                (Operand::Register(Register::Ix), Operand::Register(Register::Sp)) => {
                    Ok((0x01, None))
                }
                (Operand::Register(Register::Sp), Operand::Register(Register::Ix)) => {
                    Ok((0x03, None))
                }
                (Operand::Register(Register::Sp), Operand::Immediate(expr)) => {
                    Ok((0x02, Some(expr)))
                }
                (Operand::Register(Register::Sp), _) => {
                    Err(invalid_operand_error(mnemonic, op2))
                }
                (op1_parsed, op2_parsed) => {
                    table_shape(mnemonic, 0x60, op1_parsed, op2_parsed, op1, op2)
                }
            }
        }

        Add | Sub => {
            let (op1, op2) = two_operands(mnemonic, line)?;
            let op1_parsed = Operand::parse(op1)?;
            if op1_parsed == Operand::Register(Register::Sp) {
                let opcode = if mnemonic == Add { 0x06 } else { 0x07 };
                match Operand::parse(op2)? {
                    Operand::Immediate(expr) => Ok((opcode, Some(expr))),
                    _ => Err(invalid_operand_error(mnemonic, op2)),
                }
            } else {
                let base = if mnemonic == Add { 0xB0 } else { 0xA0 };
                table_shape(mnemonic, base, op1_parsed, Operand::parse(op2)?, op1, op2)
            }
        }

        St | Sbc | Adc | Eor | Or | And | Cmp => {
            let (op1, op2) = two_operands(mnemonic, line)?;
            // Checked by the arm pattern above.
            let base = mnemonic.table_base().unwrap_or(0x60);
            table_shape(
                mnemonic,
                base,
                Operand::parse(op1)?,
                Operand::parse(op2)?,
                op1,
                op2,
            )
        }
    }
}

/// The regular table: row from the mnemonic, +8 for an IX first operand,
/// plus the addressing-mode column for the second operand.
fn table_shape(
    mnemonic: Mnemonic,
    base: u8,
    op1: Operand,
    op2: Operand,
    op1_text: &str,
    op2_text: &str,
) -> Result<Shape, AsmError> {
    let mut opcode = match op1 {
        Operand::Register(Register::Acc) => base,
        Operand::Register(Register::Ix) => base + 8,
        _ => return Err(invalid_operand_error(mnemonic, op1_text)),
    };

    // ST writes to memory; a register or bare value as the destination is
    // a programming error in the source.
    let st_reject = |op2_text: &str| -> AsmError {
        AsmError::new(
            AsmErrorKind::InvalidOperand,
            format!(
                "invalid operand '{}' of 'ST' (use 'LD' to set registers)",
                op2_text
            ),
        )
    };

    let operand = match op2 {
        Operand::Register(Register::Acc) => {
            if mnemonic == Mnemonic::St {
                return Err(st_reject(op2_text));
            }
            None
        }
        Operand::Register(Register::Ix) => {
            if mnemonic == Mnemonic::St {
                return Err(st_reject(op2_text));
            }
            opcode += 1;
            None
        }
        Operand::Register(Register::Sp) => {
            return Err(invalid_operand_error(mnemonic, op2_text));
        }
        Operand::Immediate(expr) => {
            if mnemonic == Mnemonic::St {
                return Err(st_reject(op2_text));
            }
            opcode += 2;
            Some(expr)
        }
        Operand::SpRelative(expr) => {
            opcode += 3;
            Some(expr)
        }
        Operand::Indirect(expr) => {
            opcode += 4;
            Some(expr)
        }
        Operand::LegacyIndirect(expr) => {
            opcode += 5;
            Some(expr)
        }
        Operand::IxRelative(expr) => {
            opcode += 6;
            Some(expr)
        }
        Operand::LegacyIxRelative(expr) => {
            opcode += 7;
            Some(expr)
        }
    };

    Ok((opcode, operand))
}
