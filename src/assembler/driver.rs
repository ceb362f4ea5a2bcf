//! The two-pass assembler driver.
//!
//! Pass 1 walks the line list allocating addresses and populating the
//! symbol table; it never needs operand values, so forward references
//! cost nothing. Pass 2 walks the list again with the table complete and
//! produces the final opcode/operand words. The `LOC`/`DAT` data cursor
//! lives apart from the code cursor and is resolved authoritatively in
//! pass 2.

use super::encoder::{self, EncodeMode, Encoding, Mnemonic};
use super::error::{AsmError, AsmErrorKind};
use super::expr;
use super::parser::{LineParser, ParsedLine};
use super::render;
use super::symbol::SymbolTable;
use super::Mode;

/// One source line plus everything the two passes decided about it.
pub struct Line {
    pub parsed: ParsedLine,
    pub mnemonic: Option<Mnemonic>,
    /// Allocated address in bytes (code space, or data space for `DAT`).
    pub addr: Option<i64>,
    /// Opcode byte, or the data word itself for `DAT`.
    pub opcode: Option<i64>,
    pub operand: Option<i64>,
    /// Width in address units, fixed by pass 1.
    pub width: Option<usize>,
}

/// Mutable state threaded through both passes. Created fresh per run and
/// discarded afterwards; nothing survives between assemblies.
pub struct AssemblyContext {
    /// Code-address cursor, in bytes.
    pub cur_addr: i64,
    /// Data-address cursor, unset until a `LOC` establishes it.
    pub loc_addr: Option<i64>,
    pub symbols: SymbolTable,
    pub is_ended: bool,
}

/// The result of a successful run.
#[derive(Debug)]
pub struct Output {
    /// The rendered listing, newline-terminated.
    pub listing: String,
    /// The final symbol table, for diagnostic dumps.
    pub symbols: SymbolTable,
}

pub struct Assembler {
    mode: Mode,
    lines: Vec<Line>,
    ctx: AssemblyContext,
}

fn located(error: AsmError, line: &ParsedLine) -> AsmError {
    error.at_line(line.number, &line.raw)
}

impl Assembler {
    /// Tokenizes the source and resolves each mnemonic token against the
    /// closed mnemonic set. Unknown mnemonics fail here, before any pass.
    pub fn new(source: &str, mode: Mode) -> Result<Self, AsmError> {
        let parser = LineParser::new();
        let mut lines = Vec::new();
        for (index, raw) in source.split('\n').enumerate() {
            let parsed = parser.parse(raw, index + 1);
            let mnemonic = match parsed.mnemonic.as_deref() {
                Some(token) => Some(Mnemonic::from_token(token).ok_or_else(|| {
                    located(
                        AsmError::new(
                            AsmErrorKind::UnknownMnemonic,
                            format!("invalid mnemonic '{}'", token),
                        ),
                        &parsed,
                    )
                })?),
                None => None,
            };
            lines.push(Line {
                parsed,
                mnemonic,
                addr: None,
                opcode: None,
                operand: None,
                width: None,
            });
        }
        Ok(Assembler {
            mode,
            lines,
            ctx: AssemblyContext {
                cur_addr: 0,
                loc_addr: None,
                symbols: SymbolTable::new(),
                is_ended: false,
            },
        })
    }

    /// Runs both passes and renders the listing.
    pub fn run(mut self) -> Result<Output, AsmError> {
        info!("start assemble ({} lines)", self.lines.len());
        self.allocate()?;
        self.encode()?;
        if !self.ctx.is_ended {
            warn!("'END' instruction is not found");
        }
        let listing = render::render(&self.lines, self.mode);
        Ok(Output {
            listing,
            symbols: self.ctx.symbols,
        })
    }

    /// Pass 1: address allocation and symbol binding.
    fn allocate(&mut self) -> Result<(), AsmError> {
        debug!("pass 1: allocate addresses");
        let unit = self.mode.addr_unit_bytes();
        let ctx = &mut self.ctx;
        // Labels on mnemonic-less lines carry forward to the next
        // mnemonic-bearing line.
        let mut pending: Vec<String> = Vec::new();

        for line in &mut self.lines {
            if line.parsed.is_blank() {
                continue;
            }

            if line.mnemonic == Some(Mnemonic::Equ) {
                // Dangling labels ahead of an EQU still name the current
                // code address; only the EQU's own label takes its value.
                for name in pending.drain(..) {
                    ctx.symbols
                        .bind(&name, ctx.cur_addr)
                        .map_err(|e| located(e, &line.parsed))?;
                }
                process_equ(ctx, &line.parsed)?;
                continue;
            }

            if let Some(name) = &line.parsed.label {
                pending.push(name.clone());
            }
            let mnemonic = match line.mnemonic {
                Some(m) => m,
                None => continue,
            };
            for name in pending.drain(..) {
                ctx.symbols
                    .bind(&name, ctx.cur_addr)
                    .map_err(|e| located(e, &line.parsed))?;
            }

            match mnemonic {
                Mnemonic::Equ => {}
                Mnemonic::End => {
                    // Pass 1 keeps going so labels after END still bind;
                    // END itself consumes no address units.
                }
                Mnemonic::Loc => {
                    let op1 = line.parsed.op1.as_deref().ok_or_else(|| {
                        located(
                            AsmError::new(
                                AsmErrorKind::OperandCount,
                                "expected 1 operand(s) for LOC",
                            ),
                            &line.parsed,
                        )
                    })?;
                    // The operand may reference labels not yet bound;
                    // pass 2 re-evaluates with the table complete.
                    match expr::evaluate(op1, &ctx.symbols) {
                        Ok(addr) => {
                            ctx.loc_addr = Some(addr);
                            debug!("loc addr: {}", addr);
                        }
                        Err(e) if e.kind == AsmErrorKind::UnresolvedSymbol => {
                            debug!("loc operand '{}' not resolvable yet", op1);
                        }
                        Err(e) => return Err(located(e, &line.parsed)),
                    }
                }
                Mnemonic::Dat => {
                    // Consumes a data unit at the LOC cursor; the code
                    // cursor is unaffected and the address is assigned in
                    // pass 2 once LOC is final.
                }
                _ => {
                    let encoding = encoder::encode(mnemonic, &line.parsed, EncodeMode::Allocate)
                        .map_err(|e| located(e, &line.parsed))?;
                    let width = encoding.width();
                    line.width = Some(width);
                    line.addr = Some(ctx.cur_addr);
                    ctx.cur_addr += width as i64 * unit;
                }
            }
        }
        Ok(())
    }

    /// Pass 2: full encoding against the completed symbol table.
    fn encode(&mut self) -> Result<(), AsmError> {
        debug!("pass 2: encode");
        let unit = self.mode.addr_unit_bytes();
        let ctx = &mut self.ctx;
        // The data cursor restarts with the pass: a DAT is only valid once
        // a LOC earlier in source order has set it, so a value left over
        // from pass 1 must not carry across.
        ctx.loc_addr = None;

        for line in &mut self.lines {
            if line.parsed.is_blank() {
                continue;
            }
            let mnemonic = match line.mnemonic {
                Some(m) => m,
                None => continue,
            };

            match mnemonic {
                Mnemonic::End => {
                    ctx.is_ended = true;
                    break;
                }
                Mnemonic::Equ => {}
                Mnemonic::Loc => {
                    let op1 = line.parsed.op1.as_deref().ok_or_else(|| {
                        located(
                            AsmError::new(
                                AsmErrorKind::OperandCount,
                                "expected 1 operand(s) for LOC",
                            ),
                            &line.parsed,
                        )
                    })?;
                    let addr =
                        expr::evaluate(op1, &ctx.symbols).map_err(|e| located(e, &line.parsed))?;
                    ctx.loc_addr = Some(addr);
                    debug!("loc addr: {}", addr);
                }
                Mnemonic::Dat => {
                    let op1 = line.parsed.op1.as_deref().ok_or_else(|| {
                        located(
                            AsmError::new(
                                AsmErrorKind::OperandCount,
                                "expected 1 operand(s) for DAT",
                            ),
                            &line.parsed,
                        )
                    })?;
                    let addr = ctx.loc_addr.ok_or_else(|| {
                        located(
                            AsmError::new(
                                AsmErrorKind::MissingLocAddress,
                                "address for LOC is not defined",
                            ),
                            &line.parsed,
                        )
                    })?;
                    let value =
                        expr::evaluate(op1, &ctx.symbols).map_err(|e| located(e, &line.parsed))?;
                    line.addr = Some(addr);
                    line.opcode = Some(value);
                    ctx.loc_addr = Some(addr + unit);
                }
                _ => {
                    let encoding =
                        encoder::encode(mnemonic, &line.parsed, EncodeMode::Full(&ctx.symbols))
                            .map_err(|e| located(e, &line.parsed))?;
                    if let Encoding::Code(encoded) = encoding {
                        // Pass 1 and pass 2 share the shape analysis, so
                        // the widths cannot diverge.
                        debug_assert_eq!(Some(encoded.width()), line.width);
                        line.opcode = Some(i64::from(encoded.opcode));
                        line.operand = encoded.operand;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Binds the EQU label: a `CA` operand names the current code address and
/// consumes nothing; anything else is an expression over already-bound
/// labels.
fn process_equ(ctx: &mut AssemblyContext, parsed: &ParsedLine) -> Result<(), AsmError> {
    let label = parsed.label.as_deref().ok_or_else(|| {
        located(
            AsmError::new(AsmErrorKind::Syntax, "label not found for EQU"),
            parsed,
        )
    })?;
    let op1 = parsed.op1.as_deref().ok_or_else(|| {
        located(
            AsmError::new(AsmErrorKind::OperandCount, "expected 1 operand(s) for EQU"),
            parsed,
        )
    })?;

    let value = if op1 == "CA" {
        ctx.cur_addr
    } else {
        expr::evaluate(op1, &ctx.symbols).map_err(|e| located(e, parsed))?
    };
    ctx.symbols
        .bind(label, value)
        .map_err(|e| located(e, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(source: &str, mode: Mode) -> Result<Output, AsmError> {
        Assembler::new(source, mode)?.run()
    }

    fn listing(source: &str, mode: Mode) -> String {
        assemble(source, mode).expect("assembly succeeds").listing
    }

    #[test]
    fn test_equ_binds_literals() {
        let out = assemble("L: EQU 12H", Mode::Kuechip3).unwrap();
        assert_eq!(out.symbols.resolve("L"), Some(18));

        let out = assemble("L: EQU 12", Mode::Kuechip3).unwrap();
        assert_eq!(out.symbols.resolve("L"), Some(12));
    }

    #[test]
    fn test_loc_dat_forward_reference_scenario() {
        let source = "\
        LOC  AFTER
        DAT  1
        DAT  2

        EOR  ACC, ACC

AFTER:  EQU  CA
        END
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        // One 1-unit instruction (2 bytes in kuechip3) precedes AFTER.
        assert_eq!(out.symbols.resolve("AFTER"), Some(2));
        // The DAT words land at 2 and 4, leaving the data cursor at 6.
        assert!(out.listing.contains("0002: 0001"));
        assert!(out.listing.contains("0004: 0002"));
        // The EOR itself sits at code address 0.
        assert!(out.listing.contains("0000: 00C0"));
    }

    #[test]
    fn test_forward_branch_resolves() {
        let source = "\
        BA   DONE
        HLT
DONE:   HLT
        END
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        assert_eq!(out.symbols.resolve("DONE"), Some(6));
        assert!(out.listing.contains("0000: 0030 0006"));
    }

    #[test]
    fn test_st_register_destination_fails() {
        let err = assemble("        ST ACC, ACC", Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::InvalidOperand);
        assert_eq!(err.line.as_ref().map(|(n, _)| *n), Some(1));
    }

    #[test]
    fn test_dangling_label_carries_forward() {
        let source = "\
        NOP
WAIT:
        HLT
        END
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        assert_eq!(out.symbols.resolve("WAIT"), Some(2));
    }

    #[test]
    fn test_equ_ca_does_not_advance_cursor() {
        let source = "\
        NOP
HERE:   EQU CA
        NOP
        END
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        assert_eq!(out.symbols.resolve("HERE"), Some(2));
        // The second NOP still lands at 2: EQU consumed nothing.
        assert!(out.listing.contains("0002: 0000"));
    }

    #[test]
    fn test_dat_before_loc_is_an_error() {
        let source = "\
        DAT 1
        END
";
        let err = assemble(source, Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::MissingLocAddress);
    }

    #[test]
    fn test_dat_before_a_later_loc_is_still_an_error() {
        // The LOC must be in force by source order, not merely by the end
        // of the run; a DAT ahead of the first LOC must not inherit it.
        let source = "\
        DAT 1
        LOC 100
        END
";
        let err = assemble(source, Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::MissingLocAddress);
        assert_eq!(err.line.as_ref().map(|(n, _)| *n), Some(1));
    }

    #[test]
    fn test_duplicate_label_is_an_error() {
        let source = "\
A:      NOP
A:      NOP
        END
";
        let err = assemble(source, Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::DuplicateLabel);
    }

    #[test]
    fn test_unknown_mnemonic_is_an_error() {
        let err = assemble("        FOO 1", Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::UnknownMnemonic);
    }

    #[test]
    fn test_missing_end_still_succeeds() {
        // Degrades to a warning; the listing is produced regardless.
        let out = assemble("        NOP", Mode::Kuechip3).unwrap();
        assert!(out.listing.contains("0000: 0000"));
    }

    #[test]
    fn test_end_stops_encoding() {
        let source = "\
        HLT
        END
        HLT
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        let lines: Vec<&str> = out.listing.split('\n').collect();
        assert!(lines[0].contains("0000: 000F"));
        // The trailing HLT was allocated in pass 1 but never encoded.
        assert!(!lines[2].contains("000F"));
    }

    #[test]
    fn test_negative_operand_rendering_per_mode() {
        let source = "        LD ACC, -1\n        END\n";
        assert!(listing(source, Mode::Kuechip3).contains("0000: 0062 FFFF"));
        assert!(listing(source, Mode::Kuechip2).contains("00: 62 FF"));
    }

    #[test]
    fn test_kuechip2_field_widths() {
        let source = "\
        EOR ACC, ACC
        END
";
        let out = listing(source, Mode::Kuechip2);
        assert!(out.contains("00: C0"));
    }

    #[test]
    fn test_mode_changes_address_stride() {
        let source = "\
        NOP
        NOP
        END
";
        assert!(listing(source, Mode::Kuechip2).contains("01: 00"));
        assert!(listing(source, Mode::Kuechip3).contains("0002: 0000"));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let source = "\
        LOC  100
        DAT  FFH
START:  LD   ACC, [IX+1]
        ADD  ACC, START
        BA   START
        END
";
        let first = listing(source, Mode::Kuechip3);
        let second = listing(source, Mode::Kuechip3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_comment_only_lines_render_comment_only() {
        let out = listing("# header\n        NOP\n        END\n", Mode::Kuechip3);
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines[0], format!("{:<17}# # header", ""));
    }

    #[test]
    fn test_listing_is_newline_terminated() {
        assert!(listing("        NOP\n        END", Mode::Kuechip3).ends_with('\n'));
    }

    #[test]
    fn test_equ_without_label_fails() {
        let err = assemble("        EQU 1", Mode::Kuechip3).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::Syntax);
    }

    #[test]
    fn test_width_invariant_across_modes() {
        // Every rendered instruction line shows exactly the number of hex
        // fields its pass-1 width promised.
        let source = "\
        LD   ACC, 1
        PSH  ACC
        CAL  SUB1
SUB1:   RET
        END
";
        let out = assemble(source, Mode::Kuechip3).unwrap();
        for line in out.listing.lines() {
            let body = line.split('#').next().unwrap_or("");
            let fields = body.split_whitespace().count();
            assert!(fields <= 3);
        }
        assert_eq!(out.symbols.resolve("SUB1"), Some(10));
    }
}
