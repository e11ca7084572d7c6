//! Category-dispatching translator from tokenized HOIL lines to COIL records.
//!
//! Owns the symbol and label tables and the next-free static address counter (via
//! [`crate::symbol::SymbolTable`]).

use coil::record::{pack_jcond, pack_shift, pack_syscall_args, pack_two, Condition, Opcode, Record};
use coil::types::MemoryType;
use util::EnumFromStr;

use crate::error::{AssembleError, ErrorKind};
use crate::labels::LabelTable;
use crate::symbol::{Symbol, SymbolTable};
use crate::tokenizer::tokenize;

pub struct Assembler {
    symbols: SymbolTable,
    labels: LabelTable,
    records: Vec<Record>,
}

/// Assembles a complete HOIL source string into its COIL records.
pub fn assemble(source: &str) -> Result<Vec<Record>, AssembleError> {
    let mut assembler = Assembler::new();
    let mut last_line = 0;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        last_line = line;
        let tokens =
            tokenize(raw_line).map_err(|err| AssembleError { line, kind: err.into() })?;
        if tokens.is_empty() {
            continue;
        }
        assembler
            .assemble_line(&tokens)
            .map_err(|kind| AssembleError { line, kind })?;
    }

    assembler
        .labels
        .finish()
        .map_err(|err| AssembleError { line: last_line, kind: err.into() })?;

    Ok(assembler.records)
}

impl Assembler {
    fn new() -> Assembler {
        Assembler { symbols: SymbolTable::new(), labels: LabelTable::new(), records: Vec::new() }
    }

    fn emit(&mut self, opcode: Opcode, ty: u8, var: u16, imm: u64) {
        self.records.push(Record::new(opcode.value(), ty, var, imm));
    }

    fn assemble_line(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (category, rest) = tokens.split_first().expect("tokenize never yields empty tokens");
        match *category {
            "VAL" => self.assemble_val(rest),
            "MATH" => self.assemble_math(rest),
            "BIT" => self.assemble_bit(rest),
            "CF" => self.assemble_cf(rest),
            "MEM" => self.assemble_mem(rest),
            other => Err(ErrorKind::UnknownCategory(other.to_owned())),
        }
    }

    /// Resolves an operand token to a static-memory address: a leading `&` is
    /// stripped as an address-of marker, a leading decimal digit means a literal
    /// numeric address, otherwise it is a symbol lookup.
    fn resolve_address(&self, token: &str) -> Result<u16, ErrorKind> {
        let token = token.strip_prefix('&').unwrap_or(token);
        if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            token
                .parse::<u16>()
                .map_err(|_| ErrorKind::InvalidInteger(token.to_owned()))
        } else {
            Ok(self.symbols.require(token)?.address)
        }
    }

    fn resolve_or_alloc_int64(&mut self, name: &str) -> Result<Symbol, ErrorKind> {
        match self.symbols.get(name) {
            Some(symbol) => Ok(symbol),
            None => Ok(self.symbols.define(name, MemoryType::Int64)?),
        }
    }

    fn assemble_val(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (op, rest) = tokens.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "VAL <op> ...",
            got: 0,
        })?;

        if rest.len() != 3 {
            return Err(ErrorKind::WrongTokenCount { expected: "VAL <op> <type> <a> <b>", got: rest.len() });
        }
        let ty = MemoryType::from_str(rest[0])?;

        match *op {
            "DEFV" => {
                let value = parse_immediate(rest[2])?;
                let symbol = self.symbols.define(rest[1], ty)?;
                self.emit(Opcode::AllocImm, ty.code(), symbol.address, value);
            }
            "MOVV" => {
                let src_addr = self.resolve_address(rest[2])?;
                let dest = match self.symbols.get(rest[1]) {
                    Some(symbol) => symbol,
                    None => self.symbols.define(rest[1], ty)?,
                };
                self.emit(Opcode::AllocMem, ty.code(), dest.address, src_addr as u64);
            }
            "LOAD" => {
                let addr = self.resolve_address(rest[2])?;
                let dest = self.symbols.define(rest[1], ty)?;
                self.emit(Opcode::Load, ty.code(), dest.address, addr as u64);
            }
            "STORE" => {
                let addr = self.resolve_address(rest[1])?;
                let src = self.resolve_address(rest[2])?;
                self.emit(Opcode::Store, ty.code(), addr, src as u64);
            }
            other => return Err(ErrorKind::UnknownOperation { category: "VAL", op: other.to_owned() }),
        }
        Ok(())
    }

    fn assemble_math(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (op, rest) = tokens.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "MATH <op> ...",
            got: 0,
        })?;

        if *op == "NEG" {
            if rest.len() != 2 {
                return Err(ErrorKind::WrongTokenCount { expected: "MATH NEG <dest> <src>", got: rest.len() });
            }
            let dest = self.resolve_or_alloc_int64(rest[0])?;
            let src = self.resolve_address(rest[1])?;
            self.emit(Opcode::Neg, MemoryType::Int64.code(), dest.address, src as u64);
            return Ok(());
        }

        if rest.len() != 3 {
            return Err(ErrorKind::WrongTokenCount {
                expected: "MATH <op> <dest> <src1> <src2>",
                got: rest.len(),
            });
        }
        let opcode = match *op {
            "ADD" => Opcode::Add,
            "SUB" => Opcode::Sub,
            "MUL" => Opcode::Mul,
            "DIV" => Opcode::Div,
            "MOD" => Opcode::Mod,
            other => return Err(ErrorKind::UnknownOperation { category: "MATH", op: other.to_owned() }),
        };
        let dest = self.resolve_or_alloc_int64(rest[0])?;
        let src1 = self.resolve_address(rest[1])?;
        let src2 = self.resolve_address(rest[2])?;
        self.emit(opcode, MemoryType::Int64.code(), dest.address, pack_two(src1, src2));
        Ok(())
    }

    fn assemble_bit(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (op, rest) = tokens.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "BIT <op> ...",
            got: 0,
        })?;

        match *op {
            "NOT" => {
                if rest.len() != 2 {
                    return Err(ErrorKind::WrongTokenCount { expected: "BIT NOT <dest> <src>", got: rest.len() });
                }
                let dest = self.resolve_or_alloc_int64(rest[0])?;
                let src = self.resolve_address(rest[1])?;
                self.emit(Opcode::Not, MemoryType::Int64.code(), dest.address, src as u64);
            }
            "SHL" | "SHR" => {
                if rest.len() != 3 {
                    return Err(ErrorKind::WrongTokenCount {
                        expected: "BIT SHL|SHR <dest> <src> <shift>",
                        got: rest.len(),
                    });
                }
                let opcode = if *op == "SHL" { Opcode::Shl } else { Opcode::Shr };
                let dest = self.resolve_or_alloc_int64(rest[0])?;
                let src = self.resolve_address(rest[1])?;
                let shift = parse_plain_integer(rest[2])? as u32;
                self.emit(opcode, MemoryType::Int64.code(), dest.address, pack_shift(src, shift));
            }
            "AND" | "OR" | "XOR" => {
                if rest.len() != 3 {
                    return Err(ErrorKind::WrongTokenCount {
                        expected: "BIT AND|OR|XOR <dest> <src1> <src2>",
                        got: rest.len(),
                    });
                }
                let opcode = match *op {
                    "AND" => Opcode::And,
                    "OR" => Opcode::Or,
                    "XOR" => Opcode::Xor,
                    _ => unreachable!(),
                };
                let dest = self.resolve_or_alloc_int64(rest[0])?;
                let src1 = self.resolve_address(rest[1])?;
                let src2 = self.resolve_address(rest[2])?;
                self.emit(opcode, MemoryType::Int64.code(), dest.address, pack_two(src1, src2));
            }
            other => return Err(ErrorKind::UnknownOperation { category: "BIT", op: other.to_owned() }),
        }
        Ok(())
    }

    fn assemble_cf(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (op, rest) = tokens.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "CF <op> ...",
            got: 0,
        })?;

        match *op {
            "JMP" => {
                expect_len(rest, 1, "CF JMP <label>")?;
                let label_id = self.labels.resolve_or_declare(rest[0])?;
                self.emit(Opcode::Jmp, 0, 0, label_id as u64);
            }
            "JCOND" => {
                expect_len(rest, 4, "CF JCOND <cond> <src1> <src2> <label>")?;
                let condition = parse_condition(rest[0])?;
                let src1 = self.resolve_address(rest[1])?;
                let src2 = self.resolve_address(rest[2])?;
                let label_id = self.labels.resolve_or_declare(rest[3])?;
                self.emit(condition.opcode(), 0, 0, pack_jcond(src1, src2, label_id));
            }
            "LABEL" => {
                expect_len(rest, 1, "CF LABEL <name>")?;
                let label_id = self.labels.define(rest[0])?;
                self.emit(Opcode::Label, 0, label_id, 0);
            }
            "CALL" => {
                expect_len(rest, 1, "CF CALL <name>")?;
                let label_id = self.labels.resolve_or_declare(rest[0])?;
                self.emit(Opcode::Call, 0, 0, label_id as u64);
            }
            "RET" => {
                expect_len(rest, 0, "CF RET")?;
                self.emit(Opcode::Ret, 0, 0, 0);
            }
            "PUSH" => {
                expect_len(rest, 1, "CF PUSH <sym>")?;
                let symbol = self.symbols.require(rest[0])?;
                self.emit(Opcode::Push, symbol.ty.code(), symbol.address, 0);
            }
            "POP" => {
                expect_len(rest, 1, "CF POP <sym>")?;
                let symbol = self.resolve_or_alloc_int64(rest[0])?;
                self.emit(Opcode::Pop, symbol.ty.code(), symbol.address, 0);
            }
            "SYSC" => self.assemble_sysc(rest)?,
            "EXIT" => {
                // `EXIT` takes either a literal status or a symbol whose runtime
                // value becomes the status; a known symbol always wins so a bare
                // decimal that happens to share a name with one still dereferences.
                expect_len(rest, 1, "CF EXIT <code|sym>")?;
                let bare = rest[0].strip_prefix('&').unwrap_or(rest[0]);
                match self.symbols.get(bare) {
                    Some(symbol) => {
                        self.emit(Opcode::Exit, MemoryType::Int64.code(), 0, symbol.address as u64);
                    }
                    None => {
                        let code = parse_plain_integer(rest[0])?;
                        self.emit(Opcode::Exit, MemoryType::None.code(), 0, code as u64);
                    }
                }
            }
            other => return Err(ErrorKind::UnknownOperation { category: "CF", op: other.to_owned() }),
        }
        Ok(())
    }

    /// `MEM` operations drive the VM's heap allocator. They are not part of the
    /// category list `hoil`'s informal grammar spells out for VAL/MATH/BIT/CF, but
    /// the wire format reserves opcodes for exactly these four operations, so a
    /// program has to be able to reach them from source.
    fn assemble_mem(&mut self, tokens: &[&str]) -> Result<(), ErrorKind> {
        let (op, rest) = tokens.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "MEM <op> ...",
            got: 0,
        })?;

        match *op {
            "ALLOC" => {
                expect_len(rest, 2, "MEM ALLOC <dest> <size>")?;
                let dest = self.resolve_or_alloc_int64(rest[0])?;
                let size = parse_plain_integer(rest[1])?;
                self.emit(Opcode::MemAlloc, MemoryType::Ptr.code(), dest.address, size as u64);
            }
            "FREE" => {
                expect_len(rest, 1, "MEM FREE <ptr>")?;
                let ptr = self.symbols.require(rest[0])?;
                self.emit(Opcode::MemFree, MemoryType::Ptr.code(), ptr.address, 0);
            }
            "READ" => {
                expect_len(rest, 3, "MEM READ <dest> <ptr> <size>")?;
                let dest = self.resolve_or_alloc_int64(rest[0])?;
                let ptr = self.symbols.require(rest[1])?;
                let size = parse_plain_integer(rest[2])?;
                self.emit(
                    Opcode::MemRead,
                    MemoryType::Int64.code(),
                    dest.address,
                    pack_mem(size as u32, ptr.address),
                );
            }
            "WRITE" => {
                expect_len(rest, 3, "MEM WRITE <ptr> <src> <size>")?;
                let ptr = self.symbols.require(rest[0])?;
                let src = self.symbols.require(rest[1])?;
                let size = parse_plain_integer(rest[2])?;
                self.emit(
                    Opcode::MemWrite,
                    MemoryType::Int64.code(),
                    src.address,
                    pack_mem(size as u32, ptr.address),
                );
            }
            other => return Err(ErrorKind::UnknownOperation { category: "MEM", op: other.to_owned() }),
        }
        Ok(())
    }

    fn assemble_sysc(&mut self, rest: &[&str]) -> Result<(), ErrorKind> {
        let (num, arg_tokens) = rest.split_first().ok_or(ErrorKind::WrongTokenCount {
            expected: "CF SYSC <num> [arg...]",
            got: 0,
        })?;
        let num = parse_plain_integer(num)?;
        self.emit(Opcode::Syscall, 0, 0, num as u64);

        if arg_tokens.is_empty() {
            return Ok(());
        }
        if arg_tokens.len() > 4 {
            return Err(ErrorKind::TooManySyscallArgs(arg_tokens.len()));
        }

        let mut args = Vec::with_capacity(arg_tokens.len());
        for token in arg_tokens {
            args.push(self.resolve_syscall_arg(token)?);
        }
        self.emit(Opcode::SyscallArgs, 0, 0, pack_syscall_args(&args));
        Ok(())
    }

    /// A `SYSC` argument token is either `SIZE(sym)` (byte size of a symbol's
    /// type), `SIZEOF(type)` (byte size of a bare type keyword), or an ordinary
    /// address-resolved identifier/literal.
    fn resolve_syscall_arg(&self, token: &str) -> Result<u16, ErrorKind> {
        if let Some(inner) = strip_call(token, "SIZE") {
            let symbol = self.symbols.require(inner)?;
            return Ok(symbol.ty.byte_size() as u16);
        }
        if let Some(inner) = strip_call(token, "SIZEOF") {
            let ty = MemoryType::from_str(inner)?;
            return Ok(ty.byte_size() as u16);
        }
        self.resolve_address(token)
    }
}

/// Packs `MEM READ`/`MEM WRITE`'s `(size, ptr_symbol_address)` pair the same way
/// `coil::record::pack_two` packs two addresses, for the opcode's `size`/pointer
/// split of the immediate.
fn pack_mem(size: u32, ptr_addr: u16) -> u64 {
    ((ptr_addr as u64) << 32) | (size as u64)
}

fn strip_call<'a>(token: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{}(", name);
    token.strip_prefix(prefix.as_str())?.strip_suffix(')')
}

fn expect_len(tokens: &[&str], want: usize, shape: &'static str) -> Result<(), ErrorKind> {
    if tokens.len() == want {
        Ok(())
    } else {
        Err(ErrorKind::WrongTokenCount { expected: shape, got: tokens.len() })
    }
}

fn parse_condition(token: &str) -> Result<Condition, ErrorKind> {
    Ok(match token {
        "EQ" => Condition::Eq,
        "NE" => Condition::Ne,
        "LT" => Condition::Lt,
        "LE" => Condition::Le,
        "GT" => Condition::Gt,
        "GE" => Condition::Ge,
        other => return Err(ErrorKind::UnknownCondition(other.to_owned())),
    })
}

/// Parses a plain base-10 integer (shift counts, syscall numbers, exit codes).
fn parse_plain_integer(token: &str) -> Result<i64, ErrorKind> {
    token.parse::<i64>().map_err(|_| ErrorKind::InvalidInteger(token.to_owned()))
}

/// Parses a `DEFV` immediate: `true`/`false`, a signed base-10 integer, or `idN`
/// (an integer carried over from the label/register syntax this grammar reuses).
fn parse_immediate(token: &str) -> Result<u64, ErrorKind> {
    match token {
        "true" => return Ok(1),
        "false" => return Ok(0),
        _ => {}
    }
    if let Some(digits) = token.strip_prefix("id") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return digits
                .parse::<u64>()
                .map_err(|_| ErrorKind::InvalidInteger(token.to_owned()));
        }
    }
    let starts_numeric = token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+');
    if starts_numeric {
        token
            .parse::<i64>()
            .map(|value| value as u64)
            .map_err(|_| ErrorKind::InvalidInteger(token.to_owned()))
    } else {
        Err(ErrorKind::InvalidInteger(token.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use coil::record::unpack_two;

    #[test]
    fn defv_allocates_and_emits_alloc_imm() {
        let records = assemble("VAL DEFV int64 a 5\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].opcode, Opcode::AllocImm.value());
        assert_eq!(records[0].var, 0);
        assert_eq!(records[0].imm, 5);
    }

    #[test]
    fn movv_resolves_ampersand_prefixed_source() {
        let records = assemble("VAL DEFV int64 a 7\nVAL MOVV int64 b &a\n").unwrap();
        assert_eq!(records[1].opcode, Opcode::AllocMem.value());
        assert_eq!(records[1].imm, 0); // a's address
    }

    #[test]
    fn math_add_auto_allocates_destination_as_int64() {
        let records = assemble(
            "VAL DEFV int64 a 2\nVAL DEFV int64 b 3\nMATH ADD c a b\n",
        )
        .unwrap();
        let add = &records[2];
        assert_eq!(add.opcode, Opcode::Add.value());
        let (src1, src2) = unpack_two(add.imm);
        assert_eq!((src1, src2), (0, 8));
    }

    #[test]
    fn jmp_to_undefined_label_is_fatal_at_eof() {
        let err = assemble("CF JMP nowhere\n").unwrap_err();
        matches_undefined(&err);
    }

    fn matches_undefined(err: &AssembleError) {
        match &err.kind {
            ErrorKind::Label(crate::labels::LabelError::Undefined(names)) => {
                assert_eq!(names, &["nowhere".to_owned()]);
            }
            other => panic!("expected undefined label error, got {:?}", other),
        }
    }

    #[test]
    fn forward_call_and_later_label_share_an_id() {
        let records = assemble("CF CALL sub\nCF RET\nCF LABEL sub\nCF RET\n").unwrap();
        assert_eq!(records[0].opcode, Opcode::Call.value());
        assert_eq!(records[2].opcode, Opcode::Label.value());
        assert_eq!(records[0].imm as u16, records[2].var);
    }

    #[test]
    fn sysc_with_args_emits_a_continuation_record() {
        let records = assemble("VAL DEFV int8 buf 72\nCF SYSC 1 1 &buf 3\n").unwrap();
        assert_eq!(records[1].opcode, Opcode::Syscall.value());
        assert_eq!(records[2].opcode, Opcode::SyscallArgs.value());
    }

    #[test]
    fn wrong_token_count_is_rejected() {
        let err = assemble("VAL DEFV int64 a\n").unwrap_err();
        assert_eq!(err.line, 1);
        matches!(err.kind, ErrorKind::WrongTokenCount { .. });
    }
}
