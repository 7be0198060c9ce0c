use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::{enum_to_word, Funct, InstrKind, Instruction, Opcode};
use crate::register::{register_number, REG_AT};
use crate::{Byte, Half};

/// A rejected source line, carrying the offending text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}: '{line}'")]
pub struct SyntaxError {
    pub message: String,
    pub line: String,
}

fn err(message: &str, line: &str) -> SyntaxError {
    SyntaxError {
        message: message.to_string(),
        line: line.to_string(),
    }
}

lazy_static! {
    // One pattern per operand shape; the mnemonic capture is checked against
    // the dispatched name so a stray line can never parse as the wrong form.
    static ref THREE_REG: Regex =
        Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(\$\w+)\s*,\s*(\$\w+)$").unwrap();
    static ref REG_REG_IMM: Regex =
        Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(\$\w+)\s*,\s*(-?\w+)$").unwrap();
    static ref REG_REG_LABEL: Regex =
        Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(\$\w+)\s*,\s*([a-z_][a-z0-9_]*)$").unwrap();
    static ref MEM_OFFSET: Regex =
        Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(-?\w+)\s*\(\s*(\$\w+)\s*\)$").unwrap();
    static ref TWO_REG: Regex = Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(\$\w+)$").unwrap();
    static ref REG_IMM: Regex = Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*(-?\w+)$").unwrap();
    static ref REG_LABEL: Regex =
        Regex::new(r"^([a-z]+)\s+(\$\w+)\s*,\s*([a-z_][a-z0-9_]*)$").unwrap();
    static ref LABEL_ONLY: Regex = Regex::new(r"^([a-z]+)\s+([a-z_][a-z0-9_]*)$").unwrap();
    static ref BARE: Regex = Regex::new(r"^([a-z]+)$").unwrap();
}

/// Parses a numeric literal: `0x…` hexadecimal, `0b…` binary, a leading zero
/// selects octal, anything else decimal; a leading `-` negates.
pub fn parse_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if body.is_empty() {
        return None;
    }

    let value = if let Some(digits) = body.strip_prefix("0x") {
        i64::from_str_radix(digits, 16).ok()?
    } else if let Some(digits) = body.strip_prefix("0b") {
        i64::from_str_radix(digits, 2).ok()?
    } else if body != "0" && body.starts_with('0') {
        i64::from_str_radix(&body[1..], 8).ok()?
    } else {
        body.parse::<i64>().ok()?
    };

    Some(if negative { -value } else { value })
}

/// One parser per mnemonic; [`Parser::parse`] turns a source line into the
/// instruction records it stands for. Pseudo mnemonics expand to one or two
/// records of real kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parser {
    Add,
    Sll,
    Slt,
    Syscall,
    Addi,
    Beq,
    Bne,
    Lb,
    Lui,
    Ori,
    B,
    Beqz,
    Bge,
    La,
    Li,
    Nop,
    Subi,
}

impl Parser {
    pub fn parse(&self, line: &str) -> Result<Vec<Instruction>, SyntaxError> {
        let line = line.trim().to_lowercase();
        if line.is_empty() {
            return Err(err("empty input", &line));
        }

        match self {
            Parser::Add => parse_add(&line),
            Parser::Sll => parse_sll(&line),
            Parser::Slt => parse_slt(&line),
            Parser::Syscall => parse_syscall(&line),
            Parser::Addi => parse_addi(&line),
            Parser::Beq => parse_branch("beq", &line),
            Parser::Bne => parse_branch("bne", &line),
            Parser::Lb => parse_lb(&line),
            Parser::Lui => parse_lui(&line),
            Parser::Ori => parse_ori(&line),
            Parser::B => parse_b(&line),
            Parser::Beqz => parse_beqz(&line),
            Parser::Bge => parse_bge(&line),
            Parser::La => parse_la(&line),
            Parser::Li => parse_li(&line),
            Parser::Nop => parse_nop(&line),
            Parser::Subi => parse_subi(&line),
        }
    }
}

fn register(token: &str, line: &str) -> Result<Byte, SyntaxError> {
    register_number(token).ok_or_else(|| err("invalid register", line))
}

fn signed_16(text: &str, line: &str) -> Result<i16, SyntaxError> {
    let value = parse_literal(text).ok_or_else(|| err("invalid immediate value", line))?;
    if value < i64::from(i16::MIN) || value > i64::from(i16::MAX) {
        return Err(err("immediate value out of signed 16-bit range", line));
    }
    Ok(value as i16)
}

fn unsigned_16(text: &str, line: &str) -> Result<Half, SyntaxError> {
    let value = parse_literal(text).ok_or_else(|| err("invalid immediate value", line))?;
    if value < 0 || value > i64::from(u16::MAX) {
        return Err(err("immediate value out of 16-bit range", line));
    }
    Ok(value as Half)
}

fn r_instruction(funct: Funct, rd: Byte, rs: Byte, rt: Byte, shamt: Byte) -> Instruction {
    let mut instr = Instruction::new(InstrKind::R);
    instr.set_opcode(enum_to_word(Opcode::RType));
    instr.set_funct(enum_to_word(funct));
    instr.set_rd(rd.into());
    instr.set_rs(rs.into());
    instr.set_rt(rt.into());
    instr.set_shamt(shamt.into());
    instr
}

fn i_instruction(opcode: Opcode, rs: Byte, rt: Byte, immediate: Half) -> Instruction {
    let mut instr = Instruction::new(InstrKind::I);
    instr.set_opcode(enum_to_word(opcode));
    instr.set_rs(rs.into());
    instr.set_rt(rt.into());
    instr.set_immediate(immediate.into());
    instr
}

fn i_labelled(opcode: Opcode, rs: Byte, rt: Byte, label: &str) -> Instruction {
    let mut instr = i_instruction(opcode, rs, rt, 0);
    instr.set_label(label);
    instr
}

fn parse_add(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = THREE_REG
        .captures(line)
        .ok_or_else(|| err("expected 'add $rd, $rs, $rt'", line))?;
    if &caps[1] != "add" {
        return Err(err("line does not start with 'add'", line));
    }

    let rd = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;
    let rt = register(&caps[4], line)?;
    if rd == 0 {
        return Err(err("register $zero cannot be a destination", line));
    }

    Ok(vec![r_instruction(Funct::Add, rd, rs, rt, 0)])
}

fn parse_sll(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'sll $rd, $rt, shamt'", line))?;
    if &caps[1] != "sll" {
        return Err(err("line does not start with 'sll'", line));
    }

    let rd = register(&caps[2], line)?;
    let rt = register(&caps[3], line)?;
    let shamt = parse_literal(&caps[4]).ok_or_else(|| err("invalid shift amount", line))?;
    if !(0..=31).contains(&shamt) {
        return Err(err("shift amount out of range", line));
    }

    Ok(vec![r_instruction(Funct::Sll, rd, 0, rt, shamt as Byte)])
}

fn parse_slt(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = THREE_REG
        .captures(line)
        .ok_or_else(|| err("expected 'slt $rd, $rs, $rt'", line))?;
    if &caps[1] != "slt" {
        return Err(err("line does not start with 'slt'", line));
    }

    let rd = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;
    let rt = register(&caps[4], line)?;

    Ok(vec![r_instruction(Funct::Slt, rd, rs, rt, 0)])
}

fn parse_syscall(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = BARE
        .captures(line)
        .ok_or_else(|| err("expected 'syscall'", line))?;
    if &caps[1] != "syscall" {
        return Err(err("line does not start with 'syscall'", line));
    }

    Ok(vec![r_instruction(Funct::Syscall, 0, 0, 0, 0)])
}

fn parse_addi(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'addi $rt, $rs, imm'", line))?;
    if &caps[1] != "addi" {
        return Err(err("line does not start with 'addi'", line));
    }

    let rt = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;
    let immediate = signed_16(&caps[4], line)?;

    Ok(vec![i_instruction(Opcode::Addi, rs, rt, immediate as Half)])
}

// beq and bne share their shape; the label stays unresolved until the
// assembler's second pass.
fn parse_branch(name: &str, line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_LABEL
        .captures(line)
        .ok_or_else(|| err("expected '$rs, $rt, label' operands", line))?;
    if &caps[1] != name {
        return Err(err("mnemonic does not match the dispatched parser", line));
    }

    let first = register(&caps[2], line)?;
    let second = register(&caps[3], line)?;
    let opcode = if name == "beq" { Opcode::Beq } else { Opcode::Bne };

    Ok(vec![i_labelled(opcode, second, first, &caps[4])])
}

fn parse_lb(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    if let Some(caps) = MEM_OFFSET.captures(line) {
        if &caps[1] != "lb" {
            return Err(err("line does not start with 'lb'", line));
        }
        let rt = register(&caps[2], line)?;
        let offset = signed_16(&caps[3], line)?;
        let rs = register(&caps[4], line)?;
        return Ok(vec![i_instruction(Opcode::Lb, rs, rt, offset as Half)]);
    }

    let caps = TWO_REG
        .captures(line)
        .ok_or_else(|| err("expected 'lb $rt, offset($rs)' or 'lb $rt, $rs'", line))?;
    if &caps[1] != "lb" {
        return Err(err("line does not start with 'lb'", line));
    }
    let rt = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;

    Ok(vec![i_instruction(Opcode::Lb, rs, rt, 0)])
}

fn parse_lui(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'lui $rt, imm'", line))?;
    if &caps[1] != "lui" {
        return Err(err("line does not start with 'lui'", line));
    }

    let rt = register(&caps[2], line)?;
    let immediate = unsigned_16(&caps[3], line)?;

    Ok(vec![i_instruction(Opcode::Lui, 0, rt, immediate)])
}

fn parse_ori(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'ori $rt, $rs, imm'", line))?;
    if &caps[1] != "ori" {
        return Err(err("line does not start with 'ori'", line));
    }

    let rt = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;
    let immediate = unsigned_16(&caps[4], line)?;

    Ok(vec![i_instruction(Opcode::Ori, rs, rt, immediate)])
}

fn parse_b(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = LABEL_ONLY
        .captures(line)
        .ok_or_else(|| err("expected 'b label'", line))?;
    if &caps[1] != "b" {
        return Err(err("line does not start with 'b'", line));
    }

    Ok(vec![i_labelled(Opcode::Beq, 0, 0, &caps[2])])
}

fn parse_beqz(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_LABEL
        .captures(line)
        .ok_or_else(|| err("expected 'beqz $rs, label'", line))?;
    if &caps[1] != "beqz" {
        return Err(err("line does not start with 'beqz'", line));
    }

    let rs = register(&caps[2], line)?;

    // beq $0, $rs, label
    Ok(vec![i_labelled(Opcode::Beq, rs, 0, &caps[3])])
}

fn parse_bge(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_LABEL
        .captures(line)
        .ok_or_else(|| err("expected 'bge $rs, $rt, label'", line))?;
    if &caps[1] != "bge" {
        return Err(err("line does not start with 'bge'", line));
    }

    let rs = register(&caps[2], line)?;
    let rt = register(&caps[3], line)?;

    // slt $at, $rs, $rt  followed by  beq $0, $at, label
    Ok(vec![
        r_instruction(Funct::Slt, REG_AT, rs, rt, 0),
        i_labelled(Opcode::Beq, REG_AT, 0, &caps[4]),
    ])
}

fn parse_la(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_LABEL
        .captures(line)
        .ok_or_else(|| err("expected 'la $rt, label'", line))?;
    if &caps[1] != "la" {
        return Err(err("line does not start with 'la'", line));
    }

    let rt = register(&caps[2], line)?;
    let label = &caps[3];

    // lui $rt, upper(label); ori $rt, $rt, lower(label). Both records carry
    // the label so the second pass fills in both halves.
    Ok(vec![
        i_labelled(Opcode::Lui, 0, rt, label),
        i_labelled(Opcode::Ori, rt, rt, label),
    ])
}

fn parse_li(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'li $rt, imm'", line))?;
    if &caps[1] != "li" {
        return Err(err("line does not start with 'li'", line));
    }

    let rt = register(&caps[2], line)?;
    let value = parse_literal(&caps[3]).ok_or_else(|| err("invalid immediate value", line))?;
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        return Err(err("immediate value out of 32-bit range", line));
    }

    // ori $rt, $0, imm & 0xFFFF
    Ok(vec![i_instruction(Opcode::Ori, 0, rt, (value & 0xFFFF) as Half)])
}

fn parse_nop(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = BARE
        .captures(line)
        .ok_or_else(|| err("expected 'nop'", line))?;
    if &caps[1] != "nop" {
        return Err(err("line does not start with 'nop'", line));
    }

    // sll $0, $0, 0
    Ok(vec![r_instruction(Funct::Sll, 0, 0, 0, 0)])
}

fn parse_subi(line: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let caps = REG_REG_IMM
        .captures(line)
        .ok_or_else(|| err("expected 'subi $rt, $rs, imm'", line))?;
    if &caps[1] != "subi" {
        return Err(err("line does not start with 'subi'", line));
    }

    let rt = register(&caps[2], line)?;
    let rs = register(&caps[3], line)?;
    let value = parse_literal(&caps[4]).ok_or_else(|| err("invalid immediate value", line))?;

    let negated = -value;
    if negated < i64::from(i16::MIN) || negated > i64::from(i16::MAX) {
        return Err(err("immediate value out of signed 16-bit range", line));
    }

    // addi $rt, $rs, -imm
    Ok(vec![i_instruction(
        Opcode::Addi,
        rs,
        rt,
        (negated as i16) as Half,
    )])
}
