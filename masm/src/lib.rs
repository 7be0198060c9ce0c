//! Two-pass assembler for the mcpu processor core.
//!
//! [`assemble`] consumes MIPS assembly source and emits the encoded program
//! straight into a [`Memory`] image. The first pass walks the lines, switches
//! between the `.text` and `.data` sections, collects labels at the running
//! segment cursors, expands mnemonics into instruction records through the
//! parsers registered in the [`InstructionSet`], and writes data directives
//! to memory. The second pass resolves label references (upper half for
//! `lui`, lower half for `ori`, a PC-relative byte offset for branches),
//! then encodes every record and stores it in the text segment.
//!
//! All errors surface before execution starts; a program that assembles is
//! handed to the pipeline as nothing more than its memory image.

mod data;
mod error;


use std::collections::HashMap;

use log::debug;

use mcpu::constants::WORD_BYTES;
use mcpu::{encode, Address, Byte, InstructionSet, Memory, Opcode, Word};

pub use crate::error::AssembleError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Segment {
    None,
    Text,
    Data,
}

/// Cuts a trailing `#` comment, leaving `#` inside double quotes alone.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (index, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..index],
            _ => {}
        }
    }
    line
}

fn valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Assembles `source` into `memory` using the parsers registered in `set`.
pub fn assemble(
    source: &str,
    set: &InstructionSet,
    memory: &mut Memory,
) -> Result<(), AssembleError> {
    let text_base = memory.text_base();
    let text_end = text_base + memory.text_size() as Address;

    let mut symbols: HashMap<String, Address> = HashMap::new();
    let mut records = Vec::new();
    let mut segment = Segment::None;
    let mut curr_text = text_base;
    let mut curr_data = memory.data_base();

    // Pass 1: scan lines, collect labels, expand mnemonics, write data.
    for raw in source.lines() {
        let line = strip_comment(raw).trim().to_lowercase();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut rest = line.as_str();
        let first = match rest.split_whitespace().next() {
            Some(token) => token,
            None => continue,
        };

        match first {
            ".text" => {
                segment = Segment::Text;
                continue;
            }
            ".data" => {
                segment = Segment::Data;
                continue;
            }
            _ => {}
        }

        if segment == Segment::None {
            continue;
        }

        if first.ends_with(':') {
            let name = &first[..first.len() - 1];
            if !valid_label(name) {
                return Err(AssembleError::BadLabel {
                    label: name.to_string(),
                });
            }
            if symbols.contains_key(name) {
                return Err(AssembleError::DuplicateLabel {
                    label: name.to_string(),
                });
            }

            let addr = match segment {
                Segment::Text => curr_text,
                _ => curr_data,
            };
            symbols.insert(name.to_string(), addr);

            rest = rest[first.len()..].trim();
            if rest.is_empty() {
                continue;
            }
        }

        match segment {
            Segment::Text => {
                let mnemonic = match rest.split_whitespace().next() {
                    Some(token) => token,
                    None => continue,
                };
                let parser = set
                    .parser(mnemonic)
                    .ok_or_else(|| AssembleError::UnknownInstruction {
                        line: rest.to_string(),
                    })?;

                let expanded = parser.parse(rest)?;
                curr_text += WORD_BYTES * expanded.len() as Address;
                if curr_text > text_end {
                    return Err(AssembleError::TextOverflow);
                }
                records.extend(expanded);
            }
            _ => data::process_directive(rest, &mut curr_data, memory)?,
        }
    }

    // Pass 2: resolve labels, encode, emit.
    let mut cursor = text_base;
    for mut record in records {
        if let Some(label) = record.label().map(str::to_string) {
            let addr = *symbols
                .get(label.as_str())
                .ok_or_else(|| AssembleError::UnknownLabel {
                    label: label.clone(),
                })?;

            let immediate = if record.opcode() == Opcode::Lui as Byte {
                (addr >> 16) & 0xFFFF
            } else if record.opcode() == Opcode::Ori as Byte {
                addr & 0xFFFF
            } else {
                // Branches encode a byte offset from the following word.
                let diff = i64::from(addr) - i64::from(cursor + WORD_BYTES);
                if diff < i64::from(i16::MIN) || diff > i64::from(i16::MAX) {
                    return Err(AssembleError::BranchOutOfRange { label });
                }
                Word::from((diff as i16) as u16)
            };
            record.set_immediate(immediate);
        }

        let word = encode(&record)?;
        memory.write_word(cursor, word)?;
        cursor += WORD_BYTES;
    }

    debug!(
        "assembled {} words of text, {} bytes of data, {} symbol(s)",
        (cursor - text_base) / WORD_BYTES,
        curr_data - memory.data_base(),
        symbols.len()
    );

    Ok(())
}
