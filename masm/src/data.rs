use mcpu::constants::MEM_USER_START;
use mcpu::instr::parsers::parse_literal;
use mcpu::{Address, Memory};

use crate::error::AssembleError;

fn bad_operand(line: &str) -> AssembleError {
    AssembleError::BadOperand {
        line: line.to_string(),
    }
}

fn ensure_room(memory: &Memory, cursor: Address, len: u32) -> Result<(), AssembleError> {
    let end = MEM_USER_START as u64 + memory.total_size() as u64;
    if cursor as u64 + len as u64 > end {
        return Err(AssembleError::DataOverflow);
    }
    Ok(())
}

/// Extracts the text between the surrounding double quotes. Escape sequences
/// stay as raw bytes; they are interpreted when the string is read back out
/// of memory.
fn quoted(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('"')?;
    inner.strip_suffix('"')
}

/// Handles one `.data` line: `.ascii "…"`, `.byte N`, `.space N` or
/// `.word N`, writing straight to memory and advancing the data cursor.
///
/// The operand may be separated from the directive by spaces or tabs.
pub(crate) fn process_directive(
    line: &str,
    cursor: &mut Address,
    memory: &mut Memory,
) -> Result<(), AssembleError> {
    let (directive, operand) = match line.find(|c: char| c == ' ' || c == '\t') {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    };

    match directive {
        ".ascii" => {
            let text = quoted(operand).ok_or_else(|| bad_operand(line))?;
            ensure_room(memory, *cursor, text.len() as u32 + 1)?;
            memory.write_string(*cursor, text)?;
            *cursor += text.len() as Address + 1;
        }
        ".byte" => {
            let value = parse_literal(operand).ok_or_else(|| bad_operand(line))?;
            if value < i64::from(i8::MIN) || value > i64::from(u8::MAX) {
                return Err(bad_operand(line));
            }
            ensure_room(memory, *cursor, 1)?;
            memory.write_byte(*cursor, value as u8)?;
            *cursor += 1;
        }
        ".space" => {
            let value = parse_literal(operand).ok_or_else(|| bad_operand(line))?;
            if value < 0 {
                return Err(bad_operand(line));
            }
            ensure_room(memory, *cursor, value as u32)?;
            // The backing store is zero-initialised; reserving is enough.
            *cursor += value as Address;
        }
        ".word" => {
            let value = parse_literal(operand).ok_or_else(|| bad_operand(line))?;
            if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
                return Err(bad_operand(line));
            }
            ensure_room(memory, *cursor, 4)?;
            memory.write_word(*cursor, value as u32)?;
            *cursor += 4;
        }
        _ => {
            return Err(AssembleError::UnknownDirective {
                line: line.to_string(),
            })
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn data_memory() -> (Memory, Address) {
        let memory = Memory::new(0x1000, 0x1000);
        let base = memory.data_base();
        (memory, base)
    }

    #[test]
    fn ascii_writes_the_bytes_and_a_terminator() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".ascii \"hi\"", &mut cursor, &mut memory).unwrap();

        assert_eq!(cursor, base + 3);
        assert_eq!(memory.read_byte(base).unwrap(), b'h');
        assert_eq!(memory.read_byte(base + 1).unwrap(), b'i');
        assert_eq!(memory.read_byte(base + 2).unwrap(), 0);
    }

    #[test]
    fn ascii_keeps_escape_sequences_raw() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".ascii \"a\\nb\"", &mut cursor, &mut memory).unwrap();

        assert_eq!(memory.read_byte(base + 1).unwrap(), b'\\');
        assert_eq!(memory.read_byte(base + 2).unwrap(), b'n');
        // Interpretation happens on read-back.
        assert_eq!(memory.read_string(base).unwrap(), "a\nb");
    }

    #[test]
    fn byte_accepts_space_and_tab_separators() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".byte 65", &mut cursor, &mut memory).unwrap();
        process_directive(".byte\t0x42", &mut cursor, &mut memory).unwrap();

        assert_eq!(cursor, base + 2);
        assert_eq!(memory.read_byte(base).unwrap(), 65);
        assert_eq!(memory.read_byte(base + 1).unwrap(), 0x42);
    }

    #[test]
    fn negative_bytes_wrap_into_one_byte() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".byte -1", &mut cursor, &mut memory).unwrap();
        assert_eq!(memory.read_byte(base).unwrap(), 0xFF);
    }

    #[test]
    fn word_is_stored_little_endian() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".word\t0x11223344", &mut cursor, &mut memory).unwrap();

        assert_eq!(cursor, base + 4);
        assert_eq!(memory.read_byte(base).unwrap(), 0x44);
        assert_eq!(memory.read_byte(base + 3).unwrap(), 0x11);
    }

    #[test]
    fn space_reserves_zeroed_bytes() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        process_directive(".space 16", &mut cursor, &mut memory).unwrap();
        process_directive(".byte 7", &mut cursor, &mut memory).unwrap();

        assert_eq!(cursor, base + 17);
        assert_eq!(memory.read_byte(base).unwrap(), 0);
        assert_eq!(memory.read_byte(base + 16).unwrap(), 7);
    }

    #[test]
    fn reserving_past_the_segment_end_fails() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        assert_eq!(
            process_directive(".space 0x1001", &mut cursor, &mut memory),
            Err(AssembleError::DataOverflow)
        );
    }

    #[test]
    fn malformed_operands_are_rejected() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        assert!(process_directive(".byte zzz", &mut cursor, &mut memory).is_err());
        assert!(process_directive(".byte 256", &mut cursor, &mut memory).is_err());
        assert!(process_directive(".byte -129", &mut cursor, &mut memory).is_err());
        assert!(process_directive(".ascii hi", &mut cursor, &mut memory).is_err());
        assert!(process_directive(".space -1", &mut cursor, &mut memory).is_err());
    }

    #[test]
    fn unknown_directives_are_rejected() {
        let (mut memory, base) = data_memory();
        let mut cursor = base;
        assert_eq!(
            process_directive(".half 1", &mut cursor, &mut memory),
            Err(AssembleError::UnknownDirective {
                line: ".half 1".to_string()
            })
        );
    }
}
