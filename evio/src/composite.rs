//! Composite-data format parsing and swapping
//!
//! Composite payloads (type 0xF) are self-describing: a leading tagsegment
//! carries an ASCII format string, then a bank carries the data laid out by
//! that string. A payload may hold several such (format, data) pairs back
//! to back.
//!
//! Format strings use single characters for element kinds, optional decimal
//! repeat counts, parenthesised groups, and in-data multipliers:
//!
//! ```text
//! i  32-bit integer      F  32-bit float
//! L  64-bit integer      D  64-bit float
//! S  16-bit integer      s  16-bit unsigned integer
//! C  8-bit integer       c  8-bit unsigned integer    a  ASCII byte
//! N  32-bit count read from the data, applied to the next item
//! n  16-bit count        m  8-bit count
//! ```
//!
//! `"2iN(s,F)"` is two ints, then a count word, then count repeats of one
//! short and one float. Swapping interprets the stream and reverses each
//! element with its own stride; counts are themselves swapped as they are
//! read. The stream cycles until the bank data (minus its padding) is
//! exhausted.

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};

use crate::buffer::ByteOrder;
use crate::error::{EvioError, Result};
use crate::format::StructureHeader;
use crate::swap::{read_word, swap_word};

/// How many times an item repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Literal repeat count from the format string
    Fixed(u32),
    /// 32-bit count read (and swapped) from the data
    CountU32,
    /// 16-bit count read (and swapped) from the data
    CountU16,
    /// 8-bit count read from the data
    CountU8,
}

/// One instruction of a parsed format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatToken {
    /// A primitive element of the given byte stride
    Element {
        /// Repeat specification
        repeat: Repeat,
        /// Element width in bytes (1, 2, 4, or 8)
        stride: usize,
    },
    /// A parenthesised group of instructions
    Group {
        /// Repeat specification
        repeat: Repeat,
        /// The group body
        body: Vec<FormatToken>,
    },
}

/// Parse a composite format string into an instruction stream
pub fn parse_format(fmt: &str) -> Result<Vec<FormatToken>> {
    let mut stack: Vec<Vec<FormatToken>> = vec![Vec::new()];
    let mut group_repeats: Vec<Repeat> = Vec::new();
    let mut pending: Option<Repeat> = None;
    let mut digits = String::new();

    let bad = |msg: &str| EvioError::BadLength(format!("composite format {fmt:?}: {msg}"));

    for ch in fmt.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if !digits.is_empty() {
            let n: u32 = digits.parse().map_err(|_| bad("repeat count overflow"))?;
            if pending.is_some() {
                return Err(bad("two repeat counts in a row"));
            }
            pending = Some(Repeat::Fixed(n));
            digits.clear();
        }

        match ch {
            ' ' | ',' => {}
            'N' | 'n' | 'm' => {
                if pending.is_some() {
                    return Err(bad("multiplier after a repeat count"));
                }
                pending = Some(match ch {
                    'N' => Repeat::CountU32,
                    'n' => Repeat::CountU16,
                    _ => Repeat::CountU8,
                });
            }
            '(' => {
                group_repeats.push(pending.take().unwrap_or(Repeat::Fixed(1)));
                stack.push(Vec::new());
            }
            ')' => {
                let body = stack.pop().ok_or_else(|| bad("unbalanced ')'"))?;
                if stack.is_empty() {
                    return Err(bad("unbalanced ')'"));
                }
                let repeat = group_repeats.pop().ok_or_else(|| bad("unbalanced ')'"))?;
                stack
                    .last_mut()
                    .unwrap()
                    .push(FormatToken::Group { repeat, body });
            }
            _ => {
                let stride = match ch {
                    'i' | 'I' | 'F' => 4,
                    'L' | 'D' => 8,
                    'S' | 's' => 2,
                    'C' | 'c' | 'a' | 'A' => 1,
                    other => return Err(bad(&format!("unknown element '{other}'"))),
                };
                stack.last_mut().unwrap().push(FormatToken::Element {
                    repeat: pending.take().unwrap_or(Repeat::Fixed(1)),
                    stride,
                });
            }
        }
    }

    if !digits.is_empty() || pending.is_some() {
        return Err(bad("dangling repeat count"));
    }
    if stack.len() != 1 {
        return Err(bad("unbalanced '('"));
    }
    let tokens = stack.pop().unwrap();
    if tokens.is_empty() {
        return Err(bad("empty format"));
    }
    Ok(tokens)
}

/// Byte-swapping cursor over one composite data region
struct SwapCursor<'a> {
    data: &'a mut [u8],
    pos: usize,
    end: usize,
    src_order: ByteOrder,
}

impl SwapCursor<'_> {
    fn remaining(&self) -> usize {
        self.end - self.pos
    }

    fn need(&self, len: usize) -> Result<()> {
        if self.pos + len > self.end {
            return Err(EvioError::BadLength(format!(
                "composite data ends inside an element at offset {}",
                self.pos
            )));
        }
        Ok(())
    }

    /// Resolve a repeat, consuming (and swapping) in-data counts
    fn resolve(&mut self, repeat: Repeat) -> Result<u32> {
        match repeat {
            Repeat::Fixed(n) => Ok(n),
            Repeat::CountU32 => {
                self.need(4)?;
                let v = read_word(self.data, self.pos, self.src_order)?;
                swap_word(self.data, self.pos);
                self.pos += 4;
                Ok(v)
            }
            Repeat::CountU16 => {
                self.need(2)?;
                let s = &self.data[self.pos..self.pos + 2];
                let v = match self.src_order {
                    ByteOrder::Little => LittleEndian::read_u16(s),
                    ByteOrder::Big => BigEndian::read_u16(s),
                };
                self.data[self.pos..self.pos + 2].reverse();
                self.pos += 2;
                Ok(v as u32)
            }
            Repeat::CountU8 => {
                self.need(1)?;
                let v = self.data[self.pos];
                self.pos += 1;
                Ok(v as u32)
            }
        }
    }

    fn run(&mut self, tokens: &[FormatToken]) -> Result<()> {
        for token in tokens {
            match token {
                FormatToken::Element { repeat, stride } => {
                    let n = self.resolve(*repeat)?;
                    for _ in 0..n {
                        self.need(*stride)?;
                        if *stride > 1 {
                            self.data[self.pos..self.pos + stride].reverse();
                        }
                        self.pos += stride;
                    }
                }
                FormatToken::Group { repeat, body } => {
                    let n = self.resolve(*repeat)?;
                    for _ in 0..n {
                        self.run(body)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Swap one composite payload in place.
///
/// `data` is the full payload of a composite-typed structure: one or more
/// (format tagsegment, data bank) pairs. Bytes are in `src_order` on entry
/// and in the opposite order on return.
pub fn swap_composite(data: &mut [u8], src_order: ByteOrder) -> Result<()> {
    let mut pos = 0;

    while pos + 4 <= data.len() {
        // Format tagsegment: header word plus ASCII format characters.
        let ts = StructureHeader::parse_tagsegment(read_word(data, pos, src_order)?);
        let fmt_len = ts.data_words() as usize * 4;
        if pos + 4 + fmt_len > data.len() {
            return Err(EvioError::BadLength(format!(
                "composite format tagsegment at offset {pos} runs past the payload"
            )));
        }
        let fmt_bytes = &data[pos + 4..pos + 4 + fmt_len];
        let fmt: String = fmt_bytes
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        let tokens = parse_format(&fmt)?;

        swap_word(data, pos);
        pos += 4 + fmt_len;

        // Data bank.
        if pos + 8 > data.len() {
            return Err(EvioError::BadLength(format!(
                "composite data bank header at offset {pos} runs past the payload"
            )));
        }
        let w0 = read_word(data, pos, src_order)?;
        let w1 = read_word(data, pos + 4, src_order)?;
        let bank = StructureHeader::parse_bank(w0, w1)?;
        let data_len = bank.data_words() as usize * 4;
        swap_word(data, pos);
        swap_word(data, pos + 4);
        pos += 8;

        if pos + data_len > data.len() {
            return Err(EvioError::BadLength(format!(
                "composite data bank at offset {pos} claims {data_len} bytes past the payload"
            )));
        }

        let mut cursor = SwapCursor {
            data: &mut *data,
            pos,
            end: pos + data_len - (bank.pad as usize).min(data_len),
            src_order,
        };
        // The format cycles over the data until it is used up.
        while cursor.remaining() > 0 {
            let before = cursor.pos;
            cursor.run(&tokens)?;
            if cursor.pos == before {
                break;
            }
        }
        pos += data_len;
    }

    Ok(())
}
