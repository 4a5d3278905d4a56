//! Endian swap of evio trees
//!
//! Swaps a complete event (a bank structure) between byte orders, in place
//! or into a copy. Container payloads are walked child by child using the
//! length prefixes read in the source order; primitive payloads are swapped
//! with their element stride; opaque, string, and byte payloads pass
//! through untouched; composite payloads are handed to the data-driven
//! swapper in [`crate::composite`].
//!
//! Swapping is an involution: applying it twice restores the input.

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};

use crate::buffer::ByteOrder;
use crate::composite;
use crate::error::{EvioError, Result};
use crate::format::{DataType, StructureHeader, StructureType};

/// Swap a complete event in place.
///
/// `src_order` is the order the bytes are currently in; afterwards they are
/// in the opposite order.
pub fn swap_event_in_place(data: &mut [u8], src_order: ByteOrder) -> Result<()> {
    let consumed = swap_structure(data, 0, data.len(), StructureType::Bank, src_order)?;
    if consumed != data.len() {
        return Err(EvioError::BadLength(format!(
            "event claims {consumed} bytes but the buffer holds {}",
            data.len()
        )));
    }
    Ok(())
}

/// Swap a complete event into a fresh vector, leaving `src` untouched
pub fn swap_event(src: &[u8], src_order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = src.to_vec();
    swap_event_in_place(&mut out, src_order)?;
    Ok(out)
}

/// Read a 32-bit word at `pos` in the given order
pub(crate) fn read_word(data: &[u8], pos: usize, order: ByteOrder) -> Result<u32> {
    if pos + 4 > data.len() {
        return Err(EvioError::OutOfBounds {
            offset: pos,
            len: 4,
            bound: data.len(),
        });
    }
    let s = &data[pos..pos + 4];
    Ok(match order {
        ByteOrder::Little => LittleEndian::read_u32(s),
        ByteOrder::Big => BigEndian::read_u32(s),
    })
}

/// Reverse the 4 bytes of the word at `pos`
pub(crate) fn swap_word(data: &mut [u8], pos: usize) {
    data[pos..pos + 4].reverse();
}

/// Swap one structure (header and payload); returns its total byte size
fn swap_structure(
    data: &mut [u8],
    pos: usize,
    end: usize,
    kind: StructureType,
    src_order: ByteOrder,
) -> Result<usize> {
    // Header fields must be read in the source order before the header
    // words are reversed.
    let header = match kind {
        StructureType::Bank => {
            let w0 = read_word(data, pos, src_order)?;
            let w1 = read_word(data, pos + 4, src_order)?;
            StructureHeader::parse_bank(w0, w1)?
        }
        StructureType::Segment => StructureHeader::parse_segment(read_word(data, pos, src_order)?),
        StructureType::TagSegment => {
            StructureHeader::parse_tagsegment(read_word(data, pos, src_order)?)
        }
    };

    let total = header.total_bytes();
    if pos + total > end {
        return Err(EvioError::BadLength(format!(
            "structure at offset {pos} claims {total} bytes, region ends at {end}"
        )));
    }

    let header_bytes = header.header_words() as usize * 4;
    for w in 0..header.header_words() as usize {
        swap_word(data, pos + w * 4);
    }

    swap_payload(
        data,
        pos + header_bytes,
        total - header_bytes,
        header.data_type,
        header.pad,
        src_order,
    )?;
    Ok(total)
}

/// Swap a payload region of the given type
fn swap_payload(
    data: &mut [u8],
    pos: usize,
    len: usize,
    data_type: DataType,
    pad: u8,
    src_order: ByteOrder,
) -> Result<()> {
    if let Some(child_kind) = StructureType::of_content(data_type) {
        let end = pos + len;
        let mut child_pos = pos;
        while child_pos < end {
            child_pos += swap_structure(data, child_pos, end, child_kind, src_order)?;
        }
        return Ok(());
    }

    if data_type == DataType::Composite {
        return composite::swap_composite(&mut data[pos..pos + len], src_order);
    }

    match data_type.element_size() {
        Some(stride) => {
            // The pad bytes at the tail are not elements.
            let payload = len - (pad as usize).min(len);
            let mut p = pos;
            while p + stride <= pos + payload {
                data[p..p + stride].reverse();
                p += stride;
            }
        }
        // Strings, bytes, unknown words: carried as-is.
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteBuffer;
    use crate::format::{encode_bank_header, StructureHeader};

    /// Serialize a bank with the given payload writer in one order
    fn build_bank<F>(order: ByteOrder, data_words: u32, data_type: DataType, fill: F) -> Vec<u8>
    where
        F: FnOnce(&mut ByteBuffer),
    {
        let mut buf = ByteBuffer::new(8 + data_words as usize * 4, order);
        let words = encode_bank_header(data_words, 5, data_type, 9);
        buf.write_u32(words[0]).unwrap();
        buf.write_u32(words[1]).unwrap();
        fill(&mut buf);
        buf.as_slice().to_vec()
    }

    #[test]
    fn uint32_bank_swaps_to_other_order() {
        let payload = [0u32, 1, 2, 0xdeadbeef];
        let big = build_bank(ByteOrder::Big, 4, DataType::Uint32, |b| {
            for v in payload {
                b.write_u32(v).unwrap();
            }
        });
        let little = build_bank(ByteOrder::Little, 4, DataType::Uint32, |b| {
            for v in payload {
                b.write_u32(v).unwrap();
            }
        });

        assert_eq!(swap_event(&big, ByteOrder::Big).unwrap(), little);
        assert_eq!(swap_event(&little, ByteOrder::Little).unwrap(), big);
    }

    #[test]
    fn double_swap_is_identity() {
        let payload = [1u64, u64::MAX, 0x0102030405060708];
        let original = build_bank(ByteOrder::Little, 6, DataType::Long64, |b| {
            for v in payload {
                b.write_u64(v).unwrap();
            }
        });

        let once = swap_event(&original, ByteOrder::Little).unwrap();
        assert_ne!(once, original);
        let twice = swap_event(&once, ByteOrder::Big).unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn short_payload_honors_padding() {
        // Three shorts plus two pad bytes: 2 data words.
        let mut buf = ByteBuffer::new(16, ByteOrder::Big);
        let header = StructureHeader {
            structure_type: StructureType::Bank,
            length: 4,
            tag: 1,
            num: 1,
            pad: 2,
            data_type: DataType::Short16,
        };
        header.write_at(&mut buf, 0).unwrap();
        buf.put_u16_at(8, 0x1122).unwrap();
        buf.put_u16_at(10, 0x3344).unwrap();
        buf.put_u16_at(12, 0x5566).unwrap();
        // bytes 14..16 are padding, left zero
        let big = buf.as_slice().to_vec();

        let swapped = swap_event(&big, ByteOrder::Big).unwrap();
        // Elements byte-reversed, padding untouched.
        assert_eq!(&swapped[8..10], &[0x22, 0x11]);
        assert_eq!(&swapped[12..14], &[0x66, 0x55]);
        assert_eq!(&swapped[14..16], &[0, 0]);

        let back = swap_event(&swapped, ByteOrder::Little).unwrap();
        assert_eq!(back, big);
    }

    #[test]
    fn opaque_and_string_payloads_pass_through() {
        let text = b"hello, world\0\0\0\0";
        for data_type in [DataType::CharStar8, DataType::Unknown32, DataType::Uchar8] {
            let original = build_bank(ByteOrder::Big, 4, data_type, |b| {
                b.write_bytes(text).unwrap();
            });
            let swapped = swap_event(&original, ByteOrder::Big).unwrap();
            // Header moved, payload did not.
            assert_eq!(&swapped[8..], &original[8..], "{data_type:?}");
            assert_ne!(&swapped[..8], &original[..8]);
        }
    }

    #[test]
    fn nested_containers_swap_recursively() {
        // event bank { segment(u16 x2), tagsegment(u32 x1) }
        let mut buf = ByteBuffer::new(8 + 8 + 8, ByteOrder::Big);
        let outer = encode_bank_header(4, 7, DataType::Segment, 0);
        buf.write_u32(outer[0]).unwrap();
        buf.write_u32(outer[1]).unwrap();

        let seg = StructureHeader {
            structure_type: StructureType::Segment,
            length: 2,
            tag: 3,
            num: 0,
            pad: 0,
            data_type: DataType::Ushort16,
        };
        let (sw, _) = seg.encode();
        buf.write_u32(sw).unwrap();
        buf.write_u16(0xaabb).unwrap();
        buf.write_u16(0xccdd).unwrap();

        let seg2 = StructureHeader {
            structure_type: StructureType::Segment,
            length: 2,
            tag: 4,
            num: 0,
            pad: 0,
            data_type: DataType::Uint32,
        };
        let (s2w, _) = seg2.encode();
        buf.write_u32(s2w).unwrap();
        buf.write_u32(0x01020304).unwrap();

        let big = buf.as_slice().to_vec();
        let swapped = swap_event(&big, ByteOrder::Big).unwrap();

        // The u16 elements moved independently, the u32 as one unit.
        assert_eq!(&swapped[12..16], &[0xbb, 0xaa, 0xdd, 0xcc]);
        assert_eq!(&swapped[20..24], &[0x04, 0x03, 0x02, 0x01]);

        assert_eq!(swap_event(&swapped, ByteOrder::Little).unwrap(), big);
    }

    #[test]
    fn overlong_child_is_rejected() {
        // Outer bank claims 2 payload words but the inner bank claims 8.
        let mut buf = ByteBuffer::new(16, ByteOrder::Little);
        let outer = encode_bank_header(2, 1, DataType::Bank, 0);
        buf.write_u32(outer[0]).unwrap();
        buf.write_u32(outer[1]).unwrap();
        let inner = encode_bank_header(6, 2, DataType::Uint32, 0);
        buf.write_u32(inner[0]).unwrap();
        buf.write_u32(inner[1]).unwrap();
        let mut bytes = buf.as_slice().to_vec();

        assert!(matches!(
            swap_event_in_place(&mut bytes, ByteOrder::Little),
            Err(EvioError::BadLength(_))
        ));
    }
}
