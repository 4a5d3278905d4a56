//! Zero-copy structural index over a buffer of evio records
//!
//! [`ScannedBuffer`] owns a canonical uncompressed buffer and a node arena
//! describing every event and substructure inside it. Nodes never copy
//! event bytes; they are positions and lengths into the buffer, linked by
//! arena ids rather than references (parent/child cycles stay impossible).
//!
//! Callers hold [`NodeHandle`] tokens. Structural mutation
//! ([`ScannedBuffer::remove_structure`], [`ScannedBuffer::add_structure`])
//! shifts bytes, cascades length updates through ancestors and the owning
//! record header, bumps the arena generation, and rescans; every handle
//! issued before the mutation then fails with `ObsoleteNode`.

use log::debug;

use crate::buffer::ByteBuffer;
use crate::error::{EvioError, Result};
use crate::format::{CompressionType, DataType, StructureHeader, StructureType, HEADER_BYTES};
use crate::header::RecordHeader;
use crate::record::RecordInput;

/// Location of one record inside a scanned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    /// Byte offset of the record header
    pub position: usize,
    /// Total record bytes
    pub length: usize,
    /// Events in the record
    pub count: usize,
}

/// Positional metadata of one event or substructure.
///
/// A node is a weak view: it stores offsets into the owning
/// [`ScannedBuffer`], never bytes.
#[derive(Debug, Clone)]
pub struct EvioNode {
    /// Byte offset of the structure's first header word
    pub pos: usize,
    /// Total structure length in words, header included
    pub length: u32,
    /// Structure tag
    pub tag: u32,
    /// Num field (banks only)
    pub num: u8,
    /// Padding bytes on the payload
    pub pad: u8,
    /// Container kind of this structure
    pub structure_type: StructureType,
    /// Payload type
    pub data_type: DataType,
    /// Byte offset of the payload
    pub data_pos: usize,
    /// Payload length in words
    pub data_length: u32,
    /// Byte offset of the owning record's header
    pub record_pos: usize,
    /// Event ordinal within the buffer (roots; inherited by descendants)
    pub place: usize,
    is_event: bool,
    parent: Option<usize>,
    event: Option<usize>,
    children: Vec<usize>,
}

impl EvioNode {
    /// Total structure size in bytes
    pub fn total_bytes(&self) -> usize {
        self.length as usize * 4
    }

    /// True for event roots
    pub fn is_event(&self) -> bool {
        self.is_event
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Token for a node in a [`ScannedBuffer`] arena.
///
/// Carries the generation it was issued under; any mutation invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    id: usize,
    generation: u32,
}

/// A scanned buffer: canonical bytes plus the node arena over them.
#[derive(Debug)]
pub struct ScannedBuffer {
    buffer: ByteBuffer,
    nodes: Vec<EvioNode>,
    events: Vec<usize>,
    records: Vec<RecordPosition>,
    generation: u32,
}

impl ScannedBuffer {
    /// Scan a buffer of records.
    ///
    /// Compressed records are expanded first; when the existing storage is
    /// large enough the expansion lands back in it, otherwise a larger
    /// buffer replaces it. Either way the scanned buffer ends up canonical
    /// (uncompressed, self-consistent headers).
    pub fn scan(buffer: ByteBuffer) -> Result<Self> {
        let buffer = Self::expand_if_compressed(buffer)?;
        let mut scanned = ScannedBuffer {
            buffer,
            nodes: Vec::new(),
            events: Vec::new(),
            records: Vec::new(),
            generation: 0,
        };
        scanned.scan_structures()?;
        Ok(scanned)
    }

    /// Decompress every record into a canonical buffer, or pass the buffer
    /// through untouched when nothing is compressed.
    fn expand_if_compressed(mut buffer: ByteBuffer) -> Result<ByteBuffer> {
        let mut any_compressed = false;
        let mut pos = 0;
        while pos + HEADER_BYTES <= buffer.limit() {
            let header = RecordHeader::read_at(&mut buffer, pos)?;
            if header.compression_type.is_compressed() {
                any_compressed = true;
            }
            pos += header.total_bytes();
        }
        if !any_compressed {
            return Ok(buffer);
        }

        let order = buffer.order();
        let mut expanded: Vec<u8> = Vec::with_capacity(buffer.limit());
        let mut pos = 0;
        while pos + HEADER_BYTES <= buffer.limit() {
            let record = RecordInput::read_from_buffer(buffer.as_slice(), pos, order)?;
            let wire_len = record.header().total_bytes();

            let mut header = record.header().clone();
            header.compression_type = CompressionType::None;
            header.compressed_data_length = 0;
            header.compute_lengths();

            let mut out = ByteBuffer::new(header.total_bytes(), order);
            header.write_at(&mut out, 0)?;
            out.put_bytes_at(HEADER_BYTES, record.pre_payload()?)?;
            out.put_bytes_at(header.data_offset(), record.payload()?)?;
            expanded.extend_from_slice(out.as_slice());

            pos += wire_len;
        }

        debug!(
            "expanded compressed buffer: {} -> {} bytes",
            buffer.limit(),
            expanded.len()
        );

        // Keep the caller's storage when it already has room.
        if expanded.len() <= buffer.capacity() {
            let n = expanded.len();
            buffer.bytes_mut()[..n].copy_from_slice(&expanded);
            buffer.set_limit(n)?;
            buffer.rewind();
            Ok(buffer)
        } else {
            Ok(ByteBuffer::wrap(expanded, order))
        }
    }

    /// Walk the records and build the node arena
    fn scan_structures(&mut self) -> Result<()> {
        let mut pos = 0;
        let limit = self.buffer.limit();
        let mut place = 0usize;

        while pos + HEADER_BYTES <= limit {
            let header = RecordHeader::read_at(&mut self.buffer, pos)?;
            let total = header.total_bytes();
            if pos + total > limit {
                return Err(EvioError::Truncated(format!(
                    "record at offset {pos} claims {total} bytes, buffer ends at {limit}"
                )));
            }
            if header.header_type.is_trailer() {
                break;
            }

            let mut event_pos = pos + header.data_offset();
            let record_end = pos + total;
            for _ in 0..header.entries {
                let root = self.extract_node(
                    event_pos,
                    record_end,
                    StructureType::Bank,
                    None,
                    None,
                    pos,
                    place,
                )?;
                self.events.push(root);
                event_pos += self.nodes[root].total_bytes();
                place += 1;
            }

            self.records.push(RecordPosition {
                position: pos,
                length: total,
                count: header.entries as usize,
            });
            pos += total;
        }

        Ok(())
    }

    /// Parse one structure and recurse into its children.
    ///
    /// Returns the arena id of the new node.
    #[allow(clippy::too_many_arguments)]
    fn extract_node(
        &mut self,
        pos: usize,
        end: usize,
        structure_type: StructureType,
        parent: Option<usize>,
        event: Option<usize>,
        record_pos: usize,
        place: usize,
    ) -> Result<usize> {
        let header = StructureHeader::read_at(&self.buffer, pos, structure_type)?;
        let total = header.total_bytes();
        if pos + total > end {
            return Err(EvioError::BadLength(format!(
                "structure at offset {pos} claims {total} bytes, region ends at {end}"
            )));
        }

        let id = self.nodes.len();
        self.nodes.push(EvioNode {
            pos,
            length: header.length,
            tag: header.tag,
            num: header.num,
            pad: header.pad,
            structure_type,
            data_type: header.data_type,
            data_pos: pos + header.header_words() as usize * 4,
            data_length: header.data_words(),
            record_pos,
            place,
            is_event: parent.is_none(),
            parent,
            event,
            children: Vec::new(),
        });
        let event_id = event.unwrap_or(id);

        if let Some(child_kind) = StructureType::of_content(header.data_type) {
            let mut child_pos = self.nodes[id].data_pos;
            let child_end = child_pos + self.nodes[id].data_length as usize * 4;
            while child_pos < child_end {
                let child = self.extract_node(
                    child_pos,
                    child_end,
                    child_kind,
                    Some(id),
                    Some(event_id),
                    record_pos,
                    place,
                )?;
                self.nodes[id].children.push(child);
                child_pos += self.nodes[child].total_bytes();
            }
        }

        Ok(id)
    }

    fn check(&self, handle: NodeHandle) -> Result<usize> {
        if handle.generation != self.generation {
            return Err(EvioError::ObsoleteNode);
        }
        if handle.id >= self.nodes.len() {
            return Err(EvioError::OutOfBounds {
                offset: handle.id,
                len: 1,
                bound: self.nodes.len(),
            });
        }
        Ok(handle.id)
    }

    fn handle(&self, id: usize) -> NodeHandle {
        NodeHandle {
            id,
            generation: self.generation,
        }
    }

    /// The canonical buffer
    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    /// Give the canonical buffer back
    pub fn into_buffer(self) -> ByteBuffer {
        self.buffer
    }

    /// Records seen by the scan
    pub fn record_positions(&self) -> &[RecordPosition] {
        &self.records
    }

    /// Total number of events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Handle of event root `i`
    pub fn event(&self, i: usize) -> Result<NodeHandle> {
        let id = *self.events.get(i).ok_or(EvioError::OutOfBounds {
            offset: i,
            len: 1,
            bound: self.events.len(),
        })?;
        Ok(self.handle(id))
    }

    /// Borrow the node behind a handle
    pub fn get(&self, handle: NodeHandle) -> Result<&EvioNode> {
        Ok(&self.nodes[self.check(handle)?])
    }

    /// Handles of a node's direct children, in order
    pub fn children(&self, handle: NodeHandle) -> Result<Vec<NodeHandle>> {
        let id = self.check(handle)?;
        Ok(self.nodes[id]
            .children
            .iter()
            .map(|&c| self.handle(c))
            .collect())
    }

    /// Handle of a node's parent, if it has one
    pub fn parent(&self, handle: NodeHandle) -> Result<Option<NodeHandle>> {
        let id = self.check(handle)?;
        Ok(self.nodes[id].parent.map(|p| self.handle(p)))
    }

    /// Handle of the event root a node belongs to (itself for roots)
    pub fn event_root(&self, handle: NodeHandle) -> Result<NodeHandle> {
        let id = self.check(handle)?;
        Ok(self.handle(self.nodes[id].event.unwrap_or(id)))
    }

    /// Every descendant of a node, flattened in scan order
    pub fn descendants(&self, handle: NodeHandle) -> Result<Vec<NodeHandle>> {
        let id = self.check(handle)?;
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(self.handle(n));
            stack.extend(self.nodes[n].children.iter().rev());
        }
        Ok(out)
    }

    /// The whole structure (header plus payload) behind a handle
    pub fn structure_bytes(&self, handle: NodeHandle) -> Result<&[u8]> {
        let id = self.check(handle)?;
        let node = &self.nodes[id];
        self.buffer.slice(node.pos, node.total_bytes())
    }

    /// A structure's payload bytes, padding included
    pub fn data_bytes(&self, handle: NodeHandle) -> Result<&[u8]> {
        let id = self.check(handle)?;
        let node = &self.nodes[id];
        self.buffer
            .slice(node.data_pos, node.data_length as usize * 4)
    }

    /// Remove a substructure from its event.
    ///
    /// Shifts the tail of the buffer down, decrements every ancestor's
    /// length word, shrinks the owning record's header (and its event-index
    /// entry), and rescans. All outstanding handles become obsolete.
    pub fn remove_structure(&mut self, handle: NodeHandle) -> Result<()> {
        let id = self.check(handle)?;
        if self.nodes[id].is_event {
            return Err(EvioError::InvalidConfig(
                "remove_structure expects a substructure, not an event root".into(),
            ));
        }

        let pos = self.nodes[id].pos;
        let bytes = self.nodes[id].total_bytes();
        let words = (bytes / 4) as i64;
        let record_pos = self.nodes[id].record_pos;
        let place = self.nodes[id].place;

        // Ancestor lengths first, while their positions are still valid.
        let mut ancestor = self.nodes[id].parent;
        while let Some(a) = ancestor {
            self.adjust_structure_length(a, -words)?;
            ancestor = self.nodes[a].parent;
        }
        self.adjust_record_header(record_pos, place, -words)?;

        self.buffer.remove(pos, bytes)?;
        debug!("removed {bytes} bytes at offset {pos}; rescanning");
        self.rescan()
    }

    /// Append a structure at the end of an event's payload.
    ///
    /// `bytes` must be a complete structure, a whole number of words. Grows
    /// the event root, the owning record header, and the record's
    /// event-index entry, then rescans.
    pub fn add_structure(&mut self, event_index: usize, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(EvioError::BadLength(format!(
                "structure to add must be a whole number of words, got {} bytes",
                bytes.len()
            )));
        }
        let event_id = *self.events.get(event_index).ok_or(EvioError::OutOfBounds {
            offset: event_index,
            len: 1,
            bound: self.events.len(),
        })?;

        let insert_pos = self.nodes[event_id].pos + self.nodes[event_id].total_bytes();
        let words = (bytes.len() / 4) as i64;
        let record_pos = self.nodes[event_id].record_pos;
        let place = self.nodes[event_id].place;

        self.adjust_structure_length(event_id, words)?;
        self.adjust_record_header(record_pos, place, words)?;

        self.buffer.insert(insert_pos, bytes)?;
        debug!(
            "inserted {} bytes at offset {insert_pos}; rescanning",
            bytes.len()
        );
        self.rescan()
    }

    /// Add `delta_words` to a structure's length field in the buffer
    fn adjust_structure_length(&mut self, id: usize, delta_words: i64) -> Result<()> {
        let node = &self.nodes[id];
        let pos = node.pos;
        let structure_type = node.structure_type;
        let mut header = StructureHeader::read_at(&self.buffer, pos, structure_type)?;
        let new_length = header.length as i64 + delta_words;
        if new_length < header.header_words() as i64 {
            return Err(EvioError::BadLength(format!(
                "structure at offset {pos} would shrink below its header"
            )));
        }
        header.length = new_length as u32;
        header.write_at(&mut self.buffer, pos)
    }

    /// Patch record length, uncompressed data length, and the event-index
    /// entry of event `place` after a mutation of `delta_words` words.
    fn adjust_record_header(
        &mut self,
        record_pos: usize,
        place: usize,
        delta_words: i64,
    ) -> Result<()> {
        let delta_bytes = delta_words * 4;

        let record_length = self.buffer.get_u32_at(record_pos)? as i64 + delta_words;
        self.buffer.put_u32_at(record_pos, record_length as u32)?;

        let data_length = self.buffer.get_u32_at(record_pos + 32)? as i64 + delta_bytes;
        self.buffer.put_u32_at(record_pos + 32, data_length as u32)?;

        let index_length = self.buffer.get_u32_at(record_pos + 16)?;
        if index_length > 0 {
            // Ordinal within this record: events of earlier records come first.
            let first_place: usize = self
                .records
                .iter()
                .take_while(|r| r.position < record_pos)
                .map(|r| r.count)
                .sum();
            let entry = record_pos + HEADER_BYTES + 4 * (place - first_place);
            let event_len = self.buffer.get_u32_at(entry)? as i64 + delta_bytes;
            self.buffer.put_u32_at(entry, event_len as u32)?;
        }
        Ok(())
    }

    /// Drop every node and rebuild the arena under a new generation
    fn rescan(&mut self) -> Result<()> {
        self.generation += 1;
        self.nodes.clear();
        self.events.clear();
        self.records.clear();
        self.scan_structures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;
    use crate::format::{bank_of_u32, encode_bank_header};
    use crate::record::RecordOutput;

    /// A bank of banks: outer bank(tag) { inner banks }
    fn bank_of_banks(tag: u16, num: u8, children: &[Vec<u8>], order: ByteOrder) -> Vec<u8> {
        let data_bytes: usize = children.iter().map(|c| c.len()).sum();
        let mut buf = ByteBuffer::new(8 + data_bytes, order);
        let words = encode_bank_header((data_bytes / 4) as u32, tag, DataType::Bank, num);
        buf.write_u32(words[0]).unwrap();
        buf.write_u32(words[1]).unwrap();
        for c in children {
            buf.write_bytes(c).unwrap();
        }
        buf.as_slice().to_vec()
    }

    /// One record wrapping the given events, returned as a scanned buffer
    fn scan_record(events: &[Vec<u8>], compression: CompressionType) -> ScannedBuffer {
        let mut out = RecordOutput::new(ByteOrder::Little, compression);
        for ev in events {
            assert!(out.try_add_event(ev));
        }
        out.build().unwrap();
        let buffer = ByteBuffer::wrap(out.as_bytes().to_vec(), ByteOrder::Little);
        ScannedBuffer::scan(buffer).unwrap()
    }

    /// Three 8-word inner banks (6 payload words each) inside one event
    fn nested_event() -> (Vec<u8>, [Vec<u8>; 3]) {
        let a = bank_of_u32(0xa, 1, &[1; 6], ByteOrder::Little);
        let b = bank_of_u32(0xb, 2, &[2; 6], ByteOrder::Little);
        let c = bank_of_u32(0xc, 3, &[3; 6], ByteOrder::Little);
        let event = bank_of_banks(0x1, 0, &[a.clone(), b.clone(), c.clone()], ByteOrder::Little);
        (event, [a, b, c])
    }

    #[test]
    fn scan_finds_events_and_children() {
        let (event, _) = nested_event();
        let scanned = scan_record(&[event.clone()], CompressionType::None);

        assert_eq!(scanned.event_count(), 1);
        assert_eq!(scanned.record_positions().len(), 1);

        let root = scanned.event(0).unwrap();
        let root_node = scanned.get(root).unwrap();
        assert!(root_node.is_event());
        assert_eq!(root_node.tag, 1);
        assert_eq!(root_node.total_bytes(), event.len());

        let children = scanned.children(root).unwrap();
        assert_eq!(children.len(), 3);
        let tags: Vec<u32> = children
            .iter()
            .map(|&h| scanned.get(h).unwrap().tag)
            .collect();
        assert_eq!(tags, vec![0xa, 0xb, 0xc]);

        // Flattened descendants match the direct children here (depth 1).
        assert_eq!(scanned.descendants(root).unwrap().len(), 3);

        // Back-pointers: children know their parent and their event root.
        assert_eq!(scanned.parent(children[0]).unwrap(), Some(root));
        assert_eq!(scanned.event_root(children[2]).unwrap(), root);
        assert_eq!(scanned.event_root(root).unwrap(), root);
    }

    #[test]
    fn structure_and_data_bytes_are_views() {
        let (event, inner) = nested_event();
        let scanned = scan_record(&[event], CompressionType::None);
        let root = scanned.event(0).unwrap();
        let children = scanned.children(root).unwrap();

        assert_eq!(scanned.structure_bytes(children[1]).unwrap(), &inner[1][..]);
        // Payload of inner bank B: six words of 2.
        let data = scanned.data_bytes(children[1]).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[0..4], &[2, 0, 0, 0]);
    }

    #[test]
    fn scan_expands_compressed_records() {
        let (event, _) = nested_event();
        let scanned = scan_record(&[event.clone()], CompressionType::Lz4);

        assert_eq!(scanned.event_count(), 1);
        let root = scanned.event(0).unwrap();
        assert_eq!(scanned.structure_bytes(root).unwrap(), &event[..]);

        // The canonical buffer's record header no longer claims compression.
        let mut buf = scanned.buffer().clone();
        let header = RecordHeader::read_at(&mut buf, 0).unwrap();
        assert_eq!(header.compression_type, CompressionType::None);
    }

    #[test]
    fn remove_structure_cascades_lengths() {
        let (event, _) = nested_event();
        let scanned_len = |s: &ScannedBuffer| s.buffer().limit();

        let mut scanned = scan_record(&[event], CompressionType::None);
        let before = scanned_len(&scanned);
        let root = scanned.event(0).unwrap();
        let outer_words_before = scanned.get(root).unwrap().length;
        let record_pos = scanned.get(root).unwrap().record_pos;
        let record_len_before = scanned.buffer().get_u32_at(record_pos).unwrap();
        let data_len_before = scanned.buffer().get_u32_at(record_pos + 32).unwrap();
        let index_before = scanned.buffer().get_u32_at(record_pos + 56).unwrap();

        let b = scanned.children(root).unwrap()[1];
        scanned.remove_structure(b).unwrap();

        // 8-word inner bank: 32 bytes gone everywhere.
        assert_eq!(scanned_len(&scanned), before - 32);
        let root = scanned.event(0).unwrap();
        assert_eq!(scanned.get(root).unwrap().length, outer_words_before - 8);
        assert_eq!(
            scanned.buffer().get_u32_at(record_pos).unwrap(),
            record_len_before - 8
        );
        assert_eq!(
            scanned.buffer().get_u32_at(record_pos + 32).unwrap(),
            data_len_before - 32
        );
        assert_eq!(
            scanned.buffer().get_u32_at(record_pos + 56).unwrap(),
            index_before - 32
        );

        // Children are now A and C.
        let children = scanned.children(root).unwrap();
        let tags: Vec<u32> = children
            .iter()
            .map(|&h| scanned.get(h).unwrap().tag)
            .collect();
        assert_eq!(tags, vec![0xa, 0xc]);
    }

    #[test]
    fn mutation_invalidates_old_handles() {
        let (event, _) = nested_event();
        let mut scanned = scan_record(&[event], CompressionType::None);
        let root = scanned.event(0).unwrap();
        let b = scanned.children(root).unwrap()[1];

        scanned.remove_structure(b).unwrap();
        assert!(matches!(scanned.get(root), Err(EvioError::ObsoleteNode)));
        assert!(matches!(scanned.get(b), Err(EvioError::ObsoleteNode)));
        assert!(matches!(
            scanned.remove_structure(b),
            Err(EvioError::ObsoleteNode)
        ));
    }

    #[test]
    fn add_structure_grows_event_and_record() {
        let (event, _) = nested_event();
        let mut scanned = scan_record(&[event], CompressionType::None);
        let root = scanned.event(0).unwrap();
        let record_pos = scanned.get(root).unwrap().record_pos;
        let before = scanned.buffer().limit();
        let outer_words_before = scanned.get(root).unwrap().length;
        let index_before = scanned.buffer().get_u32_at(record_pos + 56).unwrap();

        let d = bank_of_u32(0xd, 4, &[4; 6], ByteOrder::Little);
        scanned.add_structure(0, &d).unwrap();

        assert_eq!(scanned.buffer().limit(), before + 32);
        let root = scanned.event(0).unwrap();
        assert_eq!(scanned.get(root).unwrap().length, outer_words_before + 8);
        assert_eq!(
            scanned.buffer().get_u32_at(record_pos + 56).unwrap(),
            index_before + 32
        );

        let children = scanned.children(root).unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(scanned.get(children[3]).unwrap().tag, 0xd);
        assert_eq!(scanned.structure_bytes(children[3]).unwrap(), &d[..]);
    }

    #[test]
    fn add_then_remove_restores_bytes() {
        let (event, _) = nested_event();
        let mut scanned = scan_record(&[event], CompressionType::None);
        let original = scanned.buffer().as_slice().to_vec();

        let d = bank_of_u32(0xd, 4, &[4; 6], ByteOrder::Little);
        scanned.add_structure(0, &d).unwrap();
        let root = scanned.event(0).unwrap();
        let added = *scanned.children(root).unwrap().last().unwrap();
        scanned.remove_structure(added).unwrap();

        assert_eq!(scanned.buffer().as_slice(), &original[..]);
    }

    #[test]
    fn event_roots_cannot_be_removed() {
        let (event, _) = nested_event();
        let mut scanned = scan_record(&[event], CompressionType::None);
        let root = scanned.event(0).unwrap();
        assert!(matches!(
            scanned.remove_structure(root),
            Err(EvioError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bad_child_length_is_rejected() {
        let (event, _) = nested_event();
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        out.try_add_event(&event);
        out.build().unwrap();
        let mut bytes = out.as_bytes().to_vec();

        // Corrupt the first inner bank's length word (payload starts after
        // header 56 + index 4; inner bank A starts 8 bytes into the event).
        let inner_len_offset = 56 + 4 + 8;
        bytes[inner_len_offset] = 0xff;
        let result = ScannedBuffer::scan(ByteBuffer::wrap(bytes, ByteOrder::Little));
        assert!(matches!(result, Err(EvioError::BadLength(_))));
    }

    #[test]
    fn multiple_events_across_records() {
        let ev1 = bank_of_u32(1, 1, &[1, 2, 3], ByteOrder::Little);
        let ev2 = bank_of_u32(2, 2, &[4, 5], ByteOrder::Little);

        let mut rec1 = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        rec1.try_add_event(&ev1);
        rec1.build().unwrap();
        let mut rec2 = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        rec2.set_record_number(2);
        rec2.try_add_event(&ev2);
        rec2.build().unwrap();

        let mut bytes = rec1.as_bytes().to_vec();
        bytes.extend_from_slice(rec2.as_bytes());
        let scanned = ScannedBuffer::scan(ByteBuffer::wrap(bytes, ByteOrder::Little)).unwrap();

        assert_eq!(scanned.event_count(), 2);
        assert_eq!(scanned.record_positions().len(), 2);
        assert_eq!(
            scanned
                .structure_bytes(scanned.event(1).unwrap())
                .unwrap(),
            &ev2[..]
        );
        // Second event's node knows its own record.
        let node = scanned.get(scanned.event(1).unwrap()).unwrap();
        assert_eq!(node.record_pos, scanned.record_positions()[1].position);
    }
}
