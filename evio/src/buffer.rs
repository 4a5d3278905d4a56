//! Byte-ordered buffer with positioned access
//!
//! [`ByteBuffer`] owns a contiguous byte region and carries a runtime byte
//! order plus an independently settable read position and limit. Numeric
//! accessors honor the order in effect at call time, so a buffer can be
//! re-tagged after endianness detection without touching its bytes.
//!
//! Reads are bounded by the limit, writes by the capacity; any access past
//! those fails with `OutOfBounds`. [`BufferView`] is a non-owning read
//! cursor over the same storage.

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};

use crate::error::{EvioError, Result};

/// Endianness of multi-byte values in a buffer or file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Little-endian (canonical for EVIO v6 files)
    #[default]
    Little,
    /// Big-endian
    Big,
}

impl ByteOrder {
    /// The opposite byte order
    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    /// The byte order of the host
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// True for little-endian
    pub fn is_little(self) -> bool {
        self == ByteOrder::Little
    }
}

/// A growable-on-demand byte region with byte order, position, and limit.
///
/// The buffer is the sole owner of its storage; [`ByteBuffer::slice`] and
/// [`ByteBuffer::duplicate`] hand out non-owning views valid for the
/// borrow's lifetime.
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    mark: Option<usize>,
    order: ByteOrder,
}

impl ByteBuffer {
    /// Allocate a zero-filled buffer of `capacity` bytes; limit = capacity.
    pub fn new(capacity: usize, order: ByteOrder) -> Self {
        ByteBuffer {
            data: vec![0u8; capacity],
            position: 0,
            limit: capacity,
            mark: None,
            order,
        }
    }

    /// Wrap an existing byte vector; limit = length.
    pub fn wrap(data: Vec<u8>, order: ByteOrder) -> Self {
        let limit = data.len();
        ByteBuffer {
            data,
            position: 0,
            limit,
            mark: None,
            order,
        }
    }

    /// Current byte order
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Switch the byte order; affects subsequent accesses only
    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Total storage size in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current read/write cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor; fails if past the limit
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(EvioError::OutOfBounds {
                offset: position,
                len: 0,
                bound: self.limit,
            });
        }
        self.position = position;
        if let Some(m) = self.mark {
            if m > position {
                self.mark = None;
            }
        }
        Ok(())
    }

    /// Current limit (first inaccessible read offset)
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Move the limit; fails if past the capacity
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.capacity() {
            return Err(EvioError::OutOfBounds {
                offset: limit,
                len: 0,
                bound: self.capacity(),
            });
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        if let Some(m) = self.mark {
            if m > limit {
                self.mark = None;
            }
        }
        Ok(())
    }

    /// Bytes left between position and limit
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    /// True if any bytes remain
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Limit = position, position = 0 (switch from filling to draining)
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
    }

    /// Position = 0, limit untouched
    pub fn rewind(&mut self) {
        self.position = 0;
        self.mark = None;
    }

    /// Position = 0, limit = capacity
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.capacity();
        self.mark = None;
    }

    /// Remember the current position for a later [`ByteBuffer::reset`]
    pub fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    /// Return to the marked position
    pub fn reset(&mut self) -> Result<()> {
        match self.mark {
            Some(m) => {
                self.position = m;
                Ok(())
            }
            None => Err(EvioError::InvalidConfig("reset without a mark".into())),
        }
    }

    /// Move the unread bytes to the front; position = bytes moved,
    /// limit = capacity.
    pub fn compact(&mut self) {
        let rem = self.remaining();
        self.data.copy_within(self.position..self.limit, 0);
        self.position = rem;
        self.limit = self.capacity();
        self.mark = None;
    }

    /// The full storage up to the limit
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.limit]
    }

    /// Borrow `len` bytes at `offset` without copying
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check_read(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Mutable access to the full storage
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// An independent read cursor over the same storage
    pub fn duplicate(&self) -> BufferView<'_> {
        BufferView {
            data: &self.data[..self.limit],
            position: 0,
            order: self.order,
        }
    }

    /// Shrink the storage, clamping limit and position
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        if self.limit > len {
            self.limit = len;
        }
        if self.position > self.limit {
            self.position = self.limit;
        }
    }

    /// Insert bytes at `offset`, growing the storage and the limit
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        if offset > self.limit {
            return Err(EvioError::OutOfBounds {
                offset,
                len: bytes.len(),
                bound: self.limit,
            });
        }
        self.data.splice(offset..offset, bytes.iter().copied());
        self.limit += bytes.len();
        Ok(())
    }

    /// Remove `len` bytes at `offset`, shifting the tail down and shrinking
    /// the limit
    pub fn remove(&mut self, offset: usize, len: usize) -> Result<()> {
        self.check_read(offset, len)?;
        self.data.drain(offset..offset + len);
        self.limit -= len;
        if self.position > self.limit {
            self.position = self.limit;
        }
        Ok(())
    }

    fn check_read(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.limit {
            return Err(EvioError::OutOfBounds {
                offset,
                len,
                bound: self.limit,
            });
        }
        Ok(())
    }

    fn check_write(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.capacity() {
            return Err(EvioError::OutOfBounds {
                offset,
                len,
                bound: self.capacity(),
            });
        }
        Ok(())
    }

    // ── absolute accessors ──────────────────────────────────────────────

    /// Read one byte at `offset`
    pub fn get_u8_at(&self, offset: usize) -> Result<u8> {
        self.check_read(offset, 1)?;
        Ok(self.data[offset])
    }

    /// Read a 16-bit unsigned value at `offset`
    pub fn get_u16_at(&self, offset: usize) -> Result<u16> {
        self.check_read(offset, 2)?;
        let s = &self.data[offset..offset + 2];
        Ok(match self.order {
            ByteOrder::Little => LittleEndian::read_u16(s),
            ByteOrder::Big => BigEndian::read_u16(s),
        })
    }

    /// Read a 32-bit unsigned value at `offset`
    pub fn get_u32_at(&self, offset: usize) -> Result<u32> {
        self.check_read(offset, 4)?;
        let s = &self.data[offset..offset + 4];
        Ok(match self.order {
            ByteOrder::Little => LittleEndian::read_u32(s),
            ByteOrder::Big => BigEndian::read_u32(s),
        })
    }

    /// Read a 64-bit unsigned value at `offset`
    pub fn get_u64_at(&self, offset: usize) -> Result<u64> {
        self.check_read(offset, 8)?;
        let s = &self.data[offset..offset + 8];
        Ok(match self.order {
            ByteOrder::Little => LittleEndian::read_u64(s),
            ByteOrder::Big => BigEndian::read_u64(s),
        })
    }

    /// Read a signed byte at `offset`
    pub fn get_i8_at(&self, offset: usize) -> Result<i8> {
        Ok(self.get_u8_at(offset)? as i8)
    }

    /// Read a 16-bit signed value at `offset`
    pub fn get_i16_at(&self, offset: usize) -> Result<i16> {
        Ok(self.get_u16_at(offset)? as i16)
    }

    /// Read a 32-bit signed value at `offset`
    pub fn get_i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.get_u32_at(offset)? as i32)
    }

    /// Read a 64-bit signed value at `offset`
    pub fn get_i64_at(&self, offset: usize) -> Result<i64> {
        Ok(self.get_u64_at(offset)? as i64)
    }

    /// Read a 32-bit float at `offset`
    pub fn get_f32_at(&self, offset: usize) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32_at(offset)?))
    }

    /// Read a 64-bit float at `offset`
    pub fn get_f64_at(&self, offset: usize) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64_at(offset)?))
    }

    /// Write one byte at `offset`
    pub fn put_u8_at(&mut self, offset: usize, value: u8) -> Result<()> {
        self.check_write(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Write a 16-bit unsigned value at `offset`
    pub fn put_u16_at(&mut self, offset: usize, value: u16) -> Result<()> {
        self.check_write(offset, 2)?;
        let s = &mut self.data[offset..offset + 2];
        match self.order {
            ByteOrder::Little => LittleEndian::write_u16(s, value),
            ByteOrder::Big => BigEndian::write_u16(s, value),
        }
        Ok(())
    }

    /// Write a 32-bit unsigned value at `offset`
    pub fn put_u32_at(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check_write(offset, 4)?;
        let s = &mut self.data[offset..offset + 4];
        match self.order {
            ByteOrder::Little => LittleEndian::write_u32(s, value),
            ByteOrder::Big => BigEndian::write_u32(s, value),
        }
        Ok(())
    }

    /// Write a 64-bit unsigned value at `offset`
    pub fn put_u64_at(&mut self, offset: usize, value: u64) -> Result<()> {
        self.check_write(offset, 8)?;
        let s = &mut self.data[offset..offset + 8];
        match self.order {
            ByteOrder::Little => LittleEndian::write_u64(s, value),
            ByteOrder::Big => BigEndian::write_u64(s, value),
        }
        Ok(())
    }

    /// Write a 32-bit signed value at `offset`
    pub fn put_i32_at(&mut self, offset: usize, value: i32) -> Result<()> {
        self.put_u32_at(offset, value as u32)
    }

    /// Write a 64-bit signed value at `offset`
    pub fn put_i64_at(&mut self, offset: usize, value: i64) -> Result<()> {
        self.put_u64_at(offset, value as u64)
    }

    /// Write a 32-bit float at `offset`
    pub fn put_f32_at(&mut self, offset: usize, value: f32) -> Result<()> {
        self.put_u32_at(offset, value.to_bits())
    }

    /// Write a 64-bit float at `offset`
    pub fn put_f64_at(&mut self, offset: usize, value: f64) -> Result<()> {
        self.put_u64_at(offset, value.to_bits())
    }

    /// Copy bytes into the buffer at `offset`
    pub fn put_bytes_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_write(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    // ── relative accessors (advance the position) ───────────────────────

    /// Read one byte at the position and advance
    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.get_u8_at(self.position)?;
        self.position += 1;
        Ok(v)
    }

    /// Read a 16-bit unsigned value at the position and advance
    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self.get_u16_at(self.position)?;
        self.position += 2;
        Ok(v)
    }

    /// Read a 32-bit unsigned value at the position and advance
    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.get_u32_at(self.position)?;
        self.position += 4;
        Ok(v)
    }

    /// Read a 64-bit unsigned value at the position and advance
    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.get_u64_at(self.position)?;
        self.position += 8;
        Ok(v)
    }

    /// Read a signed byte at the position and advance
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a 16-bit signed value at the position and advance
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a 32-bit signed value at the position and advance
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a 64-bit signed value at the position and advance
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Read a 32-bit float at the position and advance
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a 64-bit float at the position and advance
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Fill `dst` from the position and advance
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        self.check_read(self.position, dst.len())?;
        dst.copy_from_slice(&self.data[self.position..self.position + dst.len()]);
        self.position += dst.len();
        Ok(())
    }

    /// Write one byte at the position and advance
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put_u8_at(self.position, value)?;
        self.position += 1;
        self.sync_limit();
        Ok(())
    }

    /// Write a 16-bit unsigned value at the position and advance
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.put_u16_at(self.position, value)?;
        self.position += 2;
        self.sync_limit();
        Ok(())
    }

    /// Write a 32-bit unsigned value at the position and advance
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.put_u32_at(self.position, value)?;
        self.position += 4;
        self.sync_limit();
        Ok(())
    }

    /// Write a 64-bit unsigned value at the position and advance
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.put_u64_at(self.position, value)?;
        self.position += 8;
        self.sync_limit();
        Ok(())
    }

    /// Write a 32-bit signed value at the position and advance
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    /// Write a 64-bit signed value at the position and advance
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    /// Write a 32-bit float at the position and advance
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    /// Write a 64-bit float at the position and advance
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    /// Copy `src` in at the position and advance
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.put_bytes_at(self.position, src)?;
        self.position += src.len();
        self.sync_limit();
        Ok(())
    }

    fn sync_limit(&mut self) {
        if self.position > self.limit {
            self.limit = self.position;
        }
    }
}

/// Non-owning read cursor over a [`ByteBuffer`]'s storage.
///
/// Shares the parent's bytes without copying; carries its own position and
/// byte order.
#[derive(Debug, Clone)]
pub struct BufferView<'a> {
    data: &'a [u8],
    position: usize,
    order: ByteOrder,
}

impl<'a> BufferView<'a> {
    /// View over a plain byte slice
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        BufferView {
            data,
            position: 0,
            order,
        }
    }

    /// Current byte order
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Switch the byte order
    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Current cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(EvioError::OutOfBounds {
                offset: position,
                len: 0,
                bound: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.data.len() {
            return Err(EvioError::OutOfBounds {
                offset,
                len,
                bound: self.data.len(),
            });
        }
        Ok(())
    }

    /// Read a 32-bit unsigned value at `offset`
    pub fn get_u32_at(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        let s = &self.data[offset..offset + 4];
        Ok(match self.order {
            ByteOrder::Little => LittleEndian::read_u32(s),
            ByteOrder::Big => BigEndian::read_u32(s),
        })
    }

    /// Read a 32-bit unsigned value at the cursor and advance
    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.get_u32_at(self.position)?;
        self.position += 4;
        Ok(v)
    }

    /// Read a 64-bit unsigned value at the cursor and advance
    pub fn read_u64(&mut self) -> Result<u64> {
        self.check(self.position, 8)?;
        let s = &self.data[self.position..self.position + 8];
        let v = match self.order {
            ByteOrder::Little => LittleEndian::read_u64(s),
            ByteOrder::Big => BigEndian::read_u64(s),
        };
        self.position += 8;
        Ok(v)
    }

    /// Borrow `len` bytes at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }
}
