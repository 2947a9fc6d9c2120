//! Region marshalling over guest linear memory.
//!
//! A `Region` is a 12-byte header `(offset, capacity, length)`, three
//! little-endian `u32`s, that lives inside guest memory and describes a
//! buffer also in guest memory. The host only keeps the header pointer:
//! the header and the byte view are re-read from the current memory on every
//! access, since a guest `allocate` call may grow (and move) linear memory.
//!
//! All accesses are bounds-checked. A null pointer, a header or buffer
//! outside memory, and `length > capacity` are fatal errors.

use serde::de::DeserializeOwned;
use serde::Serialize;

use cwvm_hostapi::{Binary, HostError};

use crate::error::VmError;

/// Size of a region header in bytes.
pub const REGION_HEADER_LEN: usize = 12;

/// Access to a guest's linear memory and allocator.
///
/// Implemented over a wasmtime instance by `WasmEnv` and over a plain
/// `Vec<u8>` by `testing::MockEnv`.
pub trait GuestMemory {
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Ask the guest for a region of `size` bytes; returns the header pointer.
    fn allocate(&mut self, size: u32) -> Result<u32, VmError>;

    /// Hand a region back to the guest.
    fn deallocate(&mut self, ptr: u32) -> Result<(), VmError>;
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: u32) -> Result<&[u8], VmError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|&end| end <= mem.len())
        .ok_or_else(|| {
            VmError::RegionOutOfBounds(format!(
                "[{ptr}, {ptr}+{len}) exceeds memory size {}",
                mem.len()
            ))
        })?;
    Ok(&mem[start..end])
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), VmError> {
    let size = mem.len();
    let start = ptr as usize;
    let end = start
        .checked_add(data.len())
        .filter(|&end| end <= size)
        .ok_or_else(|| {
            VmError::RegionOutOfBounds(format!(
                "[{ptr}, {ptr}+{}) exceeds memory size {size}",
                data.len()
            ))
        })?;
    mem[start..end].copy_from_slice(data);
    Ok(())
}

fn read_u32_le(mem: &[u8], ptr: u32) -> Result<u32, VmError> {
    let bytes = read_bytes(mem, ptr, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// The decoded header of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHeader {
    pub offset: u32,
    pub capacity: u32,
    pub length: u32,
}

impl RegionHeader {
    pub fn to_bytes(self) -> [u8; REGION_HEADER_LEN] {
        let mut out = [0u8; REGION_HEADER_LEN];
        out[0..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.capacity.to_le_bytes());
        out[8..12].copy_from_slice(&self.length.to_le_bytes());
        out
    }
}

/// A handle to a region header in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    ptr: u32,
}

impl Region {
    /// Wrap a header pointer. Zero is rejected with `NullRegion`.
    pub fn new(ptr: u32) -> Result<Self, VmError> {
        if ptr == 0 {
            return Err(VmError::NullRegion);
        }
        Ok(Self { ptr })
    }

    /// Wrap a pointer where zero means "absent".
    pub fn optional(ptr: u32) -> Option<Self> {
        (ptr != 0).then_some(Self { ptr })
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    /// Ask the guest for a fresh region of `size` bytes.
    pub fn allocate<M: GuestMemory + ?Sized>(mem: &mut M, size: usize) -> Result<Self, VmError> {
        let size = u32::try_from(size).map_err(|_| {
            VmError::RegionOutOfBounds(format!("allocation of {size} bytes exceeds u32"))
        })?;
        Self::new(mem.allocate(size)?)
    }

    /// Allocate a region sized for `data` and write `data` into it.
    pub fn allocate_with<M: GuestMemory + ?Sized>(mem: &mut M, data: &[u8]) -> Result<Self, VmError> {
        let region = Self::allocate(mem, data.len())?;
        region.write(mem.memory_mut(), data)?;
        Ok(region)
    }

    /// Read and validate the header against the current memory.
    pub fn header(&self, mem: &[u8]) -> Result<RegionHeader, VmError> {
        let header = RegionHeader {
            offset: read_u32_le(mem, self.ptr)?,
            capacity: read_u32_le(mem, self.ptr.saturating_add(4))?,
            length: read_u32_le(mem, self.ptr.saturating_add(8))?,
        };
        if header.length > header.capacity {
            return Err(VmError::InvalidRegion(format!(
                "region at {}: length {} exceeds capacity {}",
                self.ptr, header.length, header.capacity
            )));
        }
        let end = header.offset as u64 + header.capacity as u64;
        if end > mem.len() as u64 {
            return Err(VmError::RegionOutOfBounds(format!(
                "region at {}: offset {} + capacity {} exceeds memory size {}",
                self.ptr,
                header.offset,
                header.capacity,
                mem.len()
            )));
        }
        Ok(header)
    }

    /// The region's `length` bytes. Never returns the unused capacity.
    pub fn read(&self, mem: &[u8]) -> Result<Vec<u8>, VmError> {
        let header = self.header(mem)?;
        Ok(read_bytes(mem, header.offset, header.length)?.to_vec())
    }

    /// Like [`read`](Self::read), but rejects a region longer than `max`
    /// with the caller's error before copying anything.
    pub fn read_limited(
        &self,
        mem: &[u8],
        max: usize,
        on_exceed: impl FnOnce(usize) -> HostError,
    ) -> Result<Vec<u8>, VmError> {
        let header = self.header(mem)?;
        if header.length as usize > max {
            return Err(on_exceed(header.length as usize).into());
        }
        Ok(read_bytes(mem, header.offset, header.length)?.to_vec())
    }

    /// Copy `data` into the region's buffer and set `length`.
    pub fn write(&self, mem: &mut [u8], data: &[u8]) -> Result<(), VmError> {
        let header = self.header(mem)?;
        if data.len() > header.capacity as usize {
            return Err(HostError::RegionTooSmall {
                needed: data.len(),
                capacity: header.capacity as usize,
            }
            .into());
        }
        write_bytes(mem, header.offset, data)?;
        let updated = RegionHeader {
            length: data.len() as u32,
            ..header
        };
        write_bytes(mem, self.ptr, &updated.to_bytes())
    }

    pub fn read_str(&self, mem: &[u8]) -> Result<String, VmError> {
        String::from_utf8(self.read(mem)?)
            .map_err(|e| VmError::Serialization(format!("region is not UTF-8: {e}")))
    }

    pub fn write_str(&self, mem: &mut [u8], s: &str) -> Result<(), VmError> {
        self.write(mem, s.as_bytes())
    }

    /// The region's bytes as standard base64.
    pub fn read_b64(&self, mem: &[u8]) -> Result<String, VmError> {
        Ok(Binary(self.read(mem)?).to_base64())
    }

    /// Decode base64 `encoded` and write the raw bytes.
    pub fn write_b64(&self, mem: &mut [u8], encoded: &str) -> Result<(), VmError> {
        let binary = Binary::from_base64(encoded)
            .map_err(|e| VmError::Serialization(format!("invalid base64: {e}")))?;
        self.write(mem, binary.as_slice())
    }

    /// Allocate a region holding the decoded bytes of base64 `encoded`.
    pub fn allocate_b64<M: GuestMemory + ?Sized>(mem: &mut M, encoded: &str) -> Result<Self, VmError> {
        let binary = Binary::from_base64(encoded)
            .map_err(|e| VmError::Serialization(format!("invalid base64: {e}")))?;
        Self::allocate_with(mem, binary.as_slice())
    }

    pub fn read_json<T: DeserializeOwned>(&self, mem: &[u8]) -> Result<T, VmError> {
        Ok(serde_json::from_slice(&self.read(mem)?)?)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, mem: &mut [u8], value: &T) -> Result<(), VmError> {
        let bytes = serde_json::to_vec(value)?;
        self.write(mem, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 256 bytes of memory with one region header at 16 pointing at
    /// `[64, 64+capacity)`.
    fn memory_with_region(capacity: u32, length: u32) -> Vec<u8> {
        let mut mem = vec![0u8; 256];
        let header = RegionHeader { offset: 64, capacity, length };
        mem[16..28].copy_from_slice(&header.to_bytes());
        mem
    }

    #[test]
    fn test_read_bytes_bounds() {
        let mem = vec![10, 20, 30, 40, 50];
        assert_eq!(read_bytes(&mem, 1, 3).unwrap(), &[20, 30, 40]);
        assert!(read_bytes(&mem, 3, 3).is_err());
        assert!(read_bytes(&mem, u32::MAX, 2).is_err());
    }

    #[test]
    fn test_write_bytes_bounds() {
        let mut mem = vec![0; 4];
        write_bytes(&mut mem, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mem, vec![0, 0, 0xAA, 0xBB]);
        assert!(write_bytes(&mut mem, 2, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_null_region() {
        assert!(matches!(Region::new(0), Err(VmError::NullRegion)));
        assert_eq!(Region::optional(0), None);
        assert_eq!(Region::optional(16).map(|r| r.ptr()), Some(16));
    }

    #[test]
    fn test_write_then_read() {
        let mut mem = memory_with_region(32, 0);
        let region = Region::new(16).unwrap();
        region.write(&mut mem, b"hello").unwrap();
        assert_eq!(region.header(&mem).unwrap().length, 5);
        assert_eq!(region.read(&mem).unwrap(), b"hello");
        assert_eq!(&mem[64..69], b"hello");
    }

    #[test]
    fn test_read_returns_length_not_capacity() {
        let mut mem = memory_with_region(32, 3);
        mem[64..96].fill(b'x');
        let region = Region::new(16).unwrap();
        assert_eq!(region.read(&mem).unwrap(), b"xxx");
    }

    #[test]
    fn test_write_too_large() {
        let mut mem = memory_with_region(4, 0);
        let err = Region::new(16).unwrap().write(&mut mem, b"hello").unwrap_err();
        assert!(matches!(
            err,
            VmError::Host(HostError::RegionTooSmall { needed: 5, capacity: 4 })
        ));
    }

    #[test]
    fn test_length_exceeds_capacity() {
        let mem = memory_with_region(4, 5);
        let err = Region::new(16).unwrap().read(&mem).unwrap_err();
        assert!(matches!(err, VmError::InvalidRegion(_)));
    }

    #[test]
    fn test_region_outside_memory() {
        let mem = memory_with_region(1024, 0);
        assert!(matches!(
            Region::new(16).unwrap().read(&mem),
            Err(VmError::RegionOutOfBounds(_))
        ));
        // header itself past the end
        assert!(matches!(
            Region::new(250).unwrap().header(&mem),
            Err(VmError::RegionOutOfBounds(_))
        ));
    }

    #[test]
    fn test_read_limited() {
        let mut mem = memory_with_region(32, 0);
        let region = Region::new(16).unwrap();
        region.write(&mut mem, &[1u8; 10]).unwrap();

        assert_eq!(region.read_limited(&mem, 10, |_| HostError::EmptyAddress).unwrap().len(), 10);
        let err = region
            .read_limited(&mem, 9, |length| HostError::KeyTooLong { length, max: 9 })
            .unwrap_err();
        assert!(matches!(
            err,
            VmError::Host(HostError::KeyTooLong { length: 10, max: 9 })
        ));
    }

    #[test]
    fn test_str_and_json() {
        let mut mem = memory_with_region(64, 0);
        let region = Region::new(16).unwrap();
        region.write_str(&mut mem, "grüße").unwrap();
        assert_eq!(region.read_str(&mem).unwrap(), "grüße");

        region.write_json(&mut mem, &serde_json::json!({ "a": [1, 2] })).unwrap();
        let value: serde_json::Value = region.read_json(&mem).unwrap();
        assert_eq!(value["a"][1], 2);

        region.write(&mut mem, &[0xff, 0xfe]).unwrap();
        assert!(matches!(region.read_str(&mem), Err(VmError::Serialization(_))));
    }

    #[test]
    fn test_base64() {
        let mut mem = memory_with_region(16, 0);
        let region = Region::new(16).unwrap();
        region.write_b64(&mut mem, "AP8Q").unwrap();
        assert_eq!(region.read(&mem).unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(region.read_b64(&mem).unwrap(), "AP8Q");

        assert!(matches!(
            region.write_b64(&mut mem, "not base64!"),
            Err(VmError::Serialization(_))
        ));
        // a failed decode leaves the region untouched
        assert_eq!(region.read_b64(&mem).unwrap(), "AP8Q");
    }
}
