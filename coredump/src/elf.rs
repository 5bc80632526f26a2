//! Minimal ELF32 container walking.
//!
//! Core dumps arrive straight off devices, and only a handful of fixed
//! header offsets matter here, so this is a hand-rolled reader rather than
//! a full ELF library. Offsets follow the ELF32 layout.

use crate::DecodeError;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

/// ELF32 header size; anything shorter cannot be walked at all.
const EHDR_SIZE: usize = 52;
/// ELF32 program header entry size.
const PHENT_SIZE: usize = 32;

// e_phoff / e_phentsize / e_phnum offsets in the ELF32 header.
const E_PHOFF: usize = 0x1c;
const E_PHENTSIZE: usize = 0x2a;
const E_PHNUM: usize = 0x2c;

/// Program header segment type carrying note records.
pub const PT_NOTE: u32 = 4;
/// Note record type for a process-status (register) dump.
pub const NT_PRSTATUS: u32 = 1;

/// A program header entry, reduced to the fields the decoder consumes.
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub offset: u32,
    pub file_size: u32,
}

/// Byte-order-aware view over a raw ELF32 image.
pub struct Image<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Image<'a> {
    /// Validate magic, class, and byte order; reject 64-bit images.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        if data.len() < EHDR_SIZE {
            return Err(DecodeError::Truncated("ELF header"));
        }
        if data[..4] != ELF_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        if data[4] != ELFCLASS32 {
            return Err(DecodeError::Not32Bit);
        }
        let big_endian = match data[5] {
            ELFDATA2LSB => false,
            ELFDATA2MSB => true,
            _ => return Err(DecodeError::Malformed("unknown byte-order flag")),
        };
        Ok(Self { data, big_endian })
    }

    fn u16_at(&self, offset: usize, what: &'static str) -> Result<u16, DecodeError> {
        let bytes: [u8; 2] = self
            .data
            .get(offset..offset + 2)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::Truncated(what))?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32_at(&self, offset: usize, what: &'static str) -> Result<u32, DecodeError> {
        let bytes: [u8; 4] = self
            .data
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::Truncated(what))?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    /// Read the program header table from the fixed ELF32 header fields.
    pub fn program_headers(&self) -> Result<Vec<ProgramHeader>, DecodeError> {
        let phoff = self.u32_at(E_PHOFF, "e_phoff")? as usize;
        let entsize = self.u16_at(E_PHENTSIZE, "e_phentsize")? as usize;
        let count = self.u16_at(E_PHNUM, "e_phnum")? as usize;

        if entsize < PHENT_SIZE {
            return Err(DecodeError::Malformed("program header entry too small"));
        }

        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let base = phoff
                .checked_add(i * entsize)
                .ok_or(DecodeError::Truncated("program header table"))?;
            headers.push(ProgramHeader {
                p_type: self.u32_at(base, "p_type")?,
                offset: self.u32_at(base + 4, "p_offset")?,
                file_size: self.u32_at(base + 16, "p_filesz")?,
            });
        }
        Ok(headers)
    }

    /// Scan a PT_NOTE segment for the first record of `wanted_type` and
    /// return its descriptor bytes.
    ///
    /// Note records are `namesz, descsz, type` words followed by the name
    /// and descriptor, each padded to a 4-byte boundary.
    pub fn note_descriptor(
        &self,
        segment: &ProgramHeader,
        wanted_type: u32,
    ) -> Result<Option<&'a [u8]>, DecodeError> {
        let start = segment.offset as usize;
        let end = start
            .checked_add(segment.file_size as usize)
            .filter(|&e| e <= self.data.len())
            .ok_or(DecodeError::Truncated("note segment"))?;

        let mut pos = start;
        while pos + 12 <= end {
            let namesz = self.u32_at(pos, "note namesz")? as usize;
            let descsz = self.u32_at(pos + 4, "note descsz")? as usize;
            let ntype = self.u32_at(pos + 8, "note type")?;

            let desc_start = pos
                .checked_add(12)
                .and_then(|p| p.checked_add(align4(namesz)))
                .ok_or(DecodeError::Truncated("note record"))?;
            let desc_end = desc_start
                .checked_add(descsz)
                .filter(|&e| e <= end)
                .ok_or(DecodeError::Truncated("note record"))?;

            if ntype == wanted_type {
                return Ok(Some(&self.data[desc_start..desc_end]));
            }

            pos = desc_start
                .checked_add(align4(descsz))
                .ok_or(DecodeError::Truncated("note record"))?;
        }
        Ok(None)
    }

    /// Split a note descriptor into 4-byte words in image byte order.
    /// A trailing partial word is dropped.
    pub fn descriptor_words(&self, descriptor: &[u8]) -> Vec<u32> {
        descriptor
            .chunks_exact(4)
            .map(|chunk| {
                let bytes: [u8; 4] = chunk.try_into().unwrap();
                if self.big_endian {
                    u32::from_be_bytes(bytes)
                } else {
                    u32::from_le_bytes(bytes)
                }
            })
            .collect()
    }
}

fn align4(n: usize) -> usize {
    n.div_ceil(4) * 4
}
