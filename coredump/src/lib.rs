//! Crash-dump decoding for Xtensa-based devices.
//!
//! Devices upload the core dump of their last crash as a base64-encoded
//! ELF blob. This crate turns that blob into named register values, an
//! exception cause, and a short heuristic backtrace. No symbolication
//! happens here; addresses come back raw for host-side tooling.

mod elf;

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use elf::{Image, NT_PRSTATUS, PT_NOTE};

/// Convenient result alias for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors that can occur while decoding a core dump.
///
/// Every malformed input maps to one of these; decoding never panics.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The uploaded payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The buffer does not start with the ELF magic bytes.
    #[error("not an ELF image (bad magic)")]
    BadMagic,
    /// The image is 64-bit or carries an unknown class byte.
    #[error("unsupported ELF class, expected 32-bit")]
    Not32Bit,
    /// A structural field held an impossible value.
    #[error("malformed ELF image: {0}")]
    Malformed(&'static str),
    /// The image ended in the middle of the named structure.
    #[error("truncated ELF image while reading {0}")]
    Truncated(&'static str),
    /// No PT_NOTE segment contained a process-status record.
    #[error("no process-status note in dump")]
    MissingProcessStatus,
}

/// Register order of the process-status note descriptor.
///
/// Best-effort layout: dumps from older device OS builds may carry fewer
/// words than this table, so extraction stops at whichever of descriptor
/// or table runs out first.
const REGISTER_NAMES: [&str; 24] = [
    "PC", "PS", "A0", "A1", "A2", "A3", "A4", "A5", "A6", "A7", "A8", "A9", "A10", "A11", "A12",
    "A13", "A14", "A15", "SAR", "EXCCAUSE", "EXCVADDR", "LBEG", "LEND", "LCOUNT",
];

// Code regions a derived return address may legitimately point into:
// instruction RAM, flash instruction cache, flash data window.
const CODE_REGIONS: [(u32, u32); 3] = [
    (0x4008_0000, 0x400A_0000),
    (0x400D_0000, 0x4040_0000),
    (0x3F40_0000, 0x3F80_0000),
];

/// Decoded crash information.
///
/// All values are `0x`-prefixed, zero-padded 8-digit hex strings ready for
/// display. `registers` preserves the extraction order of
/// [`REGISTER_NAMES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub pc: Option<String>,
    pub exception_cause: Option<String>,
    pub registers: Vec<(String, String)>,
    pub backtrace: Vec<String>,
}

/// Decode a base64-encoded core dump.
pub fn decode_base64(payload: &str) -> Result<CrashReport> {
    let raw = general_purpose::STANDARD.decode(payload.trim())?;
    decode(&raw)
}

/// Decode a raw ELF core dump.
pub fn decode(data: &[u8]) -> Result<CrashReport> {
    let image = Image::parse(data)?;

    let mut descriptor = None;
    for segment in image.program_headers()? {
        if segment.p_type != PT_NOTE {
            continue;
        }
        if let Some(desc) = image.note_descriptor(&segment, NT_PRSTATUS)? {
            descriptor = Some(desc);
            break;
        }
    }
    let descriptor = descriptor.ok_or(DecodeError::MissingProcessStatus)?;

    let words = image.descriptor_words(descriptor);

    let mut registers = Vec::new();
    let mut pc = None;
    let mut a0 = None;
    let mut exccause = None;

    for (name, value) in REGISTER_NAMES.iter().zip(words) {
        match *name {
            "PC" => pc = Some(value),
            "A0" => a0 = Some(value),
            "EXCCAUSE" => exccause = Some(value),
            _ => {}
        }
        registers.push((name.to_string(), hex32(value)));
    }

    let mut backtrace = Vec::new();
    if let Some(pc) = pc {
        backtrace.push(hex32(pc));
    }
    // A0 holds the low 30 bits of the caller's return address; the top two
    // bits encode the call size and get replaced by the call-marker bit.
    if let Some(a0) = a0 {
        let ra = (a0 & 0x3FFF_FFFF) | 0x4000_0000;
        if in_code_region(ra) {
            backtrace.push(hex32(ra));
        }
    }

    Ok(CrashReport {
        pc: pc.map(hex32),
        exception_cause: exccause.map(exception_cause_name),
        registers,
        backtrace,
    })
}

fn in_code_region(addr: u32) -> bool {
    CODE_REGIONS
        .iter()
        .any(|&(start, end)| addr >= start && addr < end)
}

fn hex32(value: u32) -> String {
    format!("0x{value:08x}")
}

/// Map an EXCCAUSE code to its architectural name.
fn exception_cause_name(code: u32) -> String {
    let name = match code {
        0 => "IllegalInstruction",
        1 => "Syscall",
        2 => "InstructionFetchError",
        3 => "LoadStoreError",
        4 => "Level1Interrupt",
        5 => "Alloca",
        6 => "IntegerDivideByZero",
        8 => "Privileged",
        9 => "LoadStoreAlignment",
        12 => "InstrPIFDataError",
        13 => "LoadStorePIFDataError",
        14 => "InstrPIFAddrError",
        15 => "LoadStorePIFAddrError",
        16 => "InstTLBMiss",
        17 => "InstTLBMultiHit",
        18 => "InstFetchPrivilege",
        20 => "InstFetchProhibited",
        24 => "LoadStoreTLBMiss",
        25 => "LoadStoreTLBMultiHit",
        26 => "LoadStorePrivilege",
        28 => "LoadProhibited",
        29 => "StoreProhibited",
        other => return format!("Unknown ({other})"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a little-endian ELF32 core with one PT_NOTE segment holding a
    /// single PRSTATUS record whose descriptor is `regs` as LE words.
    fn synthetic_core(regs: &[u32]) -> Vec<u8> {
        let mut out = vec![0u8; 52];
        out[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        out[4] = 1; // ELFCLASS32
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1; // EV_CURRENT
        out[0x10..0x12].copy_from_slice(&4u16.to_le_bytes()); // e_type = ET_CORE
        out[0x1c..0x20].copy_from_slice(&52u32.to_le_bytes()); // e_phoff
        out[0x2a..0x2c].copy_from_slice(&32u16.to_le_bytes()); // e_phentsize
        out[0x2c..0x2e].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

        let note_offset = 52 + 32;
        let name = b"CORE\0\0\0\0"; // "CORE\0" padded to 4
        let desc_len = regs.len() * 4;
        let note_len = 12 + name.len() + desc_len;

        // Program header: PT_NOTE at note_offset.
        let mut phdr = vec![0u8; 32];
        phdr[0..4].copy_from_slice(&4u32.to_le_bytes()); // p_type
        phdr[4..8].copy_from_slice(&(note_offset as u32).to_le_bytes()); // p_offset
        phdr[16..20].copy_from_slice(&(note_len as u32).to_le_bytes()); // p_filesz
        out.extend_from_slice(&phdr);

        out.extend_from_slice(&5u32.to_le_bytes()); // namesz ("CORE\0")
        out.extend_from_slice(&(desc_len as u32).to_le_bytes()); // descsz
        out.extend_from_slice(&1u32.to_le_bytes()); // NT_PRSTATUS
        out.extend_from_slice(name);
        for reg in regs {
            out.extend_from_slice(&reg.to_le_bytes());
        }
        out
    }

    /// Full register file: PC, PS, A0..A15, SAR, EXCCAUSE, EXCVADDR,
    /// LBEG, LEND, LCOUNT.
    fn full_registers(pc: u32, a0: u32, exccause: u32) -> Vec<u32> {
        let mut regs = vec![pc, 0x0006_0530, a0];
        regs.extend(std::iter::repeat(0x3FFB_0000).take(15)); // A1..A15
        regs.push(0x0000_001d); // SAR
        regs.push(exccause);
        regs.push(0x0000_0000); // EXCVADDR
        regs.extend([0, 0, 0]); // LBEG, LEND, LCOUNT
        regs
    }

    #[test]
    fn decodes_pc_and_exccause() {
        let dump = synthetic_core(&full_registers(0x400d_1234, 0x800d_5678, 28));
        let report = decode(&dump).unwrap();

        assert_eq!(report.pc.as_deref(), Some("0x400d1234"));
        assert_eq!(report.exception_cause.as_deref(), Some("LoadProhibited"));
        assert_eq!(report.registers[0], ("PC".to_string(), "0x400d1234".to_string()));
        let exccause = report
            .registers
            .iter()
            .find(|(name, _)| name == "EXCCAUSE")
            .unwrap();
        assert_eq!(exccause.1, "0x0000001c");
    }

    #[test]
    fn backtrace_is_pc_plus_derived_return_address() {
        // A0 = 0x800d5678 -> masked to 0x000d5678, call marker -> 0x400d5678,
        // which lands in the flash instruction cache region.
        let dump = synthetic_core(&full_registers(0x400d_1234, 0x800d_5678, 0));
        let report = decode(&dump).unwrap();

        assert_eq!(report.backtrace, vec!["0x400d1234", "0x400d5678"]);
    }

    #[test]
    fn backtrace_drops_return_address_outside_code_regions() {
        // Derived RA 0x40005678 sits below instruction RAM.
        let dump = synthetic_core(&full_registers(0x400d_1234, 0x8000_5678, 0));
        let report = decode(&dump).unwrap();

        assert_eq!(report.backtrace, vec!["0x400d1234"]);
        assert!(report.backtrace.len() <= 2);
    }

    #[test]
    fn partial_descriptor_extracts_partial_registers() {
        // Only PC and PS present; no A0, no EXCCAUSE.
        let dump = synthetic_core(&[0x400d_1234, 0x0006_0530]);
        let report = decode(&dump).unwrap();

        assert_eq!(report.registers.len(), 2);
        assert_eq!(report.pc.as_deref(), Some("0x400d1234"));
        assert_eq!(report.exception_cause, None);
        assert_eq!(report.backtrace, vec!["0x400d1234"]);
    }

    #[test]
    fn unknown_exception_cause_is_labelled() {
        let dump = synthetic_core(&full_registers(0x400d_1234, 0, 63));
        let report = decode(&dump).unwrap();

        assert_eq!(report.exception_cause.as_deref(), Some("Unknown (63)"));
    }

    #[test]
    fn rejects_corrupted_magic() {
        let mut dump = synthetic_core(&full_registers(0x400d_1234, 0, 0));
        dump[0] = 0x00;
        let err = decode(&dump).unwrap_err();

        assert!(matches!(err, DecodeError::BadMagic));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn rejects_64bit_class() {
        let mut dump = synthetic_core(&full_registers(0x400d_1234, 0, 0));
        dump[4] = 2; // ELFCLASS64
        assert!(matches!(decode(&dump).unwrap_err(), DecodeError::Not32Bit));
    }

    #[test]
    fn rejects_dump_without_note_segment() {
        let mut dump = synthetic_core(&full_registers(0x400d_1234, 0, 0));
        dump[0x2c..0x2e].copy_from_slice(&0u16.to_le_bytes()); // e_phnum = 0
        assert!(matches!(
            decode(&dump).unwrap_err(),
            DecodeError::MissingProcessStatus
        ));
    }

    #[test]
    fn decodes_base64_payload() {
        use base64::{engine::general_purpose, Engine as _};

        let dump = synthetic_core(&full_registers(0x400d_1234, 0x800d_5678, 29));
        let encoded = general_purpose::STANDARD.encode(&dump);
        let report = decode_base64(&encoded).unwrap();

        assert_eq!(report.exception_cause.as_deref(), Some("StoreProhibited"));
    }

    #[test]
    fn rejects_garbage_base64() {
        assert!(matches!(
            decode_base64("not base64 at all!").unwrap_err(),
            DecodeError::Base64(_)
        ));
    }
}
