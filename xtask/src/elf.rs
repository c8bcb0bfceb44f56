use std::{fs, path::Path};

use anyhow::Context;
use goblin::elf::{program_header::PT_LOAD, Elf};
use log::{debug, warn};

use crate::{arch::Arch, config::PhysAddr};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Segment {
    pub paddr: u64,
    pub filesz: u64,
}

/// What the pipeline needs to know about the kernel ELF before flattening it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelElf {
    pub machine: u16,
    pub is_64: bool,
    pub entry: u64,
    pub segments: Vec<Segment>,
}

impl KernelElf {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        let elf = Elf::parse(bytes)?;
        let segments = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD)
            .map(|ph| Segment {
                paddr: ph.p_paddr,
                filesz: ph.p_filesz,
            })
            .collect();

        Ok(Self {
            machine: elf.header.e_machine,
            is_64: elf.is_64,
            entry: elf.entry,
            segments,
        })
    }

    /// Lowest physical address of any loadable segment.
    pub fn load_base(&self) -> Option<u64> {
        self.segments.iter().map(|s| s.paddr).min()
    }

    /// Size `objcopy -O binary` produces: the span from the lowest to the
    /// highest file-backed byte.
    pub fn flat_size(&self) -> u64 {
        let base = match self.load_base() {
            Some(base) => base,
            None => return 0,
        };
        self.segments
            .iter()
            .filter(|s| s.filesz > 0)
            .map(|s| s.paddr.saturating_add(s.filesz).saturating_sub(base))
            .max()
            .unwrap_or(0)
    }

    /// Machine and class mismatches are fatal. An entry point away from the
    /// load address only warns: the firmware jumps to the load address.
    pub fn check(&self, arch: Arch, load_addr: PhysAddr) -> anyhow::Result<()> {
        if self.machine != arch.elf_machine() {
            anyhow::bail!(
                "kernel is built for ELF machine {}, expected {} ({})",
                self.machine,
                arch.elf_machine(),
                arch
            );
        }
        if self.is_64 != arch.is_64() {
            anyhow::bail!("kernel ELF class does not match {}", arch);
        }
        if self.segments.is_empty() {
            anyhow::bail!("kernel has no loadable segments");
        }

        if self.entry != load_addr.0 {
            warn!(
                "kernel entry point {:#x} differs from load address {}",
                self.entry, load_addr
            );
        }
        if let Some(base) = self.load_base() {
            if base != load_addr.0 {
                warn!(
                    "lowest loadable segment at {:#x}, but the image is loaded at {}",
                    base, load_addr
                );
            }
        }

        debug!(
            "kernel: entry {:#x}, {} loadable segment(s), {} byte flat image",
            self.entry,
            self.segments.len(),
            self.flat_size()
        );
        Ok(())
    }
}

/// A minimal ELF64 executable: header plus a single PT_LOAD covering the file.
#[cfg(test)]
pub(crate) fn tiny_elf(machine: u16, entry: u64) -> Vec<u8> {
    const EHSIZE: u16 = 64;
    const PHENTSIZE: u16 = 56;
    let file_len = (EHSIZE + PHENTSIZE) as u64;

    let mut out = Vec::with_capacity(file_len as usize);
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&(EHSIZE as u64).to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&EHSIZE.to_le_bytes());
    out.extend_from_slice(&PHENTSIZE.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&64u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes());

    out.extend_from_slice(&PT_LOAD.to_le_bytes());
    out.extend_from_slice(&5u32.to_le_bytes()); // R+X
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes()); // p_vaddr
    out.extend_from_slice(&entry.to_le_bytes()); // p_paddr
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&0x1000u64.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use goblin::elf::header::{EM_RISCV, EM_X86_64};

    use super::*;
    use crate::config::KERNEL_LOAD_ADDR;

    #[test]
    fn reads_riscv_kernel() {
        let elf = KernelElf::parse(&tiny_elf(EM_RISCV, 0x8020_0000)).unwrap();
        assert_eq!(elf.machine, EM_RISCV);
        assert!(elf.is_64);
        assert_eq!(elf.entry, 0x8020_0000);
        assert_eq!(elf.load_base(), Some(0x8020_0000));
        assert_eq!(elf.flat_size(), 120);
        elf.check(Arch::Riscv64, KERNEL_LOAD_ADDR).unwrap();
    }

    #[test]
    fn rejects_foreign_machine() {
        let elf = KernelElf::parse(&tiny_elf(EM_X86_64, 0x8020_0000)).unwrap();
        let err = elf.check(Arch::Riscv64, KERNEL_LOAD_ADDR).unwrap_err();
        assert!(err.to_string().contains("expected 243"));
    }

    #[test]
    fn entry_mismatch_only_warns() {
        let elf = KernelElf::parse(&tiny_elf(EM_RISCV, 0x8000_0000)).unwrap();
        elf.check(Arch::Riscv64, KERNEL_LOAD_ADDR).unwrap();
    }

    #[test]
    fn flat_size_saturates_on_bogus_segments() {
        let elf = KernelElf {
            machine: EM_RISCV,
            is_64: true,
            entry: 0x8020_0000,
            segments: vec![
                Segment { paddr: 0x8020_0000, filesz: 0x10 },
                Segment { paddr: u64::MAX - 4, filesz: 16 },
            ],
        };
        assert_eq!(elf.flat_size(), u64::MAX - 0x8020_0000);
        elf.check(Arch::Riscv64, KERNEL_LOAD_ADDR).unwrap();
    }

    #[test]
    fn garbage_is_not_an_elf() {
        assert!(KernelElf::parse(b"#!/bin/sh\necho hi\n").is_err());
    }
}
