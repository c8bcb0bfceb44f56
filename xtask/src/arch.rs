use std::{fmt, str::FromStr};

use goblin::elf::header::EM_RISCV;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Arch {
    #[default]
    Riscv64,
}

impl Arch {
    /// Also the value handed to `--binary-architecture`.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Arch::Riscv64 => "riscv64",
        }
    }

    #[inline]
    pub fn target_triple(&self) -> &'static str {
        match self {
            Arch::Riscv64 => "riscv64gc-unknown-none-elf",
        }
    }

    #[inline]
    pub fn qemu(&self) -> &'static str {
        match self {
            Arch::Riscv64 => "qemu-system-riscv64",
        }
    }

    #[inline]
    pub fn elf_machine(&self) -> u16 {
        match self {
            Arch::Riscv64 => EM_RISCV,
        }
    }

    #[inline]
    pub fn is_64(&self) -> bool {
        match self {
            Arch::Riscv64 => true,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "riscv64" => Ok(Arch::Riscv64),
            _ => Err(anyhow::format_err!("Unsupported architecture: {}", s)),
        }
    }
}
