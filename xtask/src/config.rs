//! Paths and constants the pipeline works with.
//!
//! Built-in defaults are relative to the project root. Environment variables
//! override them, and command-line flags override both.

use std::{
    env,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;

use crate::arch::Arch;

/// Where the firmware hands control to the kernel.
pub const KERNEL_LOAD_ADDR: PhysAddr = PhysAddr(0x8020_0000);

/// Package name of the kernel crate, and so the name of its binary.
pub const KERNEL_NAME: &str = "os";

pub const DEFAULT_BOOTLOADER: &str = "bootloader/rustsbi-qemu.bin";

pub const DEFAULT_MACHINE: &str = "virt";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysAddr(pub u64);

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for PhysAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.replace('_', "");
        let value = match digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse::<u64>(),
        };
        value
            .map(PhysAddr)
            .map_err(|e| anyhow::format_err!("Invalid physical address {:?}: {}", s, e))
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Release,
    Debug,
}

impl Profile {
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            Profile::Debug
        } else {
            Profile::Release
        }
    }

    /// Directory cargo places artifacts in under `target/<triple>/`.
    #[inline]
    pub fn dir_name(&self) -> &'static str {
        match self {
            Profile::Release => "release",
            Profile::Debug => "debug",
        }
    }

    #[inline]
    pub fn cargo_flag(&self) -> Option<&'static str> {
        match self {
            Profile::Release => Some("--release"),
            Profile::Debug => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub arch: Arch,
    pub profile: Profile,
    pub kernel_dir: PathBuf,
    pub user_dir: PathBuf,
    /// Replaces the path derived from `kernel_dir` when set.
    pub kernel_bin: Option<PathBuf>,
    pub bootloader: PathBuf,
    pub load_addr: PhysAddr,
    pub machine: String,
    pub gdb: bool,
}

impl Config {
    pub fn new(root: &Path) -> Self {
        Self {
            arch: Arch::default(),
            profile: Profile::default(),
            kernel_dir: root.join("os"),
            user_dir: root.join("user"),
            kernel_bin: None,
            bootloader: root.join(DEFAULT_BOOTLOADER),
            load_addr: KERNEL_LOAD_ADDR,
            machine: DEFAULT_MACHINE.to_string(),
            gdb: false,
        }
    }

    pub fn from_env(root: &Path) -> anyhow::Result<Self> {
        Self::from_lookup(root, |key| env::var_os(key))
    }

    /// Relative paths found in the environment are taken relative to `root`.
    pub fn from_lookup<F>(root: &Path, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Self::new(root);
        let path = |key: &str| lookup(key).map(|value| root.join(value));

        if let Some(dir) = path("KERNEL_DIR") {
            config.kernel_dir = dir;
        }
        if let Some(dir) = path("USER_DIR") {
            config.user_dir = dir;
        }
        if let Some(bin) = path("KERNEL_BIN") {
            config.kernel_bin = Some(bin);
        }
        if let Some(bootloader) = path("BOOTLOADER") {
            config.bootloader = bootloader;
        }
        if let Some(addr) = lookup("KERNEL_LOAD_ADDR") {
            let addr = addr
                .into_string()
                .map_err(|_| anyhow::format_err!("KERNEL_LOAD_ADDR is not valid UTF-8"))?;
            config.load_addr = addr.parse().context("reading KERNEL_LOAD_ADDR")?;
        }

        Ok(config)
    }

    pub fn with_arch(mut self, arch: Option<Arch>) -> Self {
        if let Some(arch) = arch {
            self.arch = arch;
        }
        self
    }

    pub fn with_profile(mut self, debug: bool) -> Self {
        self.profile = Profile::from_debug_flag(debug);
        self
    }

    pub fn target_dir(&self, project: &Path) -> PathBuf {
        project
            .join("target")
            .join(self.arch.target_triple())
            .join(self.profile.dir_name())
    }

    /// The ELF produced by the kernel build.
    pub fn kernel_binary(&self) -> PathBuf {
        match &self.kernel_bin {
            Some(bin) => bin.clone(),
            None => self.target_dir(&self.kernel_dir).join(KERNEL_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn phys_addr_parses_hex_and_decimal() {
        assert_eq!("0x80200000".parse::<PhysAddr>().unwrap(), KERNEL_LOAD_ADDR);
        assert_eq!("0x8020_0000".parse::<PhysAddr>().unwrap(), KERNEL_LOAD_ADDR);
        assert_eq!("2149580800".parse::<PhysAddr>().unwrap(), KERNEL_LOAD_ADDR);
        assert!("0xzz".parse::<PhysAddr>().is_err());
        assert!("".parse::<PhysAddr>().is_err());
    }

    #[test]
    fn phys_addr_displays_as_lower_hex() {
        assert_eq!(KERNEL_LOAD_ADDR.to_string(), "0x80200000");
    }

    #[test]
    fn defaults_are_relative_to_root() {
        let config = Config::from_lookup(Path::new("/proj"), lookup(&[])).unwrap();
        assert_eq!(config.bootloader, Path::new("/proj/bootloader/rustsbi-qemu.bin"));
        assert_eq!(config.load_addr, KERNEL_LOAD_ADDR);
        assert_eq!(config.machine, "virt");
        assert_eq!(
            config.kernel_binary(),
            Path::new("/proj/os/target/riscv64gc-unknown-none-elf/release/os")
        );
    }

    #[test]
    fn debug_profile_changes_the_binary_path() {
        let config = Config::new(Path::new("/proj")).with_profile(true);
        assert_eq!(
            config.kernel_binary(),
            Path::new("/proj/os/target/riscv64gc-unknown-none-elf/debug/os")
        );
        assert_eq!(config.profile.cargo_flag(), None);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(
            Path::new("/proj"),
            lookup(&[
                ("KERNEL_BIN", "/elsewhere/kernel"),
                ("BOOTLOADER", "fw/opensbi.bin"),
                ("KERNEL_LOAD_ADDR", "0x80400000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.kernel_binary(), Path::new("/elsewhere/kernel"));
        assert_eq!(config.bootloader, Path::new("/proj/fw/opensbi.bin"));
        assert_eq!(config.load_addr, PhysAddr(0x8040_0000));
    }

    #[test]
    fn bad_load_addr_in_environment_is_an_error() {
        let err = Config::from_lookup(Path::new("/proj"), lookup(&[("KERNEL_LOAD_ADDR", "high")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("KERNEL_LOAD_ADDR"));
    }
}
