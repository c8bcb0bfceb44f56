use log::info;
use xshell::Shell;

use crate::{
    config::Config,
    flags,
    image::flat_image_path,
    invocation::{Invocation, Step},
    pipeline::{Goal, Pipeline},
    project_root,
};

impl flags::Run {
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::from_env(&project_root())?
            .with_arch(self.arch)
            .with_profile(self.debug);
        if let Some(bootloader) = &self.bootloader {
            config.bootloader = project_root().join(bootloader);
        }
        if let Some(addr) = self.load_addr {
            config.load_addr = addr;
        }
        config.gdb = self.gdb;
        Ok(config)
    }

    pub fn run(&self, sh: &Shell) -> anyhow::Result<()> {
        let goal = if self.apps { Goal::AppsAndRun } else { Goal::Run };
        Pipeline::for_shell(sh, self.config()?, self.dry_run).run(goal)
    }
}

pub fn launch(config: &Config) -> Invocation {
    let image = flat_image_path(&config.kernel_binary());

    let mut loader = std::ffi::OsString::from("loader,file=");
    loader.push(image.as_os_str());
    loader.push(format!(",addr={}", config.load_addr));

    let inv = Invocation::new(Step::Launch, config.arch.qemu())
        .args(["-machine", config.machine.as_str(), "-nographic"])
        .arg("-bios")
        .arg(&config.bootloader)
        .arg("-device")
        .arg(loader);

    if config.gdb {
        info!("qemu will wait for gdb on tcp::1234");
        inv.args(["-s", "-S"])
    } else {
        inv
    }
}

/// QEMU only reports a missing `-bios` file after it has started.
pub fn verify_bootloader(config: &Config) -> anyhow::Result<()> {
    if !config.bootloader.is_file() {
        anyhow::bail!("bootloader not found at {}", config.bootloader.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::config::PhysAddr;

    fn config() -> Config {
        let mut config = Config::new(Path::new("/proj"));
        config.kernel_bin = Some(PathBuf::from("/proj/X"));
        config
    }

    #[test]
    fn boots_virt_with_loader_device() {
        let inv = launch(&config());
        assert_eq!(inv.program, "qemu-system-riscv64");
        assert_eq!(
            inv.arg_strings(),
            [
                "-machine",
                "virt",
                "-nographic",
                "-bios",
                "/proj/bootloader/rustsbi-qemu.bin",
                "-device",
                "loader,file=/proj/X.bin,addr=0x80200000"
            ]
        );
    }

    #[test]
    fn gdb_halts_at_startup() {
        let mut config = config();
        config.gdb = true;
        let args = launch(&config).arg_strings();
        assert_eq!(&args[args.len() - 2..], ["-s", "-S"]);
    }

    #[test]
    fn load_addr_is_passed_through() {
        let mut config = config();
        config.load_addr = PhysAddr(0x8040_0000);
        let args = launch(&config).arg_strings();
        assert_eq!(args[6], "loader,file=/proj/X.bin,addr=0x80400000");
    }

    #[test]
    fn missing_bootloader_is_reported() {
        let mut config = config();
        config.bootloader = std::env::temp_dir().join("xtask-no-such-firmware.bin");
        let err = verify_bootloader(&config).unwrap_err();
        assert!(err.to_string().starts_with("bootloader not found"));
    }
}
