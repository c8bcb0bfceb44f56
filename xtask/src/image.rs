use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::info;
use xshell::Shell;

use crate::{
    arch::Arch,
    config::Config,
    flags,
    invocation::{Invocation, Step},
    pipeline::{Goal, Pipeline},
    project_root,
};

pub const OBJCOPY: &str = "rust-objcopy";

impl flags::Image {
    pub fn run(&self, sh: &Shell) -> anyhow::Result<()> {
        let config = Config::from_env(&project_root())?
            .with_arch(self.arch)
            .with_profile(self.debug);
        Pipeline::for_shell(sh, config, self.dry_run).run(Goal::Image)
    }
}

/// `X` becomes `X.bin`; the suffix is appended, never substituted.
pub fn flat_image_path(elf: &Path) -> PathBuf {
    let mut name = OsString::from(elf.as_os_str());
    name.push(".bin");
    PathBuf::from(name)
}

pub fn objcopy(step: Step, arch: Arch, elf: &Path, out: &Path) -> Invocation {
    Invocation::new(step, OBJCOPY)
        .arg(format!("--binary-architecture={}", arch.name()))
        .arg(elf)
        .args(["--strip-all", "-O", "binary"])
        .arg(out)
}

pub fn kernel_convert(config: &Config) -> Invocation {
    let elf = config.kernel_binary();
    let out = flat_image_path(&elf);
    objcopy(Step::Convert, config.arch, &elf, &out)
}

/// Size of a converted image, failing if the converter left nothing behind.
pub fn verify_image(path: &Path) -> anyhow::Result<u64> {
    let size = fs::metadata(path)
        .with_context(|| format!("no flat image at {}", path.display()))?
        .len();
    info!("flat image: {} ({} bytes)", path.display(), size);
    Ok(size)
}
