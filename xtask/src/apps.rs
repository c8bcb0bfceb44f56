//! User applications for the batch kernel.
//!
//! Every file in `user/src/bin` is one application. The kernel embeds their
//! flat images and copies each one to `APP_BASE_ADDRESS` before running it,
//! which bounds both how many there can be and how large each may get.

use std::{fs, path::Path};

use anyhow::Context;
use log::info;
use xshell::Shell;

use crate::{
    build::cargo_build,
    config::Config,
    flags,
    image::{flat_image_path, objcopy, verify_image},
    invocation::{Invocation, Step},
    pipeline::{Goal, Pipeline},
    project_root,
};

pub const APP_BASE_ADDRESS: u64 = 0x8040_0000;
pub const APP_SIZE_LIMIT: u64 = 0x2_0000;
pub const MAX_APP_NUM: usize = 16;

impl flags::Apps {
    pub fn run(&self, sh: &Shell) -> anyhow::Result<()> {
        let config = Config::from_env(&project_root())?
            .with_arch(self.arch)
            .with_profile(self.debug);
        Pipeline::for_shell(sh, config, self.dry_run).run(Goal::Apps)
    }
}

/// Application names, sorted so the kernel sees them in a stable order.
pub fn discover(user_dir: &Path) -> anyhow::Result<Vec<String>> {
    let bin_dir = user_dir.join("src/bin");
    let entries =
        fs::read_dir(&bin_dir).with_context(|| format!("listing {}", bin_dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != "rs") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();

    if names.is_empty() {
        anyhow::bail!("no user applications in {}", bin_dir.display());
    }
    if names.len() > MAX_APP_NUM {
        anyhow::bail!(
            "{} user applications, the kernel holds at most {}",
            names.len(),
            MAX_APP_NUM
        );
    }
    Ok(names)
}

pub fn apps_build(config: &Config) -> Invocation {
    cargo_build(Step::Apps, config, &config.user_dir)
}

pub fn apps_convert(config: &Config, names: &[String]) -> Vec<Invocation> {
    let target = config.target_dir(&config.user_dir);
    names
        .iter()
        .map(|name| {
            let elf = target.join(name);
            objcopy(Step::Apps, config.arch, &elf, &flat_image_path(&elf))
        })
        .collect()
}

pub fn check_app_size(name: &str, size: u64) -> anyhow::Result<()> {
    if size > APP_SIZE_LIMIT {
        anyhow::bail!(
            "application {} is {:#x} bytes, over the {:#x} byte limit at {:#x}",
            name,
            size,
            APP_SIZE_LIMIT,
            APP_BASE_ADDRESS
        );
    }
    Ok(())
}

pub fn verify_apps(config: &Config, names: &[String]) -> anyhow::Result<()> {
    let target = config.target_dir(&config.user_dir);
    for name in names {
        let size = verify_image(&flat_image_path(&target.join(name)))?;
        check_app_size(name, size)?;
    }
    info!("{} user application(s) ready", names.len());
    Ok(())
}
