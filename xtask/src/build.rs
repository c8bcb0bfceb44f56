use std::path::Path;

use anyhow::Context;
use log::info;
use xshell::Shell;

use crate::{
    config::Config,
    elf::KernelElf,
    flags,
    invocation::{Invocation, Step},
    pipeline::{Goal, Pipeline},
    project_root,
};

impl flags::Build {
    pub fn config(&self) -> anyhow::Result<Config> {
        Ok(Config::from_env(&project_root())?
            .with_arch(self.arch)
            .with_profile(self.debug))
    }

    pub fn run(&self, sh: &Shell) -> anyhow::Result<()> {
        Pipeline::for_shell(sh, self.config()?, self.dry_run).run(Goal::Build)
    }
}

/// `cargo build` for a no_std project of the configured target.
pub fn cargo_build(step: Step, config: &Config, project: &Path) -> Invocation {
    Invocation::new(step, "cargo")
        .arg("build")
        .args(config.profile.cargo_flag())
        .args(["--target", config.arch.target_triple()])
        .current_dir(project)
}

pub fn kernel_build(config: &Config) -> Invocation {
    cargo_build(Step::Build, config, &config.kernel_dir)
}

/// The build has to leave a loadable kernel for this architecture behind.
pub fn verify_kernel(config: &Config) -> anyhow::Result<()> {
    let binary = config.kernel_binary();
    if !binary.is_file() {
        anyhow::bail!(
            "build finished but no kernel binary at {}",
            binary.display()
        );
    }
    KernelElf::read(&binary)?
        .check(config.arch, config.load_addr)
        .with_context(|| format!("checking {}", binary.display()))?;
    info!("kernel built: {}", binary.display());
    Ok(())
}
