mod apps;
mod arch;
mod build;
mod config;
mod elf;
mod flags;
mod image;
mod invocation;
mod logging;
mod pipeline;
mod run;

use std::path::{Path, PathBuf};
use xshell::Shell;

fn main() -> anyhow::Result<()> {
    logging::init()?;

    let sh = &Shell::new()?;
    sh.change_dir(project_root());

    let flags = flags::Xtask::from_env()?;
    match flags.subcommand {
        flags::XtaskCmd::Help(_) => {
            println!("{}", flags::Xtask::HELP);
            Ok(())
        }
        flags::XtaskCmd::Build(cmd) => cmd.run(sh),
        flags::XtaskCmd::Image(cmd) => cmd.run(sh),
        flags::XtaskCmd::Apps(cmd) => cmd.run(sh),
        flags::XtaskCmd::Run(cmd) => cmd.run(sh),
    }
}

fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .to_path_buf()
}
