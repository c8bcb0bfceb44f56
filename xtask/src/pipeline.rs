use anyhow::Context;
use log::info;
use xshell::Shell;

use crate::{
    apps, build,
    config::Config,
    image,
    invocation::{DryRunner, Invocation, Runner, ShellRunner, Step},
    run,
};

/// How far down the build → convert → launch chain to go.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Goal {
    Apps,
    Build,
    Image,
    Run,
    AppsAndRun,
}

impl Goal {
    fn apps(&self) -> bool {
        matches!(self, Goal::Apps | Goal::AppsAndRun)
    }

    fn build(&self) -> bool {
        !matches!(self, Goal::Apps)
    }

    fn convert(&self) -> bool {
        matches!(self, Goal::Image | Goal::Run | Goal::AppsAndRun)
    }

    fn launch(&self) -> bool {
        matches!(self, Goal::Run | Goal::AppsAndRun)
    }
}

/// Runs the steps in order and stops at the first one that fails.
pub struct Pipeline<R> {
    config: Config,
    runner: R,
}

impl<'a> Pipeline<Box<dyn Runner + 'a>> {
    pub fn for_shell(sh: &'a Shell, config: Config, dry_run: bool) -> Self {
        let runner: Box<dyn Runner + 'a> = if dry_run {
            Box::new(DryRunner)
        } else {
            Box::new(ShellRunner::new(sh))
        };
        Pipeline::new(config, runner)
    }
}

impl<R: Runner> Pipeline<R> {
    pub fn new(config: Config, runner: R) -> Self {
        Self { config, runner }
    }

    #[cfg(test)]
    pub fn into_runner(self) -> R {
        self.runner
    }

    fn exec(&mut self, invocation: &Invocation) -> anyhow::Result<()> {
        info!("{}: {}", invocation.step, invocation);
        self.runner
            .run(invocation)
            .with_context(|| format!("{} step failed", invocation.step))
    }

    fn verify(&self) -> bool {
        !self.runner.is_dry_run()
    }

    /// Artifact checks count as part of the step whose output they inspect.
    fn check<T>(step: Step, result: anyhow::Result<T>) -> anyhow::Result<T> {
        result.with_context(|| format!("{} step failed", step))
    }

    pub fn run(&mut self, goal: Goal) -> anyhow::Result<()> {
        if goal.apps() {
            self.apps()?;
        }
        if goal.build() {
            self.exec(&build::kernel_build(&self.config))?;
            if self.verify() {
                Self::check(Step::Build, build::verify_kernel(&self.config))?;
            }
        }
        if goal.convert() {
            self.exec(&image::kernel_convert(&self.config))?;
            if self.verify() {
                let image = image::flat_image_path(&self.config.kernel_binary());
                Self::check(Step::Convert, image::verify_image(&image))?;
            }
        }
        if goal.launch() {
            if self.verify() {
                Self::check(Step::Launch, run::verify_bootloader(&self.config))?;
            }
            self.exec(&run::launch(&self.config))?;
        }
        Ok(())
    }

    fn apps(&mut self) -> anyhow::Result<()> {
        let names = Self::check(Step::Apps, apps::discover(&self.config.user_dir))?;
        self.exec(&apps::apps_build(&self.config))?;
        for invocation in apps::apps_convert(&self.config, &names) {
            self.exec(&invocation)?;
        }
        if self.verify() {
            Self::check(Step::Apps, apps::verify_apps(&self.config, &names))?;
        }
        Ok(())
    }
}
