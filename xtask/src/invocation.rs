use std::{
    ffi::OsString,
    fmt,
    path::PathBuf,
};

use log::info;
use xshell::Shell;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Apps,
    Build,
    Convert,
    Launch,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Apps => "user apps",
            Step::Build => "kernel build",
            Step::Convert => "binary conversion",
            Step::Launch => "emulator launch",
        })
    }
}

/// A single external program run, kept as data until a [`Runner`] executes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: Step,
    pub program: OsString,
    pub args: Vec<OsString>,
    pub dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(step: Step, program: impl Into<OsString>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Arguments as lossy strings, for logs and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.dir {
            write!(f, "(cd {}) ", dir.display())?;
        }
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in self.arg_strings() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

pub trait Runner {
    fn run(&mut self, invocation: &Invocation) -> anyhow::Result<()>;

    /// A dry runner never produces artifacts, so callers skip checks on them.
    fn is_dry_run(&self) -> bool {
        false
    }
}

impl<R: Runner + ?Sized> Runner for Box<R> {
    fn run(&mut self, invocation: &Invocation) -> anyhow::Result<()> {
        (**self).run(invocation)
    }

    fn is_dry_run(&self) -> bool {
        (**self).is_dry_run()
    }
}

pub struct ShellRunner<'a> {
    sh: &'a Shell,
}

impl<'a> ShellRunner<'a> {
    pub fn new(sh: &'a Shell) -> Self {
        Self { sh }
    }
}

impl Runner for ShellRunner<'_> {
    fn run(&mut self, invocation: &Invocation) -> anyhow::Result<()> {
        let _d = invocation.dir.as_ref().map(|dir| self.sh.push_dir(dir));
        self.sh
            .cmd(&invocation.program)
            .args(&invocation.args)
            .quiet()
            .run()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct DryRunner;

impl Runner for DryRunner {
    fn run(&mut self, invocation: &Invocation) -> anyhow::Result<()> {
        info!("[dry-run] {}", invocation);
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
