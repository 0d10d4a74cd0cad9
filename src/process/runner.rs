use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::warn;

use super::error::ProcessError;

/// Describes one OS-level execution of a program's command, not yet
/// spawned (spec.md §4.2).
pub struct ProcessRunner {
    directory: PathBuf,
    exe: String,
    argv: Vec<String>,
    stdout_logfile: Option<PathBuf>,
    stderr_logfile: Option<PathBuf>,
    extra_fds: Vec<std::os::fd::RawFd>,
}

/// A live process handle: the pid is known and `wait`/`signal` are valid.
pub struct RunningProcess {
    child: Child,
}

impl ProcessRunner {
    pub fn new(directory: impl AsRef<Path>, exe: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            exe: exe.into(),
            argv,
            stdout_logfile: None,
            stderr_logfile: None,
            extra_fds: Vec::new(),
        }
    }

    pub fn with_stdout_logfile(mut self, path: Option<PathBuf>) -> Self {
        self.stdout_logfile = path;
        self
    }

    pub fn with_stderr_logfile(mut self, path: Option<PathBuf>) -> Self {
        self.stderr_logfile = path;
        self
    }

    /// Listener fds to inherit, conventionally starting at fd 3 in the
    /// child (spec.md §6).
    pub fn with_inherited_fds(mut self, fds: Vec<std::os::fd::RawFd>) -> Self {
        self.extra_fds = fds;
        self
    }

    /// Opens log sinks (append-only, created if missing, 0644), spawns the
    /// process detached into its own process group, and dup2's any
    /// inherited listener fds onto `3, 4, …` in the child before exec. The
    /// parent's copies of the log sinks are dropped (closed) as soon as
    /// `spawn()` returns — the child holds the only live references.
    pub fn spawn(self) -> Result<RunningProcess, ProcessError> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg0(&self.exe);
        cmd.args(&self.argv);
        cmd.current_dir(&self.directory);

        cmd.stdout(open_sink(self.stdout_logfile.as_deref(), "stdout")?);
        cmd.stderr(open_sink(self.stderr_logfile.as_deref(), "stderr")?);

        let extra_fds = self.extra_fds;
        unsafe {
            cmd.pre_exec(move || {
                // New process group: the child and its descendants become a
                // detached process group so the supervisor can signal the
                // whole tree and the child does not receive our tty signals.
                nix::unistd::setsid().map_err(std::io::Error::from)?;

                for (i, fd) in extra_fds.iter().enumerate() {
                    let target = 3 + i as i32;
                    if *fd != target {
                        nix::unistd::dup2(*fd, target).map_err(std::io::Error::from)?;
                    }
                }
                Ok(())
            });
        }

        let child = cmd.spawn()?;
        Ok(RunningProcess { child })
    }
}

impl RunningProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Blocks until the process terminates. Non-zero exit is not itself an
    /// error; inability to read the exit status is (spec.md §4.2, §7).
    pub fn wait(mut self) -> Result<ExitStatus, ProcessError> {
        self.child.wait().map_err(|_| ProcessError::WaitError)
    }

    /// Sends a POSIX signal to the process. Failures are logged, never
    /// propagated — the process may already have died (spec.md §4.3).
    pub fn signal(&self, sig: Signal) {
        let pid = Pid::from_raw(self.pid() as i32);
        if let Err(err) = signal::kill(pid, sig) {
            warn!(pid = self.pid(), signal = ?sig, error = %err, "failed to signal process");
        }
    }
}

fn open_sink(path: Option<&Path>, stream: &str) -> Result<Stdio, ProcessError> {
    match path {
        None => Ok(Stdio::null()),
        Some(path) => match OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .mode(0o644)
            .open(path)
        {
            Ok(file) => Ok(Stdio::from(file)),
            Err(err) => {
                warn!(path = %path.display(), stream, error = %err, "failed to open log sink, proceeding without redirection");
                Ok(Stdio::null())
            }
        },
    }
}
