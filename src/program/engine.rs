use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::{error, info, warn};

use crate::config::ProgramConfig;
use crate::process::{ListenerSet, ProcessRunner};

use super::error::ProgramError;
use super::handle::{RunHandle, RunIntent};
use super::status::{unix_now, ProgramState, ProgramStatus};

/// The stability window: a child must stay alive this long after spawn for
/// its start to count as successful and for the retry counter to reset
/// (spec.md §4.3).
const STABILITY_WINDOW: Duration = Duration::from_secs(1);

/// `Ok(())` once the stability window closes; `Err(())` once retries are
/// exhausted and the program has gone Fatal (spec.md §4.3 "Start-completion
/// signaling").
type StartOutcome = Result<(), ()>;

/// What the watch thread observed about the child's exit. `Panicked` covers
/// a panic inside the wait call itself (spec.md §5 "Panic isolation"): the
/// supervise loop treats it as a defensive dead end, not a normal exit to
/// retry.
enum WatchOutcome {
    Exited(Result<std::process::ExitStatus, crate::process::ProcessError>),
    Panicked,
}

struct Inner {
    status: ProgramStatus,
    listeners: ListenerSet,
    retry_count: u32,
    run: Option<RunHandle>,
}

/// The state machine driving one program across its lifetime: start, run,
/// crash-with-retry, manual stop, hot restart, destroy (spec.md §4.3). Owns
/// the listener set and at most one live runner (briefly two during a hot
/// restart).
pub struct ProgramEngine {
    name: String,
    cfg: ProgramConfig,
    /// Serializes operator-issued Start/Stop/Restart for this program; the
    /// engine's own background watch threads never take this lock.
    command_lock: Mutex<()>,
    inner: Arc<Mutex<Inner>>,
}

impl ProgramEngine {
    /// Pre-binds the configured listeners. A bind failure does not prevent
    /// construction: the program starts life in Fatal so the operator can
    /// still see it in `/status` and fix the config before retrying
    /// (spec.md §7 "Listener bind error").
    pub fn new(name: impl Into<String>, cfg: ProgramConfig) -> Self {
        let name = name.into();
        let (listeners, initial_state) = match ListenerSet::acquire(&cfg.listen_addrs) {
            Ok(set) => (set, ProgramState::Stopped),
            Err(err) => {
                error!(program = %name, error = %err, "listener bind failed at construction");
                (ListenerSet::default(), ProgramState::Fatal)
            }
        };

        let status = ProgramStatus {
            name: name.clone(),
            pid: 0,
            alive: false,
            start_time: 0,
            stop_time: 0,
            state: initial_state,
            listen_addrs: cfg.listen_addrs.clone(),
        };

        Self {
            name,
            cfg,
            command_lock: Mutex::new(()),
            inner: Arc::new(Mutex::new(Inner {
                status,
                listeners,
                retry_count: 0,
                run: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.cfg
    }

    /// A consistent snapshot of the last completed transition; never
    /// observes a partial update (spec.md §3).
    pub fn status(&self) -> ProgramStatus {
        self.inner.lock().unwrap().status.clone()
    }

    /// `Stopped/Exited/Fatal -> Starting -> Running`. Idempotent: a no-op
    /// when already Starting or Running.
    pub fn start(&self) -> Result<(), ProgramError> {
        let _guard = self.command_lock.lock().unwrap();

        {
            let state = self.inner.lock().unwrap().status.state;
            if matches!(state, ProgramState::Starting | ProgramState::Running) {
                return Ok(());
            }
        }

        self.ensure_listeners()?;

        {
            let mut g = self.inner.lock().unwrap();
            g.status.state = ProgramState::Starting;
            g.retry_count = 0;
        }

        let (tx, rx) = mpsc::sync_channel::<StartOutcome>(1);
        self.spawn_supervise_loop(Some(tx));

        match rx.recv() {
            Ok(Ok(())) => Ok(()),
            _ => Err(ProgramError::StartFailed),
        }
    }

    /// No-op if the program is not Running or Starting (spec.md transition
    /// table: "Stopped | OP/Stop -> no-op").
    pub fn stop(&self) {
        let _guard = self.command_lock.lock().unwrap();
        self.stop_locked();
    }

    fn stop_locked(&self) {
        let outgoing = {
            let mut g = self.inner.lock().unwrap();
            if !matches!(g.status.state, ProgramState::Running | ProgramState::Starting) {
                return;
            }
            info!(program = %self.name, "stop");
            g.status.state = ProgramState::Stopped;
            g.status.stop_time = unix_now();
            g.run.clone()
        };

        if let Some(run) = outgoing {
            run.mark(RunIntent::StoppedByOperator);
            self.terminate_runner(&run);
        }

        let mut g = self.inner.lock().unwrap();
        g.listeners.release();
        g.status.alive = false;
    }

    /// Hot restart: spawns a fresh runner on the inherited listeners, waits
    /// for it to reach Running (or Fatal), then marks the outgoing runner
    /// superseded and stops it. Rejected (no-op) while Starting, to avoid a
    /// third process racing the first (spec.md §4.3).
    pub fn restart(&self) {
        let _guard = self.command_lock.lock().unwrap();

        let state = self.inner.lock().unwrap().status.state;
        if state == ProgramState::Starting {
            warn!(program = %self.name, "restart rejected: program is mid-startup");
            return;
        }

        let outgoing = self.inner.lock().unwrap().run.clone();

        if self.ensure_listeners().is_err() {
            return;
        }

        {
            let mut g = self.inner.lock().unwrap();
            g.status.state = ProgramState::Starting;
            g.retry_count = 0;
        }

        info!(program = %self.name, "restart");
        let (tx, rx) = mpsc::sync_channel::<StartOutcome>(1);
        self.spawn_supervise_loop(Some(tx));

        // Whether the new runner reached Running or ran out of retries to
        // Fatal, the outgoing runner is stopped either way: leaving a
        // superseded-but-healthy process alive behind a Fatal program would
        // be surprising to an operator reading /status (see DESIGN.md).
        let _ = rx.recv();
        if let Some(run) = outgoing {
            run.mark(RunIntent::SupersededByRestart);
            self.terminate_runner(&run);
        }
    }

    /// Stops the program if running and releases listeners for good.
    /// Called on registry delete/update and supervisor shutdown.
    pub fn destroy(&self) {
        let _guard = self.command_lock.lock().unwrap();
        self.stop_locked();
        let mut g = self.inner.lock().unwrap();
        g.listeners.release();
    }

    fn ensure_listeners(&self) -> Result<(), ProgramError> {
        let mut g = self.inner.lock().unwrap();
        if g.listeners.is_empty() && !self.cfg.listen_addrs.is_empty() {
            match ListenerSet::acquire(&self.cfg.listen_addrs) {
                Ok(set) => g.listeners = set,
                Err(err) => {
                    g.status.state = ProgramState::Fatal;
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn terminate_runner(&self, run: &RunHandle) {
        signal_pid(run.pid, Signal::SIGTERM);
        if !run.terminated.wait_true_timeout(self.cfg.stop_timeout()) {
            warn!(program = %self.name, pid = run.pid, "stop_timeout elapsed, escalating to SIGKILL");
            signal_pid(run.pid, Signal::SIGKILL);
        }
    }

    /// Spawns the background spawn/wait/retry loop described in spec.md
    /// §4.3. `start_tx`, when present, is filled exactly once: with success
    /// when the stability window closes, or failure once retries are
    /// exhausted to Fatal.
    fn spawn_supervise_loop(&self, start_tx: Option<mpsc::SyncSender<StartOutcome>>) {
        let inner = self.inner.clone();
        let cfg = self.cfg.clone();
        let name = self.name.clone();

        thread::spawn(move || supervise_loop(inner, cfg, name, start_tx));
    }
}

fn supervise_loop(
    inner: Arc<Mutex<Inner>>,
    cfg: ProgramConfig,
    name: String,
    mut start_tx: Option<mpsc::SyncSender<StartOutcome>>,
) {
    loop {
        let fds = inner.lock().unwrap().listeners.raw_fds();
        let (exe, argv) = cfg.argv();

        let runner = ProcessRunner::new(&cfg.directory, exe, argv)
            .with_stdout_logfile(cfg.stdout_logfile.clone())
            .with_stderr_logfile(cfg.stderr_logfile.clone())
            .with_inherited_fds(fds);

        info!(program = %name, "starting supervised process");

        let spawned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runner.spawn()));
        let started = match spawned {
            Ok(Ok(started)) => started,
            Ok(Err(err)) => {
                error!(program = %name, error = %err, "spawn failed");
                inner.lock().unwrap().run = None;
                if !should_retry(&inner, &cfg, &name, &mut start_tx) {
                    return;
                }
                continue;
            }
            Err(_) => {
                error!(program = %name, "panic while spawning process");
                mark_unknown(&inner, &mut start_tx);
                return;
            }
        };

        let pid = started.pid();
        let run = RunHandle::new(pid);
        {
            let mut g = inner.lock().unwrap();
            g.status.pid = pid;
            g.status.alive = true;
            g.run = Some(run.clone());
        }

        let (exit_tx, exit_rx) = mpsc::channel();
        let terminated = run.terminated.clone();
        thread::spawn(move || {
            let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| started.wait())) {
                Ok(result) => WatchOutcome::Exited(result),
                Err(_) => WatchOutcome::Panicked,
            };
            let _ = terminated.cancel_all(true);
            let _ = exit_tx.send(outcome);
        });

        let stable = match exit_rx.recv_timeout(STABILITY_WINDOW) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => return,
            Ok(WatchOutcome::Panicked) => {
                error!(program = %name, "panic while waiting on child process");
                mark_unknown(&inner, &mut start_tx);
                return;
            }
            Ok(WatchOutcome::Exited(result)) => {
                handle_exit_result(result, &run, &inner, &name);
                false
            }
        };

        if stable {
            {
                let mut g = inner.lock().unwrap();
                g.retry_count = 0;
                g.status.state = ProgramState::Running;
                g.status.start_time = unix_now();
            }
            info!(program = %name, pid, "stable, now Running");
            if let Some(tx) = start_tx.take() {
                let _ = tx.send(Ok(()));
            }

            let outcome = match exit_rx.recv() {
                Ok(outcome) => outcome,
                Err(_) => return,
            };
            match outcome {
                WatchOutcome::Panicked => {
                    error!(program = %name, "panic while waiting on child process");
                    mark_unknown(&inner, &mut start_tx);
                    return;
                }
                WatchOutcome::Exited(result) => handle_exit_result(result, &run, &inner, &name),
            }
        }

        if run.current_intent() != RunIntent::None {
            // Superseded by restart or stopped by the operator: this loop's
            // job is done, the state transition (if any) already happened
            // in `stop`/`restart`.
            return;
        }

        if !should_retry(&inner, &cfg, &name, &mut start_tx) {
            return;
        }
    }
}

/// Moves a program to `Unknown` after a panic inside its spawn/watch path
/// instead of letting the panic unwind further and poison `inner` (spec.md
/// §5 "Panic isolation"). Fails any in-flight start-completion wait rather
/// than leaving the caller blocked.
fn mark_unknown(inner: &Arc<Mutex<Inner>>, start_tx: &mut Option<mpsc::SyncSender<StartOutcome>>) {
    let mut g = inner.lock().unwrap();
    g.status.state = ProgramState::Unknown;
    g.status.alive = false;
    g.run = None;
    drop(g);
    if let Some(tx) = start_tx.take() {
        let _ = tx.send(Err(()));
    }
}

fn handle_exit_result(
    result: Result<std::process::ExitStatus, crate::process::ProcessError>,
    run: &RunHandle,
    inner: &Arc<Mutex<Inner>>,
    name: &str,
) {
    if run.current_intent() != RunIntent::None {
        // This runner was superseded by a restart or stopped by the
        // operator; its delayed exit must not stomp the status a newer
        // runner (or the stop itself) has already published.
        return;
    }
    inner.lock().unwrap().status.alive = false;
    match &result {
        Ok(status) if status.success() => info!(program = %name, "process exited"),
        Ok(status) => warn!(program = %name, code = status.code(), "process exited unsuccessfully"),
        Err(err) => warn!(program = %name, error = %err, "could not retrieve exit status, treating as code 0"),
    }
}

/// `shouldRetry` (spec.md §4.3). Returns `true` if the loop should spawn
/// again (after the retry sleep), `false` if a terminal state was reached
/// and the loop must stop.
fn should_retry(
    inner: &Arc<Mutex<Inner>>,
    cfg: &ProgramConfig,
    name: &str,
    start_tx: &mut Option<mpsc::SyncSender<StartOutcome>>,
) -> bool {
    let mut g = inner.lock().unwrap();

    // An operator Stop race already moved us to Stopped; do nothing.
    if g.status.state == ProgramState::Stopped {
        return false;
    }

    if !cfg.auto_restart {
        g.status.state = ProgramState::Exited;
        g.status.stop_time = unix_now();
        g.listeners.release();
        g.run = None;
        return false;
    }

    g.retry_count += 1;
    if g.retry_count <= cfg.max_retry() {
        let attempt = g.retry_count;
        drop(g);
        info!(program = %name, attempt, "retrying after crash");
        thread::sleep(Duration::from_secs(1));
        true
    } else {
        warn!(program = %name, "max retry exceeded, program is Fatal");
        g.status.state = ProgramState::Fatal;
        g.status.stop_time = unix_now();
        g.listeners.release();
        g.run = None;
        if let Some(tx) = start_tx.take() {
            let _ = tx.send(Err(()));
        }
        false
    }
}

fn signal_pid(pid: u32, sig: Signal) {
    let pid = nix::unistd::Pid::from_raw(pid as i32);
    if let Err(err) = nix::sys::signal::kill(pid, sig) {
        warn!(pid = pid.as_raw(), signal = ?sig, error = %err, "failed to signal process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg(command: &str, args: &[&str], auto_restart: bool, max_retry: u32) -> ProgramConfig {
        ProgramConfig {
            directory: std::env::temp_dir(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            auto_restart,
            stdout_logfile: None,
            stderr_logfile: None,
            max_retry,
            listen_addrs: Vec::new(),
            stop_timeout: 1,
            stop_before_restart: false,
        }
    }

    #[test]
    fn start_retries_and_goes_fatal_on_wrong_command() {
        let engine = ProgramEngine::new("bad", cfg("no-such-executable-xyz", &[], true, 2));
        let result = engine.start();
        assert!(result.is_err());
        assert_eq!(engine.status().state, ProgramState::Fatal);
    }

    #[test]
    fn start_reaches_running_once_stable() {
        let engine = ProgramEngine::new("sleeper", cfg("sh", &["-c", "sleep 2"], false, 0));
        let result = engine.start();
        assert!(result.is_ok());
        assert_eq!(engine.status().state, ProgramState::Running);
        engine.stop();
        assert_eq!(engine.status().state, ProgramState::Stopped);
    }

    #[test]
    fn stop_on_stopped_program_is_a_no_op() {
        let engine = ProgramEngine::new("idle", cfg("sh", &["-c", "sleep 2"], false, 0));
        engine.stop();
        assert_eq!(engine.status().state, ProgramState::Stopped);
    }

    #[test]
    fn quick_exit_without_auto_restart_does_not_retry() {
        let engine = ProgramEngine::new("quick", cfg("sh", &["-c", "exit 0"], false, 0));
        let _ = engine.start();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(engine.status().state, ProgramState::Exited);
    }

    #[test]
    fn mark_unknown_leaves_the_engine_usable() {
        let engine = ProgramEngine::new("panicky", cfg("sh", &["-c", "sleep 2"], false, 0));
        engine.start().unwrap();

        let mut start_tx: Option<mpsc::SyncSender<StartOutcome>> = None;
        mark_unknown(&engine.inner, &mut start_tx);
        assert_eq!(engine.status().state, ProgramState::Unknown);
        assert!(!engine.status().alive);

        // the mutex was never poisoned, so the engine keeps working normally.
        engine.stop();
        assert_eq!(engine.status().state, ProgramState::Stopped);
    }

    #[test]
    fn restart_supersedes_outgoing_runner() {
        let engine = ProgramEngine::new("restartable", cfg("sh", &["-c", "sleep 2"], false, 0));
        engine.start().unwrap();
        let first_pid = engine.status().pid;
        engine.restart();
        let second_pid = engine.status().pid;
        assert_ne!(first_pid, second_pid);
        assert_eq!(engine.status().state, ProgramState::Running);
        engine.stop();
    }
}
