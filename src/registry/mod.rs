pub mod diff;
pub mod error;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, info};

use crate::config::ProgramConfig;
use crate::program::{ProgramEngine, ProgramStatus};

pub use diff::ConfigDiff;
pub use error::RegistryError;

struct State {
    engines: HashMap<String, Arc<ProgramEngine>>,
    snapshot: HashMap<String, ProgramConfig>,
}

/// Name → program mapping with add/delete/update/list and config-diffing for
/// hot reload (spec.md §4.4). A single `RwLock` guards the whole map: every
/// read-modify-write (delete, update, reload) holds the write lock for its
/// entire critical section, unlike the known bug in the original
/// implementation where `DeleteProgram` read-locked and then released a lock
/// it never acquired as a writer.
pub struct Supervisor {
    state: RwLock<State>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                engines: HashMap::new(),
                snapshot: HashMap::new(),
            }),
        }
    }

    /// Builds a registry already populated from an initial config snapshot,
    /// without starting any program (the caller decides whether to auto
    /// start, per the daemon's own policy).
    pub fn from_snapshot(programs: HashMap<String, ProgramConfig>) -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state.write().unwrap();
            for (name, cfg) in programs {
                let engine = Arc::new(ProgramEngine::new(name.clone(), cfg.clone()));
                state.snapshot.insert(name.clone(), cfg);
                state.engines.insert(name, engine);
            }
        }
        registry
    }

    /// Constructs an engine (which pre-binds listeners), stores it, and
    /// updates the cached config snapshot.
    pub fn add_program(&self, name: &str, cfg: ProgramConfig) {
        let mut state = self.state.write().unwrap();
        let engine = Arc::new(ProgramEngine::new(name.to_string(), cfg.clone()));
        state.snapshot.insert(name.to_string(), cfg);
        state.engines.insert(name.to_string(), engine);
    }

    fn get(&self, name: &str) -> Result<Arc<ProgramEngine>, RegistryError> {
        let state = self.state.read().unwrap();
        state
            .engines
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProgramNotFound(name.to_string()))
    }

    pub fn start_program(&self, name: &str) -> Result<(), RegistryError> {
        Ok(self.get(name)?.start()?)
    }

    pub fn stop_program(&self, name: &str) -> Result<(), RegistryError> {
        self.get(name)?.stop();
        Ok(())
    }

    pub fn restart_program(&self, name: &str) -> Result<(), RegistryError> {
        self.get(name)?.restart();
        Ok(())
    }

    /// Removes the program from the registry and snapshot, then stops and
    /// destroys its engine. Holds the write lock across the whole
    /// read-modify-write, including the map mutation.
    pub fn delete_program(&self, name: &str) -> Result<(), RegistryError> {
        let engine = {
            let mut state = self.state.write().unwrap();
            state.snapshot.remove(name);
            state
                .engines
                .remove(name)
                .ok_or_else(|| RegistryError::ProgramNotFound(name.to_string()))?
        };
        engine.destroy();
        Ok(())
    }

    /// Stops and destroys the existing engine, constructs a new one with the
    /// new config, and starts it.
    pub fn update_program(&self, name: &str, cfg: ProgramConfig) -> Result<(), RegistryError> {
        let old = {
            let mut state = self.state.write().unwrap();
            let old = state.engines.remove(name);
            let engine = Arc::new(ProgramEngine::new(name.to_string(), cfg.clone()));
            state.snapshot.insert(name.to_string(), cfg);
            state.engines.insert(name.to_string(), engine.clone());
            old
        };
        if let Some(old) = old {
            old.destroy();
        }
        self.get(name)?.start()?;
        Ok(())
    }

    pub fn status(&self) -> Vec<ProgramStatus> {
        let state = self.state.read().unwrap();
        state.engines.values().map(|e| e.status()).collect()
    }

    pub fn diff(&self, new: &HashMap<String, ProgramConfig>) -> ConfigDiff {
        let state = self.state.read().unwrap();
        diff::diff(&state.snapshot, new)
    }

    /// Applies delete, insert, update in that order. Logs per-entry failures
    /// but does not abort the batch; replaces the cached snapshot on
    /// success.
    pub fn reload(&self, new: HashMap<String, ProgramConfig>) {
        let plan = self.diff(&new);

        for name in plan.deletes.keys() {
            if let Err(err) = self.delete_program(name) {
                error!(program = %name, error = %err, "reload: delete failed");
            }
        }
        for (name, cfg) in &plan.inserts {
            self.add_program(name, cfg.clone());
            if let Err(err) = self.start_program(name) {
                error!(program = %name, error = %err, "reload: start of new program failed");
            }
        }
        for (name, cfg) in &plan.updates {
            if let Err(err) = self.update_program(name, cfg.clone()) {
                error!(program = %name, error = %err, "reload: update failed");
            }
        }

        info!(
            inserts = plan.inserts.len(),
            deletes = plan.deletes.len(),
            updates = plan.updates.len(),
            "reload applied"
        );
    }

    /// Stops and destroys every program. Called on supervisor shutdown.
    pub fn shutdown_all(&self) {
        let state = self.state.read().unwrap();
        for engine in state.engines.values() {
            engine.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(command: &str) -> ProgramConfig {
        ProgramConfig {
            directory: std::env::temp_dir(),
            command: command.to_string(),
            args: Vec::new(),
            auto_restart: false,
            stdout_logfile: None,
            stderr_logfile: None,
            max_retry: 0,
            listen_addrs: Vec::new(),
            stop_timeout: 1,
            stop_before_restart: false,
        }
    }

    #[test]
    fn start_unknown_program_is_not_found() {
        use assert_matches::assert_matches;

        let registry = Supervisor::new();
        let err = registry.start_program("ghost").unwrap_err();
        assert_matches!(err, RegistryError::ProgramNotFound(_));
    }

    #[test]
    fn add_then_delete_removes_program() {
        use assert_matches::assert_matches;

        let registry = Supervisor::new();
        registry.add_program("p", cfg("/bin/true"));
        assert_eq!(registry.status().len(), 1);
        registry.delete_program("p").unwrap();
        assert_eq!(registry.status().len(), 0);
        assert_matches!(registry.delete_program("p").unwrap_err(), RegistryError::ProgramNotFound(_));
    }

    #[test]
    fn reload_with_unchanged_config_does_not_touch_snapshot() {
        let mut programs = HashMap::new();
        programs.insert("a".to_string(), cfg("/bin/true"));

        let registry = Supervisor::from_snapshot(programs.clone());
        registry.reload(programs.clone());

        let plan = registry.diff(&programs);
        assert!(plan.inserts.is_empty());
        assert!(plan.deletes.is_empty());
        assert!(plan.updates.is_empty());
    }
}
