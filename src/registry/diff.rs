use std::collections::HashMap;

use serde::Serialize;

use crate::config::ProgramConfig;

/// Structural comparison of two config snapshots (spec.md §4.4 `Diff`).
/// Every key in `new ∪ old` appears in exactly one of the three maps, or is
/// silently unchanged.
#[derive(Debug, Default, Serialize)]
pub struct ConfigDiff {
    pub inserts: HashMap<String, ProgramConfig>,
    pub deletes: HashMap<String, ProgramConfig>,
    pub updates: HashMap<String, ProgramConfig>,
}

pub fn diff(
    old: &HashMap<String, ProgramConfig>,
    new: &HashMap<String, ProgramConfig>,
) -> ConfigDiff {
    let mut out = ConfigDiff::default();

    for (name, cfg) in new {
        match old.get(name) {
            None => {
                out.inserts.insert(name.clone(), cfg.clone());
            }
            Some(old_cfg) if old_cfg != cfg => {
                out.updates.insert(name.clone(), cfg.clone());
            }
            Some(_) => {}
        }
    }

    for (name, cfg) in old {
        if !new.contains_key(name) {
            out.deletes.insert(name.clone(), cfg.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(command: &str) -> ProgramConfig {
        ProgramConfig {
            directory: "/tmp".into(),
            command: command.to_string(),
            args: Vec::new(),
            auto_restart: false,
            stdout_logfile: None,
            stderr_logfile: None,
            max_retry: 0,
            listen_addrs: Vec::new(),
            stop_timeout: 0,
            stop_before_restart: false,
        }
    }

    #[test]
    fn diff_is_complete_and_disjoint() {
        let mut old = HashMap::new();
        old.insert("a".to_string(), cfg("/bin/a"));
        old.insert("b".to_string(), cfg("/bin/b"));
        old.insert("c".to_string(), cfg("/bin/c"));

        let mut new = HashMap::new();
        new.insert("a".to_string(), cfg("/bin/a-new"));
        new.insert("b".to_string(), cfg("/bin/b"));
        new.insert("d".to_string(), cfg("/bin/d"));

        let result = diff(&old, &new);
        assert!(result.inserts.contains_key("d"));
        assert!(result.deletes.contains_key("c"));
        assert!(result.updates.contains_key("a"));
        assert!(!result.inserts.contains_key("b"));
        assert!(!result.updates.contains_key("b"));
        assert!(!result.deletes.contains_key("b"));
    }

    #[test]
    fn diff_against_identical_config_is_empty() {
        let mut old = HashMap::new();
        old.insert("a".to_string(), cfg("/bin/a"));

        let result = diff(&old, &old.clone());
        assert!(result.inserts.is_empty());
        assert!(result.deletes.is_empty());
        assert!(result.updates.is_empty());
    }
}
