use std::path::{Path, PathBuf};

use tracing::warn;

use super::{ConfigError, SupervisorConfig};

/// Loads a [`SupervisorConfig`] from disk, merging in any files matched by
/// the `[include] files` glob. Programs defined in included files win on
/// name collision against the main file, per spec.md §6.
pub trait SupervisorConfigLoader {
    fn load_config(&self) -> Result<SupervisorConfig, ConfigError>;
}

#[derive(Clone)]
pub struct SupervisorConfigLoaderFile {
    file_path: PathBuf,
}

impl SupervisorConfigLoaderFile {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
        }
    }
}

impl SupervisorConfigLoader for SupervisorConfigLoaderFile {
    fn load_config(&self) -> Result<SupervisorConfig, ConfigError> {
        let mut cfg = parse_file(&self.file_path)?;

        let pattern = resolve_include_pattern(&self.file_path, &cfg.include.files);
        if let Some(pattern) = pattern {
            for entry in glob::glob(&pattern)? {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable include entry");
                        continue;
                    }
                };
                match parse_file(&path) {
                    Ok(sub_cfg) => {
                        for (name, program_cfg) in sub_cfg.programs {
                            cfg.programs.insert(name, program_cfg);
                        }
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to parse include file");
                    }
                }
            }
        }

        Ok(cfg)
    }
}

/// `include.files` may be relative to the main config file's directory, the
/// way the Go original resolves it against `path.Split(configPath)`.
fn resolve_include_pattern(main_file: &Path, files: &str) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    let pattern_path = Path::new(files);
    if pattern_path.is_absolute() {
        return Some(files.to_string());
    }
    let base = main_file.parent().unwrap_or_else(|| Path::new("."));
    Some(base.join(pattern_path).to_string_lossy().into_owned())
}

fn parse_file(path: &Path) -> Result<SupervisorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let cfg: SupervisorConfig = toml::from_str(&contents)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn load_single_file() {
        let dir = tempdir().unwrap();
        let main_path = dir.path().join("supervisor.toml");
        let mut f = std::fs::File::create(&main_path).unwrap();
        write!(
            f,
            r#"
[program.echo-svc]
directory = "/tmp"
command = "/bin/echo hi"
auto_restart = true
max_retry = 3
"#
        )
        .unwrap();

        let cfg = SupervisorConfigLoaderFile::new(&main_path)
            .load_config()
            .unwrap();
        assert_eq!(cfg.programs.len(), 1);
        assert!(cfg.programs.contains_key("echo-svc"));
    }

    #[test]
    fn included_entry_wins_on_collision() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf.d")).unwrap();

        let main_path = dir.path().join("supervisor.toml");
        let mut f = std::fs::File::create(&main_path).unwrap();
        write!(
            f,
            r#"
[include]
files = "conf.d/*.toml"

[program.a]
directory = "/tmp"
command = "/bin/old"
"#
        )
        .unwrap();

        let included_path = dir.path().join("conf.d/extra.toml");
        let mut inc = std::fs::File::create(&included_path).unwrap();
        write!(
            inc,
            r#"
[program.a]
directory = "/tmp"
command = "/bin/new"

[program.b]
directory = "/tmp"
command = "/bin/b"
"#
        )
        .unwrap();

        let cfg = SupervisorConfigLoaderFile::new(&main_path)
            .load_config()
            .unwrap();
        assert_eq!(cfg.programs.len(), 2);
        assert_eq!(cfg.programs["a"].command, "/bin/new");
    }

    #[test]
    fn missing_include_is_not_an_error() {
        let dir = tempdir().unwrap();
        let main_path = dir.path().join("supervisor.toml");
        let mut f = std::fs::File::create(&main_path).unwrap();
        write!(f, "").unwrap();

        let cfg = SupervisorConfigLoaderFile::new(&main_path)
            .load_config()
            .unwrap();
        assert!(cfg.programs.is_empty());
    }
}
