use serde::Serialize;

/// The per-program lifecycle states (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgramState {
    Stopped,
    Starting,
    Running,
    Exited,
    Fatal,
    Unknown,
}

/// Mutable, single-writer-by-engine snapshot of a program's observable
/// state (spec.md §3). `pid` retains the last known value even after the
/// process has gone away; `alive` is the separate liveness flag recommended
/// by the Open Question in spec.md §9.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramStatus {
    pub name: String,
    pub pid: u32,
    pub alive: bool,
    pub start_time: i64,
    pub stop_time: i64,
    pub state: ProgramState,
    pub listen_addrs: Vec<String>,
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
