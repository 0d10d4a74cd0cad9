use std::net::TcpListener;
use std::os::fd::{AsRawFd, RawFd};

use tracing::info;

use super::error::ProcessError;

/// An ordered set of TCP listeners pre-bound by the engine and handed to
/// every child process it spawns, so that a restarted child inherits the
/// same kernel socket (spec.md §4.1).
///
/// Lifetime is engine-scoped, not process-scoped: the set survives restarts
/// and is only released when the program reaches a terminal-rest state with
/// no intent to relaunch.
#[derive(Debug, Default)]
pub struct ListenerSet {
    listeners: Vec<TcpListener>,
}

impl ListenerSet {
    /// Binds every address in order. On any bind failure, all listeners
    /// already taken in this call are dropped (closed) and the error is
    /// returned — acquisition is all-or-nothing.
    pub fn acquire(addrs: &[String]) -> Result<Self, ProcessError> {
        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in addrs {
            match TcpListener::bind(addr) {
                Ok(l) => listeners.push(l),
                Err(source) => {
                    return Err(ProcessError::ListenerBind {
                        addr: addr.clone(),
                        source,
                    });
                }
            }
        }
        Ok(Self { listeners })
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Raw fds in binding order, for dup'ing into a spawned child starting
    /// at fd 3 (spec.md §6 "Inherited child file descriptors").
    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.listeners.iter().map(|l| l.as_raw_fd()).collect()
    }

    pub fn addrs(&self) -> Vec<String> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .map(|a| a.to_string())
            .collect()
    }

    /// Idempotently closes every held listener. Calling this twice, or on an
    /// already-empty set, is a no-op.
    pub fn release(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        info!(count = self.listeners.len(), "releasing pre-bound listeners");
        self.listeners.clear();
    }
}
