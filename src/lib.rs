pub mod cli;
pub mod config;
pub mod context;
pub mod http;
pub mod logging;
pub mod process;
pub mod program;
pub mod registry;

pub use config::{ProgramConfig, SupervisorConfig};
pub use logging::Logging;
pub use program::{ProgramEngine, ProgramState, ProgramStatus};
pub use registry::Supervisor;
