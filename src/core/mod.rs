//! 核心编排层：错误与恢复、时钟、主控编排

pub mod clock;
pub mod error;
pub mod orchestrator;
pub mod recovery;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{AgentResult, Orchestrator, Registrar};
pub use recovery::{RecoveryEngine, ERROR_MARKER};
