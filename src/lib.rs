//! Zerotrust Pulse - Continuous authentication engine
//!
//! Pulse turns a stream of already-sampled behavioral and contextual signals
//! into a bounded trust score and a security action through a deterministic
//! pipeline: signal window → typing statistics → factor scoring → weighted
//! blend → override pipeline → level classification.
//!
//! ## Modules
//!
//! - **Signal capture**: keystroke timing window and motion stability ([`signal`])
//! - **Scoring**: factor scorers, overrides and the engine ([`factors`], [`overrides`], [`engine`])
//! - **Session**: per-user state behind one lock ([`session`]), trace replay ([`trace`])

pub mod config;
pub mod engine;
pub mod error;
pub mod factors;
pub mod injection;
pub mod overrides;
pub mod policy;
pub mod session;
pub mod signal;
pub mod simulation;
pub mod telemetry;
pub mod trace;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{EngineConfig, ResetScope};
pub use engine::{EvaluationInput, TrustEngine};
pub use error::TrustError;
pub use overrides::{OverridePipeline, ScoreAdjustment, ScoreOverride};
pub use policy::{AccessPolicy, BalanceVisibility};
pub use session::{lock_session, LoginOutcome, SharedTrustSession, TrustSession};
pub use signal::SignalWindow;
pub use simulation::{SimulatedAttack, SimulationFlags};
pub use trace::{replay, EvaluationRecord, TraceEvent};
pub use types::{
    FactorKind, FactorScore, FactorStatus, SecurityAction, TrustLevel, TrustScore,
    TypingBaseline, TypingPattern,
};

/// Engine version embedded in evaluation output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "zerotrust-pulse";
