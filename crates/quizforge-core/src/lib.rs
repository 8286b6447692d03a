//! quizforge-core: adaptive question sampling, grading and exam sessions.
//!
//! This crate holds the data model, the collaborator traits a storage
//! backend implements, and the logic that turns a question pool and an
//! attempt history into an exam: weighted sampling, hard-mode filtering,
//! option shuffling, grading and the session state machine.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod hard_mode;
pub mod model;
pub mod parser;
pub mod sampler;
pub mod session;
pub mod shuffle;
pub mod statistics;
pub mod telemetry;
pub mod traits;
pub mod weights;
