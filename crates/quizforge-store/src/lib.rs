//! quizforge-store: storage backends for quizforge.
//!
//! Implements the `QuestionSource` and `AttemptStore` traits from
//! `quizforge-core` for an in-memory store and a PostgREST endpoint, and
//! builds either one from configuration.

pub mod config;
pub mod memory;
pub mod rest;

pub use config::{create_backend, load_config, QuizforgeConfig, StoreConfig};
pub use memory::MemoryStore;
pub use rest::RestStore;
