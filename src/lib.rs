//! # subtask-suggest
//!
//! Breaks a named task into a handful of short subtasks using an LLM provider.
//!
//! This library provides:
//! - An HTTP API accepting a task name and returning suggested subtasks
//! - Provider clients for chat-completions (Groq, OpenAI, DeepSeek) and Gemini
//! - A normalizer that turns arbitrary model output into a bounded subtask list
//!
//! ## Request Flow
//!
//! ```text
//!   POST /api/ai/suggest-subtasks
//!              │
//!              ▼
//!     ┌─────────────────┐   no API key / upstream error
//!     │  TextGeneration │──────────────────────────────┐
//!     │    Provider     │                              │
//!     └────────┬────────┘                              │
//!              │ raw text                              ▼
//!              ▼                                ┌──────────────┐
//!     ┌─────────────────┐  nothing usable       │   fallback   │
//!     │ SubtaskExtractor│──────────────────────►│   subtasks   │
//!     └────────┬────────┘                       └──────────────┘
//!              ▼
//!        3-5 subtasks
//! ```
//!
//! ## Modules
//! - `api`: axum router and handlers
//! - `llm`: upstream provider clients
//! - `subtasks`: prompt construction and response normalization
//! - `config`: environment-based configuration

pub mod api;
pub mod config;
pub mod llm;
pub mod subtasks;

pub use config::Config;
pub use llm::{ProviderKind, TextGenerationProvider};
pub use subtasks::{normalize, ExtractionLimits, SubtaskExtractor, SubtaskList};
