//! # babyconnect-ai
//!
//! The generative collaborator behind the doula chat, the name meaning
//! lookup and the operator's weekly content drafts.
//!
//! [`Generator`] is the seam; [`GeminiClient`] is the production
//! implementation. [`MeteredGenerator`] wraps any generator with the daily
//! [`QuotaMeter`](babyconnect_store::QuotaMeter) and a call timeout, and
//! reports every call as an [`AiOutcome`] instead of an error.

pub mod error;
pub mod gemini;
pub mod generator;
pub mod metered;
pub mod prompts;

pub use error::{AiError, AiResult};
pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiClient, resolve_api_key};
pub use generator::{ChatTurn, GenerateRequest, Generator, Speaker};
pub use metered::{AiOutcome, AiPolicy, DEFAULT_AI_TIMEOUT, MeteredGenerator};
pub use prompts::GeneratedWeek;
