//! Background engine for a browsing assistant: captures and analyzes
//! pages as tabs load, keeps per-conversation chat state with a
//! TTL-bound page-context cache, and maintains a cross-tab insight over
//! everything captured. All shared state mutations are serialized per
//! logical key, and durable state survives restarts.

pub mod actions;
pub mod analysis;
pub mod capture;
pub mod chat;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod insight;
pub mod models;
pub mod queue;
pub mod store;
pub mod utils;

pub use actions::{Action, ActionResponse};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus};
