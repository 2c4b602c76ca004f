pub mod conversations;
pub mod pages;

pub use conversations::{ConversationCache, CONTEXT_TTL_SECS, MAX_MESSAGES};
pub use pages::{PageStore, MAX_PAGES};
