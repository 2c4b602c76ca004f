pub mod chat;
pub mod insight;
pub mod page;

pub use chat::{ChatPhase, ConversationMessage, PageContextEntry, Role};
pub use insight::Insight;
pub use page::{
    AnalyzedPage, Claim, ContentType, EntityMention, Intent, PageAnalysis, PageInput, Stance,
};
