pub mod ai_search;
pub mod chat;
pub mod claims;
pub mod google;
pub mod mailer;
pub mod matching;
pub mod notifier;
pub mod storage;
