pub mod prelude;

pub mod chat_messages;
pub mod chats;
pub mod claims;
pub mod comments;
pub mod item_votes;
pub mod items;
pub mod users;
