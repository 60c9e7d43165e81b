pub use super::chat_messages::Entity as ChatMessages;
pub use super::chats::Entity as Chats;
pub use super::claims::Entity as Claims;
pub use super::comments::Entity as Comments;
pub use super::item_votes::Entity as ItemVotes;
pub use super::items::Entity as Items;
pub use super::users::Entity as Users;
