use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Disposition: "lost" or "found".
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub color: Option<String>,
    /// Date the item was lost or found, as reported by the poster.
    pub occurred_on: Option<Date>,
    /// Ordered image URLs, stored as a JSON array of strings.
    pub images: Json,
    /// Free-text locality string, e.g. a neighborhood or campus name.
    pub area: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Lifecycle: open -> matched -> claimed | resolved | retrieved.
    pub status: String,
    pub user_id: String,
    pub contact: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::claims::Entity")]
    Claims,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::item_votes::Entity")]
    ItemVotes,
    #[sea_orm(has_many = "super::chats::Entity")]
    Chats,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::claims::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::item_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemVotes.def()
    }
}

impl Related<super::chats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub const TYPE_LOST: &str = "lost";
pub const TYPE_FOUND: &str = "found";

/// The counterpart disposition: lost items match found ones and vice versa.
pub fn opposite_type(item_type: &str) -> &'static str {
    if item_type == TYPE_LOST { TYPE_FOUND } else { TYPE_LOST }
}

/// Item lifecycle status. Stored as plain strings; this enum carries the
/// transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Open,
    Matched,
    Claimed,
    Resolved,
    Retrieved,
}

impl ItemStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "matched" => Some(Self::Matched),
            "claimed" => Some(Self::Claimed),
            "resolved" => Some(Self::Resolved),
            "retrieved" => Some(Self::Retrieved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Matched => "matched",
            Self::Claimed => "claimed",
            Self::Resolved => "resolved",
            Self::Retrieved => "retrieved",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Claimed | Self::Resolved | Self::Retrieved)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Matched => 1,
            Self::Claimed | Self::Resolved | Self::Retrieved => 2,
        }
    }

    /// Status only moves forward. Re-applying the current status is a
    /// permitted no-op so that e.g. approving a claim on an already-claimed
    /// item does not error.
    pub fn can_advance_to(self, next: Self) -> bool {
        next == self || (!self.is_terminal() && next.rank() > self.rank())
    }
}
