use sea_orm::entity::prelude::*;

/// A sequence of email steps sent from one mailbox.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub mailbox_id: Uuid,
    pub name: String,
    pub status: String,
    /// Serialized `cadence_domain::business_hours::BusinessHours`; `None` means the default profile.
    pub business_hours: Option<Json>,
    pub disable_sending: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sequence_steps::Entity")]
    SequenceSteps,
    #[sea_orm(has_many = "super::sequence_contacts::Entity")]
    SequenceContacts,
}

impl Related<super::sequence_steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SequenceSteps.def()
    }
}

impl Related<super::sequence_contacts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SequenceContacts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
