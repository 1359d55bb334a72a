use sea_orm::entity::prelude::*;

/// Recipient of sequence emails.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sequence_contacts::Entity")]
    SequenceContacts,
}

impl Related<super::sequence_contacts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SequenceContacts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
