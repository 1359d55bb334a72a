use sea_orm::entity::prelude::*;

/// Delivery/engagement event recorded against a `(sequence, contact)` pair.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub sequence_id: Uuid,
    pub contact_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub metadata: Json,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
