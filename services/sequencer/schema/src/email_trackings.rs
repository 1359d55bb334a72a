use sea_orm::entity::prelude::*;

/// One row per physical send attempt. `hash` is the opaque token embedded in
/// tracking pixels and click redirects.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_trackings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub hash: String,
    pub user_id: Uuid,
    pub sequence_id: Option<Uuid>,
    pub step_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub email: String,
    pub status: String,
    pub message_id: Option<String>,
    pub rfc_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub metadata: Json,
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
