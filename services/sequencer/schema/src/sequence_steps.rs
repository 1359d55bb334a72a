use sea_orm::entity::prelude::*;

/// One email step. `step_order` is 1-based and unique within a sequence.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sequence_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub step_order: i32,
    pub delay_amount: i32,
    pub delay_unit: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub template_id: Option<Uuid>,
    pub reply_to_thread: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sequences::Entity",
        from = "Column::SequenceId",
        to = "super::sequences::Column::Id",
        on_delete = "Cascade"
    )]
    Sequence,
}

impl Related<super::sequences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sequence.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
