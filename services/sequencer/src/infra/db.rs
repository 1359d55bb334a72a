use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use cadence_domain::business_hours::BusinessHours;
use cadence_domain::id::{ContactId, SequenceId, StepId, TrackingId};
use cadence_domain::status::{EmailEventKind, SequenceContactStatus, TrackingStatus};
use cadence_sequencer_schema::{
    contacts, email_events, email_threads, email_trackings, sequence_contacts, sequence_steps,
    sequences,
};

use crate::domain::repository::{
    ContactRepository, EmailEventRepository, EmailThreadRepository, EmailTrackingRepository,
    SequenceContactRepository, SequenceRepository,
};
use crate::domain::types::{
    Contact, DeliveredStep, EmailEvent, EmailThread, EmailTracking, SentTracking, Sequence, SequenceContact,
    SequenceStep, StepAdvance,
};
use crate::error::SequencerError;

const ABSORBING: [SequenceContactStatus; 4] = [
    SequenceContactStatus::Completed,
    SequenceContactStatus::Bounced,
    SequenceContactStatus::Paused,
    SequenceContactStatus::OptedOut,
];

fn absorbing_strs() -> Vec<&'static str> {
    ABSORBING.iter().map(|s| s.as_str()).collect()
}

// ── Sequence repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSequenceRepository {
    pub db: DatabaseConnection,
}

impl SequenceRepository for DbSequenceRepository {
    async fn find_by_id(&self, id: SequenceId) -> Result<Option<Sequence>, SequencerError> {
        let model = sequences::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find sequence by id")?;
        model.map(sequence_from_model).transpose()
    }

    async fn list_steps(&self, id: SequenceId) -> Result<Vec<SequenceStep>, SequencerError> {
        let models = sequence_steps::Entity::find()
            .filter(sequence_steps::Column::SequenceId.eq(id.0))
            .order_by_asc(sequence_steps::Column::StepOrder)
            .all(&self.db)
            .await
            .context("list sequence steps")?;
        models.into_iter().map(step_from_model).collect()
    }
}

fn sequence_from_model(model: sequences::Model) -> Result<Sequence, SequencerError> {
    let business_hours = model
        .business_hours
        .map(serde_json::from_value::<BusinessHours>)
        .transpose()
        .map_err(|e| SequencerError::InvalidBusinessHours(e.to_string()))?;
    Ok(Sequence {
        id: SequenceId(model.id),
        user_id: model.user_id.into(),
        mailbox_id: model.mailbox_id.into(),
        name: model.name,
        status: model.status.parse().context("parse sequence status")?,
        business_hours,
        disable_sending: model.disable_sending,
    })
}

fn step_from_model(model: sequence_steps::Model) -> Result<SequenceStep, SequencerError> {
    Ok(SequenceStep {
        id: model.id.into(),
        sequence_id: SequenceId(model.sequence_id),
        order: model.step_order,
        delay_amount: i64::from(model.delay_amount),
        delay_unit: model.delay_unit.parse().context("parse step delay unit")?,
        subject: model.subject,
        content: model.content,
        template_id: model.template_id,
        reply_to_thread: model.reply_to_thread,
    })
}

// ── Contact repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbContactRepository {
    pub db: DatabaseConnection,
}

impl ContactRepository for DbContactRepository {
    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, SequencerError> {
        let model = contacts::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find contact by id")?;
        Ok(model.map(|m| Contact {
            id: ContactId(m.id),
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            company: m.company,
        }))
    }
}

// ── Sequence contact repository ───────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSequenceContactRepository {
    pub db: DatabaseConnection,
}

fn pair_condition(sequence_id: SequenceId, contact_id: ContactId) -> Condition {
    Condition::all()
        .add(sequence_contacts::Column::SequenceId.eq(sequence_id.0))
        .add(sequence_contacts::Column::ContactId.eq(contact_id.0))
}

impl SequenceContactRepository for DbSequenceContactRepository {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<SequenceContact>, SequencerError> {
        let model = sequence_contacts::Entity::find()
            .filter(pair_condition(sequence_id, contact_id))
            .one(&self.db)
            .await
            .context("find sequence contact")?;
        model.map(sequence_contact_from_model).transpose()
    }

    async fn create(&self, record: &SequenceContact) -> Result<bool, SequencerError> {
        let now = Utc::now();
        let model = sequence_contacts::ActiveModel {
            id: Set(uuid::Uuid::now_v7()),
            sequence_id: Set(record.sequence_id.0),
            contact_id: Set(record.contact_id.0),
            status: Set(record.status.as_str().to_owned()),
            current_step: Set(record.current_step),
            thread_id: Set(record.thread_id.clone()),
            started_at: Set(record.started_at),
            last_processed_at: Set(record.last_processed_at),
            next_scheduled_at: Set(record.next_scheduled_at),
            completed: Set(record.completed),
            completed_at: Set(record.completed_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = sequence_contacts::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    sequence_contacts::Column::SequenceId,
                    sequence_contacts::Column::ContactId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("create sequence contact")?;
        Ok(inserted > 0)
    }

    async fn list_due(
        &self,
        sequence_id: SequenceId,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SequenceContact>, SequencerError> {
        // Contacts with a recorded bounce or reply are left to the gate's
        // verdict and not re-queued on every sweep.
        let terminal = EmailEventKind::TERMINAL
            .iter()
            .map(|k| format!("'{}'", k.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let models = sequence_contacts::Entity::find()
            .filter(sequence_contacts::Column::SequenceId.eq(sequence_id.0))
            .filter(sequence_contacts::Column::Status.is_in([
                SequenceContactStatus::Pending.as_str(),
                SequenceContactStatus::InProgress.as_str(),
            ]))
            .filter(sequence_contacts::Column::NextScheduledAt.lte(now))
            .filter(Expr::cust(format!(
                "NOT EXISTS (SELECT 1 FROM email_events e \
                 WHERE e.sequence_id = sequence_contacts.sequence_id \
                 AND e.contact_id = sequence_contacts.contact_id \
                 AND e.kind IN ({terminal}))"
            )))
            .order_by_asc(sequence_contacts::Column::NextScheduledAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list due sequence contacts")?;
        models.into_iter().map(sequence_contact_from_model).collect()
    }

    async fn begin_attempt(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        at: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, SequencerError> {
        let not_held = Condition::any()
            .add(sequence_contacts::Column::Status.ne(SequenceContactStatus::Pending.as_str()))
            .add(sequence_contacts::Column::LastProcessedAt.is_null())
            .add(sequence_contacts::Column::LastProcessedAt.lt(at - lease));
        let result = sequence_contacts::Entity::update_many()
            .col_expr(
                sequence_contacts::Column::Status,
                Expr::value(SequenceContactStatus::Pending.as_str()),
            )
            .col_expr(sequence_contacts::Column::LastProcessedAt, Expr::value(at))
            .col_expr(sequence_contacts::Column::UpdatedAt, Expr::value(at))
            .filter(pair_condition(sequence_id, contact_id))
            .filter(sequence_contacts::Column::CurrentStep.eq(expected_step))
            .filter(sequence_contacts::Column::Status.is_not_in(absorbing_strs()))
            .filter(not_held)
            .exec(&self.db)
            .await
            .context("begin sequence contact attempt")?;
        Ok(result.rows_affected > 0)
    }

    async fn advance(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        advance: &StepAdvance,
    ) -> Result<bool, SequencerError> {
        let mut update = sequence_contacts::Entity::update_many();
        update = match advance {
            StepAdvance::Next {
                next_step,
                next_scheduled_at,
                thread_id,
                at,
            } => update
                .col_expr(
                    sequence_contacts::Column::Status,
                    Expr::value(SequenceContactStatus::InProgress.as_str()),
                )
                .col_expr(sequence_contacts::Column::CurrentStep, Expr::value(*next_step))
                .col_expr(
                    sequence_contacts::Column::NextScheduledAt,
                    Expr::value(*next_scheduled_at),
                )
                .col_expr(sequence_contacts::Column::ThreadId, Expr::value(thread_id.clone()))
                .col_expr(sequence_contacts::Column::LastProcessedAt, Expr::value(*at))
                .col_expr(sequence_contacts::Column::UpdatedAt, Expr::value(*at)),
            StepAdvance::Complete { thread_id, at } => update
                .col_expr(
                    sequence_contacts::Column::Status,
                    Expr::value(SequenceContactStatus::Completed.as_str()),
                )
                .col_expr(sequence_contacts::Column::Completed, Expr::value(true))
                .col_expr(sequence_contacts::Column::CompletedAt, Expr::value(*at))
                .col_expr(
                    sequence_contacts::Column::NextScheduledAt,
                    Expr::value(Option::<DateTime<Utc>>::None),
                )
                .col_expr(sequence_contacts::Column::ThreadId, Expr::value(thread_id.clone()))
                .col_expr(sequence_contacts::Column::LastProcessedAt, Expr::value(*at))
                .col_expr(sequence_contacts::Column::UpdatedAt, Expr::value(*at)),
        };
        let result = update
            .filter(pair_condition(sequence_id, contact_id))
            .filter(sequence_contacts::Column::CurrentStep.eq(expected_step))
            .filter(sequence_contacts::Column::Status.is_not_in(absorbing_strs()))
            .exec(&self.db)
            .await
            .context("advance sequence contact")?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        sequence_contacts::Entity::update_many()
            .col_expr(
                sequence_contacts::Column::Status,
                Expr::value(SequenceContactStatus::Failed.as_str()),
            )
            .col_expr(sequence_contacts::Column::LastProcessedAt, Expr::value(at))
            .col_expr(sequence_contacts::Column::UpdatedAt, Expr::value(at))
            .filter(pair_condition(sequence_id, contact_id))
            .filter(sequence_contacts::Column::Status.is_not_in(absorbing_strs()))
            .exec(&self.db)
            .await
            .context("mark sequence contact failed")?;
        Ok(())
    }

    async fn mark_bounced(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        sequence_contacts::Entity::update_many()
            .col_expr(
                sequence_contacts::Column::Status,
                Expr::value(SequenceContactStatus::Bounced.as_str()),
            )
            .col_expr(
                sequence_contacts::Column::NextScheduledAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(sequence_contacts::Column::UpdatedAt, Expr::value(at))
            .filter(pair_condition(sequence_id, contact_id))
            .exec(&self.db)
            .await
            .context("mark sequence contact bounced")?;
        Ok(())
    }
}

fn sequence_contact_from_model(
    model: sequence_contacts::Model,
) -> Result<SequenceContact, SequencerError> {
    Ok(SequenceContact {
        sequence_id: SequenceId(model.sequence_id),
        contact_id: ContactId(model.contact_id),
        status: model
            .status
            .parse()
            .context("parse sequence contact status")?,
        current_step: model.current_step,
        thread_id: model.thread_id,
        started_at: model.started_at,
        last_processed_at: model.last_processed_at,
        next_scheduled_at: model.next_scheduled_at,
        completed: model.completed,
        completed_at: model.completed_at,
    })
}

// ── Email thread repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEmailThreadRepository {
    pub db: DatabaseConnection,
}

impl EmailThreadRepository for DbEmailThreadRepository {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<EmailThread>, SequencerError> {
        let model = email_threads::Entity::find()
            .filter(email_threads::Column::SequenceId.eq(sequence_id.0))
            .filter(email_threads::Column::ContactId.eq(contact_id.0))
            .one(&self.db)
            .await
            .context("find email thread")?;
        Ok(model.map(|m| EmailThread {
            sequence_id: SequenceId(m.sequence_id),
            contact_id: ContactId(m.contact_id),
            provider_thread_id: m.provider_thread_id,
            first_message_id: m.first_message_id,
            subject: m.subject,
            created_at: m.created_at,
        }))
    }

    async fn create(&self, thread: &EmailThread) -> Result<(), SequencerError> {
        let model = email_threads::ActiveModel {
            id: Set(uuid::Uuid::now_v7()),
            sequence_id: Set(thread.sequence_id.0),
            contact_id: Set(thread.contact_id.0),
            provider_thread_id: Set(thread.provider_thread_id.clone()),
            first_message_id: Set(thread.first_message_id.clone()),
            subject: Set(thread.subject.clone()),
            created_at: Set(thread.created_at),
        };
        email_threads::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    email_threads::Column::SequenceId,
                    email_threads::Column::ContactId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("create email thread")?;
        Ok(())
    }
}

// ── Email tracking repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEmailTrackingRepository {
    pub db: DatabaseConnection,
}

impl EmailTrackingRepository for DbEmailTrackingRepository {
    async fn create(&self, tracking: &EmailTracking) -> Result<(), SequencerError> {
        let metadata =
            serde_json::to_value(&tracking.metadata).context("serialize tracking metadata")?;
        email_trackings::ActiveModel {
            id: Set(tracking.id.0),
            hash: Set(tracking.hash.clone()),
            user_id: Set(tracking.metadata.user_id.0),
            sequence_id: Set(Some(tracking.metadata.sequence_id.0)),
            step_id: Set(Some(tracking.metadata.step_id.0)),
            contact_id: Set(Some(tracking.metadata.contact_id.0)),
            email: Set(tracking.metadata.email.clone()),
            status: Set(tracking.status.as_str().to_owned()),
            message_id: Set(None),
            rfc_message_id: Set(None),
            thread_id: Set(None),
            metadata: Set(metadata),
            sent_at: Set(None),
            created_at: Set(tracking.created_at),
            updated_at: Set(tracking.created_at),
        }
        .insert(&self.db)
        .await
        .context("create email tracking")?;
        Ok(())
    }

    async fn mark_sent(&self, id: TrackingId, sent: &SentTracking) -> Result<(), SequencerError> {
        let metadata = serde_json::to_value(&sent.metadata).context("serialize tracking metadata")?;
        email_trackings::ActiveModel {
            id: Set(id.0),
            status: Set(TrackingStatus::Sent.as_str().to_owned()),
            message_id: Set(Some(sent.message_id.clone())),
            rfc_message_id: Set(Some(sent.rfc_message_id.clone())),
            thread_id: Set(Some(sent.thread_id.clone())),
            metadata: Set(metadata),
            sent_at: Set(Some(sent.sent_at)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark email tracking sent")?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: TrackingId,
        status: TrackingStatus,
    ) -> Result<(), SequencerError> {
        email_trackings::ActiveModel {
            id: Set(id.0),
            status: Set(status.as_str().to_owned()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set email tracking status")?;
        Ok(())
    }

    async fn find_delivered(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        step_id: StepId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<DeliveredStep>, SequencerError> {
        let mut query = email_trackings::Entity::find()
            .filter(email_trackings::Column::SequenceId.eq(sequence_id.0))
            .filter(email_trackings::Column::ContactId.eq(contact_id.0))
            .filter(email_trackings::Column::StepId.eq(step_id.0))
            .filter(email_trackings::Column::SentAt.is_not_null());
        if let Some(since) = since {
            query = query.filter(email_trackings::Column::CreatedAt.gte(since));
        }
        let model = query
            .order_by_desc(email_trackings::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find delivered email tracking")?;
        Ok(model.and_then(|m| {
            Some(DeliveredStep {
                tracking_id: TrackingId(m.id),
                rfc_message_id: m.rfc_message_id?,
                thread_id: m.thread_id?,
            })
        }))
    }
}

// ── Email event repository ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEmailEventRepository {
    pub db: DatabaseConnection,
}

impl EmailEventRepository for DbEmailEventRepository {
    async fn record(&self, event: &EmailEvent) -> Result<(), SequencerError> {
        email_events::ActiveModel {
            id: Set(event.id),
            kind: Set(event.kind.as_str().to_owned()),
            sequence_id: Set(event.sequence_id.0),
            contact_id: Set(event.contact_id.0),
            tracking_id: Set(event.tracking_id.map(|t| t.0)),
            metadata: Set(event.metadata.clone()),
            occurred_at: Set(event.occurred_at),
        }
        .insert(&self.db)
        .await
        .context("record email event")?;
        Ok(())
    }

    async fn has_terminal_event(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<bool, SequencerError> {
        let found = email_events::Entity::find()
            .select_only()
            .column(email_events::Column::Id)
            .filter(email_events::Column::SequenceId.eq(sequence_id.0))
            .filter(email_events::Column::ContactId.eq(contact_id.0))
            .filter(
                email_events::Column::Kind
                    .is_in(EmailEventKind::TERMINAL.iter().map(|k| k.as_str())),
            )
            .into_tuple::<uuid::Uuid>()
            .one(&self.db)
            .await
            .context("check terminal email events")?;
        Ok(found.is_some())
    }
}
