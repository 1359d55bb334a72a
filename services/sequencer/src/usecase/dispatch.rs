use std::time::Duration;

use chrono::Utc;
use rand::RngExt;
use serde_json::json;

use cadence_domain::id::TrackingId;
use cadence_domain::status::{EmailEventKind, TrackingStatus};

use crate::domain::repository::{
    CredentialProvider, EmailEventRepository, EmailSender, EmailTrackingRepository, MailboxClient,
};
use crate::domain::types::{
    DispatchResult, EmailEvent, EmailTracking, ProviderError, RECONCILE_DELAY_MS, SendOptions,
    SentTracking, ThreadContext, TrackingMetadata,
};
use crate::error::SequencerError;
use crate::usecase::compose::{MessageDraft, inject_tracking, new_message_id, normalize_subject};

const HASH_LEN: usize = 32;
const HASH_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn generate_hash() -> String {
    let mut rng = rand::rng();
    (0..HASH_LEN)
        .map(|_| HASH_CHARSET[rng.random_range(0..HASH_CHARSET.len())] as char)
        .collect()
}

fn send_error(e: ProviderError) -> SequencerError {
    match e {
        ProviderError::Unauthenticated => SequencerError::CredentialExpired,
        other => SequencerError::ProviderSendFailed(other.to_string()),
    }
}

/// Sends one tracked message and replaces the sender's copy with a
/// tracking-free one.
///
/// The provider has no atomic send-and-replace, so the steps after the real
/// send (re-fetch, clean copy, cleanup) degrade instead of failing: once the
/// recipient has the message, the tracking row and `sent` event must be
/// written.
pub struct EmailDispatcher<C, T, E>
where
    C: CredentialProvider,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
{
    pub credentials: C,
    pub trackings: T,
    pub events: E,
    pub tracking_base_url: String,
    /// Wait before reading back the just-sent message.
    pub reconcile_delay: Duration,
}

impl<C, T, E> EmailDispatcher<C, T, E>
where
    C: CredentialProvider,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
{
    pub fn new(credentials: C, trackings: T, events: E, tracking_base_url: String) -> Self {
        Self {
            credentials,
            trackings,
            events,
            tracking_base_url,
            reconcile_delay: Duration::from_millis(RECONCILE_DELAY_MS),
        }
    }

    async fn mark_failed(&self, tracking_id: TrackingId) {
        if let Err(e) = self
            .trackings
            .set_status(tracking_id, TrackingStatus::Failed)
            .await
        {
            tracing::warn!(%tracking_id, error = %e, "failed to mark tracking row FAILED");
        }
    }

    async fn commit(
        &self,
        options: &SendOptions,
        tracking_id: TrackingId,
        sent: SentTracking,
    ) -> Result<(), SequencerError> {
        self.trackings.mark_sent(tracking_id, &sent).await?;
        self.events
            .record(&EmailEvent {
                id: uuid::Uuid::new_v4(),
                kind: EmailEventKind::Sent,
                sequence_id: options.sequence_id,
                contact_id: options.contact_id,
                tracking_id: Some(tracking_id),
                metadata: json!({
                    "stepId": options.step_id,
                    "messageId": sent.message_id,
                    "threadId": sent.thread_id,
                    "simulated": sent.metadata.simulated,
                }),
                occurred_at: sent.sent_at,
            })
            .await
    }

    async fn simulate(
        &self,
        options: &SendOptions,
        tracking: EmailTracking,
    ) -> Result<DispatchResult, SequencerError> {
        let message_id = format!("fake-msg-{}", uuid::Uuid::new_v4());
        let thread_id = options
            .thread_id
            .clone()
            .unwrap_or_else(|| format!("fake-thread-{}", uuid::Uuid::new_v4()));
        let rfc_message_id = format!("<{message_id}@localhost>");

        let mut metadata = tracking.metadata;
        metadata.simulated = true;
        let sent = SentTracking {
            message_id: message_id.clone(),
            rfc_message_id: rfc_message_id.clone(),
            thread_id: thread_id.clone(),
            metadata,
            sent_at: Utc::now(),
        };
        self.commit(options, tracking.id, sent).await?;

        tracing::info!(
            sequence_id = %options.sequence_id,
            contact_id = %options.contact_id,
            step_id = %options.step_id,
            %message_id,
            "sending disabled, recorded simulated send"
        );
        Ok(DispatchResult {
            message_id,
            rfc_message_id,
            thread_id,
            tracking_id: tracking.id,
            untracked_copy_id: None,
            success: true,
        })
    }

    async fn deliver(
        &self,
        options: &SendOptions,
        tracking: EmailTracking,
    ) -> Result<DispatchResult, SequencerError> {
        let mailbox = match self
            .credentials
            .get_valid_credential(options.user_id, options.mailbox_id)
            .await
        {
            Ok(mailbox) => mailbox,
            Err(e) => {
                self.mark_failed(tracking.id).await;
                return Err(e);
            }
        };
        let sender = mailbox.sender().clone();

        // Thread context is best effort: without it we send a fresh message.
        let context: Option<ThreadContext> = match options.thread_id.as_deref() {
            Some(thread_id) => match mailbox.thread_context(thread_id).await {
                Ok(ctx) => Some(ctx),
                Err(e) => {
                    let e = SequencerError::ThreadResolutionFailed(e.to_string());
                    tracing::warn!(
                        sequence_id = %options.sequence_id,
                        contact_id = %options.contact_id,
                        thread_id,
                        error = %e,
                        "sending without reply headers"
                    );
                    None
                }
            },
            None => None,
        };

        let subject = match &context {
            Some(ctx) if !ctx.subject.is_empty() => normalize_subject(&ctx.subject, true),
            Some(_) => normalize_subject(&options.subject, true),
            None => normalize_subject(&options.subject, false),
        };
        let in_reply_to = context.as_ref().map(|ctx| ctx.message_id.as_str());
        let references: &[String] = context
            .as_ref()
            .map(|ctx| ctx.references.as_slice())
            .unwrap_or_default();

        let message_id = new_message_id(&sender.email);
        let tracked_html = inject_tracking(&options.html, &self.tracking_base_url, &tracking.hash);
        let tracked = MessageDraft {
            from: &sender,
            to: &options.to,
            subject: &subject,
            html: &tracked_html,
            message_id: &message_id,
            in_reply_to,
            references,
        };

        let sent = match mailbox
            .send(&tracked.encode_raw(), options.thread_id.as_deref())
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                self.mark_failed(tracking.id).await;
                return Err(send_error(e));
            }
        };

        // The send response does not carry the Message-ID header; read it back.
        tokio::time::sleep(self.reconcile_delay).await;
        let (rfc_message_id, thread_id, subject) = match mailbox.get_headers(&sent.id).await {
            Ok(headers) => (
                headers.message_id.unwrap_or_else(|| message_id.clone()),
                if headers.thread_id.is_empty() {
                    sent.thread_id.clone()
                } else {
                    headers.thread_id
                },
                headers.subject.unwrap_or(subject),
            ),
            Err(e) => {
                tracing::warn!(
                    message_id = %sent.id,
                    error = %e,
                    "could not re-fetch sent message, using generated Message-ID"
                );
                (message_id.clone(), sent.thread_id.clone(), subject)
            }
        };

        let clean = MessageDraft {
            from: &sender,
            to: &options.to,
            subject: &subject,
            html: &options.html,
            message_id: &rfc_message_id,
            in_reply_to,
            references,
        };
        let untracked_copy_id = match mailbox
            .insert_sent(&clean.encode_raw(), Some(&thread_id))
            .await
        {
            Ok(copy) => {
                if let Err(e) = mailbox.delete(&sent.id).await {
                    tracing::warn!(
                        message_id = %sent.id,
                        error = %e,
                        "could not delete tracked copy from sent folder"
                    );
                }
                Some(copy.id)
            }
            Err(e) => {
                tracing::warn!(
                    message_id = %sent.id,
                    error = %e,
                    "could not insert untracked copy, keeping tracked copy"
                );
                None
            }
        };

        let mut metadata = tracking.metadata;
        metadata.untracked_message_id = untracked_copy_id.clone();
        self.commit(
            options,
            tracking.id,
            SentTracking {
                message_id: sent.id.clone(),
                rfc_message_id: rfc_message_id.clone(),
                thread_id: thread_id.clone(),
                metadata,
                sent_at: Utc::now(),
            },
        )
        .await?;

        tracing::info!(
            sequence_id = %options.sequence_id,
            contact_id = %options.contact_id,
            step_id = %options.step_id,
            message_id = %sent.id,
            %thread_id,
            "email sent"
        );
        Ok(DispatchResult {
            message_id: sent.id,
            rfc_message_id,
            thread_id,
            tracking_id: tracking.id,
            untracked_copy_id,
            success: true,
        })
    }
}

impl<C, T, E> EmailSender for EmailDispatcher<C, T, E>
where
    C: CredentialProvider,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
{
    async fn send(&self, options: &SendOptions) -> Result<DispatchResult, SequencerError> {
        let tracking = EmailTracking {
            id: TrackingId::new(),
            hash: generate_hash(),
            metadata: TrackingMetadata {
                email: options.to.clone(),
                user_id: options.user_id,
                sequence_id: options.sequence_id,
                step_id: options.step_id,
                contact_id: options.contact_id,
                untracked_message_id: None,
                simulated: false,
            },
            status: TrackingStatus::Pending,
            created_at: options.attempted_at,
        };
        self.trackings.create(&tracking).await?;

        if options.disable_sending {
            self.simulate(options, tracking).await
        } else {
            self.deliver(options, tracking).await
        }
    }
}
