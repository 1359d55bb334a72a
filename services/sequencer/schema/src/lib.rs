//! `sea-orm` entities for the sequencer service.

pub mod contacts;
pub mod email_events;
pub mod email_threads;
pub mod email_trackings;
pub mod mailboxes;
pub mod sequence_contacts;
pub mod sequence_jobs;
pub mod sequence_steps;
pub mod sequences;
