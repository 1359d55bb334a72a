//! Status and kind enums persisted as stable upper/lower-case strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, $case:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = $case)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Lifecycle of a sequence as a whole. Only `Active` sequences are processed.
    SequenceStatus, "sequence status", "SCREAMING_SNAKE_CASE" {
        Draft => "DRAFT",
        Active => "ACTIVE",
        Paused => "PAUSED",
        Archived => "ARCHIVED",
    }
);

string_enum!(
    /// Progression state of one contact within one sequence.
    SequenceContactStatus, "sequence contact status", "SCREAMING_SNAKE_CASE" {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Bounced => "BOUNCED",
        Paused => "PAUSED",
        OptedOut => "OPTED_OUT",
    }
);

impl SequenceContactStatus {
    /// Externally-set or terminal states that no processing attempt may leave.
    pub fn is_absorbing(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Bounced | Self::Paused | Self::OptedOut
        )
    }
}

string_enum!(
    /// Delivery state of one physical send attempt.
    TrackingStatus, "tracking status", "SCREAMING_SNAKE_CASE" {
        Pending => "PENDING",
        Sent => "SENT",
        Opened => "OPENED",
        Clicked => "CLICKED",
        Bounced => "BOUNCED",
        Replied => "REPLIED",
        Failed => "FAILED",
    }
);

string_enum!(
    /// Kinds of events recorded against a `(sequence, contact)` pair.
    EmailEventKind, "email event kind", "snake_case" {
        Sent => "sent",
        Opened => "opened",
        Clicked => "clicked",
        Bounced => "bounced",
        Replied => "replied",
    }
);

impl EmailEventKind {
    /// Events after which no further step may be sent to the contact.
    pub const TERMINAL: [EmailEventKind; 2] = [EmailEventKind::Bounced, EmailEventKind::Replied];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

string_enum!(
    /// Unit of a step's delay.
    DelayUnit, "delay unit", "snake_case" {
        Minutes => "minutes",
        Hours => "hours",
        Days => "days",
    }
);

string_enum!(
    /// Whether a business-hours profile is the stock default or user-defined.
    ScheduleType, "schedule type", "SCREAMING_SNAKE_CASE" {
        Business => "BUSINESS",
        Custom => "CUSTOM",
    }
);
