//! # Expiration Classification
//!
//! Pure, read-time classification of best-before lots.
//!
//! ## Derived vs. Stored State
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stored status (state machine, explicit transitions only):             │
//! │                                                                         │
//! │       active ──consume()──► consumed   (terminal)                      │
//! │         │                                                               │
//! │         └────discard()───► discarded   (terminal)                      │
//! │                                                                         │
//! │  Derived condition (this module, computed on every read):              │
//! │                                                                         │
//! │       classify(active,   date in past)   = expired                     │
//! │       classify(active,   date not past)  = active                      │
//! │       classify(consumed, any date)       = consumed                    │
//! │       classify(discarded, any date)      = discarded                   │
//! │                                                                         │
//! │  The derived condition NEVER rewrites the stored status.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `today` is passed in by the caller - this crate never reads the clock.

use chrono::NaiveDate;

use crate::types::{LotCondition, LotStatus};

/// Classifies a lot from its stored status and expiration date.
///
/// A lot is `Expired` when its date is strictly before `today` and its
/// stored status is still `Active`; a lot expiring today is still sellable.
/// Terminal statuses win over the date.
pub fn classify(status: LotStatus, expiration_date: NaiveDate, today: NaiveDate) -> LotCondition {
    match status {
        LotStatus::Consumed => LotCondition::Consumed,
        LotStatus::Discarded => LotCondition::Discarded,
        LotStatus::Active => {
            if expiration_date < today {
                LotCondition::Expired
            } else {
                LotCondition::Active
            }
        }
    }
}

/// Days until expiration (negative once past). For dashboard sorting.
pub fn days_until(expiration_date: NaiveDate, today: NaiveDate) -> i64 {
    (expiration_date - today).num_days()
}
