use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::amount::RawAmount;
use crate::domain::user::{User, UserId};
use crate::errors::DomainError;

pub mod stage {
    pub const DEPARTMENT_APPROVAL: &str = "department-approval";
    pub const FINANCE_APPROVAL: &str = "finance-approval";
    pub const BUDGET_REVIEW: &str = "budget-review";
    pub const PAYMENT_APPROVAL: &str = "payment-approval";
    pub const IT_REVIEW: &str = "it-review";
    pub const LEGAL_REVIEW: &str = "legal-review";
    pub const EXECUTIVE_APPROVAL: &str = "executive-approval";
    pub const FINAL_APPROVAL: &str = "final-approval";
    pub const CFO_APPROVAL: &str = "cfo-approval";
    pub const PROCUREMENT_REVIEW: &str = "procurement-review";
    pub const RFQ_PROCESSING: &str = "rfq-processing";
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalStatus {
    InReview,
    ApprovedRfq,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverRef {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ApproverRef {
    pub fn matches(&self, user: &User) -> bool {
        let by_id = self.user_id.as_ref().is_some_and(|id| *id == user.id);
        let by_email = self
            .email
            .as_deref()
            .is_some_and(|email| email.trim().eq_ignore_ascii_case(user.email.trim()));
        by_id || by_email
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub approver: String,
    pub action: String,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    OnTrack,
    DueSoon,
    Overdue,
    Unscheduled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalItem {
    #[serde(alias = "_id")]
    pub id: ApprovalId,
    pub current_stage: String,
    #[serde(default)]
    pub approvers: Vec<ApproverRef>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: RawAmount,
    pub urgency: Urgency,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub sla_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub previous_approvals: Vec<ApprovalLogEntry>,
    #[serde(default, rename = "requireITReview")]
    pub require_it_review: bool,
    #[serde(default)]
    pub require_legal_review: bool,
}

impl ApprovalItem {
    pub fn is_approver(&self, user: &User) -> bool {
        self.approvers.iter().any(|approver| approver.matches(user))
    }

    pub fn stage_is(&self, stage: &str) -> bool {
        self.current_stage == stage
    }

    /// Appends to the approval log, which stays ordered by date.
    pub fn record_step(&mut self, entry: ApprovalLogEntry) -> Result<(), DomainError> {
        if let Some(last) = self.previous_approvals.last() {
            if entry.date < last.date {
                return Err(DomainError::InvariantViolation(format!(
                    "approval log entry dated {} precedes last entry dated {} on `{}`",
                    entry.date, last.date, self.id.0
                )));
            }
        }
        self.previous_approvals.push(entry);
        Ok(())
    }

    pub fn sla_state(&self, now: DateTime<Utc>, warning_window: Duration) -> SlaState {
        let Some(deadline) = self.sla_deadline else {
            return SlaState::Unscheduled;
        };

        if now > deadline {
            SlaState::Overdue
        } else if deadline - now <= warning_window {
            SlaState::DueSoon
        } else {
            SlaState::OnTrack
        }
    }
}

/// Inbox ordering: urgency first, then the earliest SLA deadline, then age.
pub fn inbox_order(left: &ApprovalItem, right: &ApprovalItem) -> Ordering {
    left.urgency
        .rank()
        .cmp(&right.urgency.rank())
        .then_with(|| match (left.sla_deadline, right.sla_deadline) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use super::{ApprovalId, ApprovalItem, ApprovalStatus, ApproverRef, Urgency};
    use crate::domain::amount::RawAmount;
    use crate::domain::user::{User, UserId};

    pub fn user(role: &str, department: &str) -> User {
        User {
            id: UserId("u-1".to_owned()),
            role: role.to_owned(),
            position: None,
            department: Some(department.to_owned()),
            email: "approver@example.com".to_owned(),
        }
    }

    pub fn item(stage: &str, department: &str, category: &str) -> ApprovalItem {
        ApprovalItem {
            id: ApprovalId("REQ-1".to_owned()),
            current_stage: stage.to_owned(),
            approvers: vec![ApproverRef {
                user_id: Some(UserId("u-1".to_owned())),
                email: None,
            }],
            department: department.to_owned(),
            category: category.to_owned(),
            amount: RawAmount::Number(1_200.0),
            urgency: Urgency::Medium,
            status: ApprovalStatus::InReview,
            sla_deadline: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            previous_approvals: Vec::new(),
            require_it_review: false,
            require_legal_review: false,
        }
    }
}
