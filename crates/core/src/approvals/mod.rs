//! Session-local approval inbox.
//!
//! Stage progression belongs to the backend. The inbox only decides whether
//! the signed-in user may request a transition, forwards the request, and
//! drops the item from the pending list once the backend accepts it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::backend::{
    ApprovalStepOutcome, ApprovalStepRequest, BackendError, IdempotencyKey, ProcurementBackend,
    StepAction,
};
use crate::domain::approval::{inbox_order, ApprovalId, ApprovalItem, ApprovalLogEntry, SlaState};
use crate::domain::user::User;
use crate::permissions::{ActionSet, PermissionMatrix};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    RequestInfo,
    AdjustBudget,
    ApproveRfq,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestInfo => "request-info",
            Self::AdjustBudget => "adjust-budget",
            Self::ApproveRfq => "approve-rfq",
        }
    }

    /// Wire action plus the rfq-approval flag.
    pub fn step(self) -> (StepAction, bool) {
        match self {
            Self::Approve => (StepAction::Approve, false),
            Self::Reject => (StepAction::Reject, false),
            Self::RequestInfo => (StepAction::RequestInfo, false),
            Self::AdjustBudget => (StepAction::AdjustBudget, false),
            Self::ApproveRfq => (StepAction::Approve, true),
        }
    }

    pub fn permitted_by(self, actions: &ActionSet) -> bool {
        match self {
            Self::Approve => actions.approve,
            Self::Reject => actions.reject,
            Self::RequestInfo => actions.request_info,
            Self::AdjustBudget => actions.adjust_budget,
            Self::ApproveRfq => actions.approve_rfq,
        }
    }

    /// Decisions hand the item to the next stage, so it leaves this user's queue.
    pub fn leaves_queue(self) -> bool {
        matches!(self, Self::Approve | Self::Reject | Self::ApproveRfq)
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "request-info" => Ok(Self::RequestInfo),
            "adjust-budget" => Ok(Self::AdjustBudget),
            "approve-rfq" => Ok(Self::ApproveRfq),
            other => Err(format!("unknown approval action `{other}`")),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("approval `{0}` is not in the pending list")]
    NotPending(ApprovalId),
    #[error("action `{action}` is not available on approval `{approval_id}`")]
    ActionNotPermitted { approval_id: ApprovalId, action: ApprovalAction },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One pending item with what the signed-in user may do about it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    pub item: ApprovalItem,
    pub actions: ActionSet,
    pub sla: SlaState,
}

pub struct ApprovalInbox {
    backend: Arc<dyn ProcurementBackend>,
    audit: Arc<dyn AuditSink>,
    matrix: PermissionMatrix,
    user: User,
    items: Vec<ApprovalItem>,
}

impl ApprovalInbox {
    pub fn new(backend: Arc<dyn ProcurementBackend>, audit: Arc<dyn AuditSink>, user: User) -> Self {
        Self { backend, audit, matrix: PermissionMatrix::standard(), user, items: Vec::new() }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn items(&self) -> &[ApprovalItem] {
        &self.items
    }

    /// Replaces the pending list with the backend's, in inbox order.
    pub async fn refresh(&mut self) -> Result<usize, ApprovalError> {
        let mut items = self.backend.pending_approvals().await?;
        items.sort_by(inbox_order);
        self.items = items;
        Ok(self.items.len())
    }

    pub fn actions_for(&self, approval_id: &ApprovalId) -> Option<ActionSet> {
        self.find(approval_id).map(|item| self.matrix.evaluate_for_user(&self.user, item))
    }

    pub fn entries(&self, now: DateTime<Utc>, sla_warning: Duration) -> Vec<InboxEntry> {
        self.items
            .iter()
            .map(|item| InboxEntry {
                item: item.clone(),
                actions: self.matrix.evaluate_for_user(&self.user, item),
                sla: item.sla_state(now, sla_warning),
            })
            .collect()
    }

    /// Requests a transition. Local state changes only after the backend accepts it.
    pub async fn act(
        &mut self,
        approval_id: &ApprovalId,
        action: ApprovalAction,
        comment: &str,
        correlation_id: &str,
    ) -> Result<ApprovalStepOutcome, ApprovalError> {
        let context = AuditContext::new(correlation_id, self.user.id.0.clone());
        let index = self
            .items
            .iter()
            .position(|item| item.id == *approval_id)
            .ok_or_else(|| ApprovalError::NotPending(approval_id.clone()))?;

        let actions = self.matrix.evaluate_for_user(&self.user, &self.items[index]);
        if !action.permitted_by(&actions) {
            self.emit(approval_id, &context, action, AuditOutcome::Rejected, None);
            return Err(ApprovalError::ActionNotPermitted {
                approval_id: approval_id.clone(),
                action,
            });
        }

        let (step, is_rfq_approval) = action.step();
        let request = ApprovalStepRequest {
            action: step,
            comment: comment.to_owned(),
            role: self.user.role.clone(),
            department: self.user.department.clone(),
            is_rfq_approval,
        };
        let key = IdempotencyKey::generate();

        let outcome = match self.backend.submit_approval_step(approval_id, &request, &key).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    event_name = "backend.request_failed",
                    correlation_id = %correlation_id,
                    approval_id = %approval_id.0,
                    action = action.as_str(),
                    error_class = error.error_class(),
                    error = %error,
                    "approval transition failed"
                );
                self.emit(approval_id, &context, action, AuditOutcome::Failed, Some(&key));
                return Err(error.into());
            }
        };

        if action.leaves_queue() {
            self.items.remove(index);
        } else {
            self.reconcile(index, action, &outcome);
        }

        tracing::info!(
            event_name = "approval.transition_applied",
            correlation_id = %correlation_id,
            approval_id = %approval_id.0,
            action = action.as_str(),
            idempotency_key = %key,
            status = ?outcome.status,
            "approval transition applied"
        );
        self.emit(approval_id, &context, action, AuditOutcome::Success, Some(&key));

        Ok(outcome)
    }

    fn find(&self, approval_id: &ApprovalId) -> Option<&ApprovalItem> {
        self.items.iter().find(|item| item.id == *approval_id)
    }

    fn reconcile(&mut self, index: usize, action: ApprovalAction, outcome: &ApprovalStepOutcome) {
        let item = &mut self.items[index];
        if let Some(status) = outcome.status {
            item.status = status;
        }
        if let Some(stage) = &outcome.current_stage {
            item.current_stage.clone_from(stage);
        }

        let entry = ApprovalLogEntry {
            approver: self.user.email.clone(),
            action: action.as_str().to_owned(),
            date: Utc::now(),
        };
        if let Err(error) = item.record_step(entry) {
            tracing::warn!(
                event_name = "approval.log_out_of_order",
                approval_id = %item.id.0,
                error = %error,
                "approval log entry skipped"
            );
        }
    }

    fn emit(
        &self,
        approval_id: &ApprovalId,
        context: &AuditContext,
        action: ApprovalAction,
        outcome: AuditOutcome,
        key: Option<&IdempotencyKey>,
    ) {
        let mut event = AuditEvent::new(
            Some(approval_id.0.clone()),
            context,
            "approval.transition_requested",
            AuditCategory::Approval,
            outcome,
        )
        .with_metadata("action", action.as_str())
        .with_metadata("role", self.user.role.clone());
        if let Some(key) = key {
            event = event.with_metadata("idempotency_key", key.to_string());
        }
        self.audit.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::{ApprovalAction, ApprovalError, ApprovalInbox};
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::backend::{BackendError, InMemoryBackend, StepAction};
    use crate::domain::approval::fixtures::{item, user};
    use crate::domain::approval::{stage, ApprovalId, ApprovalItem, ApprovalStatus, Urgency};

    fn pending(id: &str, stage: &str, department: &str, urgency: Urgency) -> ApprovalItem {
        let mut approval = item(stage, department, "Office Supplies");
        approval.id = ApprovalId(id.to_owned());
        approval.urgency = urgency;
        approval
    }

    async fn inbox(
        role: &str,
        department: &str,
        items: Vec<ApprovalItem>,
    ) -> (ApprovalInbox, InMemoryBackend, InMemoryAuditSink) {
        let backend = InMemoryBackend::default().with_approvals(items);
        let audit = InMemoryAuditSink::default();
        let mut inbox = ApprovalInbox::new(
            Arc::new(backend.clone()),
            Arc::new(audit.clone()),
            user(role, department),
        );
        inbox.refresh().await.expect("pending list loads");
        (inbox, backend, audit)
    }

    #[tokio::test]
    async fn refresh_orders_items_by_urgency_then_deadline() {
        let mut soon = pending("REQ-3", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::Low);
        soon.sla_deadline = Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        let (inbox, _, _) = inbox(
            "Manager",
            "Operations",
            vec![
                pending("REQ-1", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::Low),
                pending("REQ-2", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::High),
                soon,
            ],
        )
        .await;

        let ids: Vec<&str> = inbox.items().iter().map(|item| item.id.0.as_str()).collect();
        assert_eq!(ids, vec!["REQ-2", "REQ-3", "REQ-1"]);
    }

    #[tokio::test]
    async fn approve_removes_item_after_backend_accepts() {
        let (mut inbox, backend, audit) = inbox(
            "Manager",
            "Operations",
            vec![pending("REQ-1", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::Medium)],
        )
        .await;
        let id = ApprovalId("REQ-1".to_owned());

        let outcome =
            inbox.act(&id, ApprovalAction::Approve, "looks fine", "corr-1").await.expect("approve");

        assert_eq!(outcome.status, Some(ApprovalStatus::Approved));
        assert!(inbox.items().is_empty());
        let requests = backend.step_requests(&id);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action, StepAction::Approve);
        assert_eq!(requests[0].role, "Manager");
        assert_eq!(requests[0].department.as_deref(), Some("Operations"));
        assert!(!requests[0].is_rfq_approval);
        assert_eq!(backend.idempotency_keys().len(), 1);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[0].correlation_id, "corr-1");
    }

    #[tokio::test]
    async fn rfq_approval_is_sent_as_flagged_approve() {
        let (mut inbox, backend, _) = inbox(
            "Procurement Officer",
            "Operations",
            vec![pending("REQ-9", stage::PROCUREMENT_REVIEW, "Operations", Urgency::Medium)],
        )
        .await;
        let id = ApprovalId("REQ-9".to_owned());

        let outcome = inbox.act(&id, ApprovalAction::ApproveRfq, "", "corr-2").await.expect("rfq");

        assert_eq!(outcome.status, Some(ApprovalStatus::ApprovedRfq));
        let request = &backend.step_requests(&id)[0];
        assert_eq!(request.action, StepAction::Approve);
        assert!(request.is_rfq_approval);
        assert_eq!(
            backend.approval(&id).map(|item| item.status),
            Some(ApprovalStatus::ApprovedRfq)
        );
    }

    #[tokio::test]
    async fn backend_failure_keeps_item_pending_without_retry() {
        let (mut inbox, backend, audit) = inbox(
            "Manager",
            "Operations",
            vec![pending("REQ-1", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::Medium)],
        )
        .await;
        backend.fail_next(BackendError::Timeout);
        let id = ApprovalId("REQ-1".to_owned());

        let error = inbox.act(&id, ApprovalAction::Reject, "", "corr-3").await.unwrap_err();

        assert_eq!(error, ApprovalError::Backend(BackendError::Timeout));
        assert_eq!(inbox.items().len(), 1);
        assert_eq!(backend.idempotency_keys().len(), 1);
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Failed);
        assert_eq!(
            backend.approval(&id).map(|item| item.status),
            Some(ApprovalStatus::InReview)
        );
    }

    #[tokio::test]
    async fn disallowed_action_never_reaches_backend() {
        let (mut inbox, backend, audit) = inbox(
            "Manager",
            "Finance",
            vec![pending("REQ-1", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::Medium)],
        )
        .await;
        let id = ApprovalId("REQ-1".to_owned());

        let error = inbox.act(&id, ApprovalAction::Approve, "", "corr-4").await.unwrap_err();

        assert_eq!(
            error,
            ApprovalError::ActionNotPermitted { approval_id: id.clone(), action: ApprovalAction::Approve }
        );
        assert!(backend.idempotency_keys().is_empty());
        assert_eq!(inbox.items().len(), 1);
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn request_info_keeps_item_and_logs_the_step() {
        let (mut inbox, _, _) = inbox(
            "Finance Officer",
            "Finance",
            vec![pending("REQ-5", stage::FINANCE_APPROVAL, "Operations", Urgency::Medium)],
        )
        .await;
        let id = ApprovalId("REQ-5".to_owned());

        inbox.act(&id, ApprovalAction::RequestInfo, "need quote", "corr-5").await.expect("info");

        assert_eq!(inbox.items().len(), 1);
        let log = &inbox.items()[0].previous_approvals;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "request-info");
        assert_eq!(log[0].approver, "approver@example.com");
    }

    #[tokio::test]
    async fn unknown_item_is_reported_as_not_pending() {
        let (mut inbox, backend, _) = inbox("Admin", "IT", Vec::new()).await;
        let id = ApprovalId("REQ-404".to_owned());

        let error = inbox.act(&id, ApprovalAction::Approve, "", "corr-6").await.unwrap_err();

        assert_eq!(error, ApprovalError::NotPending(id));
        assert!(backend.idempotency_keys().is_empty());
    }

    #[tokio::test]
    async fn entries_carry_actions_and_sla_state() {
        let mut overdue = pending("REQ-1", stage::DEPARTMENT_APPROVAL, "Operations", Urgency::High);
        overdue.sla_deadline = Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let (inbox, _, _) = inbox("Manager", "Operations", vec![overdue]).await;

        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let entries = inbox.entries(now, Duration::hours(24));

        assert_eq!(entries.len(), 1);
        assert!(entries[0].actions.approve);
        assert_eq!(entries[0].sla, crate::domain::approval::SlaState::Overdue);
    }

    #[test]
    fn actions_parse_from_cli_spelling() {
        assert_eq!("approve-rfq".parse::<ApprovalAction>(), Ok(ApprovalAction::ApproveRfq));
        assert_eq!(" Reject ".parse::<ApprovalAction>(), Ok(ApprovalAction::Reject));
        assert!("escalate".parse::<ApprovalAction>().is_err());
    }
}
