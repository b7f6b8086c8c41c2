//! Boundary to the procurement backend.
//!
//! The backend owns persistence, authentication and the authoritative state
//! transition. The engine only issues transition requests through
//! [`ProcurementBackend`] and reconciles local state with the response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::amount::RawAmount;
use crate::domain::approval::{stage, ApprovalId, ApprovalItem, ApprovalStatus};
use crate::domain::rfq::{Rfq, RfqId, RfqStatus, VendorId};
use crate::domain::subscription::SubscriptionSnapshot;
use crate::domain::tender::{Bid, BidDocument, BidId, BidStatus, DocumentType, TenderId};

/// Sent once per transition request so the backend can collapse duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend rejected the session credential (status {status})")]
    SessionExpired { status: u16 },
    #[error("backend request timed out")]
    Timeout,
    #[error("backend transport failure: {0}")]
    Transport(String),
    #[error("backend rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::SessionExpired { .. } => "session_expired",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Rejected { .. } => "rejected",
            Self::Decode(_) => "decode",
        }
    }
}

/// Told when the backend stops accepting the session credential. Signing the
/// user out is the observer's job.
pub trait SessionObserver: Send + Sync {
    fn session_expired(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAction {
    Approve,
    Reject,
    RequestInfo,
    AdjustBudget,
}

impl StepAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestInfo => "request-info",
            Self::AdjustBudget => "adjust-budget",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStepRequest {
    pub action: StepAction,
    pub comment: String,
    pub role: String,
    pub department: Option<String>,
    pub is_rfq_approval: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStepOutcome {
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectVendorRequest {
    pub vendor_id: VendorId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpload {
    pub bid_id: BidId,
    pub tender_id: TenderId,
    pub vendor_id: VendorId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBidRequest {
    pub bid_id: BidId,
    pub tender_id: TenderId,
    pub vendor_id: VendorId,
    pub bid_amount: RawAmount,
    pub proposal: String,
}

#[async_trait]
pub trait ProcurementBackend: Send + Sync {
    async fn subscription(&self) -> Result<SubscriptionSnapshot, BackendError>;

    /// Items awaiting the signed-in user, already filtered by the backend.
    async fn pending_approvals(&self) -> Result<Vec<ApprovalItem>, BackendError>;

    async fn submit_approval_step(
        &self,
        approval_id: &ApprovalId,
        request: &ApprovalStepRequest,
        key: &IdempotencyKey,
    ) -> Result<ApprovalStepOutcome, BackendError>;

    async fn rfqs(&self) -> Result<Vec<Rfq>, BackendError>;

    async fn select_vendor(
        &self,
        rfq_id: &RfqId,
        request: &SelectVendorRequest,
        key: &IdempotencyKey,
    ) -> Result<Rfq, BackendError>;

    async fn bid_for(
        &self,
        vendor_id: &VendorId,
        tender_id: &TenderId,
    ) -> Result<Option<Bid>, BackendError>;

    /// Stores a document. A `new` bid id makes the backend create the bid.
    async fn upload_bid_document(
        &self,
        upload: &DocumentUpload,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError>;

    async fn submit_bid(
        &self,
        request: &SubmitBidRequest,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    snapshot: SubscriptionSnapshot,
    approvals: Vec<ApprovalItem>,
    rfqs: Vec<Rfq>,
    bids: Vec<Bid>,
    next_bid: u32,
    fail_next: Option<BackendError>,
    stale_bid_status: Option<BidStatus>,
    keys: Vec<IdempotencyKey>,
    step_requests: HashMap<ApprovalId, Vec<ApprovalStepRequest>>,
}

impl InMemoryState {
    fn answer(&mut self, mut bid: Bid) -> Bid {
        if let Some(status) = self.stale_bid_status.take() {
            bid.status = status;
        }
        bid
    }
}

/// Backend double that applies transitions in process.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBackend {
    pub fn with_snapshot(self, snapshot: SubscriptionSnapshot) -> Self {
        self.with_state(|state| state.snapshot = snapshot);
        self
    }

    pub fn with_approvals(self, approvals: Vec<ApprovalItem>) -> Self {
        self.with_state(|state| state.approvals = approvals);
        self
    }

    pub fn with_rfqs(self, rfqs: Vec<Rfq>) -> Self {
        self.with_state(|state| state.rfqs = rfqs);
        self
    }

    pub fn with_bids(self, bids: Vec<Bid>) -> Self {
        self.with_state(|state| state.bids = bids);
        self
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: BackendError) {
        self.with_state(|state| state.fail_next = Some(error));
    }

    /// Makes the next bid the backend hands out report `status`, the way a
    /// lagging replica would.
    pub fn report_stale_bid_status(&self, status: BidStatus) {
        self.with_state(|state| state.stale_bid_status = Some(status));
    }

    pub fn idempotency_keys(&self) -> Vec<IdempotencyKey> {
        self.with_state(|state| state.keys.clone())
    }

    pub fn step_requests(&self, approval_id: &ApprovalId) -> Vec<ApprovalStepRequest> {
        self.with_state(|state| state.step_requests.get(approval_id).cloned().unwrap_or_default())
    }

    pub fn approval(&self, approval_id: &ApprovalId) -> Option<ApprovalItem> {
        self.with_state(|state| state.approvals.iter().find(|item| item.id == *approval_id).cloned())
    }

    pub fn rfq(&self, rfq_id: &RfqId) -> Option<Rfq> {
        self.with_state(|state| state.rfqs.iter().find(|rfq| rfq.id == *rfq_id).cloned())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut InMemoryState) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn begin(&self, key: Option<&IdempotencyKey>) -> Result<(), BackendError> {
        self.with_state(|state| {
            if let Some(key) = key {
                state.keys.push(key.clone());
            }
            match state.fail_next.take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}

fn rejected(status: u16, message: impl Into<String>) -> BackendError {
    BackendError::Rejected { status, message: message.into() }
}

#[async_trait]
impl ProcurementBackend for InMemoryBackend {
    async fn subscription(&self) -> Result<SubscriptionSnapshot, BackendError> {
        self.begin(None)?;
        Ok(self.with_state(|state| state.snapshot.clone()))
    }

    async fn pending_approvals(&self) -> Result<Vec<ApprovalItem>, BackendError> {
        self.begin(None)?;
        Ok(self.with_state(|state| {
            state.approvals.iter().filter(|item| !item.status.is_terminal()).cloned().collect()
        }))
    }

    async fn submit_approval_step(
        &self,
        approval_id: &ApprovalId,
        request: &ApprovalStepRequest,
        key: &IdempotencyKey,
    ) -> Result<ApprovalStepOutcome, BackendError> {
        self.begin(Some(key))?;
        self.with_state(|state| {
            state.step_requests.entry(approval_id.clone()).or_default().push(request.clone());
            let item = state
                .approvals
                .iter_mut()
                .find(|item| item.id == *approval_id)
                .ok_or_else(|| rejected(404, format!("approval `{}` not found", approval_id.0)))?;
            if item.status.is_terminal() {
                return Err(rejected(409, format!("approval `{}` is closed", approval_id.0)));
            }

            match (request.action, request.is_rfq_approval) {
                (StepAction::Approve, true) => {
                    item.status = ApprovalStatus::ApprovedRfq;
                    item.current_stage = stage::RFQ_PROCESSING.to_owned();
                }
                (StepAction::Approve, false) => item.status = ApprovalStatus::Approved,
                (StepAction::Reject, _) => item.status = ApprovalStatus::Rejected,
                (StepAction::RequestInfo, _) | (StepAction::AdjustBudget, _) => {}
            }

            Ok(ApprovalStepOutcome {
                status: Some(item.status),
                current_stage: Some(item.current_stage.clone()),
                message: None,
            })
        })
    }

    async fn rfqs(&self) -> Result<Vec<Rfq>, BackendError> {
        self.begin(None)?;
        Ok(self.with_state(|state| state.rfqs.clone()))
    }

    async fn select_vendor(
        &self,
        rfq_id: &RfqId,
        request: &SelectVendorRequest,
        key: &IdempotencyKey,
    ) -> Result<Rfq, BackendError> {
        self.begin(Some(key))?;
        self.with_state(|state| {
            let rfq = state
                .rfqs
                .iter_mut()
                .find(|rfq| rfq.id == *rfq_id)
                .ok_or_else(|| rejected(404, format!("rfq `{}` not found", rfq_id.0)))?;
            if rfq.quotes.is_empty() {
                return Err(rejected(400, "rfq has no quotes"));
            }
            if !rfq.has_quote_from(&request.vendor_id) {
                return Err(rejected(400, "vendor has not quoted on this rfq"));
            }
            rfq.selected_vendor = Some(request.vendor_id.clone());
            rfq.status = RfqStatus::Closed;
            Ok(rfq.clone())
        })
    }

    async fn bid_for(
        &self,
        vendor_id: &VendorId,
        tender_id: &TenderId,
    ) -> Result<Option<Bid>, BackendError> {
        self.begin(None)?;
        Ok(self.with_state(|state| {
            let bid = state
                .bids
                .iter()
                .find(|bid| bid.vendor_id == *vendor_id && bid.tender_id == *tender_id)
                .cloned();
            bid.map(|bid| state.answer(bid))
        }))
    }

    async fn upload_bid_document(
        &self,
        upload: &DocumentUpload,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError> {
        self.begin(Some(key))?;
        self.with_state(|state| {
            let document = BidDocument {
                document_type: upload.document_type,
                name: upload.file_name.clone(),
                file_path: format!("/uploads/{}/{}", upload.tender_id.0, upload.file_name),
            };

            if upload.bid_id.0 == BidId::NEW {
                if let Some(existing) = state.bids.iter_mut().find(|bid| {
                    bid.vendor_id == upload.vendor_id && bid.tender_id == upload.tender_id
                }) {
                    existing.upsert_document(document);
                    return Ok(existing.clone());
                }

                state.next_bid += 1;
                let mut bid = Bid {
                    id: BidId(format!("BID-{:04}", state.next_bid)),
                    tender_id: upload.tender_id.clone(),
                    vendor_id: upload.vendor_id.clone(),
                    status: BidStatus::Draft,
                    bid_amount: RawAmount::default(),
                    proposal: String::new(),
                    documents: Vec::new(),
                };
                bid.upsert_document(document);
                state.bids.push(bid.clone());
                return Ok(bid);
            }

            let bid = state
                .bids
                .iter_mut()
                .find(|bid| bid.id == upload.bid_id)
                .ok_or_else(|| rejected(404, format!("bid `{}` not found", upload.bid_id.0)))?;
            if bid.status != BidStatus::Draft {
                return Err(rejected(409, "documents are locked after submission"));
            }
            bid.upsert_document(document);
            Ok(bid.clone())
        })
    }

    async fn submit_bid(
        &self,
        request: &SubmitBidRequest,
        key: &IdempotencyKey,
    ) -> Result<Bid, BackendError> {
        self.begin(Some(key))?;
        self.with_state(|state| {
            let bid = state
                .bids
                .iter_mut()
                .find(|bid| bid.id == request.bid_id)
                .ok_or_else(|| rejected(404, format!("bid `{}` not found", request.bid_id.0)))?;
            bid.advance_to(BidStatus::Submitted).map_err(|error| rejected(409, error.to_string()))?;
            bid.bid_amount = request.bid_amount.clone();
            bid.proposal = request.proposal.clone();
            let bid = bid.clone();
            Ok(state.answer(bid))
        })
    }
}
