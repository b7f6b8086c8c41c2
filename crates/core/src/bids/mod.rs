//! Bid readiness gate and the vendor-side bid workspace.
//!
//! Readiness is recomputed from current inputs on every call; nothing is
//! cached between document uploads and edits to the amount or proposal.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::backend::{
    BackendError, DocumentUpload, IdempotencyKey, ProcurementBackend, SubmitBidRequest,
};
use crate::domain::amount::RawAmount;
use crate::domain::rfq::VendorId;
use crate::domain::tender::{Bid, BidId, BidStatus, DocumentType, Tender, TenderId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gap", content = "document", rename_all = "snake_case")]
pub enum ReadinessGap {
    MissingDocument(DocumentType),
    NonPositiveAmount,
    EmptyProposal,
}

impl std::fmt::Display for ReadinessGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDocument(document_type) => write!(f, "upload {document_type}"),
            Self::NonPositiveAmount => f.write_str("enter a bid amount greater than zero"),
            Self::EmptyProposal => f.write_str("write a proposal"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidReadiness {
    pub can_submit: bool,
    pub gaps: Vec<ReadinessGap>,
}

impl BidReadiness {
    /// `documents` maps each type to whether it has been uploaded. Types
    /// absent from the map count as not uploaded.
    pub fn assess(
        documents: &BTreeMap<DocumentType, bool>,
        bid_amount: &RawAmount,
        proposal: &str,
    ) -> Self {
        let mut gaps: Vec<ReadinessGap> = DocumentType::REQUIRED
            .into_iter()
            .filter(|document_type| !documents.get(document_type).copied().unwrap_or(false))
            .map(ReadinessGap::MissingDocument)
            .collect();

        if bid_amount.positive().is_none() {
            gaps.push(ReadinessGap::NonPositiveAmount);
        }
        if proposal.trim().is_empty() {
            gaps.push(ReadinessGap::EmptyProposal);
        }

        Self { can_submit: gaps.is_empty(), gaps }
    }
}

pub fn uploaded_documents(bid: Option<&Bid>) -> BTreeMap<DocumentType, bool> {
    DocumentType::REQUIRED
        .into_iter()
        .map(|document_type| {
            (document_type, bid.is_some_and(|bid| bid.has_document(document_type)))
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BidPhase {
    NoBid,
    Draft { complete_docs: bool },
    Lodged { status: BidStatus },
}

impl BidPhase {
    pub fn of(bid: Option<&Bid>) -> Self {
        match bid {
            None => Self::NoBid,
            Some(bid) if bid.status == BidStatus::Draft => Self::Draft {
                complete_docs: DocumentType::REQUIRED
                    .into_iter()
                    .all(|document_type| bid.has_document(document_type)),
            },
            Some(bid) => Self::Lodged { status: bid.status },
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BidError {
    #[error("no draft bid exists for this tender yet")]
    NoDraft,
    #[error("bid `{bid_id}` is {status:?} and can no longer change")]
    Locked { bid_id: BidId, status: BidStatus },
    #[error("bid is not ready: {}", format_gaps(.0))]
    NotReady(Vec<ReadinessGap>),
    #[error("tender `{0}` no longer accepts bids")]
    TenderClosed(TenderId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn format_gaps(gaps: &[ReadinessGap]) -> String {
    gaps.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// One vendor's bid on one tender.
pub struct BidWorkspace {
    backend: Arc<dyn ProcurementBackend>,
    audit: Arc<dyn AuditSink>,
    vendor_id: VendorId,
    tender_id: TenderId,
    tender: Option<Tender>,
    bid: Option<Bid>,
    bid_amount: RawAmount,
    proposal: String,
}

impl BidWorkspace {
    pub fn new(
        backend: Arc<dyn ProcurementBackend>,
        audit: Arc<dyn AuditSink>,
        vendor_id: VendorId,
        tender_id: TenderId,
    ) -> Self {
        Self {
            backend,
            audit,
            vendor_id,
            tender_id,
            tender: None,
            bid: None,
            bid_amount: RawAmount::default(),
            proposal: String::new(),
        }
    }

    pub fn with_tender(mut self, tender: Tender) -> Self {
        self.tender = Some(tender);
        self
    }

    pub fn bid(&self) -> Option<&Bid> {
        self.bid.as_ref()
    }

    pub fn phase(&self) -> BidPhase {
        BidPhase::of(self.bid.as_ref())
    }

    pub fn documents(&self) -> BTreeMap<DocumentType, bool> {
        uploaded_documents(self.bid.as_ref())
    }

    pub fn readiness(&self) -> BidReadiness {
        BidReadiness::assess(&self.documents(), &self.bid_amount, &self.proposal)
    }

    pub fn set_bid_amount(&mut self, amount: impl Into<RawAmount>) {
        self.bid_amount = amount.into();
    }

    pub fn set_proposal(&mut self, proposal: impl Into<String>) {
        self.proposal = proposal.into();
    }

    /// Pulls the existing bid, if any, and seeds the form from it.
    pub async fn load(&mut self) -> Result<BidPhase, BidError> {
        let bid = self.backend.bid_for(&self.vendor_id, &self.tender_id).await?;
        if let Some(bid) = &bid {
            self.check_progress(bid)?;
            self.bid_amount = bid.bid_amount.clone();
            self.proposal.clone_from(&bid.proposal);
        }
        self.bid = bid;
        Ok(self.phase())
    }

    /// Uploads one document, replacing any earlier one of the same type. The
    /// first upload creates the bid.
    pub async fn upload(
        &mut self,
        document_type: DocumentType,
        file_name: &str,
        content: Vec<u8>,
        context: &AuditContext,
    ) -> Result<&Bid, BidError> {
        let bid_id = match &self.bid {
            Some(bid) if bid.status != BidStatus::Draft => {
                return Err(BidError::Locked { bid_id: bid.id.clone(), status: bid.status });
            }
            Some(bid) => bid.id.clone(),
            None => BidId::new_sentinel(),
        };

        let upload = DocumentUpload {
            bid_id,
            tender_id: self.tender_id.clone(),
            vendor_id: self.vendor_id.clone(),
            document_type,
            file_name: file_name.to_owned(),
            content,
        };
        let key = IdempotencyKey::generate();

        let stored = match self.backend.upload_bid_document(&upload, &key).await {
            Ok(bid) => bid,
            Err(error) => {
                self.report_failure("document upload failed", &error, context);
                self.emit("bid.document_upload_requested", context, AuditOutcome::Failed, |event| {
                    event.with_metadata("document_type", document_type.as_str())
                });
                return Err(error.into());
            }
        };

        self.check_progress(&stored)?;

        tracing::info!(
            event_name = "bid.document_uploaded",
            correlation_id = %context.correlation_id,
            bid_id = %stored.id,
            tender_id = %self.tender_id,
            document_type = document_type.as_str(),
            idempotency_key = %key,
            "bid document uploaded"
        );
        self.emit_for(
            &stored.id,
            "bid.document_upload_requested",
            context,
            AuditOutcome::Success,
            |event| event.with_metadata("document_type", document_type.as_str()),
        );

        Ok(self.bid.insert(stored))
    }

    /// Submits the draft. Refused locally when the readiness gate is closed
    /// or the tender stopped accepting bids.
    pub async fn submit(
        &mut self,
        now: DateTime<Utc>,
        context: &AuditContext,
    ) -> Result<&Bid, BidError> {
        let bid = self.bid.as_ref().ok_or(BidError::NoDraft)?;
        if bid.status != BidStatus::Draft {
            return Err(BidError::Locked { bid_id: bid.id.clone(), status: bid.status });
        }

        let readiness = self.readiness();
        if !readiness.can_submit {
            self.emit("bid.submit_requested", context, AuditOutcome::Rejected, |event| {
                event.with_metadata("gaps", format_gaps(&readiness.gaps))
            });
            return Err(BidError::NotReady(readiness.gaps));
        }
        if let Some(tender) = &self.tender {
            if !tender.accepts_bids(now) {
                self.emit("bid.submit_requested", context, AuditOutcome::Rejected, |event| {
                    event.with_metadata("reason", "tender_closed")
                });
                return Err(BidError::TenderClosed(tender.id.clone()));
            }
        }

        let current_status = bid.status;
        let request = SubmitBidRequest {
            bid_id: bid.id.clone(),
            tender_id: self.tender_id.clone(),
            vendor_id: self.vendor_id.clone(),
            bid_amount: self.bid_amount.clone(),
            proposal: self.proposal.clone(),
        };
        let key = IdempotencyKey::generate();

        let submitted = match self.backend.submit_bid(&request, &key).await {
            Ok(bid) => bid,
            Err(error) => {
                self.report_failure("bid submission failed", &error, context);
                self.emit("bid.submit_requested", context, AuditOutcome::Failed, |event| event);
                return Err(error.into());
            }
        };

        if !current_status.can_advance_to(submitted.status) {
            let error =
                DomainError::InvalidBidTransition { from: current_status, to: submitted.status };
            tracing::warn!(
                event_name = "bid.status_regressed",
                correlation_id = %context.correlation_id,
                bid_id = %submitted.id,
                error = %error,
                "submission answered with an unexpected bid status"
            );
            self.emit("bid.submit_requested", context, AuditOutcome::Failed, |event| {
                event.with_metadata("reported_status", format!("{:?}", submitted.status))
            });
            return Err(error.into());
        }

        tracing::info!(
            event_name = "bid.submitted",
            correlation_id = %context.correlation_id,
            bid_id = %submitted.id,
            tender_id = %self.tender_id,
            idempotency_key = %key,
            "bid submitted"
        );
        self.emit("bid.submit_requested", context, AuditOutcome::Success, |event| event);

        Ok(self.bid.insert(submitted))
    }

    /// Refuses a backend copy that would move the known bid backwards.
    fn check_progress(&self, incoming: &Bid) -> Result<(), DomainError> {
        match &self.bid {
            Some(current)
                if current.id == incoming.id && current.status.regresses_to(incoming.status) =>
            {
                tracing::warn!(
                    event_name = "bid.status_regressed",
                    bid_id = %current.id,
                    from = ?current.status,
                    to = ?incoming.status,
                    "ignoring bid copy that moves the status backwards"
                );
                Err(DomainError::InvalidBidTransition {
                    from: current.status,
                    to: incoming.status,
                })
            }
            _ => Ok(()),
        }
    }

    fn report_failure(&self, message: &str, error: &BackendError, context: &AuditContext) {
        tracing::warn!(
            event_name = "backend.request_failed",
            correlation_id = %context.correlation_id,
            tender_id = %self.tender_id,
            vendor_id = %self.vendor_id,
            error_class = error.error_class(),
            error = %error,
            "{message}"
        );
    }

    fn emit(
        &self,
        event_type: &str,
        context: &AuditContext,
        outcome: AuditOutcome,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let subject = self
            .bid
            .as_ref()
            .map_or_else(BidId::new_sentinel, |bid| bid.id.clone());
        self.emit_for(&subject, event_type, context, outcome, decorate);
    }

    fn emit_for(
        &self,
        subject: &BidId,
        event_type: &str,
        context: &AuditContext,
        outcome: AuditOutcome,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let event = AuditEvent::new(
            Some(subject.0.clone()),
            context,
            event_type,
            AuditCategory::Bid,
            outcome,
        )
        .with_metadata("tender_id", self.tender_id.0.clone())
        .with_metadata("vendor_id", self.vendor_id.0.clone());
        self.audit.emit(decorate(event));
    }
}
