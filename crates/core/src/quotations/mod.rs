//! Quotation comparison and vendor commitment for RFQs.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::backend::{BackendError, IdempotencyKey, ProcurementBackend, SelectVendorRequest};
use crate::config::RfqConfig;
use crate::domain::rfq::{Rfq, RfqId, RfqStatus, VendorId, VendorQuote};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedQuote {
    pub vendor_id: Option<VendorId>,
    pub vendor_name: String,
    pub price: Option<Decimal>,
    pub price_display: String,
    pub delivery_time: String,
    pub is_lowest_price: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableVendor {
    pub id: VendorId,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEvaluation {
    pub lowest_price: Option<Decimal>,
    pub quotes: Vec<EvaluatedQuote>,
    pub selectable_vendors: Vec<SelectableVendor>,
}

impl QuoteEvaluation {
    pub fn lowest(&self) -> impl Iterator<Item = &EvaluatedQuote> {
        self.quotes.iter().filter(|quote| quote.is_lowest_price)
    }
}

/// Flags every quote sitting at the lowest strictly positive price. Ties are
/// all flagged; quotes whose price is missing, invalid, zero or negative never
/// are.
pub fn evaluate_quotes(quotes: &[VendorQuote]) -> QuoteEvaluation {
    let prices: Vec<Option<Decimal>> = quotes.iter().map(|quote| quote.price.positive()).collect();
    let lowest_price = prices.iter().flatten().min().copied();

    let evaluated = quotes
        .iter()
        .zip(&prices)
        .map(|(quote, price)| EvaluatedQuote {
            vendor_id: quote.vendor_id().cloned(),
            vendor_name: quote
                .vendor
                .as_ref()
                .map_or(NOT_AVAILABLE, |vendor| vendor.display_name())
                .to_owned(),
            price: quote.price.coerce(),
            price_display: quote.price.display(),
            delivery_time: quote
                .delivery_time
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(NOT_AVAILABLE)
                .to_owned(),
            is_lowest_price: price.is_some() && *price == lowest_price,
        })
        .collect();

    let mut seen = BTreeSet::new();
    let selectable_vendors = quotes
        .iter()
        .filter_map(|quote| quote.vendor.as_ref())
        .filter(|vendor| seen.insert(vendor.id.clone()))
        .map(|vendor| SelectableVendor {
            id: vendor.id.clone(),
            name: vendor.display_name().to_owned(),
        })
        .collect();

    QuoteEvaluation { lowest_price, quotes: evaluated, selectable_vendors }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuotationError {
    #[error("rfq `{0}` is not loaded")]
    UnknownRfq(RfqId),
    #[error("rfq `{0}` has no quotes to select from")]
    NoQuotes(RfqId),
    #[error("vendor `{vendor_id}` has not quoted on rfq `{rfq_id}`")]
    VendorNotQuoted { rfq_id: RfqId, vendor_id: VendorId },
    #[error("rfq `{rfq_id}` is already closed")]
    AlreadyCommitted { rfq_id: RfqId, selected_vendor: Option<VendorId> },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Session-local view of the caller's RFQs.
pub struct RfqDesk {
    backend: Arc<dyn ProcurementBackend>,
    audit: Arc<dyn AuditSink>,
    config: RfqConfig,
    rfqs: Vec<Rfq>,
}

impl RfqDesk {
    pub fn new(
        backend: Arc<dyn ProcurementBackend>,
        audit: Arc<dyn AuditSink>,
        config: RfqConfig,
    ) -> Self {
        Self { backend, audit, config, rfqs: Vec::new() }
    }

    pub fn rfqs(&self) -> &[Rfq] {
        &self.rfqs
    }

    pub fn rfq(&self, rfq_id: &RfqId) -> Option<&Rfq> {
        self.rfqs.iter().find(|rfq| rfq.id == *rfq_id)
    }

    pub async fn refresh(&mut self) -> Result<usize, QuotationError> {
        self.rfqs = self.backend.rfqs().await?;
        Ok(self.rfqs.len())
    }

    pub fn evaluate(&self, rfq_id: &RfqId) -> Option<QuoteEvaluation> {
        self.rfq(rfq_id).map(|rfq| evaluate_quotes(&rfq.quotes))
    }

    /// Commits the RFQ to `vendor_id`. The local copy is replaced with the
    /// backend's only after the call succeeds.
    pub async fn select_vendor(
        &mut self,
        rfq_id: &RfqId,
        vendor_id: &VendorId,
        context: &AuditContext,
    ) -> Result<&Rfq, QuotationError> {
        let index = self
            .rfqs
            .iter()
            .position(|rfq| rfq.id == *rfq_id)
            .ok_or_else(|| QuotationError::UnknownRfq(rfq_id.clone()))?;

        if let Err(error) = self.check_selectable(&self.rfqs[index], vendor_id) {
            self.emit(rfq_id, vendor_id, context, AuditOutcome::Rejected);
            return Err(error);
        }

        let key = IdempotencyKey::generate();
        let request = SelectVendorRequest { vendor_id: vendor_id.clone() };
        let mut committed = match self.backend.select_vendor(rfq_id, &request, &key).await {
            Ok(rfq) => rfq,
            Err(error) => {
                tracing::warn!(
                    event_name = "backend.request_failed",
                    correlation_id = %context.correlation_id,
                    rfq_id = %rfq_id,
                    vendor_id = %vendor_id,
                    error_class = error.error_class(),
                    error = %error,
                    "vendor selection failed"
                );
                self.emit(rfq_id, vendor_id, context, AuditOutcome::Failed);
                return Err(error.into());
            }
        };

        committed.selected_vendor = Some(vendor_id.clone());
        committed.status = RfqStatus::Closed;
        self.rfqs[index] = committed;

        tracing::info!(
            event_name = "rfq.vendor_selected",
            correlation_id = %context.correlation_id,
            rfq_id = %rfq_id,
            vendor_id = %vendor_id,
            idempotency_key = %key,
            "vendor selected"
        );
        self.emit(rfq_id, vendor_id, context, AuditOutcome::Success);

        Ok(&self.rfqs[index])
    }

    fn check_selectable(&self, rfq: &Rfq, vendor_id: &VendorId) -> Result<(), QuotationError> {
        if rfq.status == RfqStatus::Closed && !self.config.allow_reselection_after_close {
            return Err(QuotationError::AlreadyCommitted {
                rfq_id: rfq.id.clone(),
                selected_vendor: rfq.selected_vendor.clone(),
            });
        }
        if rfq.quotes.is_empty() {
            return Err(QuotationError::NoQuotes(rfq.id.clone()));
        }
        if !rfq.has_quote_from(vendor_id) {
            return Err(QuotationError::VendorNotQuoted {
                rfq_id: rfq.id.clone(),
                vendor_id: vendor_id.clone(),
            });
        }
        Ok(())
    }

    fn emit(
        &self,
        rfq_id: &RfqId,
        vendor_id: &VendorId,
        context: &AuditContext,
        outcome: AuditOutcome,
    ) {
        self.audit.emit(
            AuditEvent::new(
                Some(rfq_id.0.clone()),
                context,
                "rfq.vendor_selection_requested",
                AuditCategory::Quotation,
                outcome,
            )
            .with_metadata("vendor_id", vendor_id.0.clone()),
        );
    }
}
