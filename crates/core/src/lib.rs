pub mod approvals;
pub mod audit;
pub mod backend;
pub mod bids;
pub mod config;
pub mod domain;
pub mod entitlement;
pub mod errors;
pub mod permissions;
pub mod quotations;

pub use approvals::{ApprovalAction, ApprovalError, ApprovalInbox, InboxEntry};
pub use backend::{BackendError, IdempotencyKey, InMemoryBackend, ProcurementBackend, SessionObserver};
pub use bids::{BidError, BidPhase, BidReadiness, BidWorkspace, ReadinessGap};
pub use domain::amount::RawAmount;
pub use domain::approval::{ApprovalId, ApprovalItem, ApprovalStatus};
pub use domain::rfq::{Rfq, RfqId, VendorId, VendorQuote};
pub use domain::tender::{Bid, BidId, BidStatus, DocumentType, TenderId};
pub use domain::user::{User, UserId};
pub use entitlement::{resolve_entitlement, route, Entitlement, EntitlementTier, RouteDecision};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use permissions::{ActionSet, PermissionMatrix, RoleGroup};
pub use quotations::{evaluate_quotes, QuotationError, QuoteEvaluation, RfqDesk};
