use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::amount::RawAmount;
use crate::domain::rfq::VendorId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenderId(pub String);

impl std::fmt::Display for TenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(pub String);

impl std::fmt::Display for BidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl BidId {
    /// Placeholder id sent with the first upload for a bid the backend has not
    /// created yet.
    pub const NEW: &'static str = "new";

    pub fn new_sentinel() -> Self {
        Self(Self::NEW.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Open,
    UnderReview,
    Closed,
    Awarded,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub id: TenderId,
    pub status: TenderStatus,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub budget: Option<RawAmount>,
}

impl Tender {
    pub fn accepts_bids(&self, now: DateTime<Utc>) -> bool {
        self.status == TenderStatus::Open && now <= self.deadline
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    TechnicalProposal,
    FinancialProposal,
    CompanyProfile,
    /// Any supporting document outside the required set.
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub const REQUIRED: [DocumentType; 3] =
        [Self::TechnicalProposal, Self::FinancialProposal, Self::CompanyProfile];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TechnicalProposal => "technical_proposal",
            Self::FinancialProposal => "financial_proposal",
            Self::CompanyProfile => "company_profile",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDocument {
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub name: String,
    pub file_path: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Draft,
    Submitted,
    UnderReview,
    TechnicalEvaluation,
    FinancialEvaluation,
    Awarded,
    Rejected,
}

impl BidStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::UnderReview => 2,
            Self::TechnicalEvaluation => 3,
            Self::FinancialEvaluation => 4,
            Self::Awarded | Self::Rejected => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Awarded | Self::Rejected)
    }

    /// Status only moves forward. A draft must be submitted before any review
    /// stage, and a decided bid never moves again.
    pub fn can_advance_to(self, next: BidStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self == Self::Draft {
            return next == Self::Submitted;
        }
        next.rank() > self.rank()
    }

    /// Whether a reported `next` status would move the bid backwards. A
    /// decided bid regresses on any change.
    pub fn regresses_to(self, next: BidStatus) -> bool {
        next.rank() < self.rank() || (self.is_terminal() && next != self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    #[serde(alias = "_id")]
    pub id: BidId,
    pub tender_id: TenderId,
    pub vendor_id: VendorId,
    pub status: BidStatus,
    #[serde(default)]
    pub bid_amount: RawAmount,
    #[serde(default)]
    pub proposal: String,
    #[serde(default)]
    pub documents: Vec<BidDocument>,
}

impl Bid {
    pub fn advance_to(&mut self, next: BidStatus) -> Result<(), DomainError> {
        if self.status.can_advance_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidBidTransition { from: self.status, to: next })
    }

    /// Stores a document, replacing any earlier upload of the same required
    /// type. Supporting documents accumulate.
    pub fn upsert_document(&mut self, document: BidDocument) {
        let replaces = document.document_type != DocumentType::Other;
        match self
            .documents
            .iter_mut()
            .find(|existing| replaces && existing.document_type == document.document_type)
        {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }
    }

    pub fn has_document(&self, document_type: DocumentType) -> bool {
        self.documents.iter().any(|document| document.document_type == document_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bid, BidDocument, BidId, BidStatus, DocumentType, TenderId};
    use crate::domain::amount::RawAmount;
    use crate::domain::rfq::VendorId;
    use crate::errors::DomainError;

    fn draft() -> Bid {
        Bid {
            id: BidId("B-1".to_owned()),
            tender_id: TenderId("T-1".to_owned()),
            vendor_id: VendorId("V-1".to_owned()),
            status: BidStatus::Draft,
            bid_amount: RawAmount::default(),
            proposal: String::new(),
            documents: Vec::new(),
        }
    }

    #[test]
    fn bid_status_only_moves_forward() {
        let mut bid = draft();
        bid.advance_to(BidStatus::Submitted).expect("draft -> submitted");
        bid.advance_to(BidStatus::TechnicalEvaluation).expect("submitted -> technical");
        let error = bid.advance_to(BidStatus::UnderReview).expect_err("no regression");
        assert!(matches!(error, DomainError::InvalidBidTransition { .. }));

        bid.advance_to(BidStatus::Awarded).expect("technical -> awarded");
        assert!(!BidStatus::Awarded.can_advance_to(BidStatus::Rejected));
    }

    #[test]
    fn draft_cannot_skip_submission() {
        assert!(!BidStatus::Draft.can_advance_to(BidStatus::UnderReview));
        assert!(!BidStatus::Draft.can_advance_to(BidStatus::Awarded));
        assert!(!BidStatus::Submitted.can_advance_to(BidStatus::Submitted));
    }

    #[test]
    fn upload_replaces_document_of_same_type() {
        let mut bid = draft();
        bid.upsert_document(BidDocument {
            document_type: DocumentType::CompanyProfile,
            name: "profile-v1.pdf".to_owned(),
            file_path: "/uploads/profile-v1.pdf".to_owned(),
        });
        bid.upsert_document(BidDocument {
            document_type: DocumentType::CompanyProfile,
            name: "profile-v2.pdf".to_owned(),
            file_path: "/uploads/profile-v2.pdf".to_owned(),
        });

        assert_eq!(bid.documents.len(), 1);
        assert_eq!(bid.documents[0].name, "profile-v2.pdf");
        assert!(bid.has_document(DocumentType::CompanyProfile));
        assert!(!bid.has_document(DocumentType::TechnicalProposal));
    }

    #[test]
    fn regression_is_any_move_backwards() {
        assert!(BidStatus::Submitted.regresses_to(BidStatus::Draft));
        assert!(BidStatus::FinancialEvaluation.regresses_to(BidStatus::UnderReview));
        assert!(BidStatus::Awarded.regresses_to(BidStatus::Rejected));
        assert!(!BidStatus::Draft.regresses_to(BidStatus::UnderReview));
        assert!(!BidStatus::Submitted.regresses_to(BidStatus::Submitted));
    }

    #[test]
    fn unknown_document_types_decode_as_supporting_documents() {
        let bid: Bid = serde_json::from_str(
            r#"{"_id":"B-1","tenderId":"T-1","vendorId":"V-1","status":"draft",
                "documents":[
                    {"type":"technical_proposal","name":"t.pdf","filePath":"/u/t.pdf"},
                    {"type":"other","name":"iso.pdf","filePath":"/u/iso.pdf"},
                    {"type":"certificate","name":"tax.pdf","filePath":"/u/tax.pdf"}
                ]}"#,
        )
        .expect("bid with extra documents decodes");

        assert_eq!(bid.documents.len(), 3);
        assert_eq!(bid.documents[2].document_type, DocumentType::Other);
        assert!(bid.has_document(DocumentType::TechnicalProposal));
        assert!(!bid.has_document(DocumentType::CompanyProfile));
    }

    #[test]
    fn supporting_documents_accumulate() {
        let mut bid = draft();
        for name in ["iso.pdf", "tax.pdf"] {
            bid.upsert_document(BidDocument {
                document_type: DocumentType::Other,
                name: name.to_owned(),
                file_path: format!("/uploads/{name}"),
            });
        }

        assert_eq!(bid.documents.len(), 2);
    }
}
