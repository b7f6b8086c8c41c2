use std::collections::BTreeMap;
use std::path::Path;

use procura_core::bids::BidReadiness;
use procura_core::domain::amount::RawAmount;
use procura_core::domain::tender::DocumentType;
use serde::Deserialize;

use super::{input_failure, read_input, CommandResult};

/// Draft form state: which documents are uploaded plus the typed fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BidDraft {
    #[serde(default)]
    documents: BTreeMap<DocumentType, bool>,
    #[serde(default)]
    bid_amount: RawAmount,
    #[serde(default)]
    proposal: String,
}

pub fn run(path: &Path) -> CommandResult {
    let draft: BidDraft = match read_input(path) {
        Ok(draft) => draft,
        Err(error) => return input_failure("bid-readiness", &error),
    };

    CommandResult::report(
        "bid-readiness",
        BidReadiness::assess(&draft.documents, &draft.bid_amount, &draft.proposal),
    )
}
