use std::path::Path;

use procura_core::domain::rfq::Rfq;
use procura_core::quotations::evaluate_quotes;
use serde::Serialize;

use super::{input_failure, read_input, CommandResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotesReport<'a> {
    rfq_id: &'a str,
    item_name: &'a str,
    evaluation: procura_core::quotations::QuoteEvaluation,
}

pub fn run(path: &Path) -> CommandResult {
    let rfq: Rfq = match read_input(path) {
        Ok(rfq) => rfq,
        Err(error) => return input_failure("quotes", &error),
    };

    CommandResult::report(
        "quotes",
        QuotesReport {
            rfq_id: &rfq.id.0,
            item_name: &rfq.item_name,
            evaluation: evaluate_quotes(&rfq.quotes),
        },
    )
}
