use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::amount::RawAmount;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RfqId(pub String);

impl std::fmt::Display for RfqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorId(pub String);

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Open,
    Pending,
    Closed,
}

/// Vendor reference as embedded by the backend: a populated object with a
/// name, or only the bare id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "VendorRefWire")]
pub struct VendorRef {
    pub id: VendorId,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VendorRefWire {
    Id(VendorId),
    Populated {
        #[serde(alias = "_id")]
        id: VendorId,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<VendorRefWire> for VendorRef {
    fn from(wire: VendorRefWire) -> Self {
        match wire {
            VendorRefWire::Id(id) => Self { id, name: None },
            VendorRefWire::Populated { id, name } => Self { id, name },
        }
    }
}

impl VendorRef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|name| !name.trim().is_empty()).unwrap_or("N/A")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorQuote {
    #[serde(default)]
    pub vendor: Option<VendorRef>,
    #[serde(default)]
    pub price: RawAmount,
    #[serde(default)]
    pub delivery_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VendorQuote {
    pub fn vendor_id(&self) -> Option<&VendorId> {
        self.vendor.as_ref().map(|vendor| &vendor.id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rfq {
    #[serde(alias = "_id")]
    pub id: RfqId,
    pub item_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub vendors: Vec<VendorRef>,
    #[serde(default)]
    pub quotes: Vec<VendorQuote>,
    #[serde(default)]
    pub selected_vendor: Option<VendorId>,
    pub status: RfqStatus,
}

impl Rfq {
    pub fn has_quote_from(&self, vendor_id: &VendorId) -> bool {
        self.quotes.iter().any(|quote| quote.vendor_id() == Some(vendor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{Rfq, VendorId, VendorQuote, VendorRef};
    use crate::domain::amount::RawAmount;
    use crate::quotations::evaluate_quotes;

    fn quote_json(fields: &str) -> String {
        format!(r#"{{{fields}"createdAt":"2026-03-01T09:00:00Z"}}"#)
    }

    #[test]
    fn quote_without_usable_price_still_decodes() {
        let null_price: VendorQuote =
            serde_json::from_str(&quote_json(r#""vendor":{"_id":"v1"},"price":null,"#))
                .expect("null price decodes");
        let no_price: VendorQuote =
            serde_json::from_str(&quote_json(r#""vendor":{"_id":"v2"},"#)).expect("missing price");

        assert_eq!(null_price.price, RawAmount::Missing);
        assert_eq!(no_price.price, RawAmount::Missing);

        let evaluation = evaluate_quotes(&[null_price, no_price]);
        assert!(evaluation.quotes.iter().all(|quote| quote.price_display == "N/A"));
        assert!(evaluation.quotes.iter().all(|quote| !quote.is_lowest_price));
    }

    #[test]
    fn vendor_may_arrive_as_bare_id_or_populated_object() {
        let raw = format!(
            r#"{{"_id":"rfq-1","itemName":"Laptops","quantity":3,"status":"open",
                "vendors":["v1",{{"_id":"v2","name":"Acme"}}],
                "quotes":[{},{}]}}"#,
            quote_json(r#""vendor":"v1","price":"19.99","#),
            quote_json(r#""vendor":{"_id":"v2","name":"Acme"},"price":19.99,"#),
        );
        let rfq: Rfq = serde_json::from_str(&raw).expect("rfq decodes");

        assert_eq!(rfq.vendors[0], VendorRef { id: VendorId("v1".to_owned()), name: None });
        assert_eq!(rfq.vendors[1].display_name(), "Acme");
        assert!(rfq.has_quote_from(&VendorId("v1".to_owned())));

        let evaluation = evaluate_quotes(&rfq.quotes);
        assert_eq!(evaluation.quotes[0].vendor_name, "N/A");
        assert_eq!(
            evaluation.quotes.iter().map(|quote| quote.is_lowest_price).collect::<Vec<_>>(),
            vec![true, true]
        );
    }
}
