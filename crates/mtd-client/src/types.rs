//! VAT API value types

use serde::{Deserialize, Serialize};

/// A nine-box VAT return as submitted to `POST .../returns`.
///
/// Monetary amounts are pounds with pence as decimals; the API validates
/// ranges and precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatReturn {
    pub period_key: String,
    pub vat_due_sales: f64,
    pub vat_due_acquisitions: f64,
    pub total_vat_due: f64,
    pub vat_reclaimed_curr_period: f64,
    pub net_vat_due: f64,
    #[serde(rename = "totalValueSalesExVAT")]
    pub total_value_sales_ex_vat: f64,
    #[serde(rename = "totalValuePurchasesExVAT")]
    pub total_value_purchases_ex_vat: f64,
    #[serde(rename = "totalValueGoodsSuppliedExVAT")]
    pub total_value_goods_supplied_ex_vat: f64,
    #[serde(rename = "totalAcquisitionsExVAT")]
    pub total_acquisitions_ex_vat: f64,
    /// Declaration that the return is final. Must be true to be accepted.
    #[serde(default)]
    pub finalised: bool,
}

/// Filter for the obligations endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationStatus {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "F")]
    Fulfilled,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Open => "O",
            ObligationStatus::Fulfilled => "F",
        }
    }
}

impl std::str::FromStr for ObligationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O" | "o" => Ok(ObligationStatus::Open),
            "F" | "f" => Ok(ObligationStatus::Fulfilled),
            other => Err(format!("unknown obligation status {other:?} (expected O or F)")),
        }
    }
}
