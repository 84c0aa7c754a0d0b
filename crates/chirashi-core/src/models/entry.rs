//! Flat product rows handed to serialization.

use serde::{Deserialize, Serialize};

use super::record::{ExtractionRecord, TaxRate};

/// Product categories used on retail flyers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "食品")]
    Food,
    #[serde(rename = "日用品")]
    DailyGoods,
    #[serde(rename = "医薬品・化粧品")]
    MedicineCosmetics,
    #[serde(rename = "衣料品")]
    Clothing,
    #[serde(rename = "家電・雑貨")]
    AppliancesSundries,
    #[serde(rename = "その他")]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::DailyGoods,
        Category::MedicineCosmetics,
        Category::Clothing,
        Category::AppliancesSundries,
        Category::Other,
    ];

    /// Label as printed in output files.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Food => "食品",
            Category::DailyGoods => "日用品",
            Category::MedicineCosmetics => "医薬品・化粧品",
            Category::Clothing => "衣料品",
            Category::AppliancesSundries => "家電・雑貨",
            Category::Other => "その他",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label.trim())
    }
}

/// One output row: product, prices, unit, category, confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyerEntry {
    pub product: String,
    pub price_incl_tax: Option<i64>,
    pub price_excl_tax: Option<i64>,
    pub unit: Option<String>,
    pub category: Category,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<TaxRate>,
}

impl FlyerEntry {
    pub fn from_record(record: &ExtractionRecord, category: Category) -> Self {
        Self {
            product: record.product.text.clone(),
            price_incl_tax: record.price_incl_amount(),
            price_excl_tax: record.price_excl_amount(),
            unit: record.unit.clone(),
            category,
            confidence: record.confidence,
            tax_rate: record.tax_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("家具"), None);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::MedicineCosmetics).unwrap();
        assert_eq!(json, "\"医薬品・化粧品\"");
    }
}
