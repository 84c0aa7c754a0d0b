//! Common regex patterns for flyer token classification.

use lazy_static::lazy_static;
use regex::Regex;

/// Integer or decimal amount, optionally with thousands commas.
pub const NUMBER: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?";

/// Quantity units printed next to product names and package sizes.
pub const QUANTITY_UNIT: &str = r"(?:(?i:kg|mg|ml|cc|cm|mm|g|l|m|p)|パック|ケース|ロール|個|本|枚|袋|玉|缶|箱|入り|入|尾|束|房|切れ|切|株|組|足|巻|錠|包|合|点|コ|ヶ|ケ)";

/// Tax display markers (tax-included and tax-excluded forms).
pub const TAX_MARKER: &str = r"(?:税込み?(?:価格)?|税抜き?(?:価格)?|税別(?:価格)?|本体(?:価格)?)";

lazy_static! {
    // A whole token that is a number, e.g. "198", "¥1,980", "198円", "2L", "30%"
    pub static ref NUMERIC_TOKEN: Regex = Regex::new(&format!(
        r"^(?P<yen>¥)?\s*(?P<num>{NUMBER})\s*(?P<suffix>円|%|割|{QUANTITY_UNIT})?$"
    )).unwrap();

    // Digit runs joined by date/time/phone separators, e.g. "2024/03/15", "10:00"
    pub static ref SEPARATED_DIGITS: Regex = Regex::new(
        r"^\d+(?:\s*[/:\-]\s*\d+)+$|^\d+(?:\.\d+){2,}$"
    ).unwrap();

    // A thousands group cut off by the OCR engine, e.g. "1,"
    pub static ref DANGLING_GROUP: Regex = Regex::new(
        r"^\d{1,3}(?:,\d{3})*,$"
    ).unwrap();

    // Second half of a thousands-split price, e.g. "980" or "980円" after "1,"
    pub static ref THOUSANDS_GROUP: Regex = Regex::new(
        r"^\d{3}円?$"
    ).unwrap();

    // Standalone tax marker, e.g. "税抜", "(税込)", "【本体価格】"
    pub static ref MARKER_TOKEN: Regex = Regex::new(&format!(
        r"^[(（\[【]?\s*(?P<marker>{TAX_MARKER})\s*[)）\]】]?$"
    )).unwrap();

    // Marker followed by its price, e.g. "(税抜90円)", "本体価格 ¥1,280"
    pub static ref MARKER_THEN_PRICE: Regex = Regex::new(&format!(
        r"^[(（]?\s*(?P<marker>{TAX_MARKER})\s*[)）]?\s*[:：]?\s*(?P<price>¥?\s*{NUMBER}\s*円?)\s*[)）]?$"
    )).unwrap();

    // Price followed by its marker, e.g. "298円(税込)"
    pub static ref PRICE_THEN_MARKER: Regex = Regex::new(&format!(
        r"^(?P<price>¥?\s*{NUMBER}\s*円?)\s*[(（]?\s*(?P<marker>{TAX_MARKER})\s*[)）]?$"
    )).unwrap();

    // Free text ending in a currency-marked price, e.g. "きゅうり3本 198円"
    pub static ref TEXT_THEN_PRICE: Regex = Regex::new(&format!(
        r"^(?P<text>.*?[^\d,.¥\s])\s*(?P<price>¥\s*{NUMBER}\s*円?|{NUMBER}\s*円)$"
    )).unwrap();

    // Per-unit price basis, e.g. "100gあたり", "1個当たり"
    pub static ref PER_UNIT_MARKER: Regex = Regex::new(&format!(
        r"^(?P<basis>(?:{NUMBER})?\s*{QUANTITY_UNIT})\s*(?:あたり|当たり|当り)$"
    )).unwrap();

    // Percent/discount markers, e.g. "%", "%OFF", "割引"
    pub static ref PERCENT_MARKER: Regex = Regex::new(
        r"^(?:%|割)(?:(?i:off)|引き?)?$"
    ).unwrap();

    // Currency sign or yen suffix on its own
    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(
        r"^(?:¥|円)$"
    ).unwrap();

    // Punctuation or symbols only
    pub static ref PUNCTUATION_ONLY: Regex = Regex::new(
        r"^[\p{P}\p{S}]+$"
    ).unwrap();

    // Quantity inside product text, e.g. "3本", "2L", "350ml"
    pub static ref QUANTITY_IN_TEXT: Regex = Regex::new(&format!(
        r"(?P<qty>{NUMBER}\s*{QUANTITY_UNIT})"
    )).unwrap();

    pub static ref TAX_INCLUDED: Regex = Regex::new(r"税込").unwrap();

    pub static ref TAX_EXCLUDED: Regex = Regex::new(r"税抜|税別|本体").unwrap();
}
