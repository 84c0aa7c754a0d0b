//! Keyword-based product categorization.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::extract::normalizer::fold_width;
use crate::models::entry::Category;

/// Confidence when no keyword matched and the product falls into その他.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

const FOOD: &[&str] = &[
    "野菜", "果物", "きゅうり", "キャベツ", "トマト", "たまご", "卵", "玉子", "りんご", "みかん",
    "バナナ", "いちご", "米", "パン", "牛乳", "ヨーグルト", "チーズ", "豆腐", "納豆", "肉", "豚",
    "牛", "鶏", "魚", "刺身", "ハム", "ソーセージ", "惣菜", "弁当", "うどん", "そば", "ラーメン",
    "パスタ", "カレー", "菓子", "チョコ", "アイス", "醤油", "味噌", "砂糖", "油", "水", "天然水",
    "お茶", "ジュース", "コーヒー", "ビール", "酒", "冷凍",
];

const DAILY_GOODS: &[&str] = &[
    "洗剤", "柔軟剤", "漂白剤", "ティッシュ", "トイレットペーパー", "キッチンペーパー", "石鹸",
    "せっけん", "歯ブラシ", "歯磨き", "シャンプー", "リンス", "ボディソープ", "ゴミ袋", "ラップ",
    "スポンジ", "マスク", "おむつ", "紙コップ",
];

const MEDICINE_COSMETICS: &[&str] = &[
    "薬", "風邪薬", "胃腸薬", "目薬", "湿布", "絆創膏", "ばんそうこう", "ビタミン", "サプリ",
    "化粧水", "乳液", "美容液", "口紅", "ファンデーション", "日焼け止め", "医薬",
];

const CLOTHING: &[&str] = &[
    "tシャツ", "シャツ", "靴下", "ソックス", "下着", "肌着", "ズボン", "スカート", "ジャケット",
    "コート", "セーター", "パジャマ", "帽子", "靴", "水着", "衣料",
];

const APPLIANCES_SUNDRIES: &[&str] = &[
    "電池", "乾電池", "電球", "led", "家電", "扇風機", "ドライヤー", "テレビ", "冷蔵庫", "掃除機",
    "炊飯器", "電子レンジ", "イヤホン", "充電器", "ケーブル", "時計", "文具", "ノート", "ボールペン",
    "食器", "鍋", "フライパン",
];

/// How a category was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationMethod {
    Keyword,
    /// Nothing matched; the product went to その他.
    Fallback,
}

/// Outcome of categorizing one product name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    pub confidence: f32,
    pub method: CategorizationMethod,
}

/// Keyword dictionary categorizer.
///
/// The category with the longest matching keyword wins, so "フライパン"
/// lands in 家電・雑貨 even though it contains "パン". Ties go to the
/// category with more matches, then to [`Category::ALL`] order.
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    keywords: Vec<(Category, Vec<String>)>,
}

impl KeywordCategorizer {
    pub fn new() -> Self {
        let table = [
            (Category::Food, FOOD),
            (Category::DailyGoods, DAILY_GOODS),
            (Category::MedicineCosmetics, MEDICINE_COSMETICS),
            (Category::Clothing, CLOTHING),
            (Category::AppliancesSundries, APPLIANCES_SUNDRIES),
        ];
        Self {
            keywords: table
                .into_iter()
                .map(|(category, words)| (category, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }

    /// Add keywords to a category.
    pub fn with_keywords<I, S>(mut self, category: Category, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| fold_width(w.as_ref()).to_lowercase())
            .filter(|w| !w.is_empty());
        match self.keywords.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(words),
            None => self.keywords.push((category, words.collect())),
        }
        self
    }

    pub fn categorize(&self, product: &str) -> CategoryResult {
        let name = fold_width(product).to_lowercase();

        let best = self
            .keywords
            .iter()
            .enumerate()
            .filter_map(|(order, (category, words))| {
                let matched: Vec<usize> = words
                    .iter()
                    .filter(|w| name.contains(w.as_str()))
                    .map(|w| w.chars().count())
                    .collect();
                let longest = matched.iter().copied().max()?;
                Some(((longest, matched.len(), Reverse(order)), *category))
            })
            .max_by_key(|(key, _)| *key);

        let result = match best {
            Some(((_, matches, _), category)) => CategoryResult {
                category,
                confidence: (0.8 + 0.05 * (matches - 1) as f32).min(0.95),
                method: CategorizationMethod::Keyword,
            },
            None => CategoryResult {
                category: Category::Other,
                confidence: FALLBACK_CONFIDENCE,
                method: CategorizationMethod::Fallback,
            },
        };
        trace!(product, category = result.category.label(), "categorized");
        result
    }

    pub fn categorize_batch<S: AsRef<str>>(&self, products: &[S]) -> Vec<CategoryResult> {
        products.iter().map(|p| self.categorize(p.as_ref())).collect()
    }
}

impl Default for KeywordCategorizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_food_keywords() {
        let categorizer = KeywordCategorizer::new();
        for product in ["きゅうり3本", "サントリー天然水2L", "パン", "牛乳", "りんご"] {
            let result = categorizer.categorize(product);
            assert_eq!(result.category, Category::Food, "{}", product);
            assert_eq!(result.method, CategorizationMethod::Keyword);
            assert!(result.confidence > 0.5);
        }
    }

    #[test]
    fn test_daily_goods_keywords() {
        let categorizer = KeywordCategorizer::new();
        for product in ["洗剤", "ティッシュ", "トイレットペーパー", "石鹸", "歯ブラシ"] {
            let result = categorizer.categorize(product);
            assert_eq!(result.category, Category::DailyGoods, "{}", product);
            assert!(result.confidence > 0.5);
        }
    }

    #[test]
    fn test_batch() {
        let results = KeywordCategorizer::new().categorize_batch(&["きゅうり3本", "洗剤", "風邪薬", "Tシャツ", "電池"]);
        let categories: Vec<_> = results.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Food,
                Category::DailyGoods,
                Category::MedicineCosmetics,
                Category::Clothing,
                Category::AppliancesSundries,
            ]
        );
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[test]
    fn test_longest_keyword_wins() {
        let categorizer = KeywordCategorizer::new();
        assert_eq!(categorizer.categorize("フライパン 26cm").category, Category::AppliancesSundries);
        assert_eq!(categorizer.categorize("薬用化粧水").category, Category::MedicineCosmetics);
        assert_eq!(categorizer.categorize("ＬＥＤ電球").category, Category::AppliancesSundries);
    }

    #[test]
    fn test_fallback() {
        let result = KeywordCategorizer::new().categorize("ギフト券");
        assert_eq!(result.category, Category::Other);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(result.method, CategorizationMethod::Fallback);
    }

    #[test]
    fn test_custom_keywords() {
        let categorizer = KeywordCategorizer::new().with_keywords(Category::Food, ["ギフト"]);
        assert_eq!(categorizer.categorize("ギフト券").category, Category::Food);
    }
}
