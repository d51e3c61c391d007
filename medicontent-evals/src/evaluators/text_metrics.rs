// Copyright 2025 Medicontent Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! SEO structural metrics and their piecewise point tables

use super::morpheme::{default_analyzer, MorphemeAnalyzer};
use medicontent_core::ItemId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)!\[[^\]]*\]\(([^)]+)\)").unwrap());
static HTML_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
static PAREN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(([^()\s]+?\.(?:jpg|jpeg|png|gif))\)").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w가-힣]+").unwrap());

/// Promotional and hyperbolic terms counted against the SEO score
pub const DISALLOWED_TERMS: [&str; 50] = [
    "19금", "성인", "유해", "도박", "불법", "사기", "100%", "완전무료", "대박", "짱", "헐", "1등",
    "최고", "최강", "완벽", "보장", "완치", "치료보장", "즉시", "당일", "바로", r"지금\s*당장",
    "반드시", "절대", "무조건", "전부", "전세계", "국내유일", "독점", "유일무이", "베스트",
    "프리미엄", "명품", "초특가", "파격", "무료", "공짜", "할인", "이벤트", "사은품", "한정",
    "마감임박", "재고소진", "선착순", "단독", "최초", "유일", "완전", "필수", "강력추천",
];

static DISALLOWED: Lazy<Vec<Regex>> = Lazy::new(|| {
    DISALLOWED_TERMS
        .iter()
        .map(|term| Regex::new(&format!("(?i){term}")).unwrap())
        .collect()
});

/// One metric's point table: three closed ranges checked in order, then a
/// fallback
#[derive(Debug, Clone, Copy)]
pub struct BandTable {
    pub bands: [(u64, u64, u8); 3],
    pub fallback: u8,
}

impl BandTable {
    pub fn points(&self, value: u64) -> u8 {
        self.bands
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&value))
            .map(|(_, _, points)| *points)
            .unwrap_or(self.fallback)
    }

    /// Best achievable points
    pub fn max_points(&self) -> u8 {
        self.bands[0].2
    }
}

/// Point tables for SEO items 1 through 9.
///
/// Item 9's second and third bands lie inside the first and never match;
/// images score 8 for 3-11 and 2 otherwise.
pub const BAND_TABLES: [BandTable; 9] = [
    BandTable { bands: [(26, 48, 12), (49, 69, 9), (15, 25, 6)], fallback: 3 },
    BandTable { bands: [(15, 30, 12), (31, 56, 9), (10, 14, 6)], fallback: 3 },
    BandTable { bands: [(1233, 2628, 15), (2629, 4113, 12), (612, 1232, 9)], fallback: 5 },
    BandTable { bands: [(936, 1997, 15), (1998, 3400, 12), (512, 935, 9)], fallback: 5 },
    BandTable { bands: [(249, 482, 10), (483, 672, 8), (183, 248, 6)], fallback: 3 },
    BandTable { bands: [(298, 632, 10), (633, 892, 8), (184, 297, 6)], fallback: 3 },
    BandTable { bands: [(82, 193, 10), (194, 284, 8), (54, 81, 6)], fallback: 3 },
    BandTable { bands: [(0, 7, 8), (8, 14, 6), (15, 21, 4)], fallback: 2 },
    BandTable { bands: [(3, 11, 8), (4, 11, 6), (4, 11, 4)], fallback: 2 },
];

pub fn band_table(item_id: ItemId) -> Option<&'static BandTable> {
    item_id
        .checked_sub(1)
        .and_then(|idx| BAND_TABLES.get(idx as usize))
}

/// Points for a measured value, 0 for an unknown item
pub fn band_points(item_id: ItemId, value: u64) -> u8 {
    band_table(item_id).map(|t| t.points(value)).unwrap_or(0)
}

/// Highest points an SEO item can earn
pub fn max_points(item_id: ItemId) -> u8 {
    band_table(item_id).map(|t| t.max_points()).unwrap_or(0)
}

/// Measured SEO quantities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetrics {
    pub title_len_with_space: u64,
    pub title_len_no_space: u64,
    pub body_len_with_space: u64,
    pub body_len_no_space: u64,
    pub morpheme_count: u64,
    pub syllable_count: u64,
    pub word_count: u64,
    pub disallowed_term_count: u64,
    pub image_count: u64,
}

impl SeoMetrics {
    /// Measured value for SEO item `item_id`
    pub fn value(&self, item_id: ItemId) -> Option<u64> {
        let value = match item_id {
            1 => self.title_len_with_space,
            2 => self.title_len_no_space,
            3 => self.body_len_with_space,
            4 => self.body_len_no_space,
            5 => self.morpheme_count,
            6 => self.syllable_count,
            7 => self.word_count,
            8 => self.disallowed_term_count,
            9 => self.image_count,
            _ => return None,
        };
        Some(value)
    }

    pub fn points(&self, item_id: ItemId) -> Option<u8> {
        self.value(item_id).map(|v| band_points(item_id, v))
    }

    pub fn values(&self) -> BTreeMap<ItemId, u64> {
        (1..=9)
            .filter_map(|id| self.value(id).map(|v| (id, v)))
            .collect()
    }
}

/// Count embedded images and strip them, then flatten whitespace.
///
/// Markdown images go first, then `<img>` tags, then bare parenthesized
/// filenames, each removed before the next form is searched.
pub fn extract_images(raw: &str) -> (String, usize) {
    let mut text = raw.to_string();
    let mut image_count = 0;

    for pattern in [&*MARKDOWN_IMAGE, &*HTML_IMAGE, &*PAREN_IMAGE] {
        image_count += pattern.find_iter(&text).count();
        text = pattern.replace_all(&text, " ").into_owned();
    }

    let text = text.replace(['\r', '\n', '\t'], " ");
    let text = WHITESPACE.replace_all(&text, " ").trim().to_string();
    (text, image_count)
}

/// Hangul syllables plus ASCII letters
pub fn count_syllables(text: &str) -> usize {
    text.chars()
        .filter(|ch| matches!(*ch, '\u{AC00}'..='\u{D7A3}') || ch.is_ascii_alphabetic())
        .count()
}

pub fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

pub fn count_disallowed_terms(text: &str) -> usize {
    DISALLOWED.iter().map(|re| re.find_iter(text).count()).sum()
}

/// Measures title and body for the SEO checklist
#[derive(Clone)]
pub struct TextMetrics {
    analyzer: Arc<dyn MorphemeAnalyzer>,
}

impl TextMetrics {
    pub fn new(analyzer: Arc<dyn MorphemeAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn measure(&self, title: &str, body: &str) -> SeoMetrics {
        let (cleaned, image_count) = extract_images(body);

        SeoMetrics {
            title_len_with_space: title.chars().count() as u64,
            title_len_no_space: title.chars().filter(|c| *c != ' ').count() as u64,
            body_len_with_space: cleaned.chars().count() as u64,
            body_len_no_space: cleaned.chars().filter(|c| !c.is_whitespace()).count() as u64,
            morpheme_count: self.analyzer.count(&cleaned) as u64,
            syllable_count: count_syllables(&cleaned) as u64,
            word_count: count_words(&cleaned) as u64,
            disallowed_term_count: count_disallowed_terms(&cleaned) as u64,
            image_count: image_count as u64,
        }
    }
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self::new(default_analyzer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_image_is_stripped_before_counting() {
        let metrics = TextMetrics::default().measure("제목", "사진 ![](a.png) 본문");
        assert_eq!(metrics.image_count, 1);
        assert_eq!(metrics.word_count, 2);
        assert_eq!(metrics.body_len_with_space, "사진 본문".chars().count() as u64);
        assert_eq!(metrics.body_len_no_space, 4);
    }

    #[test]
    fn test_all_three_image_forms_are_counted() {
        let body = "첫 문단 ![alt](img/one.jpg)\n<img src=\"two.png\" alt=\"둘\">\n(three.GIF) 끝";
        let (cleaned, count) = extract_images(body);
        assert_eq!(count, 3);
        assert_eq!(cleaned, "첫 문단 끝");
    }

    #[test]
    fn test_title_lengths() {
        let metrics = TextMetrics::default().measure("강남 임플란트 가이드", "본문");
        assert_eq!(metrics.title_len_with_space, 11);
        assert_eq!(metrics.title_len_no_space, 9);
    }

    #[test]
    fn test_syllables_count_hangul_and_ascii_letters() {
        assert_eq!(count_syllables("임플란트 SEO 2025!"), 7);
    }

    #[test]
    fn test_disallowed_terms_are_summed_per_pattern() {
        assert_eq!(count_disallowed_terms("지금 당장 할인 이벤트, 최고 BEST"), 4);
        // 완전 and 무료 also match inside 완전무료
        assert_eq!(count_disallowed_terms("완전무료"), 3);
    }

    #[test]
    fn test_band_points_follow_tables() {
        assert_eq!(band_points(1, 30), 12);
        assert_eq!(band_points(1, 60), 9);
        assert_eq!(band_points(1, 20), 6);
        assert_eq!(band_points(1, 5), 3);
        assert_eq!(band_points(3, 1500), 15);
        assert_eq!(band_points(3, 100), 5);
        assert_eq!(band_points(8, 0), 8);
        assert_eq!(band_points(8, 30), 2);
        assert_eq!(band_points(9, 5), 8);
        assert_eq!(band_points(9, 12), 2);
        assert_eq!(band_points(9, 1), 2);
        assert_eq!(band_points(10, 1), 0);
    }

    #[test]
    fn test_metrics_map_to_items() {
        let metrics = SeoMetrics {
            title_len_with_space: 30,
            image_count: 4,
            ..SeoMetrics::default()
        };
        assert_eq!(metrics.value(1), Some(30));
        assert_eq!(metrics.points(9), Some(8));
        assert_eq!(metrics.value(10), None);
        assert_eq!(metrics.values().len(), 9);
    }

    proptest! {
        #[test]
        fn prop_points_never_exceed_item_max(item_id in 1u32..=9, value in 0u64..10_000) {
            prop_assert!(band_points(item_id, value) <= max_points(item_id));
        }
    }
}
