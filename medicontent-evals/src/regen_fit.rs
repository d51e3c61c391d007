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

//! Post-regeneration fit: how well a rewrite resolved violations, followed
//! the judge's tips and preserved the draft's structure

use medicontent_core::{ItemId, RegenFitResult};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+|[.\n]\s+").unwrap());

/// Tip category with the keywords that classify a tip and the patterns
/// checked in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipCategory {
    SideEffectDisclosure,
    PriceDisclosure,
    EvidenceCitation,
    InducementRemoval,
    ExaggerationSoftening,
}

impl TipCategory {
    /// Classification order matters: the first matching category wins
    pub const ALL: [TipCategory; 5] = [
        TipCategory::SideEffectDisclosure,
        TipCategory::PriceDisclosure,
        TipCategory::EvidenceCitation,
        TipCategory::InducementRemoval,
        TipCategory::ExaggerationSoftening,
    ];

    fn tip_keywords(&self) -> &'static [&'static str] {
        match self {
            TipCategory::SideEffectDisclosure => &["부작용", "주의", "개인차"],
            TipCategory::PriceDisclosure => &["가격", "비용", "부가세"],
            TipCategory::EvidenceCitation => &["연구", "임상", "데이터", "근거"],
            TipCategory::InducementRemoval => &["리뷰", "이벤트", "추첨", "사은품", "대가", "기프티콘"],
            TipCategory::ExaggerationSoftening => &["100%", "최고", "유일", "완전", "무통", "과장", "절대"],
        }
    }

    fn text_patterns(&self) -> &'static [Regex] {
        &TEXT_PATTERNS[*self as usize]
    }

    /// Disclosures should appear; inducements and exaggerations should go
    pub fn wants_presence(&self) -> bool {
        matches!(
            self,
            TipCategory::SideEffectDisclosure
                | TipCategory::PriceDisclosure
                | TipCategory::EvidenceCitation
        )
    }

    pub fn classify(tip: &str) -> Option<TipCategory> {
        Self::ALL
            .into_iter()
            .find(|category| category.tip_keywords().iter().any(|k| tip.contains(k)))
    }
}

static TEXT_PATTERNS: Lazy<[Vec<Regex>; 5]> = Lazy::new(|| {
    let compile = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
            .collect()
    };
    [
        compile(&["부작용", "주의사항", "개인차", "합병증"]),
        compile(&["가격", "비용", r"추가\s*비용", "부가세"]),
        compile(&["연구|임상|데이터|근거|가이드라인"]),
        compile(&[r"리뷰\s*이벤트|추첨|사은품|기프티콘|대가"]),
        compile(&[r"100\s*%|최고|유일|완전\s*무통|부작용\s*없"]),
    ]
});

/// Fraction of `patterns` found in `text`
fn presence_rate(text: &str, patterns: &[Regex]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }
    let hits = patterns.iter().filter(|p| p.is_match(text)).count();
    hits as f64 / patterns.len() as f64
}

fn guideline_adherence(before_text: &str, after_text: &str, tips: &[String]) -> f64 {
    let checks: Vec<f64> = tips
        .iter()
        .filter_map(|tip| TipCategory::classify(tip))
        .map(|category| {
            let patterns = category.text_patterns();
            if category.wants_presence() {
                presence_rate(after_text, patterns)
            } else if presence_rate(after_text, patterns) < presence_rate(before_text, patterns) {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    if checks.is_empty() {
        0.0
    } else {
        checks.iter().sum::<f64>() / checks.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FlowStats {
    paragraphs: usize,
    sentences: usize,
    chars: usize,
}

impl FlowStats {
    fn of(text: &str) -> Self {
        let paragraphs = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();
        let sentences = SENTENCE_BREAK
            .split(text)
            .filter(|s| !s.trim().is_empty())
            .count();
        Self {
            paragraphs: paragraphs.max(1),
            sentences: sentences.max(1),
            chars: text.chars().count().max(1),
        }
    }
}

/// `1 - |after - before| / max(before, 1)`, floored at 0
fn stability(before: usize, after: usize) -> f64 {
    let delta = (after as f64 - before as f64).abs();
    (1.0 - delta / before.max(1) as f64).clamp(0.0, 1.0)
}

pub fn flow_stability(before_text: &str, after_text: &str) -> f64 {
    let before = FlowStats::of(before_text);
    let after = FlowStats::of(after_text);
    // Weighted 0.5 / 0.3 / 0.2, summed in tenths
    let flow = (5.0 * stability(before.paragraphs, after.paragraphs)
        + 3.0 * stability(before.sentences, after.sentences)
        + 2.0 * stability(before.chars, after.chars))
        / 10.0;
    flow.clamp(0.0, 1.0)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Score a finished regeneration against the first scored state
pub fn fit(
    before_violations: &[ItemId],
    after_violations: &[ItemId],
    before_text: &str,
    after_text: &str,
    tips: &[String],
) -> RegenFitResult {
    let risk_reduction = if before_violations.is_empty() {
        1.0
    } else {
        let before = before_violations.len() as f64;
        (before - after_violations.len() as f64) / before
    };
    let adherence = guideline_adherence(before_text, after_text, tips);
    let flow = flow_stability(before_text, after_text);

    let score = (50.0 * risk_reduction + 30.0 * adherence + 20.0 * flow).round();
    debug!(risk_reduction, adherence, flow, score, "regeneration fit");

    RegenFitResult {
        risk_reduction_rate: round3(risk_reduction),
        guideline_adherence: round3(adherence),
        flow_stability: round3(flow),
        score_0_100: score.max(0.0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_prior_violations_is_fully_resolved() {
        let result = fit(&[], &[], "a", "a", &[]);
        assert_eq!(result.risk_reduction_rate, 1.0);
    }

    #[test]
    fn test_risk_reduction_rate() {
        let result = fit(&[1, 3, 7, 12], &[12], "a", "a", &[]);
        assert_eq!(result.risk_reduction_rate, 0.75);
    }

    #[test]
    fn test_tip_classification_order() {
        assert_eq!(
            TipCategory::classify("부작용 가격 모두 고지"),
            Some(TipCategory::SideEffectDisclosure)
        );
        assert_eq!(
            TipCategory::classify("추가 비용을 명시하세요"),
            Some(TipCategory::PriceDisclosure)
        );
        assert_eq!(
            TipCategory::classify("'100%' 표현을 삭제"),
            Some(TipCategory::ExaggerationSoftening)
        );
        assert_eq!(TipCategory::classify("문단을 나누세요"), None);
    }

    #[test]
    fn test_adherence_add_and_remove_categories() {
        let before = "최고의 결과, 리뷰 이벤트 진행";
        let after = "만족스러운 결과. 부작용과 개인차가 있을 수 있습니다.";
        let tips = vec![
            "부작용 고지 추가".to_string(),
            "리뷰 이벤트 삭제".to_string(),
            "과장 표현 완화".to_string(),
            "분류되지 않는 팁".to_string(),
        ];
        // side effects: 2 of 4 patterns present = 0.5; inducement removed = 1.0;
        // exaggeration removed = 1.0
        let adherence = guideline_adherence(before, after, &tips);
        assert!((adherence - 2.5 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_adherence_is_zero_without_classified_tips() {
        assert_eq!(guideline_adherence("a", "b", &["문장 다듬기".to_string()]), 0.0);
    }

    #[test]
    fn test_flow_counts() {
        let stats = FlowStats::of("첫 문장. 둘째 문장!\n\n셋째 문단입니다? 끝");
        assert_eq!(stats.paragraphs, 2);
        assert_eq!(stats.sentences, 4);

        let empty = FlowStats::of("");
        assert_eq!((empty.paragraphs, empty.sentences, empty.chars), (1, 1, 1));
    }

    #[test]
    fn test_flow_drops_when_structure_changes() {
        let before = "문단 하나.\n\n문단 둘.";
        let after = "문단 하나.\n\n문단 둘.\n\n새 문단 셋.\n\n새 문단 넷.";
        assert!(flow_stability(before, after) < 1.0);
    }

    #[test]
    fn test_score_combines_components() {
        let text = "본문입니다.";
        let result = fit(&[1, 2], &[], text, text, &[]);
        // 0.5 * 1.0 + 0.3 * 0.0 + 0.2 * 1.0
        assert_eq!(result.score_0_100, 70);
        assert_eq!(result.flow_stability, 1.0);
    }

    proptest! {
        #[test]
        fn prop_identical_text_is_fully_stable(text in "[가-힣a-z .!?\n]{0,80}") {
            prop_assert_eq!(flow_stability(&text, &text), 1.0);
        }

        #[test]
        fn prop_components_stay_in_unit_range(
            before in "[가-힣 .\n]{0,60}",
            after in "[가-힣 .\n]{0,60}",
            before_v in prop::collection::vec(1u32..=15, 0..6),
        ) {
            let after_v: Vec<ItemId> = before_v.iter().copied().take(2).collect();
            let result = fit(&before_v, &after_v, &before, &after, &["부작용 추가".to_string()]);
            prop_assert!((0.0..=1.0).contains(&result.risk_reduction_rate));
            prop_assert!((0.0..=1.0).contains(&result.flow_stability));
            prop_assert!(result.score_0_100 <= 100);
        }
    }
}
