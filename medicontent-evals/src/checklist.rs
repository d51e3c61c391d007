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

//! Checklist compilation: rule-source rows plus the built-in base pattern
//! table become per-item compiled regex sets.
//!
//! Compilation never fails. A pattern that does not compile is matched as a
//! literal string instead.

use crate::EvalError;
use medicontent_core::{EvalMode, ItemId};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Compliance item names, indexed by item id - 1
pub const COMPLIANCE_ITEM_NAMES: [&str; 15] = [
    "허위·과장 표현",
    "치료경험담",
    "비급여 진료비 할인",
    "사전심의 미이행",
    "치료 전후 사진",
    "전문의 허위 표시",
    "환자 유인·알선",
    "비의료인 의료광고",
    "객관적 근거 부족",
    "비교 광고",
    "기사형 광고",
    "부작용 정보 누락",
    "인증·보증 허위표시",
    "가격 정보 오표시",
    "연락처 정보 오류",
];

/// SEO item names, indexed by item id - 1
pub const SEO_ITEM_NAMES: [&str; 9] = [
    "제목 글자수 (공백 포함)",
    "제목 글자수 (공백 제외)",
    "본문 글자수 (공백 포함)",
    "본문 글자수 (공백 제외)",
    "총 형태소 개수",
    "총 음절 개수",
    "총 단어 개수",
    "어뷰징 단어 개수",
    "본문 이미지",
];

/// Priority weights used when no report table is available
pub const DEFAULT_COMPLIANCE_WEIGHTS: [f64; 15] = [
    8.6, 8.0, 8.0, 8.0, 7.0, 7.0, 8.0, 7.4, 6.4, 6.4, 6.0, 6.0, 6.0, 6.0, 5.5,
];

/// Literal keywords lifted from the evaluation notes into extra patterns
pub const TRIGGER_KEYWORDS: [&str; 31] = [
    "최고", "유일", "완전", "100%", "부작용 없음", "이벤트", "할인", "전후", "before", "after",
    "리뷰", "후기", "협찬", "가격", "원부터", "심의번호", "전문의", "전문병원", "주의사항",
    "부작용", "개인차", "인증", "상장", "감사장", "추천", "기사형", "보도자료", "인터뷰",
    "타 병원", "최초", "유일",
];

/// Built-in compliance patterns keyed by item id
pub fn base_patterns(item_id: ItemId) -> &'static [&'static str] {
    match item_id {
        1 => &[
            // no trailing \b: "%" followed by a space has no word boundary
            r"\b100\s*%",
            r"부작용\s*없(음|다)",
            r"\b최고\b",
            r"\b유일(한)?\b",
            r"완전\s*무통",
        ],
        2 => &[
            r"후기|경험담|리뷰",
            r"만족도",
            r"치료\s*과정",
            r"치료\s*결과",
            r"협찬|제공\s*받",
        ],
        3 => &[
            r"\d{1,3}\s?%(\s*할인)?",
            r"이벤트\s*가",
            r"행사\s*가",
            r"\b원\s*부터\b",
        ],
        4 => &[r"심의번호", r"심의\s*미이행|미심의"],
        5 => &[
            r"\b전후\b",
            r"\bbefore\b",
            r"\bafter\b",
            r"!\[.*\]\(.*\)",
            r"<img[^>]+>",
        ],
        6 => &[
            r"전문의",
            r"전문병원",
            r"임플란트\s*전문의",
            r"교정\s*전문병원",
        ],
        7 => &[
            r"리뷰\s*이벤트",
            r"추첨",
            r"사은품",
            r"리뷰\s*작성\s*시",
            r"대가|포인트|기프티콘",
        ],
        8 => &[r"인플루언서|일반인\s*광고", r"제휴\s*포스팅"],
        9 => &[r"임상결과|연구결과|데이터", r"근거\s*없(음|다)"],
        10 => &[r"타\s*병원|다른\s*병원", r"최초|최고|유일\s*비교", r"보다\s*낫"],
        11 => &[r"기사형|보도자료|인터뷰\s*형태", r"전문가\s*의견\s*형식"],
        12 => &[r"부작용|주의사항|개인차", r"리스크|합병증"],
        13 => &[r"인증|상장|감사장|추천", r"공식\s*인증"],
        14 => &[r"원\s*부터|최저가|할인\s*가", r"추가\s*비용|부가세"],
        15 => &[r"병원명|주소|전화|연락처", r"오류|불일치"],
        _ => &[],
    }
}

/// Default display name for an item
pub fn item_name(mode: EvalMode, item_id: ItemId) -> &'static str {
    let names: &[&str] = match mode {
        EvalMode::Compliance => &COMPLIANCE_ITEM_NAMES,
        EvalMode::Seo => &SEO_ITEM_NAMES,
    };
    item_id
        .checked_sub(1)
        .and_then(|idx| names.get(idx as usize))
        .copied()
        .unwrap_or("")
}

/// One row of the rule-source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistRow {
    pub id: ItemId,
    pub name: String,

    /// Free-text evaluation guidance, scanned for trigger keywords
    #[serde(default)]
    pub notes: String,

    /// Extra regex patterns appended after the built-in ones
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Rule-source table (`[[items]]` in TOML)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSource {
    #[serde(default)]
    pub items: Vec<ChecklistRow>,
}

impl RuleSource {
    pub fn from_toml_str(content: &str) -> Result<Self, EvalError> {
        toml::from_str(content).map_err(|e| EvalError::RuleSource(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EvalError::RuleSource(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Built-in checklist for a mode
    pub fn builtin(mode: EvalMode) -> Self {
        let items = match mode {
            EvalMode::Compliance => COMPLIANCE_ITEM_NAMES
                .iter()
                .zip(COMPLIANCE_NOTES.iter())
                .enumerate()
                .map(|(idx, (name, notes))| ChecklistRow {
                    id: idx as ItemId + 1,
                    name: (*name).to_string(),
                    notes: (*notes).to_string(),
                    patterns: Vec::new(),
                })
                .collect(),
            EvalMode::Seo => SEO_ITEM_NAMES
                .iter()
                .zip(SEO_NOTES.iter())
                .enumerate()
                .map(|(idx, (name, notes))| ChecklistRow {
                    id: idx as ItemId + 1,
                    name: (*name).to_string(),
                    notes: (*notes).to_string(),
                    patterns: Vec::new(),
                })
                .collect(),
        };
        Self { items }
    }

    /// Load from `path` when given, otherwise the built-in table
    pub fn load(mode: EvalMode, path: Option<&Path>) -> Result<Self, EvalError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin(mode)),
        }
    }

    /// Content hash over the mode, every row and the weight table
    pub fn fingerprint(&self, mode: EvalMode, weights: &BTreeMap<ItemId, f64>) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(mode.as_str().as_bytes());
        for row in &self.items {
            hasher.update(&row.id.to_le_bytes());
            hasher.update(row.name.as_bytes());
            hasher.update(&[0]);
            hasher.update(row.notes.as_bytes());
            hasher.update(&[0]);
            for pattern in &row.patterns {
                hasher.update(pattern.as_bytes());
                hasher.update(&[0]);
            }
        }
        for (id, weight) in weights {
            hasher.update(&id.to_le_bytes());
            hasher.update(&weight.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

const COMPLIANCE_NOTES: [&str; 15] = [
    "절대적 표현('최고', '유일', '100%')이나 무통·무위험 주장 사용 여부",
    "환자 후기, 치료 과정과 결과를 담은 경험담 게시 여부",
    "비급여 진료비 할인, 이벤트 가격 등 가격 유인 표시 여부",
    "심의번호 누락 등 의료광고 사전심의 미이행 여부",
    "치료 전후 사진 또는 비교 이미지 게시 여부",
    "전문의, 전문병원 명칭을 근거 없이 표시하는지 여부",
    "리뷰 이벤트, 추첨, 사은품 등 대가 제공을 통한 환자 유인 여부",
    "비의료인이 의료광고를 하는지 여부",
    "임상 데이터나 연구결과 없이 효과를 주장하는지 여부",
    "타 병원과 비교하여 우위를 주장하는지 여부",
    "광고임을 숨긴 기사 형태의 게시 여부",
    "위험 정보(합병증 등) 고지 누락 여부",
    "공인되지 않은 보증을 표시하는지 여부",
    "진료비와 비용 정보를 잘못 표시하는지 여부",
    "병원명, 주소, 전화 등 연락처 정보의 오류 여부",
];

const SEO_NOTES: [&str; 9] = [
    "제목 글자수(공백 포함) 26~48자 최적",
    "제목 글자수(공백 제외) 15~30자 최적",
    "본문 글자수(공백 포함) 1233~2628자 최적",
    "본문 글자수(공백 제외) 936~1997자 최적",
    "본문 형태소 249~482개 최적",
    "본문 음절 298~632개 최적",
    "본문 단어 82~193개 최적",
    "어뷰징 단어 0~7개 최적",
    "본문 이미지 3~11개 최적",
];

/// One compiled checklist item
#[derive(Debug, Clone)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub name: String,
    pub notes: String,
    pub weight: f64,
    pub patterns: Vec<Regex>,
}

/// Immutable compiled checklist for one rule-source version
#[derive(Debug, Clone)]
pub struct CompiledChecklist {
    mode: EvalMode,
    items: BTreeMap<ItemId, ChecklistItem>,
    weights: BTreeMap<ItemId, f64>,
}

impl CompiledChecklist {
    /// Compile a rule source. Pure function of its inputs.
    pub fn compile(mode: EvalMode, source: &RuleSource, weights: &BTreeMap<ItemId, f64>) -> Self {
        let mut items = BTreeMap::new();

        for row in &source.items {
            let sources = match mode {
                EvalMode::Compliance => pattern_sources(row),
                // SEO items are measured, not pattern-matched
                EvalMode::Seo => Vec::new(),
            };

            let patterns: Vec<Regex> = sources
                .iter()
                .filter(|p| !p.is_empty())
                .filter_map(|p| compile_pattern(row.id, p))
                .collect();

            debug!(item_id = row.id, patterns = patterns.len(), "compiled checklist item");

            items.insert(
                row.id,
                ChecklistItem {
                    id: row.id,
                    name: row.name.clone(),
                    notes: row.notes.clone(),
                    weight: weights.get(&row.id).copied().unwrap_or(0.0),
                    patterns,
                },
            );
        }

        Self {
            mode,
            items,
            weights: weights.clone(),
        }
    }

    /// Built-in checklist with default weights
    pub fn builtin(mode: EvalMode) -> Self {
        Self::compile(mode, &RuleSource::builtin(mode), &default_weights(mode))
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn item(&self, item_id: ItemId) -> Option<&ChecklistItem> {
        self.items.get(&item_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.values()
    }

    /// Compiled patterns of an item, empty when the item has none
    pub fn patterns(&self, item_id: ItemId) -> &[Regex] {
        self.items
            .get(&item_id)
            .map(|item| item.patterns.as_slice())
            .unwrap_or(&[])
    }

    /// Rule-source name, falling back to the built-in name
    pub fn name(&self, item_id: ItemId) -> String {
        match self.items.get(&item_id) {
            Some(item) if !item.name.is_empty() => item.name.clone(),
            _ => item_name(self.mode, item_id).to_string(),
        }
    }

    pub fn weights(&self) -> &BTreeMap<ItemId, f64> {
        &self.weights
    }
}

fn pattern_sources(row: &ChecklistRow) -> Vec<String> {
    let mut sources: Vec<String> = base_patterns(row.id)
        .iter()
        .map(|p| (*p).to_string())
        .collect();
    sources.extend(row.patterns.iter().cloned());

    let notes = row.notes.replace("<br>", "\n");
    for keyword in TRIGGER_KEYWORDS {
        if notes.contains(keyword) {
            let escaped = regex::escape(keyword);
            if !sources.iter().any(|p| p == keyword || *p == escaped) {
                sources.push(escaped);
            }
        }
    }
    sources
}

fn compile_pattern(item_id: ItemId, source: &str) -> Option<Regex> {
    match RegexBuilder::new(source).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(
                item_id,
                pattern = source,
                error = %err,
                "pattern failed to compile, matching it literally"
            );
            RegexBuilder::new(&regex::escape(source))
                .case_insensitive(true)
                .build()
                .ok()
        }
    }
}

/// Default weight table for a mode
pub fn default_weights(mode: EvalMode) -> BTreeMap<ItemId, f64> {
    match mode {
        EvalMode::Compliance => DEFAULT_COMPLIANCE_WEIGHTS
            .iter()
            .enumerate()
            .map(|(idx, w)| (idx as ItemId + 1, *w))
            .collect(),
        EvalMode::Seo => mode.item_ids().map(|id| (id, 1.0)).collect(),
    }
}

/// Only finite, strictly positive weights keep the compliance total in 0-100
pub fn is_usable_weight(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}

/// Parse the priority table of a markdown report.
///
/// The table starts after a header row containing `| 순위 |` and
/// `우선순위 점수`; each row is `| rank | item name | weight | ...`. Item names
/// are matched against the built-in compliance names by containment.
pub fn parse_report_weights(markdown: &str) -> BTreeMap<ItemId, f64> {
    let mut weights = BTreeMap::new();
    let mut in_table = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if !in_table {
            in_table = line.contains("| 순위 |") && line.contains("우선순위 점수");
            continue;
        }
        if trimmed.starts_with("|------") {
            continue;
        }
        if !trimmed.starts_with('|') {
            break;
        }

        let cells: Vec<&str> = trimmed.trim_matches('|').split('|').map(str::trim).collect();
        if cells.len() < 3 {
            continue;
        }
        let item_id = COMPLIANCE_ITEM_NAMES
            .iter()
            .position(|name| cells[1].contains(name))
            .map(|idx| idx as ItemId + 1);
        let (Some(item_id), Ok(weight)) = (item_id, cells[2].parse::<f64>()) else {
            continue;
        };
        if is_usable_weight(weight) {
            weights.insert(item_id, weight);
        } else {
            warn!(item_id, weight, "ignoring non-positive report weight");
        }
    }

    weights
}

/// Weights for a mode, read from a markdown report when one is configured.
///
/// A missing or unreadable report, or one with no usable rows, falls back to
/// the default table.
pub fn load_weights(mode: EvalMode, report_path: Option<&Path>) -> BTreeMap<ItemId, f64> {
    if mode == EvalMode::Seo {
        return default_weights(mode);
    }
    let Some(path) = report_path else {
        return default_weights(mode);
    };

    match std::fs::read_to_string(path) {
        Ok(markdown) => {
            let weights = parse_report_weights(&markdown);
            if weights.is_empty() {
                warn!(path = %path.display(), "no priority table rows, using default weights");
                default_weights(mode)
            } else {
                weights
            }
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "weight report unreadable, using default weights");
            default_weights(mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::weighted_total;
    use std::io::Write;

    #[test]
    fn test_builtin_compliance_checklist_has_all_items() {
        let checklist = CompiledChecklist::builtin(EvalMode::Compliance);
        assert_eq!(checklist.items().count(), 15);
        for id in 1..=15 {
            assert!(!checklist.patterns(id).is_empty(), "item {id} has no patterns");
        }
        assert_eq!(checklist.name(3), "비급여 진료비 할인");
        assert_eq!(checklist.item(1).unwrap().weight, 8.6);
    }

    #[test]
    fn test_seo_checklist_has_no_patterns() {
        let checklist = CompiledChecklist::builtin(EvalMode::Seo);
        assert_eq!(checklist.items().count(), 9);
        assert!(checklist.patterns(1).is_empty());
        assert_eq!(checklist.name(9), "본문 이미지");
    }

    #[test]
    fn test_trigger_keywords_are_appended_once() {
        let source = RuleSource {
            items: vec![ChecklistRow {
                id: 4,
                name: "사전심의 미이행".into(),
                notes: "심의번호 누락, 보도자료<br>보도자료".into(),
                patterns: vec![],
            }],
        };
        let checklist =
            CompiledChecklist::compile(EvalMode::Compliance, &source, &default_weights(EvalMode::Compliance));

        let sources: Vec<&str> = checklist.patterns(4).iter().map(|r| r.as_str()).collect();
        // Base table already has 심의번호 verbatim
        assert_eq!(sources.iter().filter(|s| **s == "심의번호").count(), 1);
        assert_eq!(sources.iter().filter(|s| **s == "보도자료").count(), 1);
        assert_eq!(sources.len(), 3);
    }

    #[test]
    fn test_bad_pattern_falls_back_to_literal() {
        let source = RuleSource {
            items: vec![ChecklistRow {
                id: 99,
                name: "custom".into(),
                notes: String::new(),
                patterns: vec!["(unclosed".into()],
            }],
        };
        let checklist = CompiledChecklist::compile(EvalMode::Compliance, &source, &BTreeMap::new());

        let patterns = checklist.patterns(99);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_match("text with (unclosed paren"));
        assert!(!patterns[0].is_match("unclosed"));
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let checklist = CompiledChecklist::builtin(EvalMode::Compliance);
        assert!(checklist.patterns(5).iter().any(|p| p.is_match("BEFORE photo")));
    }

    #[test]
    fn test_rule_source_from_toml() {
        let source = RuleSource::from_toml_str(
            r#"
            [[items]]
            id = 1
            name = "허위·과장 표현"
            notes = "최고, 유일 표현"

            [[items]]
            id = 12
            name = "부작용 정보 누락"
            patterns = ["합병증\\s*안내"]
            "#,
        )
        .unwrap();
        assert_eq!(source.items.len(), 2);
        assert_eq!(source.items[1].patterns, vec![r"합병증\s*안내".to_string()]);

        assert!(RuleSource::from_toml_str("[[items]]\nname = 3").is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let weights = default_weights(EvalMode::Compliance);
        let a = RuleSource::builtin(EvalMode::Compliance);
        let mut b = a.clone();
        assert_eq!(
            a.fingerprint(EvalMode::Compliance, &weights),
            b.fingerprint(EvalMode::Compliance, &weights)
        );

        b.items[0].notes.push_str(" 추가");
        assert_ne!(
            a.fingerprint(EvalMode::Compliance, &weights),
            b.fingerprint(EvalMode::Compliance, &weights)
        );
    }

    #[test]
    fn test_parse_report_weights() {
        let markdown = "\
# 의료광고 리포트

| 순위 | 항목 | 우선순위 점수 | 비고 |
|------|------|------|------|
| 1 | 허위·과장 표현 | 9.1 | 최우선 |
| 2 | 치료경험담 | 7.5 | |
| 3 | 알 수 없는 항목 | 3.0 | |

본문 계속";
        let weights = parse_report_weights(markdown);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[&1], 9.1);
        assert_eq!(weights[&2], 7.5);
    }

    #[test]
    fn test_parse_report_weights_drops_non_positive_rows() {
        let markdown = "\
| 순위 | 항목 | 우선순위 점수 |
|------|------|------|
| 1 | 허위·과장 표현 | 10 |
| 2 | 치료경험담 | -5 |
| 3 | 비급여 진료비 할인 | 0 |
| 4 | 사전심의 미이행 | NaN |
";
        let weights = parse_report_weights(markdown);
        assert_eq!(weights, BTreeMap::from([(1, 10.0)]));

        let scores = BTreeMap::from([(1, 0), (2, 5)]);
        assert_eq!(weighted_total(&scores, &weights, EvalMode::Compliance), 0.0);
    }

    #[test]
    fn test_load_weights_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# no table here").unwrap();

        let weights = load_weights(EvalMode::Compliance, Some(file.path()));
        assert_eq!(weights.len(), 15);
        assert_eq!(weights[&15], 5.5);

        let weights = load_weights(EvalMode::Compliance, Some(Path::new("/nonexistent/report.md")));
        assert_eq!(weights[&1], 8.6);
    }
}
