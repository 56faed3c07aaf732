//! Job search filter payload.
//!
//! The payload is a plain value: every mutation returns a new payload, so the
//! feed controller can compare the old and new state and decide whether a
//! fetch is needed. An unset field means "no constraint".

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassportType {
    #[serde(rename = "ECR")]
    Ecr,
    #[serde(rename = "ECNR")]
    Ecnr,
    #[serde(rename = "ECR/ECNR")]
    Either,
}

impl PassportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ecr => "ECR",
            Self::Ecnr => "ECNR",
            Self::Either => "ECR/ECNR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ECR" => Some(Self::Ecr),
            "ECNR" => Some(Self::Ecnr),
            "ECR/ECNR" => Some(Self::Either),
            _ => None,
        }
    }
}

/// Contract length in months.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractPeriod {
    #[serde(rename = "12")]
    Months12,
    #[serde(rename = "24")]
    Months24,
    #[serde(rename = "36")]
    Months36,
    #[serde(rename = "more")]
    More,
}

impl ContractPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Months12 => "12",
            Self::Months24 => "24",
            Self::Months36 => "36",
            Self::More => "more",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "12" => Some(Self::Months12),
            "24" => Some(Self::Months24),
            "36" => Some(Self::Months36),
            "more" => Some(Self::More),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExperienceType {
    No,
    National,
    International,
    Any,
}

impl ExperienceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "No",
            Self::National => "National",
            Self::International => "International",
            Self::Any => "Any",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "no" => Some(Self::No),
            "national" => Some(Self::National),
            "international" => Some(Self::International),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Latest,
    Oldest,
    SalaryHigh,
    SalaryLow,
    Deadline,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Oldest => "oldest",
            Self::SalaryHigh => "salary_high",
            Self::SalaryLow => "salary_low",
            Self::Deadline => "deadline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Some(Self::Latest),
            "oldest" => Some(Self::Oldest),
            "salary_high" => Some(Self::SalaryHigh),
            "salary_low" => Some(Self::SalaryLow),
            "deadline" => Some(Self::Deadline),
            _ => None,
        }
    }
}

/// A single (field, value) pair of the payload. Set-valued fields toggle
/// membership; single-valued fields are single-select toggles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterValue {
    Occupation(i64),
    Country(i64),
    Language(String),
    Passport(PassportType),
    Contract(ContractPeriod),
    Experience(ExperienceType),
    Sort(SortBy),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Occupation(id) => write!(f, "occupation:{}", id),
            Self::Country(id) => write!(f, "country:{}", id),
            Self::Language(l) => write!(f, "language:{}", l),
            Self::Passport(p) => write!(f, "passport:{}", p.as_str()),
            Self::Contract(c) => write!(f, "contract:{}", c.as_str()),
            Self::Experience(e) => write!(f, "experience:{}", e.as_str()),
            Self::Sort(s) => write!(f, "sort:{}", s.as_str()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct FilterPayload {
    #[serde(rename = "departments", skip_serializing_if = "BTreeSet::is_empty", default)]
    pub occupation_ids: BTreeSet<i64>,
    #[serde(rename = "countries", skip_serializing_if = "BTreeSet::is_empty", default)]
    pub country_ids: BTreeSet<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub passport_type: Option<PassportType>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub languages: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contract_period: Option<ContractPeriod>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub experience_type: Option<ExperienceType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sort_by: Option<SortBy>,
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

fn select<T: PartialEq>(slot: &mut Option<T>, value: T) {
    if slot.as_ref() == Some(&value) {
        *slot = None;
    } else {
        *slot = Some(value);
    }
}

fn deselect<T: PartialEq>(slot: &mut Option<T>, value: &T) {
    if slot.as_ref() == Some(value) {
        *slot = None;
    }
}

impl FilterPayload {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn contains(&self, value: &FilterValue) -> bool {
        match value {
            FilterValue::Occupation(id) => self.occupation_ids.contains(id),
            FilterValue::Country(id) => self.country_ids.contains(id),
            FilterValue::Language(l) => self.languages.contains(l),
            FilterValue::Passport(p) => self.passport_type == Some(*p),
            FilterValue::Contract(c) => self.contract_period == Some(*c),
            FilterValue::Experience(e) => self.experience_type == Some(*e),
            FilterValue::Sort(s) => self.sort_by == Some(*s),
        }
    }

    pub fn apply(&self, value: FilterValue) -> Self {
        let mut next = self.clone();
        match value {
            FilterValue::Occupation(id) => toggle(&mut next.occupation_ids, id),
            FilterValue::Country(id) => toggle(&mut next.country_ids, id),
            FilterValue::Language(l) => toggle(&mut next.languages, l),
            FilterValue::Passport(p) => select(&mut next.passport_type, p),
            FilterValue::Contract(c) => select(&mut next.contract_period, c),
            FilterValue::Experience(e) => select(&mut next.experience_type, e),
            FilterValue::Sort(s) => select(&mut next.sort_by, s),
        }
        next
    }

    /// Badge dismissal. Removing a value that is not active is a no-op.
    pub fn remove(&self, value: &FilterValue) -> Self {
        let mut next = self.clone();
        match value {
            FilterValue::Occupation(id) => {
                next.occupation_ids.remove(id);
            }
            FilterValue::Country(id) => {
                next.country_ids.remove(id);
            }
            FilterValue::Language(l) => {
                next.languages.remove(l);
            }
            FilterValue::Passport(p) => deselect(&mut next.passport_type, p),
            FilterValue::Contract(c) => deselect(&mut next.contract_period, c),
            FilterValue::Experience(e) => deselect(&mut next.experience_type, e),
            FilterValue::Sort(s) => deselect(&mut next.sort_by, s),
        }
        next
    }

    pub fn clear(&self) -> Self {
        Self::default()
    }

    /// Active values in a stable order, one badge each.
    pub fn badges(&self) -> Vec<FilterValue> {
        let mut out = Vec::new();
        out.extend(self.occupation_ids.iter().map(|id| FilterValue::Occupation(*id)));
        out.extend(self.country_ids.iter().map(|id| FilterValue::Country(*id)));
        out.extend(self.passport_type.map(FilterValue::Passport));
        out.extend(self.languages.iter().cloned().map(FilterValue::Language));
        out.extend(self.contract_period.map(FilterValue::Contract));
        out.extend(self.experience_type.map(FilterValue::Experience));
        out.extend(self.sort_by.map(FilterValue::Sort));
        out
    }

    /// Multipart rendition: array fields use the repeated `name[]` convention.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for id in &self.occupation_ids {
            fields.push(("departments[]".to_string(), id.to_string()));
        }
        for id in &self.country_ids {
            fields.push(("countries[]".to_string(), id.to_string()));
        }
        if let Some(p) = self.passport_type {
            fields.push(("passport_type".to_string(), p.as_str().to_string()));
        }
        for l in &self.languages {
            fields.push(("languages[]".to_string(), l.clone()));
        }
        if let Some(c) = self.contract_period {
            fields.push(("contract_period".to_string(), c.as_str().to_string()));
        }
        if let Some(e) = self.experience_type {
            fields.push(("experience_type".to_string(), e.as_str().to_string()));
        }
        if let Some(s) = self.sort_by {
            fields.push(("sort_by".to_string(), s.as_str().to_string()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn every_kind() -> Vec<FilterValue> {
        vec![
            FilterValue::Occupation(3),
            FilterValue::Country(14),
            FilterValue::Language("Arabic".to_string()),
            FilterValue::Passport(PassportType::Ecnr),
            FilterValue::Contract(ContractPeriod::Months24),
            FilterValue::Experience(ExperienceType::International),
            FilterValue::Sort(SortBy::SalaryHigh),
        ]
    }

    // single-valued fields hold the same values as `every_kind`, where the
    // double-apply round trip is defined
    fn busy_payload() -> FilterPayload {
        FilterPayload::default()
            .apply(FilterValue::Occupation(1))
            .apply(FilterValue::Country(2))
            .apply(FilterValue::Passport(PassportType::Ecnr))
            .apply(FilterValue::Sort(SortBy::SalaryHigh))
    }

    #[test]
    fn test_single_select_over_other_value_clears_on_second_apply() {
        let start = FilterPayload::default().apply(FilterValue::Sort(SortBy::Latest));
        let once = start.apply(FilterValue::Sort(SortBy::Oldest));
        assert_eq!(once.sort_by, Some(SortBy::Oldest));
        assert_eq!(once.apply(FilterValue::Sort(SortBy::Oldest)).sort_by, None);
    }

    #[test]
    fn test_double_apply_restores_payload() {
        for start in [FilterPayload::default(), busy_payload()] {
            for value in every_kind() {
                let twice = start.apply(value.clone()).apply(value.clone());
                assert_eq!(twice, start, "toggling {} twice", value);
            }
        }
    }

    #[test]
    fn test_remove_then_apply_equals_apply() {
        for value in every_kind() {
            let empty = FilterPayload::default();
            let direct = empty.apply(value.clone());
            let via_remove = empty.remove(&value).apply(value.clone());
            assert_eq!(via_remove, direct, "value {}", value);
        }
    }

    #[test]
    fn test_single_select_replaces_other_value() {
        let p = FilterPayload::default()
            .apply(FilterValue::Passport(PassportType::Ecr))
            .apply(FilterValue::Passport(PassportType::Ecnr));
        assert_eq!(p.passport_type, Some(PassportType::Ecnr));

        // dismissing a value that is not selected leaves the other one alone
        let q = p.remove(&FilterValue::Passport(PassportType::Ecr));
        assert_eq!(q.passport_type, Some(PassportType::Ecnr));
    }

    #[test]
    fn test_set_fields_accumulate() {
        let p = FilterPayload::default()
            .apply(FilterValue::Occupation(3))
            .apply(FilterValue::Occupation(5))
            .apply(FilterValue::Language("Hindi".to_string()));
        assert_eq!(p.occupation_ids.iter().copied().collect::<Vec<_>>(), vec![3, 5]);
        assert!(p.contains(&FilterValue::Language("Hindi".to_string())));

        let p = p.remove(&FilterValue::Occupation(3));
        assert_eq!(p.occupation_ids.len(), 1);
        assert!(p.clear().is_empty());
    }

    #[test]
    fn test_badges_follow_payload() {
        let p = busy_payload();
        assert_eq!(
            p.badges(),
            vec![
                FilterValue::Occupation(1),
                FilterValue::Country(2),
                FilterValue::Passport(PassportType::Ecnr),
                FilterValue::Sort(SortBy::SalaryHigh),
            ]
        );
        let dismissed = p.badges().iter().fold(p.clone(), |acc, b| acc.remove(b));
        assert!(dismissed.is_empty());
    }

    #[test]
    fn test_empty_payload_serializes_to_no_constraints() {
        assert_eq!(serde_json::to_value(FilterPayload::default()).unwrap(), json!({}));

        let p = FilterPayload::default()
            .apply(FilterValue::Occupation(3))
            .apply(FilterValue::Passport(PassportType::Either))
            .apply(FilterValue::Contract(ContractPeriod::More))
            .apply(FilterValue::Experience(ExperienceType::No));
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({
                "departments": [3],
                "passport_type": "ECR/ECNR",
                "contract_period": "more",
                "experience_type": "No"
            })
        );
    }

    #[test]
    fn test_form_fields_repeat_array_entries() {
        let p = FilterPayload::default()
            .apply(FilterValue::Country(4))
            .apply(FilterValue::Country(9))
            .apply(FilterValue::Sort(SortBy::Deadline));
        assert_eq!(
            p.form_fields(),
            vec![
                ("countries[]".to_string(), "4".to_string()),
                ("countries[]".to_string(), "9".to_string()),
                ("sort_by".to_string(), "deadline".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(PassportType::parse("ecr/ecnr"), Some(PassportType::Either));
        assert_eq!(ContractPeriod::parse("36"), Some(ContractPeriod::Months36));
        assert_eq!(ExperienceType::parse("Any"), Some(ExperienceType::Any));
        assert_eq!(SortBy::parse("salary_low"), Some(SortBy::SalaryLow));
        assert_eq!(SortBy::parse(""), None);
    }
}
