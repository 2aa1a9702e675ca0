//! Rank computation over exam results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ExamResult, RankChange};

/// Sort results by marks, highest first.
///
/// Equal marks keep creation order, so the earlier entry ranks higher.
pub fn order_by_marks(results: &mut [ExamResult]) {
    results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    results.sort_by(|a, b| b.marks.total_cmp(&a.marks));
}

/// Rank already ordered results `1..=n` and report the ranks that moved.
pub fn assign_ranks(results: &mut [ExamResult]) -> Vec<RankChange> {
    let mut changes = Vec::new();
    for (index, result) in results.iter_mut().enumerate() {
        let new_rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if result.rank != new_rank {
            changes.push(RankChange {
                roll_number: result.roll_number.clone(),
                name: result.name.clone(),
                marks: result.marks,
                old_rank: result.rank,
                new_rank,
            });
            result.rank = new_rank;
        }
    }
    changes
}

/// Stored rank of one result next to the rank its marks earn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCheck {
    pub roll_number: String,
    pub name: String,
    pub marks: f64,
    pub stored_rank: u32,
    pub expected_rank: u32,
}

impl RankCheck {
    /// Whether the stored rank is wrong.
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        self.stored_rank != self.expected_rank
    }
}

/// Rank verification report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankVerification {
    /// Top results by marks.
    pub checks: Vec<RankCheck>,
    /// Subset of `checks` whose stored rank is wrong.
    pub mismatches: Vec<RankCheck>,
}

/// Compare stored ranks of the top `top` results against their marks.
#[must_use]
pub fn verify(mut results: Vec<ExamResult>, top: usize) -> RankVerification {
    order_by_marks(&mut results);
    let checks: Vec<RankCheck> = results
        .iter()
        .take(top)
        .enumerate()
        .map(|(index, result)| RankCheck {
            roll_number: result.roll_number.clone(),
            name: result.name.clone(),
            marks: result.marks,
            stored_rank: result.rank,
            expected_rank: u32::try_from(index + 1).unwrap_or(u32::MAX),
        })
        .collect();
    let mismatches = checks.iter().filter(|c| c.is_mismatch()).cloned().collect();
    RankVerification { checks, mismatches }
}

/// Roll number with one leading prefix from `prefixes` removed.
#[must_use]
pub fn base_roll_number<'a>(roll_number: &'a str, prefixes: &[String]) -> &'a str {
    prefixes
        .iter()
        .find_map(|prefix| roll_number.strip_prefix(prefix.as_str()))
        .unwrap_or(roll_number)
}

/// Split results into the entry to keep and the duplicates to drop.
///
/// Results are grouped by base roll number; in each group of two or more
/// the most recently created entry is kept.
#[must_use]
pub fn split_duplicates(
    results: Vec<ExamResult>,
    prefixes: &[String],
) -> (Vec<ExamResult>, Vec<ExamResult>) {
    let mut groups: BTreeMap<String, Vec<ExamResult>> = BTreeMap::new();
    for result in results {
        let base = base_roll_number(&result.roll_number, prefixes).to_string();
        groups.entry(base).or_default().push(result);
    }

    let mut keep = Vec::new();
    let mut drop = Vec::new();
    for mut group in groups.into_values() {
        group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut entries = group.into_iter();
        if let Some(latest) = entries.next() {
            keep.push(latest);
        }
        drop.extend(entries);
    }
    (keep, drop)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::ResultInput;
    use chrono::{Duration, Utc};

    pub(crate) fn result(roll: &str, marks: f64, rank: i64, age_minutes: i64) -> ExamResult {
        let mut result = ResultInput {
            roll_number: Some(roll.to_string()),
            name: Some(format!("Student {roll}")),
            father_name: Some("Father".to_string()),
            subject: Some("Computer".to_string()),
            marks: Some(marks),
            rank: Some(rank),
            exam_date: Some("2024-10-18".to_string()),
            ..Default::default()
        }
        .into_new_result()
        .unwrap();
        result.created_at = Utc::now() - Duration::minutes(age_minutes);
        result
    }

    #[test]
    fn test_assign_ranks_reports_changes() {
        let mut results = vec![
            result("SK1001", 40.0, 1, 3),
            result("SK1002", 90.0, 2, 2),
            result("SK1003", 70.0, 3, 1),
        ];
        order_by_marks(&mut results);
        let changes = assign_ranks(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.roll_number.as_str()).collect();
        assert_eq!(order, vec!["SK1002", "SK1003", "SK1001"]);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].old_rank, 2);
        assert_eq!(changes[0].new_rank, 1);

        assert!(assign_ranks(&mut results).is_empty());
    }

    #[test]
    fn test_ties_keep_creation_order() {
        let mut results = vec![
            result("SK1002", 50.0, 1, 1),
            result("SK1001", 50.0, 1, 5),
        ];
        order_by_marks(&mut results);
        assert_eq!(results[0].roll_number, "SK1001");
    }

    #[test]
    fn test_verify_flags_mismatches() {
        let results = vec![
            result("SK1001", 95.0, 1, 1),
            result("SK1002", 80.0, 5, 1),
            result("SK1003", 10.0, 3, 1),
        ];
        let report = verify(results, 2);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].roll_number, "SK1002");
        assert_eq!(report.mismatches[0].expected_rank, 2);
    }

    #[test]
    fn test_base_roll_number() {
        let prefixes = vec!["GK".to_string(), "SK".to_string()];
        assert_eq!(base_roll_number("GK1158", &prefixes), "1158");
        assert_eq!(base_roll_number("SK1158", &prefixes), "1158");
        assert_eq!(base_roll_number("1158", &prefixes), "1158");
    }

    #[test]
    fn test_split_duplicates_keeps_latest() {
        let prefixes = vec!["GK".to_string(), "SK".to_string()];
        let results = vec![
            result("GK1158", 88.0, 1, 30),
            result("SK1158", 88.0, 2, 5),
            result("SK1004", 60.0, 3, 10),
        ];
        let (keep, drop) = split_duplicates(results, &prefixes);

        assert_eq!(keep.len(), 2);
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].roll_number, "GK1158");
        assert!(keep.iter().any(|r| r.roll_number == "SK1158"));
    }
}
