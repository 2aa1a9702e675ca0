//! Exam results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::application::parse_date;
use super::document::{Record, new_id};
use super::dto::lenient;

/// Competition subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "GK")]
    Gk,
    Computer,
    Both,
}

impl std::str::FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GK" => Ok(Self::Gk),
            "Computer" => Ok(Self::Computer),
            "Both" => Ok(Self::Both),
            _ => Err("Invalid subject. Must be GK, Computer, or Both".to_string()),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gk => write!(f, "GK"),
            Self::Computer => write!(f, "Computer"),
            Self::Both => write!(f, "Both"),
        }
    }
}

/// Pass/fail outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultStatus {
    #[default]
    Passed,
    Failed,
}

impl std::str::FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Passed" => Ok(Self::Passed),
            "Failed" => Ok(Self::Failed),
            other => Err(format!("Invalid status '{other}'")),
        }
    }
}

/// Letter grade derived from the percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
}

impl Grade {
    /// Grade for a whole percentage.
    #[must_use]
    pub const fn from_percentage(percentage: i64) -> Self {
        match percentage {
            90.. => Self::APlus,
            80..=89 => Self::A,
            70..=79 => Self::BPlus,
            60..=69 => Self::B,
            50..=59 => Self::CPlus,
            40..=49 => Self::C,
            33..=39 => Self::D,
            _ => Self::F,
        }
    }
}

const fn default_total_marks() -> f64 {
    100.0
}

fn default_created_by() -> String {
    "admin".to_string()
}

/// A published or pending exam result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: String,
    /// Normalized (trimmed, upper-case) roll number.
    pub roll_number: String,
    pub name: String,
    pub father_name: String,
    #[serde(default)]
    pub mother_name: Option<String>,
    pub subject: Subject,
    pub marks: f64,
    pub rank: u32,
    pub exam_date: NaiveDate,
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_total_marks")]
    pub total_marks: f64,
    #[serde(default)]
    pub percentage: Option<i64>,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default = "default_created_by")]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ExamResult {
    const COLLECTION: &'static str = "results";

    fn id(&self) -> &str {
        &self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.roll_number)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl ExamResult {
    /// Recompute `percentage` and `grade` from the marks.
    #[allow(clippy::cast_possible_truncation)]
    pub fn derive_grade(&mut self) {
        let percentage = ((self.marks / self.total_marks) * 100.0).round() as i64;
        self.percentage = Some(percentage);
        self.grade = Some(Grade::from_percentage(percentage));
    }

    /// Check the stored invariants.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first violated rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.roll_number.is_empty() {
            return Err("rollNumber is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.father_name.trim().is_empty() {
            return Err("fatherName is required".to_string());
        }
        if !self.total_marks.is_finite() || self.total_marks <= 0.0 {
            return Err("totalMarks must be positive".to_string());
        }
        if !self.marks.is_finite() || !(0.0..=100.0).contains(&self.marks) {
            return Err("marks must be between 0 and 100".to_string());
        }
        if self.rank < 1 {
            return Err("rank must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Normalize a roll number the way results are stored.
#[must_use]
pub fn normalize_roll_number(roll_number: &str) -> String {
    roll_number.trim().to_uppercase()
}

/// Result fields as submitted by an operator or an import.
///
/// Every field is optional so the same shape serves both creation and
/// partial updates of an existing result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInput {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub exam_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub total_marks: Option<f64>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl From<&ExamResult> for ResultInput {
    fn from(result: &ExamResult) -> Self {
        Self {
            roll_number: Some(result.roll_number.clone()),
            name: Some(result.name.clone()),
            father_name: Some(result.father_name.clone()),
            mother_name: result.mother_name.clone(),
            subject: Some(result.subject.to_string()),
            marks: Some(result.marks),
            rank: Some(i64::from(result.rank)),
            exam_date: Some(result.exam_date.format("%Y-%m-%d").to_string()),
            status: Some(
                match result.status {
                    ResultStatus::Passed => "Passed",
                    ResultStatus::Failed => "Failed",
                }
                .to_string(),
            ),
            class_name: result.class_name.clone(),
            school: result.school.clone(),
            phone: result.phone.clone(),
            address: result.address.clone(),
            total_marks: Some(result.total_marks),
            remarks: result.remarks.clone(),
            is_published: Some(result.is_published),
            published_at: result.published_at,
            created_by: Some(result.created_by.clone()),
            created_at: Some(result.created_at),
        }
    }
}

impl ResultInput {
    /// Names of required fields that are absent, in declaration order.
    #[must_use]
    pub fn missing_required(&self) -> Option<&'static str> {
        if trimmed(self.roll_number.as_ref()).is_none() {
            return Some("rollNumber");
        }
        if trimmed(self.name.as_ref()).is_none() {
            return Some("name");
        }
        if trimmed(self.father_name.as_ref()).is_none() {
            return Some("fatherName");
        }
        if trimmed(self.subject.as_ref()).is_none() {
            return Some("subject");
        }
        if self.marks.is_none() {
            return Some("marks");
        }
        if self.rank.is_none() {
            return Some("rank");
        }
        if trimmed(self.exam_date.as_ref()).is_none() {
            return Some("examDate");
        }
        None
    }

    /// Normalized roll number, if one was submitted.
    #[must_use]
    pub fn normalized_roll_number(&self) -> Option<String> {
        trimmed(self.roll_number.as_ref()).map(|r| normalize_roll_number(&r))
    }

    /// Build a new result from a complete input.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or invalid field.
    pub fn into_new_result(self) -> Result<ExamResult, String> {
        if let Some(field) = self.missing_required() {
            return Err(format!("{field} is required"));
        }

        let now = Utc::now();
        let mut result = ExamResult {
            id: new_id(),
            roll_number: self.normalized_roll_number().unwrap_or_default(),
            name: String::new(),
            father_name: String::new(),
            mother_name: None,
            subject: Subject::Gk,
            marks: 0.0,
            rank: 1,
            exam_date: NaiveDate::default(),
            status: ResultStatus::Passed,
            class_name: None,
            school: None,
            phone: None,
            address: None,
            total_marks: default_total_marks(),
            percentage: None,
            grade: None,
            remarks: None,
            is_published: false,
            published_at: None,
            created_by: default_created_by(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        };
        self.apply_to(&mut result)?;
        Ok(result)
    }

    /// Overwrite the fields of `result` that this input carries.
    ///
    /// The roll number is never changed. `percentage` and `grade` are
    /// re-derived and the result is re-validated.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn apply_to(self, result: &mut ExamResult) -> Result<(), String> {
        if let Some(name) = trimmed(self.name.as_ref()) {
            result.name = name;
        }
        if let Some(father_name) = trimmed(self.father_name.as_ref()) {
            result.father_name = father_name;
        }
        if let Some(mother_name) = trimmed(self.mother_name.as_ref()) {
            result.mother_name = Some(mother_name);
        }
        if let Some(subject) = trimmed(self.subject.as_ref()) {
            result.subject = subject.parse()?;
        }
        if let Some(marks) = self.marks {
            result.marks = marks;
        }
        if let Some(rank) = self.rank {
            result.rank = u32::try_from(rank)
                .ok()
                .filter(|r| *r >= 1)
                .ok_or_else(|| "rank must be at least 1".to_string())?;
        }
        if let Some(exam_date) = trimmed(self.exam_date.as_ref()) {
            result.exam_date = parse_date(&exam_date)
                .ok_or_else(|| "examDate is invalid, expected YYYY-MM-DD".to_string())?;
        }
        if let Some(status) = trimmed(self.status.as_ref()) {
            result.status = status.parse()?;
        }
        if let Some(class_name) = trimmed(self.class_name.as_ref()) {
            result.class_name = Some(class_name);
        }
        if let Some(school) = trimmed(self.school.as_ref()) {
            result.school = Some(school);
        }
        if let Some(phone) = trimmed(self.phone.as_ref()) {
            result.phone = Some(phone);
        }
        if let Some(address) = trimmed(self.address.as_ref()) {
            result.address = Some(address);
        }
        if let Some(total_marks) = self.total_marks {
            result.total_marks = total_marks;
        }
        if let Some(remarks) = trimmed(self.remarks.as_ref()) {
            result.remarks = Some(remarks);
        }
        if let Some(is_published) = self.is_published {
            result.is_published = is_published;
        }
        if self.published_at.is_some() {
            result.published_at = self.published_at;
        }
        if let Some(created_by) = trimmed(self.created_by.as_ref()) {
            result.created_by = created_by;
        }

        result.updated_at = Utc::now();
        result.validate()?;
        result.derive_grade();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ResultInput {
        ResultInput {
            roll_number: Some(" sk1158 ".to_string()),
            name: Some("Ajay".to_string()),
            father_name: Some("Vijay".to_string()),
            subject: Some("GK".to_string()),
            marks: Some(87.5),
            rank: Some(1),
            exam_date: Some("2024-10-20".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_percentage(100), Grade::APlus);
        assert_eq!(Grade::from_percentage(90), Grade::APlus);
        assert_eq!(Grade::from_percentage(89), Grade::A);
        assert_eq!(Grade::from_percentage(70), Grade::BPlus);
        assert_eq!(Grade::from_percentage(60), Grade::B);
        assert_eq!(Grade::from_percentage(50), Grade::CPlus);
        assert_eq!(Grade::from_percentage(40), Grade::C);
        assert_eq!(Grade::from_percentage(33), Grade::D);
        assert_eq!(Grade::from_percentage(32), Grade::F);
    }

    #[test]
    fn test_into_new_result() {
        let result = input().into_new_result().unwrap();
        assert_eq!(result.roll_number, "SK1158");
        assert_eq!(result.percentage, Some(88));
        assert_eq!(result.grade, Some(Grade::A));
        assert!(!result.is_published);
        assert_eq!(result.created_by, "admin");
    }

    #[test]
    fn test_missing_required() {
        let mut i = input();
        i.marks = None;
        assert_eq!(i.missing_required(), Some("marks"));
        assert_eq!(i.into_new_result(), Err("marks is required".to_string()));
    }

    #[test]
    fn test_zero_marks_accepted() {
        let mut i = input();
        i.marks = Some(0.0);
        let result = i.into_new_result().unwrap();
        assert_eq!(result.grade, Some(Grade::F));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut i = input();
        i.marks = Some(101.0);
        assert!(i.into_new_result().is_err());

        let mut i = input();
        i.rank = Some(0);
        assert!(i.into_new_result().is_err());

        let mut i = input();
        i.subject = Some("Maths".to_string());
        assert!(i.into_new_result().is_err());
    }

    #[test]
    fn test_apply_keeps_roll_number() {
        let mut result = input().into_new_result().unwrap();
        let update = ResultInput {
            roll_number: Some("SK9999".to_string()),
            marks: Some(30.0),
            ..Default::default()
        };
        update.apply_to(&mut result).unwrap();
        assert_eq!(result.roll_number, "SK1158");
        assert_eq!(result.marks, 30.0);
        assert_eq!(result.grade, Some(Grade::F));
    }

    #[test]
    fn test_subject_wire_names() {
        assert_eq!(serde_json::to_value(Subject::Gk).unwrap(), "GK");
        assert_eq!(serde_json::to_value(Grade::BPlus).unwrap(), "B+");
        assert_eq!("Computer".parse(), Ok(Subject::Computer));
    }
}
