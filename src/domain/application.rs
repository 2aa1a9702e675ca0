//! Competition applications.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::document::{Record, new_id};
use super::dto::lenient;
use crate::config::CompetitionConfig;

/// Payment verification state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet verified by an operator.
    #[default]
    Pending,
    /// Verified by an operator.
    Verified,
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            other => Err(format!("Invalid status '{other}'")),
        }
    }
}

/// A submitted competition application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionApplication {
    /// Document identifier.
    pub id: String,
    /// Allocated roll number; immutable once assigned.
    pub roll_number: String,
    pub name: String,
    pub father_name: String,
    pub mother_name: String,
    pub phone: String,
    #[serde(default)]
    pub parent_phone: Option<String>,
    #[serde(default)]
    pub aadhaar: Option<String>,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub age: Option<u32>,
    pub school: String,
    pub class_passed: String,
    pub address: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Reference to the uploaded photograph.
    pub image: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub exam_date: String,
    #[serde(default)]
    pub exam_time: String,
    #[serde(default)]
    pub reporting_time: String,
    #[serde(default)]
    pub exam_center: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_subject() -> String {
    "GK".to_string()
}

impl Record for CompetitionApplication {
    const COLLECTION: &'static str = "competition_applications";

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

impl CompetitionApplication {
    /// Copy of this application carrying a fresh id and the given roll number.
    #[must_use]
    pub fn with_roll_number(&self, roll_number: String) -> Self {
        Self {
            id: new_id(),
            roll_number,
            ..self.clone()
        }
    }
}

/// Intake form for a competition application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompetitionApplication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub parent_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub aadhaar: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub class_passed: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

const MISSING_FIELDS: &str = "Please fill all required fields including student image";

fn present(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl NewCompetitionApplication {
    /// Validate the form and build an application without a roll number.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first failed rule.
    pub fn validate(
        &self,
        rules: &CompetitionConfig,
        today: NaiveDate,
    ) -> Result<CompetitionApplication, String> {
        let required = (
            present(self.name.as_ref()),
            present(self.father_name.as_ref()),
            present(self.mother_name.as_ref()),
            present(self.aadhaar.as_ref()),
            present(self.date_of_birth.as_ref()),
            present(self.school.as_ref()),
            present(self.class_passed.as_ref()),
            present(self.address.as_ref()),
            present(self.image.as_ref()),
        );
        let (
            Some(name),
            Some(father_name),
            Some(mother_name),
            Some(aadhaar),
            Some(date_of_birth),
            Some(school),
            Some(class_passed),
            Some(address),
            Some(image),
        ) = required
        else {
            return Err(MISSING_FIELDS.to_string());
        };

        let phone = present(self.phone.as_ref());
        let parent_phone = present(self.parent_phone.as_ref());
        let Some(primary_phone) = phone.clone().or_else(|| parent_phone.clone()) else {
            return Err(MISSING_FIELDS.to_string());
        };

        if aadhaar.len() != 12 || !aadhaar.bytes().all(|b| b.is_ascii_digit()) {
            return Err("Invalid Aadhaar number".to_string());
        }

        let date_of_birth = parse_date(&date_of_birth)
            .ok_or_else(|| "Invalid dateOfBirth, expected YYYY-MM-DD".to_string())?;
        let age = today
            .years_since(date_of_birth)
            .ok_or_else(|| "dateOfBirth cannot be in the future".to_string())?;
        if age > rules.max_age {
            return Err(format!(
                "Only candidates aged {} or below can register",
                rules.max_age
            ));
        }

        if !rules
            .allowed_classes
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&class_passed))
        {
            return Err("Invalid classPassed value".to_string());
        }

        let now = Utc::now();
        Ok(CompetitionApplication {
            id: new_id(),
            roll_number: String::new(),
            name,
            father_name,
            mother_name,
            parent_phone: parent_phone.or_else(|| phone.clone()),
            phone: primary_phone,
            aadhaar: Some(aadhaar),
            date_of_birth,
            age: Some(age),
            school,
            class_passed,
            address,
            subject: present(self.subject.as_ref()).unwrap_or_else(default_subject),
            image,
            payment_status: PaymentStatus::Pending,
            exam_date: rules.exam_date.clone(),
            exam_time: rules.exam_time.clone(),
            reporting_time: rules.reporting_time.clone(),
            exam_center: rules.exam_center.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Parse a `YYYY-MM-DD` date, also accepting an RFC 3339 timestamp.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}
