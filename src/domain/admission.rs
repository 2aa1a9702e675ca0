//! Course admissions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::application::parse_date;
use super::document::{Record, new_id};
use super::dto::lenient;

/// Review state of an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl std::str::FromStr for AdmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            other => Err(format!(
                "Invalid status '{other}', expected Pending, Approved or Rejected"
            )),
        }
    }
}

/// A course admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub id: String,
    pub roll_number: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub education: String,
    pub application_date: DateTime<Utc>,
    #[serde(default)]
    pub status: AdmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Admission {
    const COLLECTION: &'static str = "admissions";

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

impl Admission {
    /// Copy of this admission carrying a fresh id and the given roll number.
    #[must_use]
    pub fn with_roll_number(&self, roll_number: String) -> Self {
        Self {
            id: new_id(),
            roll_number,
            ..self.clone()
        }
    }
}

/// Admission form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
}

fn required(field: &str, value: Option<&String>) -> Result<String, String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| format!("{field} is required"))
}

impl NewAdmission {
    /// Validate the form and build an admission without a roll number.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or malformed field.
    pub fn validate(&self) -> Result<Admission, String> {
        let name = required("name", self.name.as_ref())?;
        let email = required("email", self.email.as_ref())?;
        let phone = required("phone", self.phone.as_ref())?;
        let course = required("course", self.course.as_ref())?;
        let date_of_birth = required("dateOfBirth", self.date_of_birth.as_ref())?;
        let address = required("address", self.address.as_ref())?;
        let education = required("education", self.education.as_ref())?;

        if !email.contains('@') {
            return Err("email is invalid".to_string());
        }
        let date_of_birth = parse_date(&date_of_birth)
            .ok_or_else(|| "dateOfBirth is invalid, expected YYYY-MM-DD".to_string())?;

        let now = Utc::now();
        Ok(Admission {
            id: new_id(),
            roll_number: String::new(),
            name,
            email,
            phone,
            course,
            date_of_birth,
            address,
            education,
            application_date: now,
            status: AdmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }
}
