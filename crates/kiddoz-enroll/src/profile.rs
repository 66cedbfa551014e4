//! Child and guardian profile form model.
//!
//! [`ProfileFields`] is the raw form input exactly as the user typed it.
//! [`validate`] turns it into a [`ChildProfile`] or reports every problem at
//! once. Validation is a pure function of its input.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw profile form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    /// Child's full name.
    pub name: String,
    /// Child's age in years, as typed.
    pub age: String,
    /// Child's gender, as typed or selected.
    pub gender: String,
    /// Allergies or conditions.
    pub allergies: String,
    /// Dietary restrictions.
    pub dietary_restrictions: String,
    /// Medical conditions.
    pub medical_conditions: String,
    /// Primary doctor name.
    pub doctor_name: String,
    /// Primary doctor phone.
    pub doctor_phone: String,
    /// Parent or guardian name.
    pub guardian_name: String,
    /// Parent or guardian phone.
    pub guardian_phone: String,
    /// Emergency contact name.
    pub emergency_name: String,
    /// Emergency contact phone.
    pub emergency_phone: String,
}

/// Child gender as recorded on enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Boy.
    Boy,
    /// Girl.
    Girl,
    /// Not specified by the guardian.
    Unspecified,
}

impl Gender {
    /// Parse a form value, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "boy" | "male" => Some(Self::Boy),
            "girl" | "female" => Some(Self::Girl),
            "unspecified" | "other" | "prefer not to say" => Some(Self::Unspecified),
            _ => None,
        }
    }

    /// Stable lowercase name used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boy => "boy",
            Self::Girl => "girl",
            Self::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated child profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProfile {
    /// Child's full name.
    pub name: String,
    /// Age in whole years, always positive.
    pub age: u8,
    /// Gender.
    pub gender: Gender,
    /// Allergy notes.
    pub allergies: Option<String>,
    /// Dietary restrictions.
    pub dietary_restrictions: Option<String>,
    /// Medical conditions.
    pub medical_conditions: Option<String>,
    /// Primary doctor name.
    pub doctor_name: Option<String>,
    /// Primary doctor phone.
    pub doctor_phone: Option<String>,
    /// Guardian name.
    pub guardian_name: String,
    /// Guardian phone.
    pub guardian_phone: String,
    /// Emergency contact name.
    pub emergency_name: Option<String>,
    /// Emergency contact phone.
    pub emergency_phone: Option<String>,
}

/// A profile form field, used as the key of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    /// Child's name.
    Name,
    /// Child's age.
    Age,
    /// Child's gender.
    Gender,
    /// Doctor phone.
    DoctorPhone,
    /// Guardian name.
    GuardianName,
    /// Guardian phone.
    GuardianPhone,
    /// Emergency contact phone.
    EmergencyPhone,
}

impl ProfileField {
    /// Fields that must be filled in before the form can advance.
    pub const REQUIRED: [Self; 5] = [
        Self::Name,
        Self::Age,
        Self::Gender,
        Self::GuardianName,
        Self::GuardianPhone,
    ];

    /// Field name as used in form payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::DoctorPhone => "doctor_phone",
            Self::GuardianName => "guardian_name",
            Self::GuardianPhone => "guardian_phone",
            Self::EmergencyPhone => "emergency_phone",
        }
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation failures, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<ProfileField, String>);

impl ValidationErrors {
    fn add(&mut self, field: ProfileField, reason: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| reason.into());
    }

    /// Whether `field` failed validation.
    #[must_use]
    pub fn contains(&self, field: ProfileField) -> bool {
        self.0.contains_key(&field)
    }

    /// The reason `field` failed, if it did.
    #[must_use]
    pub fn reason(&self, field: ProfileField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Iterate failures in field order.
    pub fn iter(&self) -> impl Iterator<Item = (ProfileField, &str)> {
        self.0.iter().map(|(field, reason)| (*field, reason.as_str()))
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, reason) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {reason}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Outcome of validating a profile form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The input forms a complete profile.
    Valid(ChildProfile),
    /// One or more fields are missing or malformed.
    Invalid(ValidationErrors),
}

impl ValidationResult {
    /// True for [`ValidationResult::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The validation errors, if any.
    #[must_use]
    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(errors) => Some(errors),
        }
    }
}

const REQUIRED: &str = "This field is required";

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\+?[0-9()\-. ]+$").unwrap_or_else(|err| panic!("phone pattern: {err}"))
    })
}

fn is_phone(value: &str) -> bool {
    let value = value.trim();
    phone_pattern().is_match(value) && value.chars().filter(char::is_ascii_digit).count() >= 5
}

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Validate raw form input.
///
/// Required fields are child name, age, gender, guardian name, and guardian
/// phone. Text is kept verbatim; blank means empty after trimming.
#[must_use]
pub fn validate(fields: &ProfileFields) -> ValidationResult {
    let mut errors = ValidationErrors::default();

    let required = [
        (ProfileField::Name, &fields.name),
        (ProfileField::Age, &fields.age),
        (ProfileField::Gender, &fields.gender),
        (ProfileField::GuardianName, &fields.guardian_name),
        (ProfileField::GuardianPhone, &fields.guardian_phone),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.add(field, REQUIRED);
        }
    }

    let age = match fields.age.trim().parse::<u8>() {
        Ok(age) if age > 0 => Some(age),
        _ => {
            errors.add(ProfileField::Age, "Age must be a positive whole number");
            None
        }
    };

    let gender = Gender::parse(&fields.gender);
    if gender.is_none() {
        errors.add(ProfileField::Gender, "Choose boy, girl, or prefer not to say");
    }

    if !is_phone(&fields.guardian_phone) {
        errors.add(ProfileField::GuardianPhone, "Enter a valid phone number");
    }
    for (field, value) in [
        (ProfileField::DoctorPhone, &fields.doctor_phone),
        (ProfileField::EmergencyPhone, &fields.emergency_phone),
    ] {
        if !value.trim().is_empty() && !is_phone(value) {
            errors.add(field, "Enter a valid phone number");
        }
    }

    match (age, gender) {
        (Some(age), Some(gender)) if errors.is_empty() => ValidationResult::Valid(ChildProfile {
            name: fields.name.clone(),
            age,
            gender,
            allergies: optional(&fields.allergies),
            dietary_restrictions: optional(&fields.dietary_restrictions),
            medical_conditions: optional(&fields.medical_conditions),
            doctor_name: optional(&fields.doctor_name),
            doctor_phone: optional(&fields.doctor_phone),
            guardian_name: fields.guardian_name.clone(),
            guardian_phone: fields.guardian_phone.clone(),
            emergency_name: optional(&fields.emergency_name),
            emergency_phone: optional(&fields.emergency_phone),
        }),
        _ => ValidationResult::Invalid(errors),
    }
}
