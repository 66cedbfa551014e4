//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::profile::ProfileFields;

/// Plan listing arguments.
#[derive(Debug, Args)]
pub struct PlansCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Scripted enrollment arguments.
///
/// Drives the full workflow: plan, profile, face and body capture, commit.
#[derive(Debug, Args)]
pub struct EnrollCommand {
    /// Identifier of the signed-in guardian account
    #[arg(short, long)]
    pub user: String,

    /// Display name of the guardian account (prefills the guardian name)
    #[arg(long)]
    pub display_name: Option<String>,

    /// Plan identifier (defaults to the popular plan)
    #[arg(short, long)]
    pub plan: Option<String>,

    /// Child's full name
    #[arg(long)]
    pub name: String,

    /// Child's age in years
    #[arg(long, allow_hyphen_values = true)]
    pub age: String,

    /// Child's gender (boy, girl, unspecified)
    #[arg(long)]
    pub gender: String,

    /// Allergies or conditions
    #[arg(long)]
    pub allergies: Option<String>,

    /// Dietary restrictions
    #[arg(long)]
    pub dietary: Option<String>,

    /// Medical conditions
    #[arg(long)]
    pub medical: Option<String>,

    /// Primary doctor name
    #[arg(long)]
    pub doctor_name: Option<String>,

    /// Primary doctor phone
    #[arg(long)]
    pub doctor_phone: Option<String>,

    /// Guardian name (defaults to the account display name)
    #[arg(long)]
    pub guardian_name: Option<String>,

    /// Guardian phone
    #[arg(long)]
    pub guardian_phone: String,

    /// Emergency contact name
    #[arg(long)]
    pub emergency_name: Option<String>,

    /// Emergency contact phone
    #[arg(long)]
    pub emergency_phone: Option<String>,

    /// Face image file (raw image or data URL)
    #[arg(long, value_name = "FILE")]
    pub face: PathBuf,

    /// Body image file (raw image or data URL)
    #[arg(long, value_name = "FILE")]
    pub body: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl EnrollCommand {
    /// Form input from the arguments, on top of the workflow's prefill.
    #[must_use]
    pub fn profile_fields(&self, prefill: ProfileFields) -> ProfileFields {
        ProfileFields {
            name: self.name.clone(),
            age: self.age.clone(),
            gender: self.gender.clone(),
            allergies: self.allergies.clone().unwrap_or(prefill.allergies),
            dietary_restrictions: self.dietary.clone().unwrap_or(prefill.dietary_restrictions),
            medical_conditions: self.medical.clone().unwrap_or(prefill.medical_conditions),
            doctor_name: self.doctor_name.clone().unwrap_or(prefill.doctor_name),
            doctor_phone: self.doctor_phone.clone().unwrap_or(prefill.doctor_phone),
            guardian_name: self.guardian_name.clone().unwrap_or(prefill.guardian_name),
            guardian_phone: self.guardian_phone.clone(),
            emergency_name: self.emergency_name.clone().unwrap_or(prefill.emergency_name),
            emergency_phone: self.emergency_phone.clone().unwrap_or(prefill.emergency_phone),
        }
    }
}

/// Student listing arguments.
#[derive(Debug, Args)]
pub struct StudentsCommand {
    /// Only students owned by this guardian account
    #[arg(short, long)]
    pub guardian: Option<String>,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Single student arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Student identifier, e.g. K-4821
    pub student_id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
