//! Care plan catalog.
//!
//! The catalog is read-only reference data loaded once from configuration.
//! It feeds the plan selection step and decides the fallback plan used when a
//! later step is reached without an explicit selection.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How often a plan is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    /// Billed per hour of care.
    Hourly,
    /// Billed every week.
    Weekly,
    /// Billed every month.
    Monthly,
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hour"),
            Self::Weekly => write!(f, "week"),
            Self::Monthly => write!(f, "month"),
        }
    }
}

/// A named care plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier.
    pub id: String,
    /// Display name; this is what enrollment records store.
    pub name: String,
    /// Price in whole currency units.
    pub price: u32,
    /// ISO currency code.
    pub currency: String,
    /// Recurrence period of the price.
    pub period: BillingPeriod,
    /// Ordered feature list.
    #[serde(default)]
    pub features: Vec<String>,
    /// Display hint; also selects the fallback plan.
    #[serde(default)]
    pub popular: bool,
}

impl Plan {
    /// Human-readable price, e.g. `BDT 25,000/month`.
    #[must_use]
    pub fn display_price(&self) -> String {
        format!(
            "{} {}/{}",
            self.currency,
            group_thousands(self.price),
            self.period
        )
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// The built-in plans offered by the centre.
#[must_use]
pub fn builtin_plans() -> Vec<Plan> {
    let features = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
    vec![
        Plan {
            id: "basic".to_string(),
            name: "Little Explorer".to_string(),
            price: 15_000,
            currency: "BDT".to_string(),
            period: BillingPeriod::Monthly,
            features: features(&[
                "Day Care (8AM - 4PM)",
                "Healthy Snacks",
                "Nap Time Monitoring",
                "Daily Reports",
            ]),
            popular: false,
        },
        Plan {
            id: "growth".to_string(),
            name: "Growth Scholar".to_string(),
            price: 25_000,
            currency: "BDT".to_string(),
            period: BillingPeriod::Monthly,
            features: features(&[
                "Pre-School Curriculum",
                "Full Meals Included",
                "Development Tracking",
                "Access to Live View",
            ]),
            popular: true,
        },
        Plan {
            id: "vip".to_string(),
            name: "VIP Guardian".to_string(),
            price: 45_000,
            currency: "BDT".to_string(),
            period: BillingPeriod::Monthly,
            features: features(&[
                "Extended Hours",
                "Priority Nanny Booking",
                "1-on-1 Tutoring",
                "Premium Health Insights",
            ]),
            popular: false,
        },
    ]
}

/// An ordered, immutable list of plans.
///
/// Cloning is cheap; all clones share the same plan list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: Arc<[Plan]>,
}

impl PlanCatalog {
    /// Build a catalog from a list of plans.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the list is empty or contains
    /// duplicate identifiers.
    pub fn new(plans: Vec<Plan>) -> Result<Self> {
        if plans.is_empty() {
            return Err(Error::config("plan catalog must contain at least one plan"));
        }

        let mut seen = HashSet::new();
        for plan in &plans {
            if plan.id.trim().is_empty() {
                return Err(Error::config("plan identifiers must not be empty"));
            }
            if !seen.insert(plan.id.as_str()) {
                return Err(Error::config(format!("duplicate plan id '{}'", plan.id)));
            }
        }

        Ok(Self {
            plans: plans.into(),
        })
    }

    /// The catalog shipped with the application.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            plans: builtin_plans().into(),
        }
    }

    /// All plans, in display order.
    #[must_use]
    pub fn list_plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Look up a plan by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }

    /// The plan used when a step is reached without a selection.
    ///
    /// This is the first plan flagged popular, or the first plan if none is.
    #[must_use]
    pub fn fallback(&self) -> &Plan {
        self.plans
            .iter()
            .find(|plan| plan.popular)
            .unwrap_or(&self.plans[0])
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
