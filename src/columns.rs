use crate::error::{Result, VarianceError};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic meaning a raw column header can take.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Category,
    Budget,
    Actual,
    CostCenter,
    GlAccount,
    Period,
}

impl Role {
    /// Scan order used by auto-detection. When two roles share an alias, the
    /// earlier role wins for a given header.
    pub const PRIORITY: [Role; 6] = [
        Role::Category,
        Role::Budget,
        Role::Actual,
        Role::CostCenter,
        Role::GlAccount,
        Role::Period,
    ];

    pub const REQUIRED: [Role; 3] = [Role::Category, Role::Budget, Role::Actual];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Category => "category",
            Role::Budget => "budget",
            Role::Actual => "actual",
            Role::CostCenter => "cost center",
            Role::GlAccount => "GL account",
            Role::Period => "period",
        };
        f.write_str(name)
    }
}

/// Case-insensitive substrings that identify each role in a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AliasTable {
    pub category: Vec<String>,
    pub budget: Vec<String>,
    pub actual: Vec<String>,
    pub cost_center: Vec<String>,
    pub gl_account: Vec<String>,
    pub period: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for AliasTable {
    fn default() -> Self {
        Self {
            category: words(&[
                "category",
                "description",
                "line item",
                "account name",
                "item",
                "name",
            ]),
            budget: words(&["budget", "plan", "forecast"]),
            actual: words(&["actual", "spent", "ytd"]),
            cost_center: words(&["cost center", "cost centre", "department", "dept"]),
            gl_account: words(&["gl", "account", "ledger"]),
            period: words(&["period", "month", "quarter", "date"]),
        }
    }
}

impl AliasTable {
    pub fn aliases(&self, role: Role) -> &[String] {
        match role {
            Role::Category => &self.category,
            Role::Budget => &self.budget,
            Role::Actual => &self.actual,
            Role::CostCenter => &self.cost_center,
            Role::GlAccount => &self.gl_account,
            Role::Period => &self.period,
        }
    }

    pub fn matches(&self, role: Role, header: &str) -> bool {
        let lower = header.to_lowercase();
        self.aliases(role)
            .iter()
            .filter(|alias| !alias.trim().is_empty())
            .any(|alias| lower.contains(&alias.to_lowercase()))
    }
}

/// A best-effort header-to-role assignment. Any role may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMapping {
    pub category: Option<String>,
    pub budget: Option<String>,
    pub actual: Option<String>,
    pub cost_center: Option<String>,
    pub gl_account: Option<String>,
    pub period: Option<String>,
}

/// Manual correction applied on top of auto-detection. `header: None` clears
/// the role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingOverride {
    pub role: Role,
    pub header: Option<String>,
}

impl MappingOverride {
    pub fn assign(role: Role, header: impl Into<String>) -> Self {
        Self {
            role,
            header: Some(header.into()),
        }
    }

    pub fn clear(role: Role) -> Self {
        Self { role, header: None }
    }
}

impl ColumnMapping {
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Category => self.category.as_deref(),
            Role::Budget => self.budget.as_deref(),
            Role::Actual => self.actual.as_deref(),
            Role::CostCenter => self.cost_center.as_deref(),
            Role::GlAccount => self.gl_account.as_deref(),
            Role::Period => self.period.as_deref(),
        }
    }

    pub fn set(&mut self, role: Role, header: Option<String>) {
        let slot = match role {
            Role::Category => &mut self.category,
            Role::Budget => &mut self.budget,
            Role::Actual => &mut self.actual,
            Role::CostCenter => &mut self.cost_center,
            Role::GlAccount => &mut self.gl_account,
            Role::Period => &mut self.period,
        };
        *slot = header;
    }

    pub fn with_overrides(mut self, overrides: &[MappingOverride]) -> Self {
        for o in overrides {
            self.set(o.role, o.header.clone());
        }
        self
    }

    pub fn missing_required(&self) -> Vec<Role> {
        Role::REQUIRED
            .into_iter()
            .filter(|role| self.get(*role).is_none())
            .collect()
    }

    /// Checks every assigned header exists and every required role is
    /// present.
    pub fn validate(&self, headers: &[String]) -> Result<ValidatedMapping> {
        for role in Role::PRIORITY {
            if let Some(header) = self.get(role) {
                if !headers.iter().any(|h| h == header) {
                    return Err(VarianceError::UnknownHeader {
                        role,
                        header: header.to_string(),
                    });
                }
            }
        }

        match (&self.category, &self.budget, &self.actual) {
            (Some(category), Some(budget), Some(actual)) => Ok(ValidatedMapping {
                category: category.clone(),
                budget: budget.clone(),
                actual: actual.clone(),
                cost_center: self.cost_center.clone(),
                gl_account: self.gl_account.clone(),
                period: self.period.clone(),
            }),
            _ => Err(VarianceError::Mapping {
                missing: self.missing_required(),
            }),
        }
    }
}

/// A mapping that has passed validation; the only input the record builder
/// accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidatedMapping {
    pub category: String,
    pub budget: String,
    pub actual: String,
    pub cost_center: Option<String>,
    pub gl_account: Option<String>,
    pub period: Option<String>,
}

pub struct ColumnResolver<'a> {
    aliases: &'a AliasTable,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        Self { aliases }
    }

    /// Ordered scan: headers left to right, roles in [`Role::PRIORITY`]
    /// order. A header takes the first unassigned role it matches and a role
    /// keeps the first header that matched it.
    pub fn detect(&self, headers: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();

        for header in headers {
            let role = Role::PRIORITY
                .into_iter()
                .find(|role| mapping.get(*role).is_none() && self.aliases.matches(*role, header));

            if let Some(role) = role {
                mapping.set(role, Some(header.clone()));
            }
        }

        mapping
    }

    pub fn resolve(
        &self,
        headers: &[String],
        overrides: &[MappingOverride],
    ) -> Result<ValidatedMapping> {
        let mapping = self.detect(headers).with_overrides(overrides);
        debug!("Resolved column mapping: {:?}", mapping);
        mapping.validate(headers)
    }
}
