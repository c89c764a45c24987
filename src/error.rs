use crate::columns::Role;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum VarianceError {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Mapping error: no column found for required role(s): {}", format_roles(.missing))]
    Mapping { missing: Vec<Role> },

    #[error("Mapping error: column '{header}' assigned to {role} does not exist")]
    UnknownHeader { role: Role, header: String },

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("No record with id {0}")]
    UnknownRecord(Uuid),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl VarianceError {
    /// True for the errors a mis-mapped upload produces, as opposed to bad
    /// input text or an internal failure.
    pub fn is_mapping_error(&self) -> bool {
        matches!(self, Self::Mapping { .. } | Self::UnknownHeader { .. })
    }
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, VarianceError>;
