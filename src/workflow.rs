use crate::error::{Result, VarianceError};
use crate::schema::{Comment, ParsedDataset, RootCause, Status, VarianceRecord};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user edit to the review fields of one record. Amounts and derived
/// variance are never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    SetStatus {
        id: Uuid,
        status: Status,
    },

    AssignOwner {
        id: Uuid,
        #[schemars(description = "Free-text owner name; empty unassigns.")]
        owner: String,
    },

    /// `None` removes the tag.
    TagRootCause {
        id: Uuid,
        root_cause: Option<RootCause>,
    },

    /// `None` removes the due date.
    SetDueDate {
        id: Uuid,
        due_date: Option<NaiveDate>,
    },

    Explain {
        id: Uuid,
        explanation: String,
    },

    /// Appended after any existing comments.
    AddComment {
        id: Uuid,
        author: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    ToggleStar {
        id: Uuid,
    },

    /// Overrides the computed flag until thresholds are applied again.
    SetSignificant {
        id: Uuid,
        is_significant: bool,
    },
}

impl WorkflowAction {
    pub fn target(&self) -> Uuid {
        match self {
            Self::SetStatus { id, .. }
            | Self::AssignOwner { id, .. }
            | Self::TagRootCause { id, .. }
            | Self::SetDueDate { id, .. }
            | Self::Explain { id, .. }
            | Self::AddComment { id, .. }
            | Self::ToggleStar { id }
            | Self::SetSignificant { id, .. } => *id,
        }
    }

    pub fn comment(id: Uuid, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AddComment {
            id,
            author: author.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns a new dataset with the action applied to its target record.
    pub fn apply(&self, dataset: &ParsedDataset) -> Result<ParsedDataset> {
        let id = self.target();
        if dataset.get(id).is_none() {
            return Err(VarianceError::UnknownRecord(id));
        }

        debug!("Applying {:?} to record {}", self, id);
        Ok(dataset.clone().map_records(|record| {
            if record.id == id {
                self.apply_to_record(record)
            } else {
                record
            }
        }))
    }

    fn apply_to_record(&self, mut record: VarianceRecord) -> VarianceRecord {
        match self {
            Self::SetStatus { status, .. } => record.status = *status,
            Self::AssignOwner { owner, .. } => record.owner = owner.trim().to_string(),
            Self::TagRootCause { root_cause, .. } => record.root_cause = *root_cause,
            Self::SetDueDate { due_date, .. } => record.due_date = *due_date,
            Self::Explain { explanation, .. } => record.explanation = explanation.clone(),
            Self::AddComment {
                author,
                text,
                timestamp,
                ..
            } => record.comments.push(Comment {
                author: author.clone(),
                text: text.clone(),
                timestamp: *timestamp,
            }),
            Self::ToggleStar { .. } => record.is_starred = !record.is_starred,
            Self::SetSignificant { is_significant, .. } => {
                record.set_significant(*is_significant)
            }
        }
        record
    }
}

/// Applies actions in order, stopping at the first failure.
pub fn apply_all(dataset: &ParsedDataset, actions: &[WorkflowAction]) -> Result<ParsedDataset> {
    let mut current = dataset.clone();
    for action in actions {
        current = action.apply(&current)?;
    }
    Ok(current)
}
