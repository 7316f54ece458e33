//! Creation-flow state for a new schema.
//!
//! The flow has three steps (name, content, conditions). A step can only be
//! left forward once its input validates; going back is always allowed.

use serde::{Deserialize, Serialize};

use super::{BlockingCondition, ContentSelection, Schema, SchemaType};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStep {
    Name,
    Content,
    Conditions,
}

impl DraftStep {
    pub fn number(self) -> u8 {
        match self {
            DraftStep::Name => 1,
            DraftStep::Content => 2,
            DraftStep::Conditions => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDraft {
    pub name: String,
    pub schema_type: SchemaType,
    pub content: ContentSelection,
    pub conditions: Vec<BlockingCondition>,
    step: DraftStep,
}

impl Default for SchemaDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            schema_type: SchemaType::Custom,
            content: ContentSelection::default(),
            conditions: Vec::new(),
            step: DraftStep::Name,
        }
    }
}

impl SchemaDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a draft from a starter template, keeping its conditions.
    pub fn from_template(template: &Schema) -> Self {
        Self {
            name: template.name.clone(),
            schema_type: template.schema_type,
            content: template.selected_content.clone(),
            conditions: template.blocking_conditions.clone(),
            step: DraftStep::Name,
        }
    }

    pub fn step(&self) -> DraftStep {
        self.step
    }

    pub fn add_condition(&mut self, condition: BlockingCondition) {
        self.conditions.push(condition);
    }

    /// Remove a condition by position; out-of-range indices are ignored.
    pub fn remove_condition(&mut self, index: usize) -> Option<BlockingCondition> {
        if index < self.conditions.len() {
            Some(self.conditions.remove(index))
        } else {
            None
        }
    }

    /// Validate only the input owned by the current step.
    pub fn validate_step(&self) -> Result<(), ValidationError> {
        match self.step {
            DraftStep::Name => {
                if self.name.trim().is_empty() {
                    return Err(ValidationError::EmptyName);
                }
            }
            DraftStep::Content => {
                if self.content.is_empty() {
                    return Err(ValidationError::NoContentSelected);
                }
            }
            DraftStep::Conditions => {
                if self.conditions.is_empty() {
                    return Err(ValidationError::NoConditions);
                }
                for condition in &self.conditions {
                    condition.validate()?;
                }
            }
        }
        Ok(())
    }

    pub fn can_proceed(&self) -> bool {
        self.validate_step().is_ok()
    }

    /// Advance to the next step. Returns `Ok(true)` once the last step has
    /// validated and the draft is ready to [`build`](Self::build).
    pub fn next_step(&mut self) -> Result<bool, ValidationError> {
        self.validate_step()?;
        self.step = match self.step {
            DraftStep::Name => DraftStep::Content,
            DraftStep::Content => DraftStep::Conditions,
            DraftStep::Conditions => return Ok(true),
        };
        Ok(false)
    }

    pub fn previous_step(&mut self) {
        self.step = match self.step {
            DraftStep::Name | DraftStep::Content => DraftStep::Name,
            DraftStep::Conditions => DraftStep::Content,
        };
    }

    /// Validate every step and produce an inactive schema.
    pub fn build(&self) -> Result<Schema, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.content.is_empty() {
            return Err(ValidationError::NoContentSelected);
        }
        if self.conditions.is_empty() {
            return Err(ValidationError::NoConditions);
        }
        for condition in &self.conditions {
            condition.validate()?;
        }

        let mut schema = Schema::new(name, self.schema_type);
        schema.selected_content = self.content.clone();
        schema.blocking_conditions = self.conditions.clone();
        Ok(schema)
    }
}
