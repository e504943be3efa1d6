//! Turns an allocation plan into per-store document drafts

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collation::compare_positions;
use super::numbering::{DocumentNumber, NumberSequence};
use crate::allocation::{AllocatedLine, AllocationPlan, PlanningError};
use crate::models::{StoreAssignment, TaskDraft, TaskPriority};
use crate::types::StoreCode;

/// Settings shared by every document of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorySettings {
    /// Fixed central warehouse identifier
    pub source_warehouse: String,
    pub task_due_days: i64,
    pub task_priority: TaskPriority,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            source_warehouse: "CENTRAL".to_string(),
            task_due_days: 2,
            task_priority: TaskPriority::High,
        }
    }
}

/// A line item ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub product_code: String,
    pub product_name: String,
    pub position: Option<String>,
    pub requested_quantity: i32,
    pub sequence_index: i32,
}

/// A transfer document ready to be persisted, with its linked task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub document_number: DocumentNumber,
    pub source_warehouse: String,
    pub destination_store: StoreCode,
    pub assignee: Uuid,
    pub created_by: Uuid,
    pub lines: Vec<LineDraft>,
    pub task: TaskDraft,
}

impl DocumentDraft {
    pub fn total_quantity(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| i64::from(line.requested_quantity))
            .sum()
    }
}

/// Drafts for one run plus the stores left out for lack of an assignee
#[derive(Debug, Clone, Default)]
pub struct FactoryOutput {
    pub drafts: Vec<DocumentDraft>,
    pub unassigned_stores: Vec<StoreCode>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferDocumentFactory {
    settings: FactorySettings,
}

impl TransferDocumentFactory {
    pub fn new(settings: FactorySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    /// Build one draft per assigned store with at least one positive line.
    ///
    /// Stores are numbered in code order from `sequence`, so one run never
    /// reuses a number.
    pub fn build(
        &self,
        plan: &AllocationPlan,
        assignments: &[StoreAssignment],
        sequence: &mut NumberSequence,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FactoryOutput, PlanningError> {
        let assignees = index_assignments(assignments)?;

        let mut output = FactoryOutput::default();
        for (store, lines) in plan.by_store() {
            let Some(assignee) = assignees.get(&store).copied() else {
                output.unassigned_stores.push(store);
                continue;
            };

            let lines = order_lines(lines);
            if lines.is_empty() {
                continue;
            }

            let document_number = sequence.issue();
            let task = self.task_for(&document_number, &store, &lines, assignee, created_by, now);
            output.drafts.push(DocumentDraft {
                document_number,
                source_warehouse: self.settings.source_warehouse.clone(),
                destination_store: store,
                assignee,
                created_by,
                lines,
                task,
            });
        }

        Ok(output)
    }

    fn task_for(
        &self,
        number: &DocumentNumber,
        store: &StoreCode,
        lines: &[LineDraft],
        assignee: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> TaskDraft {
        let total: i64 = lines.iter().map(|l| i64::from(l.requested_quantity)).sum();
        TaskDraft {
            title: format!("Převodka {} pro {}", number, store),
            description: format!(
                "Vychystat {} položek ({} ks) ze skladu {} pro prodejnu {}.",
                lines.len(),
                total,
                self.settings.source_warehouse,
                store
            ),
            priority: self.settings.task_priority,
            due_date: now + Duration::days(self.settings.task_due_days),
            assignee,
            created_by,
        }
    }
}

/// One assignee per store; an empty or ambiguous list is an input error
pub fn index_assignments(
    assignments: &[StoreAssignment],
) -> Result<BTreeMap<StoreCode, Uuid>, PlanningError> {
    if assignments.is_empty() {
        return Err(PlanningError::NoAssignments);
    }

    let mut seen = BTreeSet::new();
    let mut index = BTreeMap::new();
    for assignment in assignments {
        if !seen.insert(assignment.store.clone()) {
            return Err(PlanningError::DuplicateAssignment(assignment.store.clone()));
        }
        index.insert(assignment.store.clone(), assignment.assignee_user_id);
    }
    Ok(index)
}

/// Sort by position for picker routing and number the lines from zero
fn order_lines(mut lines: Vec<AllocatedLine>) -> Vec<LineDraft> {
    lines.retain(|line| line.quantity > 0);
    lines.sort_by(|a, b| {
        compare_positions(a.position.as_deref(), b.position.as_deref())
            .then_with(|| a.product_code.cmp(&b.product_code))
    });

    lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| LineDraft {
            product_code: line.product_code,
            product_name: line.product_name,
            position: line.position,
            requested_quantity: line.quantity,
            sequence_index: index as i32,
        })
        .collect()
}
