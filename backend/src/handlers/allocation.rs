//! HTTP handlers for allocation runs

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use shared::allocation::AllocationPlan;
use shared::{validate_assignments, StoreAssignment};

use crate::error::{AppError, AppResult};
use crate::middleware::{check_permission, permissions, CurrentUser};
use crate::services::allocation::{AllocationService, RunSummary};
use crate::AppState;

/// Request body for an allocation run
#[derive(Debug, Deserialize, Validate)]
pub struct RunAllocationRequest {
    #[validate(length(min = 1, message = "At least one store assignment is required"))]
    pub assignments: Vec<StoreAssignment>,
}

fn allocation_service(state: &AppState) -> AllocationService {
    AllocationService::new(
        state.db.clone(),
        state.config.allocation.clone(),
        state.events.clone(),
    )
}

/// Compute the allocation for the current snapshot without writing
pub async fn preview_allocation(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<AllocationPlan>> {
    check_permission(&current_user.0, permissions::PLAN)?;

    let plan = allocation_service(&state).preview().await?;
    Ok(Json(plan))
}

/// Run the allocation and create transfer documents
pub async fn run_allocation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RunAllocationRequest>,
) -> AppResult<Json<RunSummary>> {
    check_permission(&current_user.0, permissions::PLAN)?;
    input.validate()?;
    validate_assignments(&input.assignments).map_err(|msg| AppError::Validation {
        field: "assignments".to_string(),
        message: msg.to_string(),
        message_cs: "Neplatné přiřazení prodejen".to_string(),
    })?;

    tracing::info!(
        user_id = %current_user.0.user_id,
        stores = input.assignments.len(),
        "Allocation run requested"
    );

    let summary = allocation_service(&state)
        .run(current_user.0.user_id, &input.assignments)
        .await?;
    Ok(Json(summary))
}
