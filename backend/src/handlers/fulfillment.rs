//! HTTP handlers for picking, shipping and receiving transfer documents

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::transfer::AdHocItem;
use shared::{normalize_note, validate_scan_token, TransferDocument};

use crate::error::{AppError, AppResult};
use crate::middleware::{check_permission, permissions, CurrentUser};
use crate::services::fulfillment::{AddItemResult, FulfillmentService, ScanResult};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmItemRequest {
    #[validate(range(min = 0, message = "Picked quantity cannot be negative"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_code: String,
    #[validate(length(min = 1, max = 255))]
    pub product_name: String,
    #[validate(length(max = 64))]
    pub position: Option<String>,
    #[validate(range(min = 1, max = 100_000, message = "Added quantity must be between 1 and 100000"))]
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FinishPickingRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

fn fulfillment_service(state: &AppState) -> FulfillmentService {
    FulfillmentService::new(state.db.clone(), state.events.clone())
}

/// Start picking (idempotent)
pub async fn start_picking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::PICK)?;

    let document = fulfillment_service(&state).start_picking(document_id).await?;
    Ok(Json(document))
}

/// Match a scanned barcode against the document
pub async fn scan_code(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(input): Json<ScanRequest>,
) -> AppResult<Json<ScanResult>> {
    check_permission(&current_user.0, permissions::PICK)?;
    input.validate()?;
    validate_scan_token(&input.code).map_err(|msg| AppError::Validation {
        field: "code".to_string(),
        message: msg.to_string(),
        message_cs: "Naskenovaný kód je prázdný".to_string(),
    })?;

    let result = fulfillment_service(&state)
        .scan(document_id, &input.code)
        .await?;
    Ok(Json(result))
}

/// Confirm the picked quantity of a line item
pub async fn confirm_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((document_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ConfirmItemRequest>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::PICK)?;
    input.validate()?;

    let document = fulfillment_service(&state)
        .confirm_item(document_id, item_id, input.quantity)
        .await?;
    Ok(Json(document))
}

/// Add an ad-hoc line item
pub async fn add_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(input): Json<AddItemRequest>,
) -> AppResult<Json<AddItemResult>> {
    check_permission(&current_user.0, permissions::PICK)?;
    input.validate()?;

    let item = AdHocItem {
        product_code: input.product_code.trim().to_string(),
        product_name: input.product_name.trim().to_string(),
        position: input
            .position
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        quantity: input.quantity,
    };
    let result = fulfillment_service(&state).add_item(document_id, item).await?;
    Ok(Json(result))
}

/// Close the picking session
pub async fn finish_picking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Json(input): Json<FinishPickingRequest>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::PICK)?;
    input.validate()?;

    let note = normalize_note(input.note.as_deref());
    let document = fulfillment_service(&state)
        .finish_picking(document_id, note.as_deref())
        .await?;
    Ok(Json(document))
}

/// Dispatch to the destination store
pub async fn ship(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::SHIP)?;

    let document = fulfillment_service(&state).ship(document_id).await?;
    Ok(Json(document))
}

/// Destination store acknowledges receipt
pub async fn confirm_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::RECEIVE)?;

    let document = fulfillment_service(&state).confirm_receipt(document_id).await?;
    Ok(Json(document))
}

/// Cancel before picking is finished
pub async fn cancel(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::PLAN)?;

    let document = fulfillment_service(&state).cancel(document_id).await?;
    Ok(Json(document))
}
