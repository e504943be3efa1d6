//! HTTP handlers for reading transfer documents

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::transfer::PickList;
use shared::{PaginatedResponse, Pagination, TransferDocument, TransferState};

use crate::error::AppResult;
use crate::middleware::{check_permission, permissions, CurrentUser};
use crate::services::transfer::{TransferFilter, TransferService, TransferSummary};
use crate::AppState;

/// Query parameters for listing transfer documents
#[derive(Debug, Deserialize)]
pub struct ListTransfersQuery {
    pub state: Option<TransferState>,
    pub store: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PickListQuery {
    pub format: Option<String>, // "text" (default) or "csv"
}

/// List transfer documents
pub async fn list_transfers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListTransfersQuery>,
) -> AppResult<Json<PaginatedResponse<TransferSummary>>> {
    check_permission(&current_user.0, permissions::READ)?;

    let defaults = Pagination::default();
    let pagination = Pagination {
        page: query.page.unwrap_or(defaults.page),
        per_page: query.per_page.unwrap_or(defaults.per_page),
    };
    let filter = TransferFilter {
        state: query.state,
        store: query.store,
    };

    let service = TransferService::new(state.db);
    let page = service.list(&filter, &pagination).await?;
    Ok(Json(page))
}

/// Get a transfer document with its line items
pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<TransferDocument>> {
    check_permission(&current_user.0, permissions::READ)?;

    let service = TransferService::new(state.db);
    let document = service.get(document_id).await?;
    Ok(Json(document))
}

/// Printable pick list as plain text or CSV
pub async fn get_pick_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(document_id): Path<Uuid>,
    Query(query): Query<PickListQuery>,
) -> AppResult<Response> {
    check_permission(&current_user.0, permissions::READ)?;

    let service = TransferService::new(state.db);
    let document = service.get(document_id).await?;
    let pick_list = PickList::for_document(&document);

    if query.format.as_deref() == Some("csv") {
        let csv = TransferService::export_pick_list_csv(&pick_list)?;
        let disposition = format!("attachment; filename=\"{}.csv\"", pick_list.document_number);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            pick_list.render_text(),
        )
            .into_response())
    }
}
