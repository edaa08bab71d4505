use crate::{error::AppError, middleware::auth::AuthUser, models::Balance};
use axum::{extract::State, Json};

use super::documents::AppState;

/// `GET /billing/balance` — `{ "total_available": n }`
pub async fn get_balance(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> Result<Json<Balance>, AppError> {
    let balance = state.analysis.balance().get_balance().await?;
    Ok(Json(balance))
}
