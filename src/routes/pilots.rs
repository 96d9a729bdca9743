//! `/pilots` routes — administrative pilot management plus the pilot's own
//! form context (`/pilots/me/vehicle`).
//!
//! Management operations are a closed set of typed endpoints: add, delete,
//! toggle-status. No stringly-typed action dispatch.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    auth::hash_password,
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_admin},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    use axum::middleware;
    let admin_guard = middleware::from_fn(require_admin);
    Router::new()
        // Pilot-facing: own profile + assigned vehicle for the report form.
        .route("/pilots/me/vehicle", get(my_vehicle))
        .merge(
            Router::new()
                .route("/pilots",              get(list_pilots).post(add_pilot))
                .route("/pilots/{id}",         axum::routing::delete(delete_pilot))
                .route("/pilots/{id}/status",  patch(toggle_status))
                .route_layer(admin_guard),
        )
}

// ── Row / payload types ──────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct PilotRow {
    id:                     i64,
    username:               String,
    full_name:              String,
    role:                   String,
    is_active:              bool,
    assigned_vehicle_plate: Option<String>,
}

#[derive(Deserialize, Validate)]
struct AddPilotBody {
    #[validate(length(min = 3, message = "username must be at least 3 characters"))]
    username:  String,
    #[validate(length(min = 1, message = "full name is required"))]
    full_name: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    password:  String,
}

#[derive(sqlx::FromRow, Serialize)]
struct MyVehicleRow {
    full_name: String,
    plate:     Option<String>,
    brand:     Option<String>,
    model:     Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /pilots — all pilots with their assigned vehicle plate.
async fn list_pilots(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
) -> AppResult<Json<Vec<PilotRow>>> {
    let pool = &state.pool;
    let rows: Vec<PilotRow> = sqlx::query_as::<_, PilotRow>(
        "SELECT u.id, u.username, u.full_name, u.role, u.is_active,
                v.plate AS assigned_vehicle_plate
         FROM users u
         LEFT JOIN vehicles v ON v.assigned_pilot_id = u.id
         WHERE u.role = 'pilot'
         ORDER BY u.full_name",
    )
    .fetch_all(pool)
    .await?;
    Ok(Json(rows))
}

/// POST /pilots — create a pilot account.
async fn add_pilot(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Json(body): Json<AddPilotBody>,
) -> AppResult<(StatusCode, Json<PilotRow>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let pool = &state.pool;
    let hash = hash_password(&body.password)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash, full_name, role, is_active)
         VALUES ($1, $2, $3, 'pilot', TRUE)
         RETURNING id",
    )
    .bind(&body.username)
    .bind(hash)
    .bind(&body.full_name)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        AppError::from_db_unique(e, &format!("username '{}' already exists", body.username))
    })?;

    let row: PilotRow = sqlx::query_as::<_, PilotRow>(
        "SELECT u.id, u.username, u.full_name, u.role, u.is_active,
                v.plate AS assigned_vehicle_plate
         FROM users u
         LEFT JOIN vehicles v ON v.assigned_pilot_id = u.id
         WHERE u.id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /pilots/{id} — hard delete; reports cascade, vehicle assignment
/// goes back to NULL via the FK.
async fn delete_pilot(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let pool = &state.pool;
    let affected = sqlx::query("DELETE FROM users WHERE id = $1 AND role = 'pilot'")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("no pilot with id {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /pilots/{id}/status — flip the active flag.
async fn toggle_status(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<PilotRow>> {
    let pool = &state.pool;
    let affected = sqlx::query(
        "UPDATE users SET is_active = NOT is_active WHERE id = $1 AND role = 'pilot'",
    )
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("no pilot with id {id}")));
    }

    let row: PilotRow = sqlx::query_as::<_, PilotRow>(
        "SELECT u.id, u.username, u.full_name, u.role, u.is_active,
                v.plate AS assigned_vehicle_plate
         FROM users u
         LEFT JOIN vehicles v ON v.assigned_pilot_id = u.id
         WHERE u.id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(Json(row))
}

/// GET /pilots/me/vehicle — the caller's name and assigned vehicle, for the
/// inspection form. Vehicle fields are null when nothing is assigned.
async fn my_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<MyVehicleRow>> {
    let pool = &state.pool;
    let row: MyVehicleRow = sqlx::query_as::<_, MyVehicleRow>(
        "SELECT u.full_name, v.plate, v.brand, v.model
         FROM users u
         LEFT JOIN vehicles v ON v.assigned_pilot_id = u.id
         WHERE u.id = $1",
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;
    Ok(Json(row))
}
