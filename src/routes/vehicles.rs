//! `/vehicles` routes — administrative vehicle management and pilot
//! assignment. All routes require the admin role.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_admin},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    use axum::middleware;
    let admin_guard = middleware::from_fn(require_admin);
    Router::new()
        .route("/vehicles",                get(list_vehicles).post(add_vehicle))
        .route("/vehicles/{plate}",        axum::routing::put(update_vehicle).delete(delete_vehicle))
        .route("/vehicles/{plate}/assign", post(assign_pilot))
        .route_layer(admin_guard)
}

// ── Row / payload types ──────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct VehicleRow {
    plate:               String,
    brand:               String,
    model:               String,
    year:                Option<i32>,
    capacity_kg:         Option<i32>,
    assigned_pilot_id:   Option<i64>,
    assigned_pilot_name: Option<String>,
}

#[derive(Deserialize, Validate)]
struct AddVehicleBody {
    #[validate(length(min = 1, message = "plate is required"))]
    plate:       String,
    #[validate(length(min = 1, message = "brand is required"))]
    brand:       String,
    #[validate(length(min = 1, message = "model is required"))]
    model:       String,
    year:        Option<i32>,
    capacity_kg: Option<i32>,
}

#[derive(Deserialize)]
struct UpdateVehicleBody {
    brand:       String,
    model:       String,
    year:        Option<i32>,
    capacity_kg: Option<i32>,
}

#[derive(Deserialize)]
struct AssignPilotBody {
    /// Pilot to assign; `null` unassigns the vehicle.
    pilot_id: Option<i64>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /vehicles — all vehicles with the assigned pilot's name.
async fn list_vehicles(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
) -> AppResult<Json<Vec<VehicleRow>>> {
    let pool = &state.pool;
    let rows: Vec<VehicleRow> = sqlx::query_as::<_, VehicleRow>(
        "SELECT v.plate, v.brand, v.model, v.year, v.capacity_kg,
                v.assigned_pilot_id, u.full_name AS assigned_pilot_name
         FROM vehicles v
         LEFT JOIN users u ON v.assigned_pilot_id = u.id
         ORDER BY v.plate",
    )
    .fetch_all(pool)
    .await?;
    Ok(Json(rows))
}

/// POST /vehicles — register a vehicle. Plates are stored uppercased.
async fn add_vehicle(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Json(body): Json<AddVehicleBody>,
) -> AppResult<(StatusCode, Json<VehicleRow>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let pool = &state.pool;
    let plate = body.plate.trim().to_uppercase();

    sqlx::query(
        "INSERT INTO vehicles (plate, brand, model, year, capacity_kg)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&plate)
    .bind(&body.brand)
    .bind(&body.model)
    .bind(body.year)
    .bind(body.capacity_kg)
    .execute(pool)
    .await
    .map_err(|e| AppError::from_db_unique(e, &format!("vehicle '{plate}' already exists")))?;

    let row = fetch_vehicle(pool, &plate).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /vehicles/{plate} — update descriptive fields.
async fn update_vehicle(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(plate): Path<String>,
    Json(body): Json<UpdateVehicleBody>,
) -> AppResult<Json<VehicleRow>> {
    let pool = &state.pool;
    let plate = plate.trim().to_uppercase();

    let affected = sqlx::query(
        "UPDATE vehicles SET brand = $1, model = $2, year = $3, capacity_kg = $4
         WHERE plate = $5",
    )
    .bind(&body.brand)
    .bind(&body.model)
    .bind(body.year)
    .bind(body.capacity_kg)
    .bind(&plate)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("no vehicle with plate {plate}")));
    }

    let row = fetch_vehicle(pool, &plate).await?;
    Ok(Json(row))
}

/// DELETE /vehicles/{plate} — remove a vehicle; its reports cascade.
async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(plate): Path<String>,
) -> AppResult<StatusCode> {
    let pool = &state.pool;
    let plate = plate.trim().to_uppercase();

    let affected = sqlx::query("DELETE FROM vehicles WHERE plate = $1")
        .bind(&plate)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("no vehicle with plate {plate}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /vehicles/{plate}/assign — assign a pilot (or unassign with null).
///
/// A pilot drives at most one vehicle: any prior assignment of that pilot is
/// cleared in the same transaction before the new one is set, so both
/// vehicles are never assigned simultaneously.
async fn assign_pilot(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(plate): Path<String>,
    Json(body): Json<AssignPilotBody>,
) -> AppResult<Json<VehicleRow>> {
    let pool = &state.pool;
    let plate = plate.trim().to_uppercase();

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vehicles WHERE plate = $1)")
        .bind(&plate)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound(format!("no vehicle with plate {plate}")));
    }

    match body.pilot_id {
        Some(pilot_id) => {
            let is_pilot: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = 'pilot')",
            )
            .bind(pilot_id)
            .fetch_one(pool)
            .await?;
            if !is_pilot {
                return Err(AppError::BadRequest(format!("no pilot with id {pilot_id}")));
            }

            let mut tx = pool.begin().await?;
            sqlx::query("UPDATE vehicles SET assigned_pilot_id = NULL WHERE assigned_pilot_id = $1")
                .bind(pilot_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE vehicles SET assigned_pilot_id = $1 WHERE plate = $2")
                .bind(pilot_id)
                .bind(&plate)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        None => {
            sqlx::query("UPDATE vehicles SET assigned_pilot_id = NULL WHERE plate = $1")
                .bind(&plate)
                .execute(pool)
                .await?;
        }
    }

    let row = fetch_vehicle(pool, &plate).await?;
    Ok(Json(row))
}

// ── Internal helpers ──────────────────────────────────────────

async fn fetch_vehicle(pool: &crate::db::Db, plate: &str) -> AppResult<VehicleRow> {
    let row: VehicleRow = sqlx::query_as::<_, VehicleRow>(
        "SELECT v.plate, v.brand, v.model, v.year, v.capacity_kg,
                v.assigned_pilot_id, u.full_name AS assigned_pilot_name
         FROM vehicles v
         LEFT JOIN users u ON v.assigned_pilot_id = u.id
         WHERE v.plate = $1",
    )
    .bind(plate)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
