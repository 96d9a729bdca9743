//! `/reports` routes — checklist submission, filtered listing, deletion and
//! CSV export. The heavy lifting lives in `services::reports`; handlers here
//! deal with auth scoping and query-string parsing.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    checklist,
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_admin},
    models::UserRole,
    services::reports::{self, ExportMode, ReportFilters, ReportRecord},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    use axum::middleware;
    let admin_guard = middleware::from_fn(require_admin);
    Router::new()
        .route("/reports",           get(list).post(submit))
        .route("/reports/export",    get(export))
        .route("/reports/checklist", get(catalog))
        .merge(
            Router::new()
                .route("/reports/{id}", delete(remove))
                .route_layer(admin_guard),
        )
}

// ── Request / response types ──────────────────────────────────

#[derive(Deserialize)]
struct SubmitBody {
    /// Header fields as submitted: plate, km_actual, campaign dates, license
    /// info, ... — relational fields are extracted, the rest is kept opaque.
    header:       HashMap<String, String>,
    /// Raw checklist form: derived item key → state string.
    checklist:    HashMap<String, String>,
    observations: Option<String>,
    confirmation: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    report_id: i64,
}

#[derive(Deserialize)]
struct ListQuery {
    start_date: Option<String>,
    end_date:   Option<String>,
    pilot_id:   Option<i64>,
    plate:      Option<String>,
    /// Export only: "json" (default) or "columns".
    mode:       Option<String>,
}

#[derive(Serialize)]
struct CatalogCategory {
    category: &'static str,
    items:    Vec<CatalogItem>,
}

#[derive(Serialize)]
struct CatalogItem {
    item:     &'static str,
    form_key: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /reports — a pilot submits an inspection for their vehicle.
async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SubmitBody>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    if user.role != UserRole::Pilot {
        return Err(AppError::Forbidden);
    }

    let report_id = reports::submit_report(
        &state.pool,
        &state.config.report_timezone,
        user.user_id,
        body.header,
        body.checklist,
        body.observations,
        &body.confirmation,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { report_id })))
}

/// GET /reports — filtered listing, newest first. Pilots only ever see their
/// own reports; admins may filter by any pilot.
async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ReportRecord>>> {
    let filters = filters_for(&user, &query)?;
    let records = reports::list_reports(&state.pool, &filters).await?;
    Ok(Json(records))
}

/// GET /reports/export — same filters as the listing, rendered as CSV.
async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let filters = filters_for(&user, &query)?;
    let mode = match query.mode.as_deref() {
        None | Some("") | Some("json") => ExportMode::Json,
        Some("columns")                => ExportMode::Columns,
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown export mode: {other}")))
        }
    };

    let records = reports::list_reports(&state.pool, &filters).await?;
    let csv = reports::export_csv(&records, mode);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"inspection_reports.csv\"",
            ),
        ],
        csv,
    ))
}

/// DELETE /reports/{id} — admin-only; details cascade with the report.
async fn remove(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    reports::delete_report(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /reports/checklist — the static catalog with derived form keys, so a
/// client can render the fixed inspection form.
async fn catalog() -> Json<Vec<CatalogCategory>> {
    let categories = checklist::CHECKLIST_ITEMS
        .iter()
        .copied()
        .map(|(category, items)| CatalogCategory {
            category,
            items: items
                .iter()
                .copied()
                .map(|item| CatalogItem {
                    item,
                    form_key: checklist::form_key(item),
                })
                .collect(),
        })
        .collect();
    Json(categories)
}

// ── Internal helpers ──────────────────────────────────────────

/// Build retrieval filters from the query string, constraining pilots to
/// their own reports regardless of what they asked for.
fn filters_for(user: &AuthUser, query: &ListQuery) -> AppResult<ReportFilters> {
    let driver_id = match user.role {
        UserRole::Admin => query.pilot_id,
        UserRole::Pilot => Some(user.user_id),
    };

    Ok(ReportFilters {
        start_date: parse_date("start_date", query.start_date.as_deref())?,
        end_date:   parse_date("end_date", query.end_date.as_deref())?,
        driver_id,
        plate:      query
            .plate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned),
    })
}

/// Empty strings count as absent — HTML forms submit blank filter inputs.
fn parse_date(name: &str, raw: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} must be YYYY-MM-DD, got: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pilot() -> AuthUser {
        AuthUser {
            user_id:   42,
            full_name: "Ana Lopez".into(),
            role:      UserRole::Pilot,
        }
    }

    fn admin() -> AuthUser {
        AuthUser {
            user_id:   1,
            full_name: "Primary Administrator".into(),
            role:      UserRole::Admin,
        }
    }

    fn query() -> ListQuery {
        ListQuery {
            start_date: Some("2024-01-01".into()),
            end_date:   Some("".into()),
            pilot_id:   Some(7),
            plate:      Some(" p-1 ".into()),
            mode:       None,
        }
    }

    #[test]
    fn pilots_are_pinned_to_their_own_reports() {
        let filters = filters_for(&pilot(), &query()).unwrap();
        assert_eq!(filters.driver_id, Some(42));
    }

    #[test]
    fn admins_filter_freely() {
        let filters = filters_for(&admin(), &query()).unwrap();
        assert_eq!(filters.driver_id, Some(7));
        assert_eq!(filters.plate.as_deref(), Some("p-1"));
    }

    #[test]
    fn blank_dates_are_ignored_and_bad_dates_rejected() {
        let filters = filters_for(&admin(), &query()).unwrap();
        assert_eq!(
            filters.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(filters.end_date, None);

        let mut bad = query();
        bad.end_date = Some("01/05/2024".into());
        assert!(filters_for(&admin(), &bad).is_err());
    }
}
