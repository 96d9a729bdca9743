//! `/auth` routes — session login/logout and current-user lookup.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};

use crate::{
    auth::{generate_token, verify_password},
    db::Db,
    errors::{AppError, AppResult},
    middleware::auth_guard::SESSION_COOKIE,
    state::AppState,
};

const SESSION_DAYS: i64 = 30;

// ── Request / response types ──────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id:        i64,
    username:  String,
    full_name: String,
    role:      String,
}

// ── Database row types (runtime queries — no DATABASE_URL at compile time) ──────

#[derive(sqlx::FromRow)]
struct UserRow {
    id:            i64,
    username:      String,
    password_hash: String,
    full_name:     String,
    role:          String,
    is_active:     bool,
}

#[derive(sqlx::FromRow)]
struct MeRow {
    id:        i64,
    username:  String,
    full_name: String,
    role:      String,
}

// ── Router ────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login",  post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me",     get(me))
}

// ── Handlers ──────────────────────────────────────────────────

/// POST /auth/login — username + password for pilots and admins alike.
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;

    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash, full_name, role, is_active
         FROM users WHERE username = $1 LIMIT 1",
    )
    .bind(&body.username)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !row.is_active {
        return Err(AppError::BadRequest(
            "Your account has been disabled. Contact the administrator.".into(),
        ));
    }

    verify_password(&body.password, &row.password_hash)?;

    let session_token = create_session(pool, row.id, SESSION_DAYS).await?;
    set_session_cookie(&cookies, &session_token, SESSION_DAYS);

    Ok(Json(UserResponse {
        id:        row.id,
        username:  row.username,
        full_name: row.full_name,
        role:      row.role,
    }))
}

/// POST /auth/logout — delete the current session.
async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(&token)
            .execute(pool)
            .await?;
    }
    clear_session_cookie(&cookies);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me — return the currently logged-in user.
async fn me(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    let row = sqlx::query_as::<_, MeRow>(
        "SELECT u.id, u.username, u.full_name, u.role
         FROM user_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = $1 AND s.expires_at > NOW() AND u.is_active = TRUE
         LIMIT 1",
    )
    .bind(&token)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserResponse {
        id:        row.id,
        username:  row.username,
        full_name: row.full_name,
        role:      row.role,
    }))
}

// ── Internal helpers ──────────────────────────────────────────

async fn create_session(pool: &Db, user_id: i64, days: i64) -> AppResult<String> {
    let token = generate_token();
    let expires_at = Utc::now() + chrono::Duration::days(days);

    sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

fn set_session_cookie(cookies: &Cookies, token: &str, days: i64) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::days(days))
        .build();
    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(cookie);
}
