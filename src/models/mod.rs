#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Users ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id:            i64,
    pub username:      String,
    pub password_hash: String,
    pub full_name:     String,
    pub role:          UserRole,
    pub is_active:     bool,
}

/// Canonical role encoding: `admin` / `pilot`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Pilot,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self { UserRole::Admin => "admin", UserRole::Pilot => "pilot" };
        write!(f, "{s}")
    }
}

// ── Sessions ─────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSession {
    pub id:         i64,
    pub user_id:    i64,
    pub token:      String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

// ── Vehicles ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub plate:             String,
    pub brand:             String,
    pub model:             String,
    pub year:              Option<i32>,
    pub capacity_kg:       Option<i32>,
    pub assigned_pilot_id: Option<i64>,
}

// ── Reports ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id:                i64,
    pub driver_id:         i64,
    pub vehicle_plate:     String,
    /// Local wall-clock time in the configured report timezone.
    pub report_date:       NaiveDateTime,
    pub km_actual:         f64,
    pub km_next_service:   Option<f64>,
    pub last_service_date: Option<NaiveDate>,
    pub observations:      Option<String>,
}

/// One checklist result row. `state` holds the submitter's original string
/// (already validated against the three allowed states on the way in).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChecklistDetail {
    pub id:        i64,
    pub report_id: i64,
    pub category:  String,
    pub item:      String,
    pub state:     String,
}
