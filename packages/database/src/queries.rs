//! Postgres implementation of the registry store.
//!
//! All queries go through `query_raw_params()` / `exec_raw_params()`
//! with positional `DatabaseValue` parameters. Region-filter column
//! names come from the closed [`RegionField`] enum, never from caller
//! input.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use pothole_map_database_models::{
    Coordinate, IncidentQuery, IncidentRecord, InvitationRow, NewIncident, NewUser, UserRow,
};
use pothole_map_incident_models::IncidentStatus;
use pothole_map_incident_models::region::RegionField;
use std::sync::Arc;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, RegistryStore};

/// Registry store backed by the Postgres database.
pub struct PgStore {
    db: Arc<dyn Database>,
}

impl PgStore {
    /// Wraps a database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

/// Columns selected for every incident query.
const INCIDENT_COLUMNS: &str = "id, reference_number, latitude, longitude, severity, confidence, \
     description, status, detection_method, priority_score, report_count, \
     reporters, state, district, mandal, image_url, reported_date, last_update";

fn conversion<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> DbError + '_ {
    move |e| DbError::Conversion {
        message: format!("{context}: {e}"),
    }
}

fn parse_datetime(row: &switchy_database::Row, column: &str) -> Result<DateTime<Utc>, DbError> {
    let naive: NaiveDateTime = row
        .to_value(column)
        .map_err(conversion(&format!("Failed to parse {column}")))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn parse_incident(row: &switchy_database::Row) -> Result<IncidentRecord, DbError> {
    let severity: String = row
        .to_value("severity")
        .map_err(conversion("Failed to read severity"))?;
    let status: String = row
        .to_value("status")
        .map_err(conversion("Failed to read status"))?;
    let detection_method: String = row
        .to_value("detection_method")
        .map_err(conversion("Failed to read detection_method"))?;
    let reporters_json: String = row
        .to_value("reporters")
        .map_err(conversion("Failed to read reporters"))?;

    let latitude: Option<f64> = row.to_value("latitude").unwrap_or(None);
    let longitude: Option<f64> = row.to_value("longitude").unwrap_or(None);
    let coordinate = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
        _ => None,
    };

    Ok(IncidentRecord {
        id: row.to_value("id").map_err(conversion("Failed to parse id"))?,
        reference_number: row
            .to_value("reference_number")
            .map_err(conversion("Failed to parse reference_number"))?,
        coordinate,
        severity: severity
            .parse()
            .map_err(conversion("Invalid severity value"))?,
        confidence: row.to_value("confidence").unwrap_or(0.0),
        description: row.to_value("description").unwrap_or_default(),
        status: status.parse().map_err(conversion("Invalid status value"))?,
        detection_method: detection_method
            .parse()
            .map_err(conversion("Invalid detection_method value"))?,
        priority_score: row.to_value("priority_score").unwrap_or(1),
        report_count: row.to_value("report_count").unwrap_or(1),
        reporters: serde_json::from_str(&reporters_json)
            .map_err(conversion("Invalid reporters JSON"))?,
        region: pothole_map_incident_models::region::RegionTags {
            state: row.to_value("state").unwrap_or_default(),
            district: row.to_value("district").unwrap_or_default(),
            mandal: row.to_value("mandal").unwrap_or_default(),
        },
        image_url: row.to_value("image_url").unwrap_or(None),
        reported_date: parse_datetime(row, "reported_date")?,
        last_update: parse_datetime(row, "last_update")?,
    })
}

fn parse_user(row: &switchy_database::Row) -> Result<UserRow, DbError> {
    Ok(UserRow {
        id: row.to_value("id").map_err(conversion("Failed to parse user id"))?,
        email: row
            .to_value("email")
            .map_err(conversion("Failed to parse email"))?,
        name: row.to_value("name").unwrap_or_default(),
        role: row.to_value("role").unwrap_or_default(),
        jurisdiction_area: row.to_value("jurisdiction_area").unwrap_or(None),
        is_active: row.to_value("is_active").unwrap_or(true),
        created_at: parse_datetime(row, "created_at")?,
    })
}

fn parse_invitation(row: &switchy_database::Row) -> Result<InvitationRow, DbError> {
    let used_at: Option<NaiveDateTime> = row.to_value("used_at").unwrap_or(None);

    Ok(InvitationRow {
        code: row
            .to_value("code")
            .map_err(conversion("Failed to parse invitation code"))?,
        role: row.to_value("role").unwrap_or_default(),
        jurisdiction: row.to_value("jurisdiction").unwrap_or_default(),
        created_by: row.to_value("created_by").unwrap_or_default(),
        expires_at: parse_datetime(row, "expires_at")?,
        is_used: row.to_value("is_used").unwrap_or(false),
        used_by: row.to_value("used_by").unwrap_or(None),
        used_at: used_at.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        created_at: parse_datetime(row, "created_at")?,
    })
}

fn optional_real(value: Option<f64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Real64)
}

fn optional_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| {
        DatabaseValue::String(v.to_string())
    })
}

#[async_trait]
impl RegistryStore for PgStore {
    async fn create_incident(&self, incident: &NewIncident) -> Result<IncidentRecord, DbError> {
        let reporters_json =
            serde_json::to_string(&[incident.reporter.clone()]).unwrap_or_else(|_| "[]".to_string());

        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "INSERT INTO incidents (
                        reference_number, latitude, longitude, severity, confidence,
                        description, status, detection_method, priority_score,
                        report_count, reporters, state, district, mandal, image_url,
                        reported_date, last_update
                    ) VALUES (
                        $1, $2, $3, $4, $5, $6, 'reported', $7, 1, 1, $8, $9, $10,
                        $11, $12, NOW(), NOW()
                    )
                    RETURNING {INCIDENT_COLUMNS}"
                ),
                &[
                    DatabaseValue::String(incident.reference_number.clone()),
                    optional_real(incident.coordinate.map(|c| c.latitude)),
                    optional_real(incident.coordinate.map(|c| c.longitude)),
                    DatabaseValue::String(incident.severity.to_string()),
                    DatabaseValue::Real64(incident.confidence),
                    DatabaseValue::String(incident.description.clone()),
                    DatabaseValue::String(incident.detection_method.to_string()),
                    DatabaseValue::String(reporters_json),
                    DatabaseValue::String(incident.region.state.clone()),
                    DatabaseValue::String(incident.region.district.clone()),
                    DatabaseValue::String(incident.region.mandal.clone()),
                    optional_string(incident.image_url.as_deref()),
                ],
            )
            .await?;

        let row = rows.first().ok_or_else(|| DbError::Conversion {
            message: "Insert returned no row".to_string(),
        })?;
        parse_incident(row)
    }

    async fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1"),
                &[DatabaseValue::Int64(id)],
            )
            .await?;

        rows.first().map(parse_incident).transpose()
    }

    async fn incident_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<IncidentRecord>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE reference_number = $1"),
                &[DatabaseValue::String(reference.to_string())],
            )
            .await?;

        rows.first().map(parse_incident).transpose()
    }

    async fn incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, DbError> {
        let mut sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE 1=1");
        let mut params: Vec<DatabaseValue> = Vec::new();

        if let Some(region) = &query.region {
            // Column names come from the closed RegionField enum.
            let column = match region.field {
                RegionField::State => "state",
                RegionField::District => "district",
                RegionField::Mandal => "mandal",
            };
            params.push(DatabaseValue::String(region.value.trim().to_string()));
            sql.push_str(&format!(
                " AND LOWER(TRIM({column})) = LOWER(TRIM(${}))",
                params.len()
            ));
        }

        if let Some(from) = query.date_from {
            params.push(DatabaseValue::DateTime(from.naive_utc()));
            sql.push_str(&format!(" AND reported_date >= ${}", params.len()));
        }

        if let Some(to) = query.date_to {
            // Inclusive end date: keep everything before the next day.
            let end = to + Duration::days(1);
            params.push(DatabaseValue::DateTime(end.naive_utc()));
            sql.push_str(&format!(" AND reported_date < ${}", params.len()));
        }

        sql.push_str(" ORDER BY reported_date DESC");

        let rows = self.db.query_raw_params(&sql, &params).await?;
        rows.iter().map(parse_incident).collect()
    }

    async fn dedup_candidates(&self) -> Result<Vec<IncidentRecord>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "SELECT {INCIDENT_COLUMNS} FROM incidents
                     WHERE status != 'fixed'
                       AND latitude IS NOT NULL
                       AND longitude IS NOT NULL"
                ),
                &[],
            )
            .await?;

        rows.iter().map(parse_incident).collect()
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<bool, DbError> {
        let affected = self
            .db
            .exec_raw_params(
                "UPDATE incidents SET status = $2, last_update = NOW() WHERE id = $1",
                &[
                    DatabaseValue::Int64(id),
                    DatabaseValue::String(status.to_string()),
                ],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn boost_priority(
        &self,
        id: i64,
        boost: i64,
        reporter: &str,
    ) -> Result<Option<IncidentRecord>, DbError> {
        let Some(current) = self.incident_by_id(id).await? else {
            return Ok(None);
        };

        let mut reporters = current.reporters;
        reporters.push(reporter.to_string());
        let reporters_json =
            serde_json::to_string(&reporters).map_err(conversion("Failed to encode reporters"))?;

        self.db
            .exec_raw_params(
                "UPDATE incidents SET
                    priority_score = $2,
                    report_count = $3,
                    reporters = $4,
                    last_update = NOW()
                 WHERE id = $1",
                &[
                    DatabaseValue::Int64(id),
                    DatabaseValue::Int64(current.priority_score + boost),
                    DatabaseValue::Int64(current.report_count + 1),
                    DatabaseValue::String(reporters_json),
                ],
            )
            .await?;

        self.incident_by_id(id).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserRow, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "INSERT INTO users (email, name, role, jurisdiction_area, api_token, is_active, created_at)
                 VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
                 RETURNING id, email, name, role, jurisdiction_area, is_active, created_at",
                &[
                    DatabaseValue::String(user.email.clone()),
                    DatabaseValue::String(user.name.clone()),
                    DatabaseValue::String(user.role.clone()),
                    optional_string(user.jurisdiction_area.as_deref()),
                    DatabaseValue::String(user.api_token.clone()),
                ],
            )
            .await?;

        let row = rows.first().ok_or_else(|| DbError::Conversion {
            message: "User insert returned no row".to_string(),
        })?;
        parse_user(row)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRow>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT id, email, name, role, jurisdiction_area, is_active, created_at
                 FROM users WHERE LOWER(email) = LOWER($1)",
                &[DatabaseValue::String(email.to_string())],
            )
            .await?;

        rows.first().map(parse_user).transpose()
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<UserRow>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT id, email, name, role, jurisdiction_area, is_active, created_at
                 FROM users WHERE api_token = $1 AND is_active = TRUE",
                &[DatabaseValue::String(token.to_string())],
            )
            .await?;

        rows.first().map(parse_user).transpose()
    }

    async fn delete_user_by_email(&self, email: &str) -> Result<bool, DbError> {
        let affected = self
            .db
            .exec_raw_params(
                "DELETE FROM users WHERE LOWER(email) = LOWER($1)",
                &[DatabaseValue::String(email.to_string())],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn create_invitation(&self, invitation: &InvitationRow) -> Result<(), DbError> {
        self.db
            .exec_raw_params(
                "INSERT INTO invitation_codes (
                    code, role, jurisdiction, created_by, expires_at, is_used, created_at
                ) VALUES ($1, $2, $3, $4, $5, FALSE, NOW())",
                &[
                    DatabaseValue::String(invitation.code.clone()),
                    DatabaseValue::String(invitation.role.clone()),
                    DatabaseValue::String(invitation.jurisdiction.clone()),
                    DatabaseValue::String(invitation.created_by.clone()),
                    DatabaseValue::DateTime(invitation.expires_at.naive_utc()),
                ],
            )
            .await?;

        Ok(())
    }

    async fn invitation_by_code(&self, code: &str) -> Result<Option<InvitationRow>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT code, role, jurisdiction, created_by, expires_at, is_used,
                        used_by, used_at, created_at
                 FROM invitation_codes WHERE code = $1",
                &[DatabaseValue::String(code.to_string())],
            )
            .await?;

        rows.first().map(parse_invitation).transpose()
    }

    async fn invitations(&self) -> Result<Vec<InvitationRow>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT code, role, jurisdiction, created_by, expires_at, is_used,
                        used_by, used_at, created_at
                 FROM invitation_codes ORDER BY created_at DESC",
                &[],
            )
            .await?;

        rows.iter().map(parse_invitation).collect()
    }

    async fn mark_invitation_used(&self, code: &str, used_by: &str) -> Result<bool, DbError> {
        let affected = self
            .db
            .exec_raw_params(
                "UPDATE invitation_codes SET is_used = TRUE, used_by = $2, used_at = NOW()
                 WHERE code = $1",
                &[
                    DatabaseValue::String(code.to_string()),
                    DatabaseValue::String(used_by.to_string()),
                ],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn delete_invitation(&self, code: &str) -> Result<bool, DbError> {
        let affected = self
            .db
            .exec_raw_params(
                "DELETE FROM invitation_codes WHERE code = $1",
                &[DatabaseValue::String(code.to_string())],
            )
            .await?;

        Ok(affected > 0)
    }
}
