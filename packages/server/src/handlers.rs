//! HTTP handler functions for the pothole map API.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use pothole_map_access::{
    authorize_invitation_admin, authorize_status_update, jurisdiction_filter, AccessError,
};
use pothole_map_database_models::{Coordinate, IncidentQuery, InvitationRow, RegionEquals};
use pothole_map_incident_models::IncidentStatus;
use pothole_map_pipeline::{
    codes, reference, AnalyzeOutcome, ManualReport, PipelineError, ReportOutcome,
};
use pothole_map_server_models::{
    AnalyzeQueryParams, AnalyzeResponse, ApiError, ApiHealth, ApiIncident, ApiInvitation,
    ApiStats, InvitationRequest, ManualReportRequest, NearbyFoundResponse, PotholesQueryParams,
    PotholesResponse, PrioritizeResponse, PriorityBoostRequest, ReportResponse,
    StatusUpdateRequest, VideoAnalyzeResponse,
};

use crate::auth::{optional_caller, require_caller};
use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/analyze`
///
/// Body: raw image bytes. Query: filename, optional manual coordinates,
/// `forceCreate`.
pub async fn analyze(
    state: web::Data<AppState>,
    params: web::Query<AnalyzeQueryParams>,
    body: web::Bytes,
) -> HttpResponse {
    let Some(filename) = params.filename.clone().filter(|f| !f.trim().is_empty()) else {
        return error_body(400, "No image provided", codes::IMAGE_MISSING, Some("validation"));
    };

    let started = std::time::Instant::now();
    let manual = manual_coordinate(params.manual_latitude, params.manual_longitude);

    match state
        .pipeline
        .analyze_image(&filename, &body, manual, params.force_create)
        .await
    {
        Ok(AnalyzeOutcome::Completed(analysis)) => HttpResponse::Ok().json(AnalyzeResponse {
            status: "success".to_string(),
            gps_info: analysis.coordinate.map(Into::into),
            detections: analysis.detections.iter().map(Into::into).collect(),
            annotated_image_url: analysis.annotated_image_url,
            created: analysis.created.into_iter().map(ApiIncident::from).collect(),
            processing_time: started.elapsed().as_secs_f64(),
        }),
        Ok(AnalyzeOutcome::PendingConfirmation {
            duplicates,
            detections,
            annotated_image_url,
        }) => HttpResponse::Ok().json(NearbyFoundResponse::from_duplicates(
            &duplicates,
            &detections,
            annotated_image_url,
        )),
        Err(e) => pipeline_error_response(&e),
    }
}

/// `POST /api/analyze-video`
///
/// Body: raw video bytes. Query: filename, optional manual coordinates.
pub async fn analyze_video(
    state: web::Data<AppState>,
    params: web::Query<AnalyzeQueryParams>,
    body: web::Bytes,
) -> HttpResponse {
    let Some(filename) = params.filename.clone().filter(|f| !f.trim().is_empty()) else {
        return error_body(400, "No video provided", codes::VIDEO_MISSING, Some("validation"));
    };

    let started = std::time::Instant::now();
    let manual = manual_coordinate(params.manual_latitude, params.manual_longitude);

    match state.pipeline.analyze_video(&filename, &body, manual).await {
        Ok(analysis) => HttpResponse::Ok().json(VideoAnalyzeResponse {
            status: "success".to_string(),
            r#type: "video".to_string(),
            gps_info: analysis.coordinate.map(Into::into),
            total_detections: analysis.total_detections,
            frames_processed: analysis.frames_processed,
            detection_summary: analysis.summary,
            all_detections: analysis.detections.iter().map(Into::into).collect(),
            preview_image_url: analysis.preview_url,
            created: analysis.created.map(ApiIncident::from),
            processing_time: started.elapsed().as_secs_f64(),
        }),
        Err(e) => pipeline_error_response(&e),
    }
}

/// `POST /api/report`
///
/// Manual pothole report with caller-supplied severity and description.
pub async fn report(
    state: web::Data<AppState>,
    body: web::Json<ManualReportRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    let Ok(severity) = request.severity.parse() else {
        return error_body(400, "Invalid severity level", codes::INVALID_FIELD, None);
    };

    let image = match decode_report_image(&request) {
        Ok(image) => image,
        Err(response) => return *response,
    };

    let report = ManualReport {
        coordinate: Coordinate::new(request.latitude, request.longitude),
        severity,
        description: request.description,
        reporter_name: request.reporter_name,
        image,
        force_create: request.force_create,
    };

    match state.pipeline.submit_manual_report(report).await {
        Ok(ReportOutcome::Created(record)) => HttpResponse::Ok().json(ReportResponse {
            status: "success".to_string(),
            message: "Pothole reported successfully".to_string(),
            pothole: record.into(),
        }),
        Ok(ReportOutcome::PendingConfirmation(duplicates)) => HttpResponse::Ok().json(
            NearbyFoundResponse::from_duplicates(&duplicates, &[], None),
        ),
        Err(e) => pipeline_error_response(&e),
    }
}

/// `GET /api/potholes`
///
/// Incident listing, partitioned by the caller's jurisdiction and
/// optionally bounded by an inclusive date range. Unauthenticated and
/// citizen callers see the unfiltered set.
pub async fn potholes(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<PotholesQueryParams>,
) -> HttpResponse {
    let caller = optional_caller(&req, &state.verifier).await;
    let query = visible_query(caller.as_ref(), &params);

    match state.store.incidents(&query).await {
        Ok(records) => {
            let potholes: Vec<ApiIncident> = records.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(PotholesResponse {
                total_count: potholes.len(),
                potholes,
            })
        }
        Err(e) => {
            log::error!("Failed to query incidents: {e}");
            error_body(500, "Failed to query incidents", codes::STORE_ERROR, None)
        }
    }
}

/// `PUT /api/potholes/{id}`
///
/// Status transition. Authority roles only; non-national authorities
/// are confined to their jurisdiction; `fixed` records are permanent.
pub async fn update_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> HttpResponse {
    let caller = match require_caller(&req, &state.verifier).await {
        Ok(caller) => caller,
        Err(e) => return access_error_response(&e),
    };

    let Ok(new_status) = body.status.parse::<IncidentStatus>() else {
        return error_body(
            400,
            "Invalid status. Must be one of: reported, verified, in_progress, fixed",
            codes::INVALID_FIELD,
            None,
        );
    };

    let id = path.into_inner();
    let record = match state.store.incident_by_id(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return error_body(404, "Pothole not found", codes::NOT_FOUND, None),
        Err(e) => {
            log::error!("Failed to fetch incident {id}: {e}");
            return error_body(500, "Failed to fetch pothole", codes::STORE_ERROR, None);
        }
    };

    if let Err(e) = authorize_status_update(&caller, record.status, &record.region) {
        return access_error_response(&e);
    }

    match state.store.update_status(id, new_status).await {
        Ok(true) => {
            log::info!(
                "Incident {id} status updated from {} to {new_status} by {}",
                record.status,
                caller.email
            );
            let updated = state.store.incident_by_id(id).await.ok().flatten();
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": format!("Pothole status updated to {new_status}"),
                "pothole": updated.map(ApiIncident::from),
            }))
        }
        Ok(false) => error_body(404, "Pothole not found", codes::NOT_FOUND, None),
        Err(e) => {
            log::error!("Failed to update incident {id}: {e}");
            error_body(500, "Failed to update pothole status", codes::STORE_ERROR, None)
        }
    }
}

/// `POST /api/update-priority`
///
/// Merge a new observation into an existing record.
pub async fn update_priority(
    state: web::Data<AppState>,
    body: web::Json<PriorityBoostRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    let boost = request.priority_boost.unwrap_or(1);
    let reporter = request
        .reporter_name
        .unwrap_or_else(|| "anonymous".to_string());

    match state
        .pipeline
        .boost_priority(request.pothole_id, boost, &reporter)
        .await
    {
        Ok(record) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": "Priority updated successfully",
            "pothole": ApiIncident::from(record),
        })),
        Err(e) => pipeline_error_response(&e),
    }
}

/// `GET /api/track/{reference}`
pub async fn track(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let reference = path.into_inner();

    match state.store.incident_by_reference(&reference).await {
        Ok(Some(record)) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "pothole": ApiIncident::from(record),
        })),
        Ok(None) => error_body(
            404,
            "No pothole found with this reference number",
            codes::NOT_FOUND,
            None,
        ),
        Err(e) => {
            log::error!("Failed to look up reference {reference}: {e}");
            error_body(500, "Failed to look up reference", codes::STORE_ERROR, None)
        }
    }
}

/// `POST /api/prioritize`
///
/// Ranks the caller's visible record set by computed urgency.
pub async fn prioritize(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<PotholesQueryParams>,
) -> HttpResponse {
    let caller = optional_caller(&req, &state.verifier).await;
    let query = visible_query(caller.as_ref(), &params);

    match state.store.incidents(&query).await {
        Ok(records) => {
            let ranked = pothole_map_priority::prioritize(records);
            HttpResponse::Ok().json(PrioritizeResponse {
                status: "success".to_string(),
                total_count: ranked.len(),
                prioritized_potholes: ranked.into_iter().map(Into::into).collect(),
                algorithm: "severity_confidence_based".to_string(),
            })
        }
        Err(e) => {
            log::error!("Failed to query incidents for prioritization: {e}");
            error_body(500, "Failed to prioritize incidents", codes::STORE_ERROR, None)
        }
    }
}

/// `GET /api/stats`
///
/// Public landing-page statistics; no authentication required.
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let records = match state.store.incidents(&IncidentQuery::default()).await {
        Ok(records) => records,
        Err(e) => {
            log::error!("Failed to query incidents for stats: {e}");
            Vec::new()
        }
    };

    let fixed: Vec<_> = records
        .iter()
        .filter(|record| record.status == IncidentStatus::Fixed)
        .collect();

    let avg_response_days = if fixed.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let total: f64 = fixed
            .iter()
            .map(|record| {
                (record.last_update - record.reported_date)
                    .num_days()
                    .max(0) as f64
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = total / fixed.len() as f64;
        (avg * 10.0).round() / 10.0
    };

    HttpResponse::Ok().json(serde_json::json!({
        "stats": ApiStats {
            total_detected: records.len(),
            fixed_count: fixed.len(),
            pending_count: records.len() - fixed.len(),
            avg_response_days,
        }
    }))
}

/// `POST /api/invitations`
///
/// Generates an invitation code for onboarding an authority account.
/// Invitation-admin roles only.
pub async fn create_invitation(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<InvitationRequest>,
) -> HttpResponse {
    let caller = match require_caller(&req, &state.verifier).await {
        Ok(caller) => caller,
        Err(e) => return access_error_response(&e),
    };
    if let Err(e) = authorize_invitation_admin(&caller) {
        return access_error_response(&e);
    }

    let request = body.into_inner();
    if request.role.parse::<pothole_map_access::Role>().is_err() {
        return error_body(400, "Invalid role", codes::INVALID_FIELD, None);
    }

    let invitation = InvitationRow {
        code: reference::generate_invitation_code(),
        role: request.role,
        jurisdiction: request.jurisdiction,
        created_by: caller.email.clone(),
        expires_at: Utc::now() + chrono::Duration::days(30),
        is_used: false,
        used_by: None,
        used_at: None,
        created_at: Utc::now(),
    };

    match state.store.create_invitation(&invitation).await {
        Ok(()) => {
            log::info!(
                "Invitation code {} generated for role {} by {}",
                invitation.code,
                invitation.role,
                caller.email
            );
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "invitation": ApiInvitation::from(invitation),
            }))
        }
        Err(e) => {
            log::error!("Failed to create invitation: {e}");
            error_body(500, "Failed to generate invitation code", codes::STORE_ERROR, None)
        }
    }
}

/// `GET /api/invitations`
pub async fn list_invitations(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let caller = match require_caller(&req, &state.verifier).await {
        Ok(caller) => caller,
        Err(e) => return access_error_response(&e),
    };
    if let Err(e) = authorize_invitation_admin(&caller) {
        return access_error_response(&e);
    }

    match state.store.invitations().await {
        Ok(invitations) => {
            let invitations: Vec<ApiInvitation> =
                invitations.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "invitations": invitations,
            }))
        }
        Err(e) => {
            log::error!("Failed to list invitations: {e}");
            error_body(500, "Failed to list invitation codes", codes::STORE_ERROR, None)
        }
    }
}

/// `DELETE /api/invitations/{code}`
///
/// Revokes an invitation code; a redeemed code also removes the
/// authority account it created.
pub async fn delete_invitation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let caller = match require_caller(&req, &state.verifier).await {
        Ok(caller) => caller,
        Err(e) => return access_error_response(&e),
    };
    if let Err(e) = authorize_invitation_admin(&caller) {
        return access_error_response(&e);
    }

    let code = path.into_inner();
    let invitation = match state.store.invitation_by_code(&code).await {
        Ok(Some(invitation)) => invitation,
        Ok(None) => return error_body(404, "Invitation code not found", codes::NOT_FOUND, None),
        Err(e) => {
            log::error!("Failed to fetch invitation {code}: {e}");
            return error_body(500, "Failed to delete invitation code", codes::STORE_ERROR, None);
        }
    };

    let mut deleted_user = None;
    if invitation.is_used
        && let Some(used_by) = &invitation.used_by
    {
        match state.store.delete_user_by_email(used_by).await {
            Ok(true) => {
                log::info!("Authority account deleted: {used_by}");
                deleted_user = Some(used_by.clone());
            }
            Ok(false) => {}
            Err(e) => log::error!("Failed to delete account {used_by}: {e}"),
        }
    }

    match state.store.delete_invitation(&code).await {
        Ok(true) => {
            log::info!("Invitation code deleted: {code} by {}", caller.email);
            let message = deleted_user.as_ref().map_or_else(
                || "Invitation code deleted successfully".to_string(),
                |email| {
                    format!(
                        "Invitation code deleted successfully and associated authority account ({email}) removed"
                    )
                },
            );
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": message,
                "deletedUser": deleted_user,
            }))
        }
        Ok(false) => error_body(404, "Invitation code not found", codes::NOT_FOUND, None),
        Err(e) => {
            log::error!("Failed to delete invitation {code}: {e}");
            error_body(500, "Failed to delete invitation code", codes::STORE_ERROR, None)
        }
    }
}

/// Builds the store query for a caller's visible record set.
fn visible_query(
    caller: Option<&pothole_map_access::CallerContext>,
    params: &PotholesQueryParams,
) -> IncidentQuery {
    IncidentQuery {
        region: jurisdiction_filter(caller).map(|filter| RegionEquals {
            field: filter.field,
            value: filter.area,
        }),
        date_from: params.date_from.as_deref().and_then(parse_date),
        date_to: params.date_to.as_deref().and_then(parse_date),
    }
}

/// Parses a date filter value: RFC 3339, or a bare `YYYY-MM-DD` taken
/// as the start of that day (UTC).
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime.with_timezone(&Utc));
    }
    let date = s.parse::<NaiveDate>().ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

/// Parses manual coordinates, requiring both fields.
fn manual_coordinate(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinate> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
        _ => None,
    }
}

/// Decodes the optional base64 photo on a manual report.
fn decode_report_image(
    request: &ManualReportRequest,
) -> Result<Option<(String, Vec<u8>)>, Box<HttpResponse>> {
    use base64::Engine as _;

    let Some(encoded) = request.image_base64.as_deref() else {
        return Ok(None);
    };

    let payload = encoded.rsplit(',').next().unwrap_or(encoded);
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| {
            Box::new(error_body(
                400,
                "Image is not valid base64",
                codes::INVALID_FIELD,
                None,
            ))
        })?;

    let extension = request
        .image_extension
        .clone()
        .unwrap_or_else(|| "jpg".to_string())
        .to_ascii_lowercase();

    Ok(Some((extension, data)))
}

/// Maps a pipeline error onto an HTTP response with its stable code and
/// phase tag.
fn pipeline_error_response(e: &PipelineError) -> HttpResponse {
    let status = match e {
        PipelineError::Validation { .. } => 400,
        PipelineError::NotFound { .. } => 404,
        PipelineError::ImmutableState => 403,
        PipelineError::Processing { .. } | PipelineError::Store(_) => 500,
    };

    if status == 500 {
        log::error!("Pipeline failure: {e}");
    }

    error_body(
        status,
        &e.to_string(),
        e.code(),
        e.phase().map(|phase| phase.as_ref().to_string()).as_deref(),
    )
}

/// Maps an access error onto an HTTP response.
fn access_error_response(e: &AccessError) -> HttpResponse {
    match e {
        AccessError::Unauthorized => error_body(401, &e.to_string(), "UNAUTHORIZED", None),
        AccessError::Forbidden { .. } => error_body(403, &e.to_string(), "FORBIDDEN", None),
        AccessError::ImmutableState => error_body(403, &e.to_string(), codes::IMMUTABLE, None),
    }
}

fn error_body(status: u16, message: &str, code: &str, phase: Option<&str>) -> HttpResponse {
    let body = ApiError {
        error: message.to_string(),
        code: code.to_string(),
        phase: phase.map(ToString::to_string),
    };

    match status {
        400 => HttpResponse::BadRequest().json(body),
        401 => HttpResponse::Unauthorized().json(body),
        403 => HttpResponse::Forbidden().json(body),
        404 => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pothole_map_access::{CallerContext, Role};

    #[test]
    fn parses_bare_dates_as_day_start() {
        let parsed = parse_date("2026-08-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-01T00:00:00+00:00");
    }

    #[test]
    fn parses_rfc3339_dates() {
        let parsed = parse_date("2026-08-01T12:30:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-01T12:30:00+00:00");
    }

    #[test]
    fn rejects_invalid_dates() {
        assert!(parse_date("not-a-date").is_none());
    }

    #[test]
    fn manual_coordinates_require_both_fields() {
        assert!(manual_coordinate(Some(12.9), None).is_none());
        assert!(manual_coordinate(None, Some(77.5)).is_none());
        let coordinate = manual_coordinate(Some(12.9), Some(77.5)).unwrap();
        assert!((coordinate.latitude - 12.9).abs() < f64::EPSILON);
    }

    #[test]
    fn visible_query_carries_jurisdiction_filter() {
        let caller = CallerContext {
            user_id: 1,
            email: "district@example.com".to_string(),
            role: Role::DistrictAuthority,
            jurisdiction_area: Some("Chennai".to_string()),
        };
        let params = PotholesQueryParams {
            date_from: Some("2026-08-01".to_string()),
            date_to: None,
        };

        let query = visible_query(Some(&caller), &params);
        let region = query.region.expect("district authority is scoped");
        assert_eq!(region.value, "Chennai");
        assert!(query.date_from.is_some());
        assert!(query.date_to.is_none());

        let unauthenticated = visible_query(
            None,
            &PotholesQueryParams {
                date_from: None,
                date_to: None,
            },
        );
        assert!(unauthenticated.region.is_none());
    }
}
