use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use image::RgbImage;
use pothole_map_database::{DbError, RegistryStore};
use pothole_map_database_models::{
    Coordinate, IncidentQuery, IncidentRecord, InvitationRow, NewIncident, NewUser, UserRow,
};
use pothole_map_detect::{
    BoundingBox, DefectDetector, DetectError, DetectionOutcome, FrameDecoder, ImageEnhancer,
    RawDetection,
};
use pothole_map_geocoder::StaticResolver;
use pothole_map_incident_models::{DetectionMethod, IncidentStatus, SeverityTier};

use super::*;

/// In-memory store stub. Injected through the same trait as the real
/// Postgres store; nothing production-facing touches it.
#[derive(Default)]
struct MemoryStore {
    incidents: Mutex<Vec<IncidentRecord>>,
    next_id: AtomicI64,
    fail_creates: AtomicBool,
    /// Number of upcoming reference lookups that should claim the code
    /// is taken, forcing the generator to re-roll.
    forced_collisions: AtomicU32,
}

impl MemoryStore {
    fn insert_at(&self, coordinate: Coordinate, status: IncidentStatus) -> IncidentRecord {
        let record = IncidentRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            reference_number: format!("PH-2026-SEED{:02}", self.next_id.load(Ordering::SeqCst)),
            coordinate: Some(coordinate),
            severity: SeverityTier::High,
            confidence: 88.0,
            description: "seeded".to_string(),
            status,
            detection_method: DetectionMethod::Manual,
            priority_score: 1,
            report_count: 1,
            reporters: vec!["seeder".to_string()],
            region: pothole_map_geocoder::fallback::region_for_coordinates(
                coordinate.latitude,
                coordinate.longitude,
            ),
            image_url: None,
            reported_date: Utc::now(),
            last_update: Utc::now(),
        };
        self.incidents.lock().unwrap().push(record.clone());
        record
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn create_incident(&self, incident: &NewIncident) -> Result<IncidentRecord, DbError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DbError::Conversion {
                message: "simulated store outage".to_string(),
            });
        }

        let record = IncidentRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            reference_number: incident.reference_number.clone(),
            coordinate: incident.coordinate,
            severity: incident.severity,
            confidence: incident.confidence,
            description: incident.description.clone(),
            status: IncidentStatus::Reported,
            detection_method: incident.detection_method,
            priority_score: 1,
            report_count: 1,
            reporters: vec![incident.reporter.clone()],
            region: incident.region.clone(),
            image_url: incident.image_url.clone(),
            reported_date: Utc::now(),
            last_update: Utc::now(),
        };
        self.incidents.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn incident_by_id(&self, id: i64) -> Result<Option<IncidentRecord>, DbError> {
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn incident_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<IncidentRecord>, DbError> {
        if self.forced_collisions.load(Ordering::SeqCst) > 0 {
            self.forced_collisions.fetch_sub(1, Ordering::SeqCst);
            let phantom = IncidentRecord {
                id: 0,
                reference_number: reference.to_string(),
                coordinate: None,
                severity: SeverityTier::Low,
                confidence: 0.0,
                description: "phantom collision".to_string(),
                status: IncidentStatus::Reported,
                detection_method: DetectionMethod::Manual,
                priority_score: 1,
                report_count: 1,
                reporters: vec!["phantom".to_string()],
                region: pothole_map_geocoder::fallback::region_for_coordinates(0.0, 0.0),
                image_url: None,
                reported_date: Utc::now(),
                last_update: Utc::now(),
            };
            return Ok(Some(phantom));
        }

        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.reference_number == reference)
            .cloned())
    }

    async fn incidents(&self, _query: &IncidentQuery) -> Result<Vec<IncidentRecord>, DbError> {
        Ok(self.incidents.lock().unwrap().clone())
    }

    async fn dedup_candidates(&self) -> Result<Vec<IncidentRecord>, DbError> {
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.status != IncidentStatus::Fixed && record.coordinate.is_some())
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: i64, status: IncidentStatus) -> Result<bool, DbError> {
        let mut incidents = self.incidents.lock().unwrap();
        if let Some(record) = incidents.iter_mut().find(|record| record.id == id) {
            record.status = status;
            record.last_update = Utc::now();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn boost_priority(
        &self,
        id: i64,
        boost: i64,
        reporter: &str,
    ) -> Result<Option<IncidentRecord>, DbError> {
        let mut incidents = self.incidents.lock().unwrap();
        let Some(record) = incidents.iter_mut().find(|record| record.id == id) else {
            return Ok(None);
        };
        record.priority_score += boost;
        record.report_count += 1;
        record.reporters.push(reporter.to_string());
        record.last_update = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn create_user(&self, _user: &NewUser) -> Result<UserRow, DbError> {
        unreachable!("not exercised by pipeline tests")
    }

    async fn user_by_email(&self, _email: &str) -> Result<Option<UserRow>, DbError> {
        Ok(None)
    }

    async fn user_by_token(&self, _token: &str) -> Result<Option<UserRow>, DbError> {
        Ok(None)
    }

    async fn delete_user_by_email(&self, _email: &str) -> Result<bool, DbError> {
        Ok(false)
    }

    async fn create_invitation(&self, _invitation: &InvitationRow) -> Result<(), DbError> {
        Ok(())
    }

    async fn invitation_by_code(&self, _code: &str) -> Result<Option<InvitationRow>, DbError> {
        Ok(None)
    }

    async fn invitations(&self) -> Result<Vec<InvitationRow>, DbError> {
        Ok(Vec::new())
    }

    async fn mark_invitation_used(&self, _code: &str, _used_by: &str) -> Result<bool, DbError> {
        Ok(false)
    }

    async fn delete_invitation(&self, _code: &str) -> Result<bool, DbError> {
        Ok(false)
    }
}

/// Detector stub returning a fixed detection list for every call.
struct StubDetector {
    detections: Vec<RawDetection>,
}

#[async_trait]
impl DefectDetector for StubDetector {
    async fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
        Ok(self.detections.clone())
    }

    async fn detect_with_overlay(
        &self,
        image: &RgbImage,
    ) -> Result<DetectionOutcome, DetectError> {
        Ok(DetectionOutcome {
            detections: self.detect(image).await?,
            annotated_jpeg: None,
        })
    }
}

/// Identity enhancer.
struct StubEnhancer;

#[async_trait]
impl ImageEnhancer for StubEnhancer {
    async fn enhance(&self, image: &RgbImage) -> Result<RgbImage, DetectError> {
        Ok(image.clone())
    }
}

/// Frame decoder stub yielding `count` blank frames.
struct StubFrames {
    count: usize,
}

#[async_trait]
impl FrameDecoder for StubFrames {
    async fn frames(&self, _data: &[u8], _extension: &str) -> Result<Vec<RgbImage>, DetectError> {
        Ok((0..self.count).map(|_| RgbImage::new(64, 64)).collect())
    }
}

fn raw_detection(confidence: f64) -> RawDetection {
    RawDetection {
        label: "severe_pothole".to_string(),
        confidence,
        bbox: BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 40.0,
            y2: 30.0,
        },
    }
}

fn png_bytes() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(RgbImage::new(32, 32))
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn pipeline_with(
    store: Arc<MemoryStore>,
    detections: Vec<RawDetection>,
    frames: usize,
) -> Pipeline {
    Pipeline::new(
        store,
        Arc::new(StubDetector { detections }),
        Arc::new(StubEnhancer),
        Arc::new(StubFrames { count: frames }),
        Arc::new(StaticResolver),
        None,
    )
}

#[tokio::test]
async fn validation_rejects_wrong_extension_and_empty_payload() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline_with(store, vec![], 0);

    let err = pipeline
        .analyze_image("road.gif", &png_bytes(), None, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_FILE_TYPE);
    assert_eq!(err.phase(), Some(Phase::Validation));

    let err = pipeline
        .analyze_image("road.png", &[], None, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::EMPTY_FILE);
}

#[tokio::test]
async fn analysis_without_coordinates_returns_detections_unpersisted() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline_with(Arc::clone(&store), vec![raw_detection(0.9)], 0);

    let outcome = pipeline
        .analyze_image("road.png", &png_bytes(), None, false)
        .await
        .unwrap();

    let AnalyzeOutcome::Completed(analysis) = outcome else {
        panic!("expected completed analysis");
    };
    assert_eq!(analysis.detections.len(), 1);
    assert!(analysis.coordinate.is_none());
    assert!(analysis.created.is_empty());
    assert!(store.incidents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn manual_coordinates_create_records_with_manual_method() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline_with(
        Arc::clone(&store),
        vec![raw_detection(0.9), raw_detection(0.6)],
        0,
    );

    let outcome = pipeline
        .analyze_image(
            "road.png",
            &png_bytes(),
            Some(Coordinate::new(13.07, 80.23)),
            false,
        )
        .await
        .unwrap();

    let AnalyzeOutcome::Completed(analysis) = outcome else {
        panic!("expected completed analysis");
    };
    assert_eq!(analysis.detection_method, DetectionMethod::Manual);
    assert_eq!(analysis.created.len(), 2);

    let critical = &analysis.created[0];
    assert_eq!(critical.severity, SeverityTier::Critical);
    assert!((critical.confidence - 90.0).abs() < 1e-9);
    assert_eq!(
        critical.description,
        "Auto-detected critical pothole (90.0% confidence)"
    );
    assert_eq!(critical.reporters, vec![SYSTEM_REPORTER.to_string()]);
    // Chennai falls inside the static fallback table.
    assert_eq!(critical.region.district, "Chennai");
}

#[tokio::test]
async fn nearby_submission_requires_confirmation_until_forced() {
    let store = Arc::new(MemoryStore::default());
    let existing = store.insert_at(Coordinate::new(0.0, 0.0), IncidentStatus::Reported);

    let pipeline = pipeline_with(Arc::clone(&store), vec![raw_detection(0.9)], 0);

    // ~10m east of the seeded incident.
    let nearby = Coordinate::new(0.0, 0.000_09);

    let outcome = pipeline
        .analyze_image("road.png", &png_bytes(), Some(nearby), false)
        .await
        .unwrap();

    let AnalyzeOutcome::PendingConfirmation { duplicates, .. } = outcome else {
        panic!("expected pending confirmation");
    };
    assert_eq!(duplicates.candidates.len(), 1);
    assert_eq!(duplicates.candidates[0].incident.id, existing.id);
    assert!(duplicates.candidates[0].distance_m < DEDUP_RADIUS_M);
    assert_eq!(store.incidents.lock().unwrap().len(), 1);

    // force_create bypasses the check and persists independently.
    let outcome = pipeline
        .analyze_image("road.png", &png_bytes(), Some(nearby), true)
        .await
        .unwrap();
    let AnalyzeOutcome::Completed(analysis) = outcome else {
        panic!("expected completed analysis");
    };
    assert_eq!(analysis.created.len(), 1);
    assert_eq!(store.incidents.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn manual_report_dedups_then_creates_when_forced() {
    let store = Arc::new(MemoryStore::default());
    store.insert_at(Coordinate::new(12.97, 77.59), IncidentStatus::Reported);

    let pipeline = pipeline_with(Arc::clone(&store), vec![], 0);

    let report = ManualReport {
        coordinate: Coordinate::new(12.970_05, 77.59),
        severity: SeverityTier::High,
        description: "Deep pothole near the bus stop".to_string(),
        reporter_name: "resident".to_string(),
        image: None,
        force_create: false,
    };

    let outcome = pipeline.submit_manual_report(report.clone()).await.unwrap();
    assert!(matches!(outcome, ReportOutcome::PendingConfirmation(_)));

    let outcome = pipeline
        .submit_manual_report(ManualReport {
            force_create: true,
            ..report
        })
        .await
        .unwrap();
    let ReportOutcome::Created(record) = outcome else {
        panic!("expected created record");
    };
    assert_eq!(record.detection_method, DetectionMethod::Manual);
    assert!((record.confidence - 100.0).abs() < 1e-9);
    assert_eq!(record.region.district, "Bengaluru Urban");
}

#[tokio::test]
async fn fixed_incidents_do_not_count_as_duplicates() {
    let store = Arc::new(MemoryStore::default());
    store.insert_at(Coordinate::new(0.0, 0.0), IncidentStatus::Fixed);

    let pipeline = pipeline_with(Arc::clone(&store), vec![], 0);

    let outcome = pipeline
        .submit_manual_report(ManualReport {
            coordinate: Coordinate::new(0.0, 0.000_05),
            severity: SeverityTier::Medium,
            description: "Reopened break next to the patched one".to_string(),
            reporter_name: "resident".to_string(),
            image: None,
            force_create: false,
        })
        .await
        .unwrap();

    assert!(matches!(outcome, ReportOutcome::Created(_)));
}

#[tokio::test]
async fn boost_appends_reporter_and_rejects_fixed() {
    let store = Arc::new(MemoryStore::default());
    let open = store.insert_at(Coordinate::new(0.0, 0.0), IncidentStatus::Reported);
    let fixed = store.insert_at(Coordinate::new(1.0, 1.0), IncidentStatus::Fixed);

    let pipeline = pipeline_with(Arc::clone(&store), vec![], 0);

    let updated = pipeline.boost_priority(open.id, 3, "second_reporter").await.unwrap();
    assert_eq!(updated.priority_score, 4);
    assert_eq!(updated.report_count, 2);
    assert_eq!(updated.reporters.last().map(String::as_str), Some("second_reporter"));

    let err = pipeline
        .boost_priority(fixed.id, 1, "anyone")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ImmutableState));

    let err = pipeline.boost_priority(9999, 1, "anyone").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}

#[tokio::test]
async fn persistence_failure_is_non_fatal_for_analysis() {
    let store = Arc::new(MemoryStore::default());
    store.fail_creates.store(true, Ordering::SeqCst);

    let pipeline = pipeline_with(Arc::clone(&store), vec![raw_detection(0.9)], 0);

    let outcome = pipeline
        .analyze_image(
            "road.png",
            &png_bytes(),
            Some(Coordinate::new(12.97, 77.59)),
            false,
        )
        .await
        .unwrap();

    let AnalyzeOutcome::Completed(analysis) = outcome else {
        panic!("expected completed analysis");
    };
    // Detections still come back even though nothing was stored.
    assert_eq!(analysis.detections.len(), 1);
    assert!(analysis.created.is_empty());
}

#[tokio::test]
async fn video_aggregates_frames_into_one_severe_record() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline_with(
        Arc::clone(&store),
        vec![raw_detection(0.9), raw_detection(0.55)],
        3,
    );

    let analysis = pipeline
        .analyze_video(
            "clip.mp4",
            b"not a real container, the stub decoder ignores it",
            Some(Coordinate::new(28.63, 77.21)),
        )
        .await
        .unwrap();

    assert_eq!(analysis.frames_processed, 3);
    assert_eq!(analysis.total_detections, 6);
    assert_eq!(analysis.summary.get(&SeverityTier::Critical), Some(&3));
    assert_eq!(analysis.summary.get(&SeverityTier::Medium), Some(&3));
    assert_eq!(analysis.detections[0].frame_number, 1);

    let record = analysis.created.expect("severe detections persist a record");
    assert_eq!(record.severity, SeverityTier::Critical);
    assert!((record.confidence - 90.0).abs() < 1e-9);
    assert_eq!(
        record.description,
        "Video analysis detected 6 potholes across 3 frames"
    );
    assert_eq!(record.region.district, "Central Delhi");
    assert_eq!(store.incidents.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn video_without_severe_detections_persists_nothing() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline_with(Arc::clone(&store), vec![raw_detection(0.55)], 2);

    let analysis = pipeline
        .analyze_video("clip.mp4", b"stub", Some(Coordinate::new(28.63, 77.21)))
        .await
        .unwrap();

    assert_eq!(analysis.total_detections, 2);
    assert!(analysis.created.is_none());
    assert!(store.incidents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reference_generation_is_collision_free_across_many_codes() {
    let store = MemoryStore::default();
    // The first uniqueness check claims the code is taken, so the
    // generator must re-roll at least once.
    store.forced_collisions.store(1, Ordering::SeqCst);

    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        let code = reference::generate_reference(&store).await.unwrap();
        assert!(code.starts_with("PH-"), "unexpected shape: {code}");
        let suffix = code.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(seen.insert(code), "duplicate reference generated");
    }
    assert_eq!(seen.len(), 10_000);
}
