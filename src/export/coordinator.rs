//! Export orchestrator
//!
//! Owns one lane per output format. A lane is `Idle` or `Busy`; triggering a
//! busy lane is rejected without touching the retriever, and the two lanes
//! never block each other. A run goes through the stages
//! retrieve → parse → reproject (GeoJSON only) → encode → save, strictly in
//! order. Whatever happens, the lane is back to `Idle` once the run returns.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Local};
use indicatif::MultiProgress;
use tracing::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::geo::{ReferenceSystemCode, Reprojector};
use crate::model::{FeatureCollection, LayerDescriptor};
use crate::retriever::{FeatureRetriever, FetchRequest};

use super::artifact::ArtifactExporter;
use super::format::{derive_filename, ExportFormat, ExportRequest};
use super::notify::ExportNotifier;
use super::progress::ProgressTracker;
use super::writers::{FormatWriter, GeoJsonEncoder, TabularFlattener};

/// State of one export lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaneState {
    #[default]
    Idle,
    Busy,
}

/// Marks a lane busy for as long as it lives
///
/// Dropping the guard returns the lane to `Idle`, also when the run errors
/// out or unwinds.
pub struct LaneGuard<'a> {
    lane: &'a Mutex<LaneState>,
    format: ExportFormat,
}

impl<'a> LaneGuard<'a> {
    /// Move the lane from `Idle` to `Busy`, or return `None` if it is already busy
    pub fn try_acquire(lane: &'a Mutex<LaneState>, format: ExportFormat) -> Option<Self> {
        let mut state = lane.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == LaneState::Busy {
            return None;
        }
        *state = LaneState::Busy;
        debug!("{} lane busy", format);
        Some(Self { lane, format })
    }
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        *self.lane.lock().unwrap_or_else(PoisonError::into_inner) = LaneState::Idle;
        debug!("{} lane idle", self.format);
    }
}

/// View inputs the export runs against
#[derive(Debug, Clone, PartialEq)]
pub struct ExportContext {
    pub service_url: String,
    pub layer: LayerDescriptor,

    /// Feature cap when not downloading everything
    pub max_features: u64,

    /// The standard-projection fetch path is unreliable for this layer
    pub projection_issue: bool,

    /// Total number of features in the layer, if known
    pub total_feature_count: Option<u64>,

    /// Number of features currently loaded in the view
    pub loaded_feature_count: u64,

    /// Reference system of retrieved coordinates when the payload declares
    /// none; see [`ExportContext::fallback_projection`]
    pub source_projection: Option<ReferenceSystemCode>,
}

impl ExportContext {
    pub fn new(service_url: impl Into<String>, layer: LayerDescriptor) -> Self {
        Self {
            service_url: service_url.into(),
            layer,
            max_features: 0,
            projection_issue: false,
            total_feature_count: None,
            loaded_feature_count: 0,
            source_projection: None,
        }
    }

    pub fn with_max_features(mut self, max_features: u64) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_feature_counts(mut self, total: Option<u64>, loaded: u64) -> Self {
        self.total_feature_count = total;
        self.loaded_feature_count = loaded;
        self
    }

    pub fn with_projection_issue(mut self, projection_issue: bool) -> Self {
        self.projection_issue = projection_issue;
        self
    }

    pub fn with_source_projection(mut self, code: ReferenceSystemCode) -> Self {
        self.source_projection = Some(code);
        self
    }

    /// Projection assumed for payloads without a `crs` member
    ///
    /// The explicit source projection, else the layer's default projection
    /// (native coordinates are requested in it), else WGS84.
    pub fn fallback_projection(&self) -> ReferenceSystemCode {
        self.source_projection
            .clone()
            .or_else(|| self.layer.default_projection.clone())
            .unwrap_or_else(ReferenceSystemCode::wgs84)
    }

    /// Whether "download all" can be offered: more features exist than are
    /// loaded and than the cap allows
    pub fn download_all_available(&self) -> bool {
        match self.total_feature_count {
            Some(total) => {
                total > 0 && self.loaded_feature_count < total && self.max_features < total
            }
            None => false,
        }
    }
}

/// User toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub download_all: bool,
    pub keep_native_projection: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            download_all: true,
            keep_native_projection: false,
        }
    }
}

/// Orchestrator settings taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Projection GeoJSON output is converted to
    pub standard_projection: ReferenceSystemCode,
    /// Filename label for the standard projection
    pub standard_label: String,
    pub delimiter: char,
    pub pretty_geojson: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            standard_projection: ReferenceSystemCode::new(&config.standard_projection),
            standard_label: config.standard_label.clone(),
            delimiter: config.delimiter,
            pretty_geojson: config.pretty_geojson,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// Summary of a completed export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub format: ExportFormat,
    /// Name the file was saved under
    pub filename: String,
    pub location: String,
    pub bytes: u64,
    pub features: usize,
    /// Whether coordinates were converted to the standard projection
    pub reprojected: bool,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Local>,
}

/// Result of a trigger
#[derive(Debug)]
pub enum ExportOutcome {
    /// The lane was busy; nothing was done
    Rejected,
    Completed(ExportReport),
    /// The run failed; the user has been notified
    Failed(ExportError),
}

impl ExportOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ExportOutcome::Failed(_))
    }
}

/// Coordinates retrieval, reprojection, encoding and saving per format
pub struct ExportOrchestrator {
    context: ExportContext,
    options: RwLock<ExportOptions>,
    settings: OrchestratorSettings,
    retriever: Arc<dyn FeatureRetriever>,
    exporter: Arc<dyn ArtifactExporter>,
    notifier: Arc<dyn ExportNotifier>,
    reprojector: Reprojector,
    progress: Option<MultiProgress>,
    lanes: [Mutex<LaneState>; 2],
}

impl ExportOrchestrator {
    /// Create an orchestrator with default settings and both lanes idle
    pub fn new(
        context: ExportContext,
        retriever: Arc<dyn FeatureRetriever>,
        exporter: Arc<dyn ArtifactExporter>,
        notifier: Arc<dyn ExportNotifier>,
    ) -> Self {
        Self {
            context,
            options: RwLock::new(ExportOptions::default()),
            settings: OrchestratorSettings::default(),
            retriever,
            exporter,
            notifier,
            reprojector: Reprojector::builtin(),
            progress: None,
            lanes: [Mutex::new(LaneState::Idle), Mutex::new(LaneState::Idle)],
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_options(self, options: ExportOptions) -> Self {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
        self
    }

    pub fn with_reprojector(mut self, reprojector: Reprojector) -> Self {
        self.reprojector = reprojector;
        self
    }

    /// Show a spinner per running lane on the given display
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn context(&self) -> &ExportContext {
        &self.context
    }

    pub fn options(&self) -> ExportOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_download_all(&self, download_all: bool) {
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .download_all = download_all;
    }

    pub fn set_keep_native_projection(&self, keep: bool) {
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .keep_native_projection = keep;
    }

    fn lane(&self, format: ExportFormat) -> &Mutex<LaneState> {
        &self.lanes[format.lane_index()]
    }

    pub fn lane_state(&self, format: ExportFormat) -> LaneState {
        *self
            .lane(format)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the trigger for `format` accepts input
    pub fn is_trigger_enabled(&self, format: ExportFormat) -> bool {
        self.lane_state(format) == LaneState::Idle
    }

    /// Whether the "download all" toggle should be shown
    pub fn show_download_all_option(&self) -> bool {
        self.context.download_all_available()
    }

    /// Whether the "keep native projection" toggle should be shown
    pub fn show_native_projection_option(&self) -> bool {
        self.context.fallback_projection() != self.settings.standard_projection
    }

    /// Feature cap passed to the retriever, 0 = all
    pub fn effective_max_features(&self) -> u64 {
        if self.options().download_all && self.context.download_all_available() {
            0
        } else {
            self.context.max_features
        }
    }

    /// Build the request for one run from the current context and options
    pub fn build_request(&self, format: ExportFormat) -> ExportRequest {
        let options = self.options();
        ExportRequest {
            layer: self.context.layer.clone(),
            max_feature_count: self.effective_max_features(),
            use_native_projection: self.context.projection_issue,
            keep_native_projection: options.keep_native_projection,
            format,
        }
    }

    /// Run an export for `format`
    ///
    /// Returns [`ExportOutcome::Rejected`] without doing anything when the
    /// lane is busy. Failures are logged, reported to the notifier once and
    /// returned; they never propagate further.
    pub async fn trigger(&self, format: ExportFormat) -> ExportOutcome {
        let Some(_guard) = LaneGuard::try_acquire(self.lane(format), format) else {
            debug!("{} export already running, ignoring trigger", format);
            return ExportOutcome::Rejected;
        };

        let tracker = ProgressTracker::new(format.label(), self.progress.as_ref());
        let outcome = match self.run(format, &tracker).await {
            Ok(report) => {
                info!(
                    "{} export completed: {} ({} features, {} bytes, {} ms)",
                    format, report.filename, report.features, report.bytes, report.elapsed_ms
                );
                self.notifier.export_completed(&report);
                ExportOutcome::Completed(report)
            }
            Err(e) => {
                error!("{} export of '{}' failed: {}", format, self.context.layer.id, e);
                self.notifier.export_failed(format, &e);
                ExportOutcome::Failed(e)
            }
        };
        tracker.finish();
        outcome
    }

    async fn run(&self, format: ExportFormat, tracker: &ProgressTracker) -> Result<ExportReport> {
        let request = self.build_request(format);
        debug!(
            "Starting {} export of '{}' (cap {}, native {}, keep native {})",
            format,
            request.layer.id,
            request.max_feature_count,
            request.use_native_projection,
            request.keep_native_projection
        );

        tracker.stage("Retrieving features");
        let fetch = FetchRequest {
            service_url: self.context.service_url.clone(),
            layer_id: request.layer.id.clone(),
            max_features: request.max_feature_count,
            layer: request.layer.clone(),
            use_native_projection: request.use_native_projection,
            client_side_reprojection: true,
        };
        let payload = self.retriever.fetch(&fetch).await?;

        tracker.stage("Parsing");
        let mut collection = FeatureCollection::from_payload(&payload)?;
        drop(payload);
        debug!("Parsed {} feature(s)", collection.len());

        let source = collection
            .declared_crs()
            .unwrap_or_else(|| self.context.fallback_projection());
        let standard = &self.settings.standard_projection;
        let source_is_standard = source == *standard;

        let mut reprojected = false;
        if format == ExportFormat::GeoJson {
            if !request.keep_native_projection && !source_is_standard {
                tracker.stage("Reprojecting");
                self.reproject_collection(&mut collection, &source)?;
                reprojected = true;
            } else if !source_is_standard && collection.crs.is_none() {
                collection.set_declared_crs(Some(&source));
            }
        }

        tracker.stage("Encoding");
        let writer = self.writer_for(format);
        let encoded = writer.encode(&collection)?;

        let native_in_output = request.native_coordinates_in_output(source_is_standard);
        let filename = if format == ExportFormat::GeoJson && native_in_output && !reprojected {
            // Name the file after the coordinates it actually holds
            derive_filename(&request.layer.id, source.as_str(), format)
        } else {
            request.filename(native_in_output, &self.settings.standard_label)
        };

        tracker.stage("Saving");
        let receipt = self
            .exporter
            .export(encoded, format.mime_type(), &filename)
            .await?;

        Ok(ExportReport {
            format,
            filename: receipt.filename,
            location: receipt.location,
            bytes: receipt.bytes,
            features: collection.len(),
            reprojected,
            elapsed_ms: tracker.elapsed_ms(),
            finished_at: Local::now(),
        })
    }

    /// Reproject every geometry to the standard projection
    ///
    /// All-or-nothing per geometry; the first failure aborts the run.
    fn reproject_collection(
        &self,
        collection: &mut FeatureCollection,
        source: &ReferenceSystemCode,
    ) -> Result<()> {
        let target = &self.settings.standard_projection;
        let mut positions = 0usize;

        for (index, feature) in collection.features.iter_mut().enumerate() {
            let Some(geometry) = feature.geometry.as_mut() else {
                continue;
            };
            match self.reprojector.reproject(geometry, source, target) {
                Ok(count) => positions += count,
                Err(e) => {
                    let id = feature
                        .id
                        .as_ref()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| format!("#{index}"));
                    warn!("Cannot reproject feature {}: {}", id, e);
                    return Err(e.into());
                }
            }
        }

        if target.is_wgs84() {
            collection.set_declared_crs(None);
        } else {
            collection.set_declared_crs(Some(target));
        }
        collection.refresh_bboxes();

        info!(
            "Reprojected {} position(s) in {} feature(s) from {} to {}",
            positions,
            collection.len(),
            source,
            target
        );
        Ok(())
    }

    fn writer_for(&self, format: ExportFormat) -> Box<dyn FormatWriter> {
        match format {
            ExportFormat::GeoJson => Box::new(GeoJsonEncoder::new(self.settings.pretty_geojson)),
            ExportFormat::Tabular => Box::new(TabularFlattener::new(self.settings.delimiter)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ParseError};
    use crate::export::artifact::{ArtifactReceipt, Payload};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MERCATOR_PAYLOAD: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
        "bbox": [0.0, 0.0, 1113194.9079327357, 0.0],
        "features": [
            {
                "type": "Feature",
                "id": "trees.1",
                "geometry": { "type": "Point", "coordinates": [1113194.9079327357, 0.0] },
                "properties": { "species": "Tilia", "height": 12 }
            },
            {
                "type": "Feature",
                "id": "trees.2",
                "geometry": null,
                "properties": { "species": "Quercus" }
            }
        ]
    }"#;

    // Mock retriever that yields once before answering
    struct MockRetriever {
        payload: std::result::Result<String, String>,
        calls: AtomicUsize,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl MockRetriever {
        fn ok(payload: &str) -> Arc<Self> {
            Arc::new(Self {
                payload: Ok(payload.to_string()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                payload: Err("connection refused".to_string()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> FetchRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl FeatureRetriever for MockRetriever {
        async fn fetch(&self, request: &FetchRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            tokio::task::yield_now().await;
            match &self.payload {
                Ok(payload) => Ok(payload.clone()),
                Err(msg) => Err(FetchError::Request(msg.clone()).into()),
            }
        }
    }

    // Mock exporter that keeps saved artifacts in memory
    #[derive(Default)]
    struct MockExporter {
        saved: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl MockExporter {
        fn saved(&self) -> Vec<(String, String, Vec<u8>)> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactExporter for MockExporter {
        async fn export(
            &self,
            payload: Payload,
            mime_type: &str,
            filename: &str,
        ) -> Result<ArtifactReceipt> {
            let bytes = payload.into_bytes();
            let receipt = ArtifactReceipt {
                filename: filename.to_string(),
                location: format!("/downloads/{filename}"),
                bytes: bytes.len() as u64,
            };
            self.saved
                .lock()
                .unwrap()
                .push((filename.to_string(), mime_type.to_string(), bytes));
            Ok(receipt)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        completed: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ExportNotifier for RecordingNotifier {
        fn export_completed(&self, _report: &ExportReport) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn export_failed(&self, _format: ExportFormat, _error: &ExportError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        retriever: Arc<MockRetriever>,
        exporter: Arc<MockExporter>,
        notifier: Arc<RecordingNotifier>,
        orchestrator: ExportOrchestrator,
    }

    fn layer() -> LayerDescriptor {
        LayerDescriptor::new("parks:trees")
            .with_default_projection(ReferenceSystemCode::new("EPSG:25832"))
    }

    fn fixture(retriever: Arc<MockRetriever>, context: ExportContext) -> Fixture {
        let exporter = Arc::new(MockExporter::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = ExportOrchestrator::new(
            context,
            retriever.clone(),
            exporter.clone(),
            notifier.clone(),
        );
        Fixture {
            retriever,
            exporter,
            notifier,
            orchestrator,
        }
    }

    fn context() -> ExportContext {
        ExportContext::new("https://example.org/wfs", layer()).with_max_features(100)
    }

    #[tokio::test]
    async fn test_download_all_passes_zero_cap() {
        let f = fixture(
            MockRetriever::ok(MERCATOR_PAYLOAD),
            context().with_feature_counts(Some(500), 100),
        );
        assert!(f.orchestrator.show_download_all_option());
        assert_eq!(f.orchestrator.effective_max_features(), 0);

        f.orchestrator.trigger(ExportFormat::Tabular).await;
        assert_eq!(f.retriever.last_request().max_features, 0);

        f.orchestrator.set_download_all(false);
        assert_eq!(f.orchestrator.effective_max_features(), 100);
    }

    #[tokio::test]
    async fn test_download_all_unavailable_keeps_cap() {
        let f = fixture(MockRetriever::ok(MERCATOR_PAYLOAD), context());
        assert!(!f.orchestrator.show_download_all_option());
        assert_eq!(f.orchestrator.effective_max_features(), 100);

        let everything_loaded = context().with_feature_counts(Some(80), 80);
        assert!(!everything_loaded.download_all_available());
    }

    #[tokio::test]
    async fn test_second_trigger_while_busy_is_rejected() {
        let f = fixture(MockRetriever::ok(MERCATOR_PAYLOAD), context());

        let (first, second) = tokio::join!(
            f.orchestrator.trigger(ExportFormat::GeoJson),
            f.orchestrator.trigger(ExportFormat::GeoJson)
        );

        assert!(matches!(first, ExportOutcome::Completed(_)));
        assert!(matches!(second, ExportOutcome::Rejected));
        assert_eq!(f.retriever.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.exporter.saved().len(), 1);
        assert!(f.orchestrator.is_trigger_enabled(ExportFormat::GeoJson));
    }

    #[tokio::test]
    async fn test_lanes_are_independent() {
        let f = fixture(MockRetriever::ok(MERCATOR_PAYLOAD), context());

        let (geojson, tabular) = tokio::join!(
            f.orchestrator.trigger(ExportFormat::GeoJson),
            f.orchestrator.trigger(ExportFormat::Tabular)
        );

        assert!(matches!(geojson, ExportOutcome::Completed(_)));
        assert!(matches!(tabular, ExportOutcome::Completed(_)));
        assert_eq!(f.retriever.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.notifier.completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_resets_lane_and_notifies_once() {
        let f = fixture(MockRetriever::failing(), context());

        let outcome = f.orchestrator.trigger(ExportFormat::GeoJson).await;

        assert!(matches!(outcome, ExportOutcome::Failed(ExportError::Fetch(_))));
        assert_eq!(f.orchestrator.lane_state(ExportFormat::GeoJson), LaneState::Idle);
        assert_eq!(f.notifier.failed.load(Ordering::SeqCst), 1);
        assert_eq!(f.notifier.completed.load(Ordering::SeqCst), 0);
        assert!(f.exporter.saved().is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_exports_nothing() {
        let f = fixture(MockRetriever::ok("<ows:ExceptionReport/>"), context());

        let outcome = f.orchestrator.trigger(ExportFormat::Tabular).await;

        assert!(matches!(
            outcome,
            ExportOutcome::Failed(ExportError::Parse(ParseError::InvalidJson(_)))
        ));
        assert!(f.exporter.saved().is_empty());
        assert!(f.orchestrator.is_trigger_enabled(ExportFormat::Tabular));
    }

    #[tokio::test]
    async fn test_native_projection_filename() {
        let f = fixture(
            MockRetriever::ok(MERCATOR_PAYLOAD),
            context().with_projection_issue(true),
        );

        f.orchestrator.trigger(ExportFormat::Tabular).await;

        let saved = f.exporter.saved();
        assert_eq!(saved[0].0, "parks_trees_EPSG_25832.csv");
        assert_eq!(saved[0].1, "text/csv; charset=utf-8");
        assert!(f.retriever.last_request().use_native_projection);
    }

    #[tokio::test]
    async fn test_geojson_lane_reprojects() {
        let f = fixture(MockRetriever::ok(MERCATOR_PAYLOAD), context());

        let outcome = f.orchestrator.trigger(ExportFormat::GeoJson).await;
        let ExportOutcome::Completed(report) = outcome else {
            panic!("expected completed export");
        };
        assert!(report.reprojected);
        assert_eq!(report.filename, "parks_trees_WGS84.geojson");
        assert_eq!(report.features, 2);

        let saved = f.exporter.saved();
        let value: Value = serde_json::from_slice(&saved[0].2).unwrap();
        let coords = &value["features"][0]["geometry"]["coordinates"];
        assert!((coords[0].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert!(coords[1].as_f64().unwrap().abs() < 1e-9);
        assert!(value.get("crs").is_none());
        assert!((value["bbox"][2].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(value["features"][1]["geometry"], Value::Null);
    }

    #[tokio::test]
    async fn test_tabular_lane_skips_reprojection() {
        let f = fixture(MockRetriever::ok(MERCATOR_PAYLOAD), context());

        let outcome = f.orchestrator.trigger(ExportFormat::Tabular).await;
        let ExportOutcome::Completed(report) = outcome else {
            panic!("expected completed export");
        };
        assert!(!report.reprojected);
        assert_eq!(report.filename, "parks_trees_WGS84.csv");

        let saved = f.exporter.saved();
        assert_eq!(
            String::from_utf8(saved[0].2.clone()).unwrap(),
            "species,height\nTilia,12\nQuercus,\n"
        );
    }

    #[tokio::test]
    async fn test_keep_native_projection() {
        let f = fixture(
            MockRetriever::ok(MERCATOR_PAYLOAD),
            context().with_source_projection(ReferenceSystemCode::new("EPSG:3857")),
        );
        assert!(f.orchestrator.show_native_projection_option());
        f.orchestrator.set_keep_native_projection(true);

        let outcome = f.orchestrator.trigger(ExportFormat::GeoJson).await;
        let ExportOutcome::Completed(report) = outcome else {
            panic!("expected completed export");
        };
        assert!(!report.reprojected);
        assert_eq!(report.filename, "parks_trees_EPSG_3857.geojson");

        let value: Value = serde_json::from_slice(&f.exporter.saved()[0].2).unwrap();
        assert_eq!(value["crs"]["properties"]["name"], "EPSG:3857");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][0], 1113194.9079327357);
    }

    #[tokio::test]
    async fn test_undeclared_crs_falls_back_to_context() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[500000.0,0.0]},"properties":{}}
        ]}"#;
        let f = fixture(
            MockRetriever::ok(payload),
            context().with_source_projection(ReferenceSystemCode::new("EPSG:32632")),
        );

        f.orchestrator.trigger(ExportFormat::GeoJson).await;

        let value: Value = serde_json::from_slice(&f.exporter.saved()[0].2).unwrap();
        let coords = &value["features"][0]["geometry"]["coordinates"];
        assert!((coords[0].as_f64().unwrap() - 9.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_undeclared_crs_falls_back_to_layer_projection() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[500000.0,0.0]},"properties":{}}
        ]}"#;
        let f = fixture(MockRetriever::ok(payload), context());
        assert_eq!(
            f.orchestrator.context().fallback_projection(),
            ReferenceSystemCode::from_epsg(25832)
        );

        let outcome = f.orchestrator.trigger(ExportFormat::GeoJson).await;
        let ExportOutcome::Completed(report) = outcome else {
            panic!("expected completed export");
        };
        assert!(report.reprojected);
        assert_eq!(report.filename, "parks_trees_WGS84.geojson");
        assert!(f.retriever.last_request().wants_native_coordinates());

        let value: Value = serde_json::from_slice(&f.exporter.saved()[0].2).unwrap();
        let coords = &value["features"][0]["geometry"]["coordinates"];
        assert!((coords[0].as_f64().unwrap() - 9.0).abs() < 1e-9);
        assert!(coords[1].as_f64().unwrap().abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_keep_native_names_file_after_fallback_projection() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[389900.5,5819700.25]},"properties":{}}
        ]}"#;
        let f = fixture(MockRetriever::ok(payload), context());
        f.orchestrator.set_keep_native_projection(true);

        f.orchestrator.trigger(ExportFormat::GeoJson).await;

        let saved = f.exporter.saved();
        assert_eq!(saved[0].0, "parks_trees_EPSG_25832.geojson");
        let value: Value = serde_json::from_slice(&saved[0].2).unwrap();
        assert_eq!(value["crs"]["properties"]["name"], "EPSG:25832");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][0], 389900.5);
    }

    #[tokio::test]
    async fn test_geometry_error_fails_run() {
        let payload = r#"{"type":"FeatureCollection",
            "crs":{"type":"name","properties":{"name":"EPSG:3857"}},
            "features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1.0]},"properties":{}}]}"#;
        let f = fixture(MockRetriever::ok(payload), context());

        let outcome = f.orchestrator.trigger(ExportFormat::GeoJson).await;

        assert!(matches!(outcome, ExportOutcome::Failed(ExportError::Geometry(_))));
        assert!(f.exporter.saved().is_empty());
        assert_eq!(f.notifier.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lane_guard_resets_on_drop() {
        let lane = Mutex::new(LaneState::Idle);
        let guard = LaneGuard::try_acquire(&lane, ExportFormat::GeoJson).unwrap();
        assert_eq!(*lane.lock().unwrap(), LaneState::Busy);
        assert!(LaneGuard::try_acquire(&lane, ExportFormat::GeoJson).is_none());

        drop(guard);
        assert_eq!(*lane.lock().unwrap(), LaneState::Idle);
        assert!(LaneGuard::try_acquire(&lane, ExportFormat::GeoJson).is_some());
    }
}
