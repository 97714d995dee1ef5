//! End-to-end pipeline tests against local storage, a scripted capture
//! source, and an in-memory binding store.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use falamedia_core::{
    BindingError, BindingStore, CaptureMode, CaptureOptions, MediaAsset, OwnerKind,
    OwnerReference, PipelineError, PipelineOutcome, PipelineStage, StorageBackend,
};
use falamedia_pipeline::{
    AlwaysGranted, Capture, CaptureSource, MediaPipeline, PermissionHost, PipelineSettings,
    ProgressSink,
};
use falamedia_storage::{LocalStorage, Storage, StorageError, StorageResult};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InMemoryBindings {
    bound: Mutex<HashMap<String, String>>,
    fail: bool,
}

impl InMemoryBindings {
    fn failing() -> Self {
        Self {
            bound: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    /// Failing store whose owner record already holds a bound URL.
    fn failing_with(owner: &OwnerReference, url: &str) -> Self {
        let store = Self::failing();
        store
            .bound
            .lock()
            .unwrap()
            .insert(owner.to_string(), url.to_string());
        store
    }

    fn url_for(&self, owner: &OwnerReference) -> Option<String> {
        self.bound.lock().unwrap().get(&owner.to_string()).cloned()
    }

    fn is_empty(&self) -> bool {
        self.bound.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BindingStore for InMemoryBindings {
    async fn bind_image_url(&self, owner: &OwnerReference, url: &str) -> Result<(), BindingError> {
        if self.fail {
            return Err(BindingError::Database("connection reset".to_string()));
        }
        self.bound
            .lock()
            .unwrap()
            .insert(owner.to_string(), url.to_string());
        Ok(())
    }

    async fn fetch_bound_url(
        &self,
        owner: &OwnerReference,
    ) -> Result<Option<String>, BindingError> {
        Ok(self.url_for(owner))
    }
}

enum Script {
    Asset(MediaAsset),
    Cancel,
}

struct ScriptedCapture {
    script: Script,
    delay: Duration,
    invocations: AtomicUsize,
}

impl ScriptedCapture {
    fn asset(asset: MediaAsset) -> Self {
        Self {
            script: Script::Asset(asset),
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
        }
    }

    fn cancelling() -> Self {
        Self {
            script: Script::Cancel,
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    async fn capture(
        &self,
        _mode: CaptureMode,
        _options: &CaptureOptions,
    ) -> Result<Capture, PipelineError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Asset(asset) => Ok(Capture::Asset(asset.clone())),
            Script::Cancel => Ok(Capture::Cancelled),
        }
    }
}

struct DenyingHost;

#[async_trait]
impl PermissionHost for DenyingHost {
    async fn request_access(&self) -> bool {
        false
    }
}

struct FailingStorage;

#[async_trait]
impl Storage for FailingStorage {
    async fn upload_with_key(
        &self,
        _storage_key: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        Err(StorageError::UploadFailed("bucket unavailable".to_string()))
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        Err(StorageError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://failing/{}", key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<PipelineStage>>,
}

impl ProgressSink for StageRecorder {
    fn stage(&self, _owner: &OwnerReference, stage: PipelineStage) {
        self.stages.lock().unwrap().push(stage);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    _capture_dir: TempDir,
    storage_dir: TempDir,
    storage: Arc<dyn Storage>,
    bindings: Arc<InMemoryBindings>,
}

/// PNG of deterministic noise, large enough to cross a 1 KiB threshold.
fn noisy_png_bytes() -> Vec<u8> {
    let mut img = RgbImage::new(200, 200);
    let mut state: u32 = 0xdeadbeef;
    for y in 0..200 {
        for x in 0..200 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            img.put_pixel(x, y, Rgb([(state >> 24) as u8, (state >> 16) as u8, (state >> 8) as u8]));
        }
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

async fn harness() -> Harness {
    let capture_dir = TempDir::new().unwrap();
    let storage_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(storage_dir.path(), "http://localhost:3000/media".to_string())
            .await
            .unwrap(),
    );
    Harness {
        _capture_dir: capture_dir,
        storage_dir,
        storage,
        bindings: Arc::new(InMemoryBindings::default()),
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        // Small threshold so test fixtures do not need megabytes of pixels.
        compression_threshold_bytes: 1024,
        ..PipelineSettings::default()
    }
}

fn pipeline_with(
    harness: &Harness,
    capture: Arc<dyn CaptureSource>,
    settings: PipelineSettings,
) -> Arc<MediaPipeline> {
    Arc::new(MediaPipeline::new(
        harness.storage.clone(),
        harness.bindings.clone(),
        capture,
        Arc::new(AlwaysGranted),
        settings,
    ))
}

fn png_asset(harness: &Harness, name: &str) -> MediaAsset {
    let path = harness._capture_dir.path().join(name);
    let bytes = noisy_png_bytes();
    std::fs::write(&path, &bytes).unwrap();
    MediaAsset {
        local_uri: path,
        byte_size: bytes.len() as u64,
        mime_type: Some("image/png".to_string()),
        base64_payload: None,
    }
}

fn stored_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}

fn child_42() -> OwnerReference {
    OwnerReference::new(OwnerKind::ChildProfile, "child_42")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_avatar_is_compressed_uploaded_and_bound() {
    let h = harness().await;
    let asset = png_asset(&h, "avatar.png");
    let original_size = asset.byte_size;
    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::asset(asset)), settings());

    let outcome = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap();

    let (public_url, storage_key) = match outcome {
        PipelineOutcome::Completed {
            public_url,
            storage_key,
        } => (public_url, storage_key),
        PipelineOutcome::Cancelled => panic!("expected completion"),
    };

    // Re-encoded to JPEG under the avatar scope.
    assert!(storage_key.starts_with("profile_photos/child_42_"));
    assert!(storage_key.ends_with(".jpg"));
    assert_eq!(public_url, format!("http://localhost:3000/media/{}", storage_key));

    // Object is durably stored, smaller than the original, and the bound
    // URL matches what storage serves.
    assert!(h.storage.exists(&storage_key).await.unwrap());
    assert!(h.storage.content_length(&storage_key).await.unwrap() <= original_size);
    assert_eq!(h.bindings.url_for(&child_42()), Some(public_url));
}

#[tokio::test]
async fn uploaded_bytes_round_trip() {
    let h = harness().await;
    let asset = png_asset(&h, "avatar.png");
    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::asset(asset)), settings());

    let outcome = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap();
    let storage_key = match outcome {
        PipelineOutcome::Completed { storage_key, .. } => storage_key,
        PipelineOutcome::Cancelled => panic!("expected completion"),
    };

    // The stored object is the post-compression encoding and decodes back
    // to the captured dimensions.
    let stored = h.storage.download(&storage_key).await.unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));
}

#[tokio::test]
async fn small_vocabulary_image_keeps_its_format() {
    let h = harness().await;
    let path = h._capture_dir.path().join("casa.png");
    // 1x1 PNG, well under the compression threshold.
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(&path, &buf).unwrap();
    let asset = MediaAsset {
        local_uri: path,
        byte_size: buf.len() as u64,
        mime_type: Some("image/png".to_string()),
        base64_payload: None,
    };

    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::asset(asset)), settings());
    let outcome = pipeline
        .upload_vocabulary_image("vocab_family_7", "Minha Casa", CaptureOptions::default())
        .await
        .unwrap();

    let storage_key = match outcome {
        PipelineOutcome::Completed { storage_key, .. } => storage_key,
        PipelineOutcome::Cancelled => panic!("expected completion"),
    };
    assert_eq!(storage_key, "vocabulary_images/vocab_family_7/minha_casa.png");

    let owner = OwnerReference::new(OwnerKind::VocabularyItem, "vocab_family_7");
    assert!(h.bindings.url_for(&owner).is_some());
}

#[tokio::test]
async fn cancelled_picker_makes_no_upload_and_no_bind() {
    let h = harness().await;
    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::cancelling()), settings());

    let outcome = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, PipelineOutcome::Cancelled);
    assert!(h.bindings.is_empty());
    assert!(stored_files(h.storage_dir.path()).is_empty());
}

#[tokio::test]
async fn oversized_file_fails_validation_before_any_upload() {
    let h = harness().await;
    let asset = MediaAsset {
        local_uri: h._capture_dir.path().join("huge.jpg"),
        byte_size: 6 * 1024 * 1024,
        mime_type: Some("image/jpeg".to_string()),
        base64_payload: None,
    };
    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::asset(asset)), settings());

    let err = pipeline
        .run(
            OwnerReference::new(OwnerKind::VocabularyItem, "vocab_family_7"),
            Some("Família".to_string()),
            CaptureOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(err.to_string().contains("too large"));
    assert!(h.bindings.is_empty());
    assert!(stored_files(h.storage_dir.path()).is_empty());
}

#[tokio::test]
async fn permission_denial_stops_the_run_before_capture() {
    let h = harness().await;
    let capture = Arc::new(ScriptedCapture::cancelling());
    let pipeline = Arc::new(MediaPipeline::new(
        h.storage.clone(),
        h.bindings.clone(),
        capture.clone(),
        Arc::new(DenyingHost),
        settings(),
    ));

    let err = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, PipelineError::PermissionDenied);
    assert_eq!(capture.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_failure_never_reaches_the_binding_store() {
    let h = harness().await;
    let asset = png_asset(&h, "avatar.png");
    let pipeline = Arc::new(MediaPipeline::new(
        Arc::new(FailingStorage),
        h.bindings.clone(),
        Arc::new(ScriptedCapture::asset(asset)),
        Arc::new(AlwaysGranted),
        settings(),
    ));

    let err = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(_)));
    assert!(h.bindings.is_empty());
}

#[tokio::test]
async fn binding_failure_leaves_the_object_in_the_bucket() {
    let h = harness().await;
    let prior_url = "http://localhost:3000/media/profile_photos/child_42_0.jpg";
    let failing_bindings = Arc::new(InMemoryBindings::failing_with(&child_42(), prior_url));
    let asset = png_asset(&h, "avatar.png");
    let pipeline = Arc::new(MediaPipeline::new(
        h.storage.clone(),
        failing_bindings.clone(),
        Arc::new(ScriptedCapture::asset(asset)),
        Arc::new(AlwaysGranted),
        settings(),
    ));

    let err = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Binding(_)));
    // The owning record still holds its previous URL and the uploaded
    // object is orphaned at its computed path.
    let bound = failing_bindings.fetch_bound_url(&child_42()).await.unwrap();
    assert_eq!(bound.as_deref(), Some(prior_url));
    let orphans = stored_files(h.storage_dir.path());
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0]
        .strip_prefix(h.storage_dir.path())
        .unwrap()
        .starts_with("profile_photos"));
}

#[tokio::test]
async fn compensation_deletes_the_object_when_binding_fails() {
    let h = harness().await;
    let failing_bindings = Arc::new(InMemoryBindings::failing());
    let asset = png_asset(&h, "avatar.png");
    let pipeline = Arc::new(MediaPipeline::new(
        h.storage.clone(),
        failing_bindings,
        Arc::new(ScriptedCapture::asset(asset)),
        Arc::new(AlwaysGranted),
        PipelineSettings {
            compensate_on_bind_failure: true,
            ..settings()
        },
    ));

    let err = pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Binding(_)));
    assert!(stored_files(h.storage_dir.path()).is_empty());
}

#[tokio::test]
async fn empty_owner_key_is_a_configuration_error() {
    let h = harness().await;
    let pipeline = pipeline_with(&h, Arc::new(ScriptedCapture::cancelling()), settings());

    let err = pipeline
        .run(
            OwnerReference::new(OwnerKind::UserProfile, ""),
            None,
            CaptureOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[tokio::test]
async fn rapid_repeated_runs_for_one_owner_are_single_flighted() {
    let h = harness().await;
    let asset = png_asset(&h, "avatar.png");
    let capture = Arc::new(ScriptedCapture {
        script: Script::Asset(asset),
        delay: Duration::from_millis(50),
        invocations: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with(&h, capture.clone(), settings());

    let a = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline
                .run(child_42(), None, CaptureOptions::default())
                .await
        })
    };
    let b = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline
                .run(child_42(), None, CaptureOptions::default())
                .await
        })
    };

    let (ra, rb) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    // Second tap joined the first run: one capture, one stored object,
    // identical results.
    assert_eq!(capture.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(ra, rb);
    assert_eq!(stored_files(h.storage_dir.path()).len(), 1);
}

#[tokio::test]
async fn progress_sink_sees_forward_only_stages() {
    let h = harness().await;
    let asset = png_asset(&h, "avatar.png");
    let recorder = Arc::new(StageRecorder::default());
    let pipeline = Arc::new(
        MediaPipeline::new(
            h.storage.clone(),
            h.bindings.clone(),
            Arc::new(ScriptedCapture::asset(asset)),
            Arc::new(AlwaysGranted),
            settings(),
        )
        .with_progress(recorder.clone()),
    );

    pipeline
        .run(child_42(), None, CaptureOptions::default())
        .await
        .unwrap();

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            PipelineStage::PermissionCheck,
            PipelineStage::Capturing,
            PipelineStage::Validating,
            PipelineStage::Compressing,
            PipelineStage::Uploading,
            PipelineStage::Binding,
            PipelineStage::Done,
        ]
    );
}
