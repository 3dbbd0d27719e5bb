//! Analysis pipeline: validate files, probe the service, fan out detection,
//! then optionally upload the originals and persist one record per image.

use std::path::{Path, PathBuf};

use adlaw_core::{CanonicalDetection, DetectResponse, normalize, primary_index};
use adlaw_detect::{
    DetectClient, UploadImage, check_batch_size, is_supported_extension, validate_bytes,
};
use adlaw_store::{AnalysisStore, BackendClient, IdentityClient, ObjectStore, RecordStore};
use anyhow::Context;
use tracing::info;

pub struct Options {
    pub ping: bool,
    pub save: bool,
}

/// Outcome for one analysed image.
pub struct FileAnalysis {
    pub filename: String,
    pub detections: Vec<CanonicalDetection>,
    /// Index of the primary (highest-confidence) detection.
    pub primary: Option<usize>,
    pub processing_time: Option<f64>,
    /// Persisted record id when `--save` is set.
    pub record_id: Option<String>,
}

pub async fn run(
    detect: &DetectClient,
    backend: &BackendClient,
    paths: &[PathBuf],
    opts: Options,
) -> anyhow::Result<Vec<FileAnalysis>> {
    // 1. Enforce the batch cap before reading anything.
    check_batch_size(paths.len())?;

    // 2. Read and validate every file; no network until all pass.
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(load_image(path).await?);
    }

    // 3. Probe the service. Serverless deployments cold-start, so failure
    //    here usually means "asleep", not "broken".
    if opts.ping {
        detect.ping().await.context(
            "inference service is not responding; it may be cold-starting, retry shortly",
        )?;
    }

    // 4. One concurrent detection request per image.
    let responses = detect.detect_all(&images).await?;

    // 5. Optionally upload originals and persist one record per image.
    let record_ids = if opts.save {
        persist_all(backend, &images, &responses).await?
    } else {
        vec![None; images.len()]
    };

    Ok(images
        .iter()
        .zip(&responses)
        .zip(record_ids)
        .map(|((image, response), record_id)| {
            let detections = normalize(&response.detections);
            let primary = primary_index(&detections);
            FileAnalysis {
                filename: image.filename.clone(),
                detections,
                primary,
                processing_time: response.processing_time,
                record_id,
            }
        })
        .collect())
}

async fn load_image(path: &Path) -> anyhow::Result<UploadImage> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.display().to_string());
    // Extension check before touching the disk; the magic-byte check below
    // still decides what the file actually is.
    if !is_supported_extension(path) {
        anyhow::bail!("{}: unsupported extension (JPEG or PNG required)", path.display());
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(validate_bytes(&filename, data)?)
}

async fn persist_all(
    backend: &BackendClient,
    images: &[UploadImage],
    responses: &[DetectResponse],
) -> anyhow::Result<Vec<Option<String>>> {
    let identity = IdentityClient::new(backend.clone());
    let user = identity
        .current_user()
        .await
        .context("fetching account (is ADLAW_SESSION set?)")?;

    let objects = ObjectStore::new(backend.clone());
    let store = AnalysisStore::new(RecordStore::new(backend.clone()));

    // Writes run sequentially: the store admits one in-flight write at a time.
    let mut ids = Vec::with_capacity(images.len());
    for (image, response) in images.iter().zip(responses) {
        let file_id = objects
            .upload(&image.filename, image.kind.mime(), image.data.clone())
            .await
            .with_context(|| format!("uploading {}", image.filename))?;
        let image_ref = objects.view_url(&file_id);

        let record = store
            .save_analysis(&user.id, &image_ref, response)
            .await
            .with_context(|| format!("saving analysis for {}", image.filename))?;
        info!(record = %record.id, file = %image.filename, "analysis persisted");
        ids.push(Some(record.id));
    }
    Ok(ids)
}
