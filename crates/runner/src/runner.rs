//! Study orchestration
//!
//! One study runs in three steps:
//!
//! 1. imaging stage on the blocking pool (select, normalize, compose, infer)
//! 2. prompt rendering
//! 3. note generation, bounded by the backend timeout
//!
//! Imaging errors abort the study. Inference and backend failures are kept on
//! the report so the caller always sees what happened.

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use medprompt_core::{
    ClinicalPrompt, FindingsSummary, ImagingPipeline, InferenceAdapter, IntensityOptions, PromptBuilder,
    ScanAttributes,
};
use medprompt_note_client::{HttpNoteClient, NoteBackendClient, NoteResult};
use ndarray::ArrayD;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Decoded study handed over by the file reader
#[derive(Debug, Clone)]
pub struct StudyInput {
    /// Raw samples, `(rows, cols)` or `(frames, rows, cols)`
    pub pixels: ArrayD<f32>,
    pub attributes: ScanAttributes,
    pub options: IntensityOptions,
}

impl StudyInput {
    pub fn new(pixels: ArrayD<f32>, attributes: ScanAttributes) -> Self {
        Self {
            pixels,
            attributes,
            options: IntensityOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IntensityOptions) -> Self {
        self.options = options;
        self
    }
}

/// Everything produced for one study
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub id: Uuid,
    pub attributes: ScanAttributes,
    pub frame_index: Option<usize>,
    /// Display image as base64 PNG, when previews are enabled
    pub preview_png_base64: Option<String>,
    pub findings: Option<FindingsSummary>,
    pub inference_error: Option<String>,
    pub prompt: ClinicalPrompt,
    pub note: NoteResult,
    pub elapsed_ms: u64,
}

/// Runs studies through the imaging stage and the note backend
#[derive(Clone)]
pub struct StudyRunner {
    pipeline: Arc<ImagingPipeline>,
    prompt_builder: PromptBuilder,
    adapter: Option<Arc<dyn InferenceAdapter>>,
    backend: Arc<dyn NoteBackendClient>,
    timeout: Duration,
    include_preview: bool,
    semaphore: Arc<Semaphore>,
}

impl StudyRunner {
    /// Runner with an injected backend and no inference model
    pub fn new(config: &RunnerConfig, backend: Arc<dyn NoteBackendClient>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            pipeline: Arc::new(ImagingPipeline::from_config(&config.imaging)?),
            prompt_builder: PromptBuilder::new(),
            adapter: None,
            backend,
            timeout: config.backend.timeout(),
            include_preview: config.imaging.include_preview,
            semaphore: Arc::new(Semaphore::new(config.runner.max_concurrency)),
        })
    }

    /// Runner talking to the configured HTTP backend
    pub fn connect(config: &RunnerConfig) -> Result<Self> {
        let backend = HttpNoteClient::new(config.backend.clone())?;
        Self::new(config, Arc::new(backend))
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn InferenceAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_prompt_builder(mut self, builder: PromptBuilder) -> Self {
        self.prompt_builder = builder;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Process one study
    pub async fn run(&self, input: StudyInput) -> Result<StudyReport> {
        let id = Uuid::new_v4();
        let start = Instant::now();
        let StudyInput {
            pixels,
            attributes,
            options,
        } = input;

        let pipeline = Arc::clone(&self.pipeline);
        let adapter = self.adapter.clone();
        let include_preview = self.include_preview;

        let (prepared, preview) = tokio::task::spawn_blocking(move || -> medprompt_core::Result<_> {
            let prepared = pipeline.prepare(pixels.view(), &options, adapter.as_deref())?;
            let preview = if include_preview {
                Some(prepared.display.to_base64_png()?)
            } else {
                None
            };
            Ok((prepared, preview))
        })
        .await
        .map_err(|e| Error::Worker(format!("Imaging task failed: {}", e)))??;

        let prompt = self
            .prompt_builder
            .build(&attributes, prepared.findings_text().as_deref());

        let note = self.backend.generate(&prompt, self.timeout).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            study = %id,
            modality = %attributes.modality_code,
            frame = ?prepared.frame_index,
            findings = prepared.findings.is_some(),
            note_ok = note.is_success(),
            backend = self.backend.name(),
            elapsed_ms,
            "Study complete"
        );

        Ok(StudyReport {
            id,
            attributes,
            frame_index: prepared.frame_index,
            preview_png_base64: preview,
            findings: prepared.findings,
            inference_error: prepared.inference_error.map(|e| e.to_string()),
            prompt,
            note,
            elapsed_ms,
        })
    }

    /// Process independent studies on the bounded worker pool
    ///
    /// Results come back in input order. One study failing does not affect the
    /// others.
    pub async fn run_batch(&self, inputs: Vec<StudyInput>) -> Vec<Result<StudyReport>> {
        let mut handles = Vec::with_capacity(inputs.len());

        for input in inputs {
            let runner = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = runner
                    .semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Worker(format!("Failed to acquire semaphore: {}", e)))?;
                runner.run(input).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let report = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Worker(format!("Study task failed: {}", e))),
            };
            if let Err(e) = &report {
                tracing::warn!(error = %e, "Study aborted");
            }
            reports.push(report);
        }

        reports
    }
}
