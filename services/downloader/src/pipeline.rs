//! One retrieval run: download every field, then transform every field.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grib_dump::GridDecoder;
use ingestion::{FieldTransformer, HourReport, TransformOptions};
use tracing::{info, instrument, warn};

use crate::config::RunConfig;
use crate::download::{ArchiveFetcher, ArchiveTransport, DownloadOutcome};
use crate::targets::{RunTime, TargetBuilder};

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub downloaded: usize,
    pub failed_downloads: usize,
    pub hours: Vec<HourReport>,
}

impl RunSummary {
    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.hours.iter().filter_map(|h| h.artifact.as_deref())
    }

    pub fn incomplete_hours(&self) -> usize {
        self.hours.iter().filter(|h| !h.is_complete()).count()
    }
}

/// Drives the fetcher and the transform phase for one run.
pub struct Pipeline<T, D> {
    config: RunConfig,
    output_dir: PathBuf,
    fetcher: ArchiveFetcher<T>,
    decoder: D,
}

impl<T, D> Pipeline<T, D>
where
    T: ArchiveTransport,
    D: GridDecoder + Clone + Send + 'static,
{
    pub fn new(config: RunConfig, output_dir: PathBuf, transport: T, decoder: D) -> Self {
        let fetcher = ArchiveFetcher::new(transport, config.max_concurrent);
        Self {
            config,
            output_dir,
            fetcher,
            decoder,
        }
    }

    /// Directory of one field: `<output>/<YYYYMMDDHH>/<field>`.
    pub fn field_dir(&self, run: RunTime, field: &str) -> PathBuf {
        self.output_dir.join(run.stamp()).join(field)
    }

    #[instrument(skip_all, fields(run = %run))]
    pub async fn run(&self, run: RunTime) -> Result<RunSummary> {
        let builder = TargetBuilder::new(&self.config.source, run);
        let mut summary = RunSummary::default();

        for field in &self.config.fields {
            let dir = self.field_dir(run, field);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        for field in &self.config.fields {
            let targets =
                builder.field_targets(field, self.config.hours.range(), self.config.levels.range());
            info!(field = %field, targets = targets.len(), "Downloading field");

            let outcomes = self
                .fetcher
                .fetch_batch(targets, &self.field_dir(run, field))
                .await?;
            for outcome in &outcomes {
                match outcome {
                    DownloadOutcome::Downloaded { .. } => summary.downloaded += 1,
                    DownloadOutcome::Failed { .. } => summary.failed_downloads += 1,
                }
            }
        }
        info!(
            downloaded = summary.downloaded,
            failed = summary.failed_downloads,
            "Download of data files finished"
        );

        for field in &self.config.fields {
            let reports = self.transform_field(&builder, run, field).await?;
            summary.hours.extend(reports);
        }

        if summary.incomplete_hours() > 0 {
            warn!(
                incomplete = summary.incomplete_hours(),
                "Some hours were missing levels"
            );
        }
        Ok(summary)
    }

    /// Runs the blocking transform of one field off the async workers.
    async fn transform_field(
        &self,
        builder: &TargetBuilder,
        run: RunTime,
        field: &str,
    ) -> Result<Vec<HourReport>> {
        let options = TransformOptions {
            policy: self.config.incomplete_hour,
            remove_intermediate: self.config.remove_intermediate,
        };
        let mut transformer = FieldTransformer::new(
            self.decoder.clone(),
            self.config.crop,
            builder.naming().clone(),
            options,
        );
        let dir = self.field_dir(run, field);
        let field = field.to_string();
        let hours = self.config.hours.range();
        let levels = self.config.levels.range();

        let reports = tokio::task::spawn_blocking(move || {
            transformer.process_field(&dir, &field, hours, levels)
        })
        .await
        .context("Transform task panicked")??;
        Ok(reports)
    }
}
