use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::clean::{
    clean_result_files, find_result_files, write_cleaned_responses, CLEANED_RESPONSES_FILE,
};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::grouping::{group_by_category, split_category, LocalizationMap};
use crate::pipeline::langfiles::write_language_files;
use crate::pipeline::requests::{build_category_requests, job_file_name, write_job_file};
use crate::pipeline::submit::{wait_for_job, Clock, JobOutcome, SystemClock};
use crate::progress::ConsoleProgress;
use crate::service::{HttpBatchService, TranslationService};

pub const BATCHES_DIR: &str = "batches";
pub const RESULTS_DIR: &str = "results";

/// Drives the whole flow: source map -> job files -> submitted jobs ->
/// downloaded results -> cleaned mapping -> per-language files. Strictly
/// sequential; one job is fully processed before the next starts.
pub struct BatchPipeline {
    cfg: PipelineConfig,
    progress: ConsoleProgress,
}

impl BatchPipeline {
    pub fn new(cfg: PipelineConfig, progress: ConsoleProgress) -> Self {
        Self { cfg, progress }
    }

    /// Build a fresh run: group the source map, chunk each category, and
    /// write one job file per category under `<batch_root>/<stamp>/batches`.
    /// Returns the run directory.
    pub fn build_run(&self, input: &Path) -> anyhow::Result<PathBuf> {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("read localization file: {}", input.display()))?;
        let data: LocalizationMap = serde_json::from_str(&text)
            .with_context(|| format!("parse localization file: {}", input.display()))?;
        self.progress
            .info(format!("loaded {} localization entries", data.len()));

        let grouped = group_by_category(&data)?;
        let run_stamp = unix_timestamp()?;
        let run_dir = self.cfg.batch_root.join(run_stamp.to_string());
        let batches_dir = run_dir.join(BATCHES_DIR);
        std::fs::create_dir_all(&batches_dir)
            .with_context(|| format!("create batches dir: {}", batches_dir.display()))?;

        for (category, features) in &grouped {
            let chunks = split_category(features);
            let requests = build_category_requests(
                category,
                &chunks,
                &self.cfg.languages,
                &self.cfg.model,
                &self.cfg.prompts.translate_batch,
                run_stamp,
            )?;
            let path = batches_dir.join(job_file_name(
                &self.cfg.job_file_prefix,
                category,
                &self.cfg.languages,
            ));
            write_job_file(&path, &requests)?;
            self.progress.info(format!(
                "wrote {} requests to {}",
                requests.len(),
                path.display()
            ));
        }

        Ok(run_dir)
    }

    /// Upload, submit, poll, and download every job file of a run. A job
    /// that ends in a terminal failure state is skipped with a warning;
    /// the remaining job files still run.
    pub fn submit_run(&self, run_dir: &Path) -> anyhow::Result<()> {
        let service = HttpBatchService::from_params(&self.cfg.service)?;
        self.submit_run_with(run_dir, &service, &SystemClock)
    }

    pub(crate) fn submit_run_with(
        &self,
        run_dir: &Path,
        service: &dyn TranslationService,
        clock: &dyn Clock,
    ) -> anyhow::Result<()> {
        let batches_dir = run_dir.join(BATCHES_DIR);
        let job_files = list_job_files(&batches_dir)?;
        anyhow::ensure!(
            !job_files.is_empty(),
            "no job files in {}",
            batches_dir.display()
        );
        let results_dir = run_dir.join(RESULTS_DIR);

        for (i, path) in job_files.iter().enumerate() {
            self.progress.progress("job", i + 1, job_files.len());
            self.progress.info(format!("uploading {}", path.display()));
            let file_id = service.upload_batch_file(path)?;
            let job_id = service.create_job(&file_id)?;
            self.progress.info(format!("submitted job {job_id}"));

            let outcome = wait_for_job(
                service,
                clock,
                self.cfg.poll_interval,
                job_id,
                &self.progress,
            )?;
            match outcome {
                JobOutcome::Failed { status } => {
                    self.progress.warn(format!(
                        "job for {} ended as {status}, skipping",
                        path.display()
                    ));
                }
                JobOutcome::Completed { output_file_id } => {
                    let bytes = service.download_output(&output_file_id)?;
                    std::fs::create_dir_all(&results_dir).with_context(|| {
                        format!("create results dir: {}", results_dir.display())
                    })?;
                    let out = results_dir.join(result_file_name(path));
                    std::fs::write(&out, bytes)
                        .with_context(|| format!("write result file: {}", out.display()))?;
                    self.progress
                        .info(format!("saved results to {}", out.display()));
                }
            }
        }

        Ok(())
    }

    /// Clean every run directory under the batch root, oldest first.
    pub fn clean_all_runs(&self) -> anyhow::Result<()> {
        let root = &self.cfg.batch_root;
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("read batch root: {}", root.display()))?;
        let mut run_dirs: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read batch root: {}", root.display()))?;
            if entry.path().is_dir() {
                run_dirs.push(entry.path());
            }
        }
        run_dirs.sort();

        for run_dir in run_dirs {
            self.clean_run(&run_dir)?;
        }
        Ok(())
    }

    /// Merge a run's result files into `cleaned_responses.json` and the
    /// per-language files, all inside the run's results directory.
    pub fn clean_run(&self, run_dir: &Path) -> anyhow::Result<()> {
        let results_dir = run_dir.join(RESULTS_DIR);
        if !results_dir.is_dir() {
            self.progress
                .info(format!("no results in {}, skipping", run_dir.display()));
            return Ok(());
        }

        let inputs = find_result_files(&results_dir, &self.cfg.job_file_prefix)?;
        if inputs.is_empty() {
            self.progress.info(format!(
                "no result files in {}, skipping",
                results_dir.display()
            ));
            return Ok(());
        }
        for input in &inputs {
            self.progress.info(format!("loading {}", input.display()));
        }

        let cleaned = clean_result_files(&inputs)?;
        write_cleaned_responses(&results_dir.join(CLEANED_RESPONSES_FILE), &cleaned)?;
        write_language_files(&cleaned, &results_dir)?;
        self.progress.info(format!(
            "merged {} result files into {} keys in {}",
            inputs.len(),
            cleaned.len(),
            results_dir.display()
        ));
        Ok(())
    }
}

fn unix_timestamp() -> anyhow::Result<u64> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before unix epoch")?;
    Ok(now.as_secs())
}

fn list_job_files(batches_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(batches_dir)
        .with_context(|| format!("read batches dir: {}", batches_dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("read batches dir: {}", batches_dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn result_file_name(job_file: &Path) -> String {
    let stem = job_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("batch");
    format!("{stem}-results.jsonl")
}
