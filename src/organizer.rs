use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use filetime::FileTime;
use log::{debug, info, warn};

use crate::classifier::{Classifier, LabelScores, UNSAFE_LABEL};
use crate::config::{Layout, MissingLabel, ScanConfig};
use crate::discovery::discover_images;
use crate::error::{FileError, ScanError};
use crate::scan_log::ScanLog;
use crate::session::{Disposition, OutputDirs};

/// Final tally of one run.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub total: usize,
    pub safe: usize,
    pub unsafe_count: usize,
    pub errors: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub output: OutputDirs,
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    safe: usize,
    unsafe_count: usize,
    errors: usize,
}

struct Placement {
    disposition: Disposition,
    probability: f32,
    destination: PathBuf,
}

/// One run of the organizer: output folders prepared, log open, images
/// discovered. Consumed by [`Scan::run`], which closes the log.
pub struct Scan {
    config: ScanConfig,
    input_dir: PathBuf,
    output: OutputDirs,
    log: ScanLog,
    files: Vec<PathBuf>,
    started: Instant,
}

impl Scan {
    /// Validates the config, creates the output folders and the log, and
    /// discovers the images to classify.
    pub fn begin(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let started = Instant::now();
        let input_dir = config.input_dir()?.to_path_buf();
        let now = Local::now();

        let output = OutputDirs::prepare(config.layout, &config.output_root, &input_dir, now)?;
        let mut log = ScanLog::create(output.log_file.as_deref())?;
        let analyzed = (config.layout == Layout::Session).then_some(input_dir.as_path());
        log.write_header(now, analyzed)?;

        let files = discover_images(&input_dir, config.recursive);

        if files.is_empty() {
            log.line(format!(
                "No images found in directory '{}'",
                input_dir.display()
            ))?;
        } else {
            log.line(format!("Found {} images to classify...", files.len()))?;
            log.line(format!("Input directory: {}", input_dir.display()))?;
            log.line(format!("Output directory: {}", output.root.display()))?;
            log.line(format!("Batch size: {}", config.batch_size))?;
            log.line(format!("Unsafe threshold: {}", config.threshold))?;
            log.blank()?;
        }

        Ok(Self {
            config: config.clone(),
            input_dir,
            output,
            log,
            files,
            started,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes a free-form line to the run log.
    pub fn note(&mut self, message: impl AsRef<str>) -> Result<(), ScanError> {
        self.log.line(message).map_err(ScanError::from)
    }

    /// Classifies every discovered image batch by batch and copies each one
    /// into the safe or unsafe folder.
    ///
    /// A classifier failure aborts the run; anything that goes wrong with a
    /// single file is logged and counted as an error.
    pub fn run(mut self, classifier: &dyn Classifier) -> Result<ScanSummary, ScanError> {
        let files = std::mem::take(&mut self.files);
        let total = files.len();
        let mut tally = Tally::default();
        let mut batches = 0usize;

        if total > 0 {
            self.log.line("Classifying...")?;
            self.log.blank()?;
        }

        for batch in files.chunks(self.config.batch_size) {
            batches += 1;
            debug!("Classifying batch {} ({} images)", batches, batch.len());
            let results = classifier.classify(batch)?;
            self.process_batch(batch, results, total, &mut tally)?;
        }

        let summary = ScanSummary {
            total,
            safe: tally.safe,
            unsafe_count: tally.unsafe_count,
            errors: tally.errors,
            batches,
            elapsed: self.started.elapsed(),
            output: self.output.clone(),
        };
        self.write_summary(&summary)?;
        info!(
            "Scan finished: {} images ({} safe, {} unsafe, {} errors) in {} batches",
            summary.total, summary.safe, summary.unsafe_count, summary.errors, summary.batches
        );
        Ok(summary)
    }

    fn process_batch(
        &mut self,
        batch: &[PathBuf],
        results: Vec<(PathBuf, LabelScores)>,
        total: usize,
        tally: &mut Tally,
    ) -> Result<(), ScanError> {
        let mut pending: HashSet<&Path> = batch.iter().map(PathBuf::as_path).collect();

        for (path, scores) in results {
            if !pending.remove(path.as_path()) {
                warn!(
                    "Ignoring classifier result for {} (not in batch or duplicated)",
                    path.display()
                );
                continue;
            }
            tally.processed += 1;
            let outcome = self.place(&path, &scores);
            self.record(&path, outcome, total, tally)?;
        }

        // Anything the classifier left out still needs a disposition.
        for path in batch {
            if pending.contains(path.as_path()) {
                tally.processed += 1;
                self.record(path, Err(FileError::NotClassified), total, tally)?;
            }
        }

        Ok(())
    }

    fn record(
        &mut self,
        path: &Path,
        outcome: Result<Placement, FileError>,
        total: usize,
        tally: &mut Tally,
    ) -> Result<(), ScanError> {
        let processed = tally.processed;
        match outcome {
            Ok(placement) => {
                match placement.disposition {
                    Disposition::Safe => tally.safe += 1,
                    Disposition::Unsafe => tally.unsafe_count += 1,
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.log.line(format!(
                    "[{processed}/{total}] {}: {name} (probability: {:.3}) -> {}",
                    placement.disposition,
                    placement.probability,
                    placement.destination.display()
                ))?;
            }
            Err(err) => {
                tally.errors += 1;
                self.log.line(format!(
                    "[{processed}/{total}] ERROR: {}: {err}",
                    path.display()
                ))?;
            }
        }
        Ok(())
    }

    fn place(&self, path: &Path, scores: &LabelScores) -> Result<Placement, FileError> {
        let probability = unsafe_probability(scores, self.config.missing_label)?;
        let disposition = Disposition::from_probability(probability, self.config.threshold);

        let file_name = path
            .file_name()
            .ok_or_else(|| FileError::NoFileName(path.to_path_buf()))?;
        let name = free_file_name(
            file_name,
            &[self.output.safe.as_path(), self.output.unsafe_dir.as_path()],
        );
        let destination = self.output.dir_for(disposition).join(name);

        copy_preserving_times(path, &destination).map_err(|source| FileError::Copy {
            destination: destination.clone(),
            source,
        })?;

        Ok(Placement {
            disposition,
            probability,
            destination,
        })
    }

    fn write_summary(&mut self, summary: &ScanSummary) -> Result<(), ScanError> {
        self.log.blank()?;
        self.log.rule()?;
        self.log.line("CLASSIFICATION SUMMARY:")?;
        self.log
            .line(format!("Analyzed directory: {}", self.input_dir.display()))?;
        self.log
            .line(format!("Results directory: {}", summary.output.root.display()))?;
        self.log.line(format!("Safe images: {}", summary.safe))?;
        self.log
            .line(format!("Unsafe images: {}", summary.unsafe_count))?;
        self.log.line(format!("Errors: {}", summary.errors))?;
        self.log.line(format!(
            "Total processed: {}",
            summary.safe + summary.unsafe_count
        ))?;
        self.log.line(format!(
            "Total execution time: {}",
            format_elapsed(summary.elapsed)
        ))?;
        self.log.rule()?;
        if let Some(path) = self.log.path().map(Path::to_path_buf) {
            self.log.line(format!("Log saved to: {}", path.display()))?;
        }
        Ok(())
    }
}

fn unsafe_probability(scores: &LabelScores, missing: MissingLabel) -> Result<f32, FileError> {
    let probability = match (scores.get(UNSAFE_LABEL), missing) {
        (Some(&p), _) => p,
        (None, MissingLabel::Safe) => 0.0,
        (None, MissingLabel::Error) => return Err(FileError::MissingLabel(UNSAFE_LABEL)),
    };
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(FileError::InvalidProbability(probability));
    }
    Ok(probability)
}

/// First of `name`, `stem_1.ext`, `stem_2.ext`, ... that exists in none of `dirs`.
pub fn free_file_name(file_name: &OsStr, dirs: &[&Path]) -> OsString {
    let taken = |candidate: &OsStr| dirs.iter().any(|dir| dir.join(candidate).exists());
    if !taken(file_name) {
        return file_name.to_os_string();
    }

    let as_path = Path::new(file_name);
    let stem = as_path.file_stem().unwrap_or(file_name);
    let extension = as_path.extension();

    let mut counter = 1usize;
    loop {
        let mut candidate = stem.to_os_string();
        candidate.push(format!("_{counter}"));
        if let Some(ext) = extension {
            candidate.push(".");
            candidate.push(ext);
        }
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Copies `source` to `destination` and carries over access and modification
/// times. The source is left untouched.
fn copy_preserving_times(source: &Path, destination: &Path) -> std::io::Result<()> {
    // Read first: once the copy lands, the file must count as copied.
    let metadata = fs::metadata(source)?;
    fs::copy(source, destination)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(err) = filetime::set_file_times(destination, atime, mtime) {
        warn!(
            "Copied {} but could not preserve timestamps: {}",
            destination.display(),
            err
        );
    }
    Ok(())
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64();
    let minutes = (total / 60.0).floor();
    format!("{} min {:.2} s", minutes as u64, total - minutes * 60.0)
}
