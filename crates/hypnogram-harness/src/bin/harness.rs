//! CLI entrypoint for the hypnogram harness.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use hypnogram_core::{ClockTime, EpochSequence, Thresholds, analyze};
use hypnogram_harness::batch::{BatchConfig, BatchReport, SubjectOutcome, log_outcomes, run_batch};
use hypnogram_harness::determinism::{check_determinism, fingerprint};
use hypnogram_harness::input::{load_stage_file, load_subjects, subject_id};
use hypnogram_harness::structured_log::{ArtifactIndex, LogEmitter, LogLevel, Outcome, StreamKind};
use hypnogram_harness::verify::VerificationSummary;
use hypnogram_harness::{FixtureSet, HarnessError, TestRunner, VerificationReport};

/// Sleep-architecture analysis tooling.
#[derive(Debug, Parser)]
#[command(name = "hypnogram-harness")]
#[command(about = "Analyze staged nights, verify fixtures and run batches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one stage file and write the full result as JSON.
    Analyze {
        /// Stage file, one token per epoch.
        #[arg(long)]
        stages: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        epoch_secs: f64,
        /// Clock time of the first epoch (hh:mm:ss).
        #[arg(long)]
        start: Option<String>,
        /// Analysis option `key=value`; repeatable.
        #[arg(long = "param")]
        params: Vec<String>,
        /// Reject the file unless it holds exactly this many epochs.
        #[arg(long)]
        expected_epochs: Option<usize>,
        /// Output JSON path (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Verify the engine against fixture files.
    Verify {
        /// Directory containing fixture JSON files.
        #[arg(long)]
        fixture: PathBuf,
        /// Output report path (markdown).
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Analyze every stage file in a directory.
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        epoch_secs: f64,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long = "param")]
        params: Vec<String>,
        /// Output JSON path (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Re-run one analysis and compare blake3 fingerprints.
    Determinism {
        #[arg(long)]
        stages: PathBuf,
        #[arg(long, default_value_t = 3)]
        runs: usize,
        #[arg(long, default_value_t = 30.0)]
        epoch_secs: f64,
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

fn run_id(command: &str) -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{command}-{secs}")
}

fn write_or_print(output: Option<&Path>, json: &str) -> std::io::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn write_artifact_index(log: &Path, run_id: &str, outputs: &[(&Path, &str)]) -> std::io::Result<()> {
    let mut index = ArtifactIndex::new(run_id);
    index.add_file(log, "log")?;
    for (path, kind) in outputs {
        index.add_file(path, *kind)?;
    }
    let json = index.to_json().map_err(std::io::Error::other)?;
    std::fs::write(log.with_extension("artifacts.json"), json)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            stages,
            epoch_secs,
            start,
            params,
            expected_epochs,
            output,
            log,
        } => {
            let subject = subject_id(&stages);
            let run_id = run_id("analyze");
            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, &run_id, StreamKind::Analysis)?,
                None => LogEmitter::sink(&run_id, StreamKind::Analysis),
            };

            let thresholds = Thresholds::from_params(&params)?;
            let start_time = start.as_deref().and_then(|text| {
                let parsed = ClockTime::parse(text);
                if parsed.is_none() {
                    eprintln!("Ignoring unparseable start time '{text}'");
                }
                parsed
            });
            let mut sequence =
                EpochSequence::new(load_stage_file(&stages)?, epoch_secs).with_start(start_time);
            if let Some(n) = expected_epochs {
                sequence = sequence.with_expected_epochs(n);
            }
            eprintln!("Analyzing {} ({} epochs)", stages.display(), sequence.len());

            let t0 = Instant::now();
            let analysis = match analyze(&sequence, &thresholds) {
                Ok(analysis) => analysis,
                Err(err) => {
                    let entry = emitter
                        .entry(LogLevel::Error, "analysis_failed", &subject)
                        .with_outcome(Outcome::Error)
                        .with_epochs(sequence.len())
                        .with_details(serde_json::json!({ "error": err.to_string(), "kind": err.kind() }));
                    emitter.emit_entry(entry)?;
                    emitter.flush()?;
                    return Err(HarnessError::Input {
                        path: stages,
                        source: err,
                    }
                    .into());
                }
            };
            let digest = fingerprint(&analysis)?;
            let entry = emitter
                .entry(LogLevel::Info, "analysis_complete", &subject)
                .with_outcome(Outcome::Pass)
                .with_epochs(analysis.epoch_count())
                .with_duration_ms(t0.elapsed().as_millis() as u64)
                .with_digest(digest)
                .with_details(serde_json::json!({
                    "tst_minutes": analysis.summary.tst,
                    "cycle_count": analysis.summary.cycle_count,
                    "any_sleep": analysis.summary.any_sleep,
                }));
            emitter.emit_entry(entry)?;
            emitter.flush()?;

            write_or_print(output.as_deref(), &serde_json::to_string_pretty(&analysis)?)?;
            if let Some(log) = &log {
                let outputs: Vec<(&Path, &str)> =
                    output.as_deref().map(|p| (p, "analysis")).into_iter().collect();
                write_artifact_index(log, &run_id, &outputs)?;
            }
            eprintln!(
                "Analysis complete: tst={:.1} min, cycles={}",
                analysis.summary.tst, analysis.summary.cycle_count
            );
        }
        Command::Verify { fixture, report } => {
            eprintln!("Verifying against fixtures in {}", fixture.display());
            let mut fixture_sets = Vec::new();
            for path in hypnogram_harness::fixtures::fixture_files(&fixture)? {
                match FixtureSet::from_file(&path) {
                    Ok(set) => fixture_sets.push(set),
                    Err(err) => eprintln!("Skipping {}: {}", path.display(), err),
                }
            }
            if fixture_sets.is_empty() {
                return Err(HarnessError::NoFixtures(fixture).into());
            }

            let runner = TestRunner::new("fixture-verify");
            let results = fixture_sets.iter().flat_map(|set| runner.run(set)).collect();
            let report_doc = VerificationReport {
                title: String::from("Hypnogram Fixture Verification"),
                timestamp: hypnogram_harness::structured_log::now_utc(),
                summary: VerificationSummary::from_results(results),
            };

            eprintln!(
                "Verification complete: total={}, passed={}, failed={}",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );
            for failure in report_doc.summary.results.iter().filter(|r| !r.passed) {
                eprintln!("FAIL {}\n{}", failure.case_name, failure.diff.as_deref().unwrap_or(""));
            }

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, report_doc.to_markdown())?;
                std::fs::write(report_path.with_extension("json"), report_doc.to_json())?;
            }

            if !report_doc.summary.all_passed() {
                return Err("Fixture verification failed".into());
            }
        }
        Command::Batch {
            input,
            epoch_secs,
            workers,
            params,
            output,
            log,
        } => {
            let run_id = run_id("batch");
            let config = BatchConfig {
                epoch_secs,
                workers,
                thresholds: Thresholds::from_params(&params)?,
            };
            let (subjects, failures) = load_subjects(&input)?;
            eprintln!(
                "Analyzing {} subjects from {} with {} workers",
                subjects.len(),
                input.display(),
                config.workers
            );

            let mut outcomes = run_batch(&subjects, &config);
            for failure in &failures {
                let subject = match failure {
                    HarnessError::Input { path, .. } => subject_id(path),
                    _ => String::from("unknown"),
                };
                eprintln!("Could not load {subject}: {failure}");
                outcomes.push(SubjectOutcome::load_failure(subject, failure.to_string()));
            }
            outcomes.sort_by(|a, b| a.subject.cmp(&b.subject));

            if let Some(path) = &log {
                let mut emitter = LogEmitter::to_file(path, &run_id, StreamKind::Batch)?;
                log_outcomes(&mut emitter, &outcomes)?;
            }

            let report = BatchReport::new(&run_id, outcomes);
            write_or_print(output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
            if let Some(log) = &log {
                let outputs: Vec<(&Path, &str)> =
                    output.as_deref().map(|p| (p, "batch")).into_iter().collect();
                write_artifact_index(log, &run_id, &outputs)?;
            }
            eprintln!(
                "Batch complete: subjects={}, succeeded={}, failed={}",
                report.subjects, report.succeeded, report.failed
            );
        }
        Command::Determinism {
            stages,
            runs,
            epoch_secs,
            params,
        } => {
            let thresholds = Thresholds::from_params(&params)?;
            let sequence = EpochSequence::new(load_stage_file(&stages)?, epoch_secs);
            let report = check_determinism(&sequence, &thresholds, runs)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.stable {
                return Err(format!("Non-deterministic output across {} runs", report.runs).into());
            }
            eprintln!(
                "Determinism check passed: {} runs, digest {}",
                report.runs,
                report.digests.first().map_or("", String::as_str)
            );
        }
    }

    Ok(())
}
