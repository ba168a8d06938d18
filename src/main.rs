use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pdf_stamping::config::job::JobFile;
use pdf_stamping::config::merged::MergedConfig;
use pdf_stamping::config::{self};
use pdf_stamping::pipeline::job_runner::{JobConfig, resolve_path};
use pdf_stamping::pipeline::orchestrator::run_all_jobs;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: pdf_stamping <jobs.yaml>...");
        eprintln!("  Place signature and stamp images onto PDF pages as described by each job file.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_stamping {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut job_configs: Vec<JobConfig> = Vec::new();

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file = match JobFile::from_yaml(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            job_configs.push(JobConfig {
                input_path: resolve_path(&job_dir, &job.input),
                output_path: resolve_path(&job_dir, &job.output_or_default()),
                base_dir: job_dir.clone(),
                overlays: job.overlays.clone(),
                merged: MergedConfig::new(&settings, job),
            });
        }
    }

    let results = run_all_jobs(&job_configs);

    let mut has_error = false;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(job_result) => {
                eprintln!(
                    "OK: {} -> {} ({} overlays)",
                    job_result.input_path.display(),
                    job_result.output_path.display(),
                    job_result.overlays_composed
                );
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    job_configs[i].input_path.display(),
                    job_configs[i].output_path.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
