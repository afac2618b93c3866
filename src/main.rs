//! stemctl CLI entry point

use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use indicatif::{ProgressBar, ProgressStyle};
use stemctl::config::{Cli, Settings};
use stemctl::export::write_manifest;
use stemctl::pipeline::Separator;
use stemctl::process::CancellationToken;
use stemctl::tool::tool_version;
use stemctl::{ProgressEvent, SeparationRequest, SeparationResult};
use std::process::ExitCode;
use std::thread;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI and environment
    let settings = Settings::from_cli(&cli);

    if cli.version_check {
        return print_version(&settings);
    }

    let Some(request) = cli.to_request() else {
        eprintln!("Error: no input file given");
        return ExitCode::FAILURE;
    };

    // Progress events are rendered on their own thread so the separator's
    // stderr reader never waits on the terminal
    let (tx, rx) = unbounded();
    let display = spawn_progress_display(rx, settings.show_progress);

    // The tool sits in its own process group, so Ctrl-C has to be relayed
    let cancel = CancellationToken::new();
    if let Err(e) = cancel.cancel_on_interrupt() {
        warn!("Could not install interrupt handler: {}", e);
    }

    let separator = Separator::new(settings.clone()).with_cancellation(cancel);
    let result = separator.separate(&request, Some(&tx));

    drop(tx);
    if display.join().is_err() {
        warn!("Progress display thread panicked");
    }

    if settings.write_manifest {
        let path = result
            .output_dir
            .join(format!("{}_stems.json", request.track_name()));
        if let Err(e) = write_manifest(&request, &result, &path) {
            eprintln!("Warning: {}", e);
        }
    }

    print_summary(&request, &result)
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        cli.log_level()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_version(settings: &Settings) -> ExitCode {
    match tool_version(&settings.pip, &settings.package, settings.probe_timeout) {
        Some(version) => {
            println!("{} {}", settings.package, version);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!(
                "Could not determine the installed {} version.\n\n  Tip: Install it with: pip install -U {}",
                settings.package, settings.package
            );
            ExitCode::FAILURE
        }
    }
}

/// Render progress events until the sender is dropped
fn spawn_progress_display(rx: Receiver<ProgressEvent>, show: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if !show {
            // Drain so the channel does not just accumulate
            for _ in rx {}
            return;
        }

        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message("starting");

        for event in rx {
            match &event {
                ProgressEvent::Info { message } => pb.println(message),
                ProgressEvent::OverallProgress { percent, .. } => {
                    pb.set_position(u64::from(*percent));
                }
                ProgressEvent::StageProgress { stage, percent, .. } => {
                    pb.set_message(format!(
                        "{} ({}/{}) {}%",
                        stage.name, stage.index, stage.total, percent
                    ));
                }
                ProgressEvent::StageComplete { stage, .. } => {
                    pb.println(format!("  ✓ {}", stage.name));
                }
            }
        }

        pb.finish_and_clear();
    })
}

fn print_summary(request: &SeparationRequest, result: &SeparationResult) -> ExitCode {
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }

    if !result.success {
        eprintln!(
            "Error: {}",
            result.error.as_deref().unwrap_or("separation failed")
        );
        return ExitCode::FAILURE;
    }

    println!();
    println!(
        "✓ Separated {} into {} stems in {:.1}s",
        request.input().display(),
        result.stems.len(),
        result.elapsed.as_secs_f64()
    );
    for (kind, path) in &result.stems {
        println!("  {:<8} {}", kind.stage_name(), path.display());
    }

    ExitCode::SUCCESS
}
