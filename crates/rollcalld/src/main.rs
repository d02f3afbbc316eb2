use anyhow::Result;
use rollcall_core::{read_code, Frame, OnnxAnalyzer};
use rollcall_store::{ErrorLog, Gallery, Ledger, MarkOutcome};
use rollcall_sync::{RemoteSync, RestTransport};
use rollcalld::{Attendance, Config, CycleOutcome, Engine, LogAnnouncer, ScanOutcome};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

type FrameInput = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(data_dir = %config.data_dir.display(), "rollcalld starting");

    let gallery = Gallery::open(config.gallery_path(), config.faces_dir())?;
    let ledger = Ledger::open(config.ledger_path(), config.year_rule)?;
    let error_log = ErrorLog::new(config.error_log_path());

    let analyzer = OnnxAnalyzer::load(
        &config.detector_model_path(),
        &config.extractor_model_path(),
    )?;

    let remote = match &config.remote_url {
        Some(url) => {
            tracing::info!(url, "remote sync enabled");
            Some(RemoteSync::new(RestTransport::new(
                url.clone(),
                config.remote_auth.clone(),
            )?))
        }
        None => {
            tracing::info!("ROLLCALL_REMOTE_URL not set; remote sync disabled");
            None
        }
    };

    let mut engine = Engine::new(
        analyzer,
        gallery,
        ledger,
        remote,
        error_log,
        Box::new(LogAnnouncer),
        config.tolerance,
    );

    // Frame acquisition is an external collaborator: the capture side feeds
    // one image path per line; 'q' quits.
    let mut input: FrameInput = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!("rollcalld ready — feed captured frame paths on stdin ('q' to quit)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received");
                break;
            }
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "q" || line == "quit" {
                    break;
                }
                if let Err(e) = run_cycle(&mut engine, Path::new(line), &mut input).await {
                    // Recognition/enrollment errors restart the cycle; the
                    // operator re-presents.
                    tracing::warn!(error = %e, "attendance cycle failed");
                }
            }
        }
    }

    tracing::info!("rollcalld shutting down");
    engine.flush()?;
    Ok(())
}

async fn run_cycle(
    engine: &mut Engine<OnnxAnalyzer, RestTransport>,
    frame_path: &Path,
    input: &mut FrameInput,
) -> Result<()> {
    let frame = Frame::from_path(frame_path)?;

    match engine.attend(&frame).await? {
        CycleOutcome::Marked(attendance) => report(&attendance),
        CycleOutcome::Unrecognized => {
            tracing::info!("face not recognized — scan ID code (frame paths; 'q' cancels)");
            match scan_code(input).await? {
                ScanOutcome::Payload(payload) => {
                    // Bind the originally captured face to the scanned key
                    let attendance = engine.enroll_and_attend(&frame, &payload).await?;
                    report(&attendance);
                }
                ScanOutcome::Abandoned => {
                    tracing::info!("enrollment abandoned by operator");
                }
            }
        }
    }

    Ok(())
}

/// Scan successive frames for a QR/barcode until one decodes or the operator
/// cancels.
async fn scan_code(input: &mut FrameInput) -> Result<ScanOutcome> {
    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "q" || line == "quit" {
            return Ok(ScanOutcome::Abandoned);
        }

        let frame = match Frame::from_path(Path::new(line)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(path = line, error = %e, "could not load scan frame");
                continue;
            }
        };

        if let Some(payload) = read_code(&frame) {
            return Ok(ScanOutcome::Payload(payload));
        }
        tracing::info!("no code found in frame; present the code again");
    }

    // End of input while scanning counts as a cancel
    Ok(ScanOutcome::Abandoned)
}

fn report(attendance: &Attendance) {
    match attendance.mark {
        MarkOutcome::Recorded => tracing::info!(
            identity = %attendance.identity,
            date = %attendance.date,
            time = %attendance.time.format("%H:%M:%S"),
            "attendance recorded"
        ),
        MarkOutcome::AlreadyMarked => tracing::info!(
            identity = %attendance.identity,
            date = %attendance.date,
            "already marked today; first time kept"
        ),
    }

    if let Some(remote) = &attendance.remote {
        if remote.fully_synced() {
            tracing::info!(identity = %attendance.identity, "remote storage updated");
        }
    }
}
