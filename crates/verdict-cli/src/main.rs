//! Verdict - live multi-verifier verification client
//!
//! ## Commands
//!
//! - `verify`: stream a perturbation through every configured verifier
//! - `replay`: extract results from a captured response body offline
//! - `perturb`: ask the backend to generate a perturbation
//! - `roster`: list the configured verifiers
//! - `health`: check that the backend is up

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use verdict_core::{
    extract_chunks, snapshot, snapshot_with_roster, AgreementSnapshot, ExtractionReport,
    ReplayTransport, RunOutcome, Session, SessionStatus, VerificationController,
    VerificationRequest, VerifierDescriptor, VerifierResult,
};
use verdict_http::{HttpClientConfig, HttpVerificationClient, PerturbationInput};

#[derive(Parser)]
#[command(name = "verdict")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live multi-verifier verification client", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Verification backend base URL
    #[arg(
        long,
        global = true,
        env = "VERDICT_SERVER_URL",
        default_value = verdict_http::DEFAULT_SERVER_URL
    )]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a perturbation with every configured verifier, live
    Verify {
        /// Path to the perturbation (JSON, as produced by `perturb`)
        #[arg(short, long)]
        request: PathBuf,

        /// Skip fetching the verifier roster
        #[arg(long)]
        no_roster: bool,

        /// Write the final session and agreement to this file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract verifier results from a captured response body
    Replay {
        /// Captured body of a verify call
        #[arg(short, long)]
        stream: PathBuf,

        /// Bytes per simulated network chunk
        #[arg(long, default_value = "64")]
        chunk_size: usize,
    },

    /// Generate a perturbation for a QA instance
    Perturb {
        #[arg(long)]
        question: String,

        #[arg(long)]
        context: String,

        /// Acceptable answer (repeat for several)
        #[arg(long = "answer", required = true)]
        answers: Vec<String>,

        /// Perturbation class, e.g. P-Ambiguity
        #[arg(long = "class")]
        perturbation_class: String,

        /// Intensity: LOW, MEDIUM or HIGH
        #[arg(long)]
        intensity: String,

        /// Write the generated perturbation here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the verifiers configured on the backend
    Roster,

    /// Check backend health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    verdict_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Verify {
            request,
            no_roster,
            output,
        } => cmd_verify(&cli.server, &request, no_roster, output.as_deref()).await,
        Commands::Replay { stream, chunk_size } => cmd_replay(&stream, chunk_size),
        Commands::Perturb {
            question,
            context,
            answers,
            perturbation_class,
            intensity,
            output,
        } => {
            let input = PerturbationInput {
                question,
                context,
                answers,
                perturbation_class,
                intensity,
            };
            cmd_perturb(&cli.server, &input, output.as_deref()).await
        }
        Commands::Roster => cmd_roster(&cli.server).await,
        Commands::Health => cmd_health(&cli.server).await,
    }
}

fn http_client(server: &str) -> Result<HttpVerificationClient> {
    let config = HttpClientConfig::from_env().with_base_url(server);
    HttpVerificationClient::new(config).context("Failed to build HTTP client")
}

fn load_request(path: &Path) -> Result<VerificationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid perturbation JSON in {:?}", path))
}

#[derive(Serialize)]
struct VerifyReport<'a> {
    session: &'a Session,
    agreement: &'a AgreementSnapshot,
}

async fn cmd_verify(
    server: &str,
    request_path: &Path,
    no_roster: bool,
    output: Option<&Path>,
) -> Result<()> {
    let request = load_request(request_path)?;
    let client = Arc::new(http_client(server)?);

    let roster = if no_roster {
        Vec::new()
    } else {
        match client.fetch_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(error = %e, "could not fetch verifier roster; slots follow arrival order");
                Vec::new()
            }
        }
    };

    println!(
        "Verifying {} ({} configured verifier(s))",
        request.label(),
        roster.len()
    );

    let ctl = Arc::new(
        VerificationController::new(client.clone(), client, request).with_roster(roster),
    );
    let mut updates = ctl.subscribe();
    let mut run = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.auto_start().await }
    });

    let mut printed = 0;
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome.context("Verification task panicked")?,
            changed = updates.changed() => {
                if changed.is_err() {
                    continue;
                }
                let session = updates.borrow_and_update().clone();
                print_new_results(&session, ctl.roster(), &mut printed);
            }
        }
    };
    let session = ctl.snapshot();
    print_new_results(&session, ctl.roster(), &mut printed);

    let agreement = snapshot_with_roster(&session.results, ctl.roster());
    println!();
    print!("{}", render::matrix(&agreement));
    println!("{}", render::save_line(&session.save));

    if let Some(path) = output {
        let report = VerifyReport {
            session: &session,
            agreement: &agreement,
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write to {:?}", path))?;
        println!("Session written to {:?}", path);
    }

    match outcome {
        Some(RunOutcome::Failed { message }) => bail!("Verification failed: {}", message),
        _ if session.status == SessionStatus::Failed => bail!(
            "Verification failed: {}",
            session.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

/// Print results that arrived since the last call, then the live agreement.
fn print_new_results(session: &Session, roster: &[VerifierDescriptor], printed: &mut usize) {
    if session.results.len() < *printed {
        *printed = 0;
    }
    if session.results.len() == *printed {
        return;
    }
    for (seq, result) in session.results.iter().enumerate().skip(*printed) {
        println!("{}", render::result_line(seq, result));
    }
    *printed = session.results.len();
    let agreement = snapshot_with_roster(&session.results, roster);
    println!("    {}", render::agreement_line(&agreement));
}

fn replay_file(path: &Path, chunk_size: usize) -> Result<ExtractionReport<VerifierResult>> {
    let body =
        std::fs::read(path).with_context(|| format!("Failed to read stream file {:?}", path))?;
    let chunks = ReplayTransport::new(body, chunk_size).chunks();
    info!(chunks = chunks.len(), "replaying captured stream");
    Ok(extract_chunks(chunks))
}

fn cmd_replay(path: &Path, chunk_size: usize) -> Result<()> {
    let report = replay_file(path, chunk_size)?;

    for (seq, result) in report.objects.iter().enumerate() {
        println!("{}", render::result_line(seq, result));
    }
    let agreement = snapshot(&report.objects);
    println!("{}", render::agreement_line(&agreement));
    println!();
    print!("{}", render::matrix(&agreement));

    if report.malformed > 0 {
        println!("{} malformed object(s) skipped", report.malformed);
    }
    if report.dropped_bytes > 0 {
        println!(
            "stream ended inside an object: {} trailing byte(s) dropped",
            report.dropped_bytes
        );
    }
    Ok(())
}

async fn cmd_perturb(server: &str, input: &PerturbationInput, output: Option<&Path>) -> Result<()> {
    if !input.is_complete() {
        bail!("question, context and at least one answer are required");
    }
    let client = http_client(server)?;
    let request = client
        .generate_perturbation(input)
        .await
        .context("Perturbation request failed")?;

    if request.ground_truth_label.is_none() {
        warn!("backend returned no ground truth label");
    }
    let json = serde_json::to_string_pretty(&request)?;
    if let Some(path) = output {
        std::fs::write(path, &json).with_context(|| format!("Failed to write to {:?}", path))?;
        println!("Perturbation written to {:?}", path);
    } else {
        println!("{}", json);
    }
    Ok(())
}

async fn cmd_roster(server: &str) -> Result<()> {
    let roster = http_client(server)?
        .fetch_roster()
        .await
        .context("Failed to fetch verifier roster")?;

    if roster.is_empty() {
        println!("No verifiers configured");
    }
    for (index, verifier) in roster.iter().enumerate() {
        println!(
            "[{index}] {:<28} {}/{}",
            verifier.label(),
            verifier.provider,
            verifier.model_id
        );
    }
    Ok(())
}

async fn cmd_health(server: &str) -> Result<()> {
    let healthy = http_client(server)?
        .health()
        .await
        .with_context(|| format!("Backend at {} is unreachable", server))?;
    if !healthy {
        bail!("Backend at {} reported unhealthy", server);
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = concat!(
        r#"[{"verification_model":"m1","verification_response":{"verification_result":"PASS"}},"#,
        r#"{"verification_model":"m2","verification_response":{"verification_result":"FAIL"}},"#,
        r#"{"verification_model":"m3","verification_resp"#,
    );

    #[test]
    fn replay_reports_results_and_truncated_tail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("capture.json");
        std::fs::write(&path, CAPTURE).unwrap();

        let report = replay_file(&path, 5).unwrap();
        assert_eq!(report.objects.len(), 2);
        assert_eq!(
            report.dropped_bytes,
            r#"{"verification_model":"m3","verification_resp"#.len()
        );
        assert!(cmd_replay(&path, 5).is_ok());
    }

    #[test]
    fn replay_of_missing_file_fails_with_context() {
        let err = replay_file(Path::new("/nonexistent/capture.json"), 64).unwrap_err();
        assert!(err.to_string().contains("Failed to read stream file"));
    }

    #[test]
    fn load_request_reads_generator_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("perturbation.json");
        std::fs::write(
            &path,
            r#"{"perturbed_query":"Who wrote it?","perturbation_class":"P-Ambiguity","intensity":"LOW","original_answers":"Frank Herbert"}"#,
        )
        .unwrap();

        let request = load_request(&path).unwrap();
        assert_eq!(request.label(), "P-Ambiguity / LOW");
        assert!(!request.original_answers.is_empty());
    }

    #[test]
    fn print_new_results_tracks_what_was_shown() {
        let mut session = Session::default();
        session.results.push(VerifierResult::new("m1", None));
        let mut printed = 0;
        print_new_results(&session, &[], &mut printed);
        assert_eq!(printed, 1);

        session.results.clear();
        print_new_results(&session, &[], &mut printed);
        assert_eq!(printed, 0);
    }

    #[test]
    fn cli_parses_perturb_with_repeated_answers() {
        let cli = Cli::try_parse_from([
            "verdict",
            "--server",
            "http://10.0.0.5:4075",
            "perturb",
            "--question",
            "q",
            "--context",
            "c",
            "--answer",
            "a1",
            "--answer",
            "a2",
            "--class",
            "P-Ambiguity",
            "--intensity",
            "HIGH",
        ])
        .unwrap();

        assert_eq!(cli.server, "http://10.0.0.5:4075");
        match cli.command {
            Commands::Perturb { answers, .. } => assert_eq!(answers, ["a1", "a2"]),
            _ => panic!("expected perturb"),
        }
    }

    #[test]
    fn cli_requires_request_for_verify() {
        assert!(Cli::try_parse_from(["verdict", "verify"]).is_err());
        let cli = Cli::try_parse_from(["verdict", "verify", "-r", "p.json", "--no-roster"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Verify {
                no_roster: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn perturb_rejects_incomplete_input_before_calling_backend() {
        let err = cmd_perturb("http://127.0.0.1:9", &PerturbationInput::default(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("required"));
    }
}
