use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{signature_for_enrollment, Frame, Identity, OnnxAnalyzer};
use rollcall_store::{Gallery, Ledger};
use rollcalld::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance administration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from an image file containing exactly one face
    Enroll {
        /// Identity key (student roll number)
        id: String,
        /// Path to the face image
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Deregister an identity and remove its reference image
    Deregister {
        /// Identity key to remove
        id: String,
    },
    /// List enrolled identities
    List,
    /// Show the attendance ledger
    Ledger,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Enroll { id, image } => {
            let identity = Identity::parse(&id)
                .with_context(|| format!("{id:?} is not a valid identity key"))?;
            let frame = Frame::from_path(&image)
                .with_context(|| format!("could not load {}", image.display()))?;

            let mut analyzer = OnnxAnalyzer::load(
                &config.detector_model_path(),
                &config.extractor_model_path(),
            )?;
            let signature = signature_for_enrollment(&mut analyzer, &frame)?;

            let mut gallery = Gallery::open(config.gallery_path(), config.faces_dir())?;
            gallery.put(identity.clone(), signature, &frame)?;
            println!("Enrolled {identity}");
        }
        Commands::Deregister { id } => {
            let identity = Identity::parse(&id)
                .with_context(|| format!("{id:?} is not a valid identity key"))?;
            let mut gallery = Gallery::open(config.gallery_path(), config.faces_dir())?;
            if gallery.contains(&identity) {
                gallery.remove(&identity)?;
                println!("Deregistered {identity}");
            } else {
                println!("{identity} is not enrolled");
            }
        }
        Commands::List => {
            let gallery = Gallery::open(config.gallery_path(), config.faces_dir())?;
            if gallery.is_empty() {
                println!("No identities enrolled");
            }
            for entry in gallery.snapshot() {
                println!("{}", entry.identity);
            }
        }
        Commands::Ledger => {
            let ledger = Ledger::open(config.ledger_path(), config.year_rule)?;
            let dates: Vec<String> = ledger
                .columns()
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            println!("Student ID\tYear\tRegistered\t{}", dates.join("\t"));
            for row in ledger.rows() {
                let cells: Vec<&str> = ledger
                    .columns()
                    .iter()
                    .map(|d| row.time_for(*d).unwrap_or("-"))
                    .collect();
                println!(
                    "{}\t{}\t{}\t{}",
                    row.identity,
                    row.year,
                    row.registered_on.format("%Y-%m-%d"),
                    cells.join("\t")
                );
            }
        }
    }

    Ok(())
}
