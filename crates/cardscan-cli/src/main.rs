//! `cardscan` binary: scan photos for cards, build and inspect reference
//! hash databases.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use rayon::prelude::*;

use cardscan::adapt::{rgb_view, to_image};
use cardscan::annotate::annotate;
use cardscan::report::ScanReport;
use cardscan::{CardDetector, DetectorParams, ScanResult};
use cardscan_core::logger;
use cardscan_phash::{HashDb, ReferenceCard};

#[derive(Parser)]
#[command(name = "cardscan", version, about = "Recognize trading cards in photographs")]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one or more images against a reference database.
    Scan(ScanArgs),
    /// Reference database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Input photographs.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Reference hash database (JSON).
    #[arg(long)]
    db: PathBuf,

    /// Detector parameter overrides (JSON, partial allowed).
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write annotated copies of the inputs into this directory.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    /// Write a JSON report of all scans to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Hash every image in a directory into a new database.
    Build {
        /// Directory of reference card images.
        dir: PathBuf,
        /// Output database path.
        #[arg(long)]
        out: PathBuf,
        /// Detector parameter overrides (JSON, partial allowed).
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Summarize a database: entry count, hash width, duplicate names.
    Inspect { db: PathBuf },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] cardscan_phash::DbError),
    #[error(transparent)]
    Config(#[from] cardscan::DetectorConfigError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("reference database {0} is empty; build one with `cardscan db build`")]
    EmptyDb(PathBuf),
    #[error("no images found in {0}")]
    NoImages(PathBuf),
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = logger::init_with_level(level);

    if let Err(err) = run(cli.command) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Scan(args) => scan(args),
        Command::Db {
            command: DbCommand::Build { dir, out, params },
        } => db_build(&dir, &out, params.as_deref()),
        Command::Db {
            command: DbCommand::Inspect { db },
        } => db_inspect(&db),
    }
}

fn load_params(path: Option<&Path>) -> Result<DetectorParams, CliError> {
    match path {
        Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => Ok(DetectorParams::default()),
    }
}

fn scan(args: ScanArgs) -> Result<(), CliError> {
    let params = load_params(args.params.as_deref())?;
    let db = HashDb::load_json(&args.db)?;
    if db.is_empty() {
        return Err(CliError::EmptyDb(args.db.clone()));
    }
    info!("loaded {} reference entries", db.len());
    let detector = CardDetector::new(db, params)?;

    if let Some(dir) = &args.annotate_dir {
        fs::create_dir_all(dir)?;
    }

    // Images are independent; the pipeline itself stays single-threaded.
    let mut outcomes: Vec<(PathBuf, Option<ScanResult>)> = args
        .images
        .par_iter()
        .map(|path| {
            let result = scan_one(&detector, path, args.annotate_dir.as_deref());
            (path.clone(), result)
        })
        .collect();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut reports = Vec::new();
    for (path, result) in &outcomes {
        let Some(result) = result else {
            println!("{}: scan failed", path.display());
            continue;
        };
        if result.cards.is_empty() {
            println!("{}: no cards recognized", path.display());
        }
        for card in &result.cards {
            println!(
                "{}: {} (score {:.2})",
                path.display(),
                card.name,
                card.recognition_score
            );
        }
        reports.push(ScanReport::from_result(path.display().to_string(), result));
    }

    if let Some(report_path) = &args.report {
        fs::write(report_path, serde_json::to_string_pretty(&reports)?)?;
        info!("wrote report to {}", report_path.display());
    }
    Ok(())
}

fn scan_one(detector: &CardDetector, path: &Path, annotate_dir: Option<&Path>) -> Option<ScanResult> {
    let photo = match image::open(path) {
        Ok(img) => img.to_rgb8(),
        Err(err) => {
            error!("{}: decode failed: {err}", path.display());
            return None;
        }
    };

    let result = match detector.detect(&rgb_view(&photo)) {
        Ok(result) => result,
        Err(err) => {
            error!("{}: {err}", path.display());
            return None;
        }
    };
    info!(
        "{}: {} card(s) after {:?}",
        path.display(),
        result.cards.len(),
        result.modes_tried
    );

    // Annotation failures are reported but never affect the scan result.
    if let Some(dir) = annotate_dir {
        let overlay = annotate(&rgb_view(&photo), &result.cards);
        let out = dir.join(path.file_name().unwrap_or(path.as_os_str()));
        match to_image(&overlay) {
            Some(img) => {
                if let Err(err) = img.save(&out) {
                    warn!("{}: writing annotation failed: {err}", out.display());
                }
            }
            None => warn!("{}: annotation buffer was invalid", path.display()),
        }
    }

    Some(result)
}

fn db_build(dir: &Path, out: &Path, params: Option<&Path>) -> Result<(), CliError> {
    let params = load_params(params)?;

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image_path(p))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(CliError::NoImages(dir.to_path_buf()));
    }

    let entries: Vec<ReferenceCard> = paths
        .par_iter()
        .filter_map(|path| {
            let img = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(err) => {
                    warn!("{}: skipped ({err})", path.display());
                    return None;
                }
            };
            let phash = cardscan::hash_reference_image(&rgb_view(&img), &params);
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(ReferenceCard::new(name, phash))
        })
        .collect();

    let db = HashDb::new(entries);
    db.write_json(out)?;
    println!("hashed {} reference images into {}", db.len(), out.display());
    Ok(())
}

fn db_inspect(path: &Path) -> Result<(), CliError> {
    let db = HashDb::load_json(path)?;
    println!("entries:   {}", db.len());
    println!(
        "hash bits: {}",
        db.hash_bits().map_or("n/a".into(), |b| b.to_string())
    );

    let mut names: Vec<&str> = db.entries.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    let mut duplicates = 0usize;
    for pair in names.windows(2) {
        if pair[0] == pair[1] {
            duplicates += 1;
        }
    }
    println!("duplicate names: {duplicates}");
    Ok(())
}

fn is_image_path(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "bmp" | "tiff" | "webp"
    )
}
