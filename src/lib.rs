//! Annostore: annotation storage and COCO interchange.
//!
//! Annostore keeps image assets, their metadata and their annotation sets in
//! a directory of JSON records, and converts between those records and the
//! COCO format. Every write replaces a whole record atomically.
//!
//! # Modules
//!
//! - [`model`]: Records (images, annotations, geometry primitives, ids)
//! - [`store`]: The on-disk record store
//! - [`validation`]: Boundary checks for annotation payloads
//! - [`geometry`]: Polygon area and bbox inference
//! - [`project`]: Per-project listings
//! - [`coco`]: COCO JSON import and export
//! - [`export`]: Zip bundles of a project
//! - [`config`]: Store locations
//! - [`error`]: Error types for annostore operations

pub mod coco;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod project;
pub mod store;
pub mod validation;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use error::AnnostoreError;

use config::StoreConfig;
use model::{AnnotationId, ImageId, RawAnnotation, DEFAULT_PROJECT};
use project::ProjectIndex;
use store::RecordStore;

/// The annostore CLI application.
#[derive(Parser)]
#[command(name = "annostore")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Store root directory.
    #[arg(long, global = true, env = "ANNOSTORE_ROOT", default_value = "./data")]
    root: PathBuf,

    /// YAML store config; overrides --root.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Store image files, each with an empty annotation set.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,
    },

    /// List a project's images, most recently written first.
    List {
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List every project tag in the store.
    Projects,

    /// Delete an image with its asset and annotations.
    DeleteImage { image_id: String },

    /// Print an image's annotation set as JSON.
    Annotations { image_id: String },

    /// Replace an image's annotation set with a JSON array payload.
    SetAnnotations { image_id: String, payload: PathBuf },

    /// Remove one annotation from an image's set.
    DeleteAnnotation {
        image_id: String,
        annotation_id: String,
    },

    /// Write a project as a COCO JSON document.
    CocoExport {
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import annotations from a COCO JSON document.
    CocoImport {
        input: PathBuf,

        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,
    },

    /// Bundle a project into a zip archive.
    Export {
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,

        /// Archive path (default: <project>_export.zip).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Run the annostore CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnostoreError> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("annostore {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Annotation storage and COCO interchange.");
        println!();
        println!("Run 'annostore --help' for usage information.");
        return Ok(());
    };

    let config = match &cli.config {
        Some(path) => StoreConfig::from_yaml_file(path)?,
        None => StoreConfig::new(&cli.root),
    };
    let store = RecordStore::open(&config)?;

    match command {
        Commands::Ingest { files, project } => {
            for record in store.ingest_files(&files, &project)? {
                println!("{}\t{}", record.id, record.filename);
            }
            Ok(())
        }
        Commands::List { project, output } => run_list(&store, &project, output),
        Commands::Projects => {
            for project in ProjectIndex::new(&store).projects()? {
                println!("{}", project);
            }
            Ok(())
        }
        Commands::DeleteImage { image_id } => {
            let report = store.delete_image(&ImageId::new(image_id))?;
            println!("Deleted image {}", report.image_id);
            Ok(())
        }
        Commands::Annotations { image_id } => {
            let annotations = store.get_annotations(&ImageId::new(image_id))?;
            println!("{}", to_pretty_json(&annotations)?);
            Ok(())
        }
        Commands::SetAnnotations { image_id, payload } => {
            run_set_annotations(&store, ImageId::new(image_id), payload)
        }
        Commands::DeleteAnnotation {
            image_id,
            annotation_id,
        } => {
            store.delete_annotation(&ImageId::new(image_id), &AnnotationId::new(annotation_id))?;
            Ok(())
        }
        Commands::CocoExport { project, output } => {
            let (doc, report) = coco::export_project(&store, &project)?;
            coco::write_coco_json(&output, &doc)?;
            println!("Wrote {}", output.display());
            print!("{}", report);
            Ok(())
        }
        Commands::CocoImport { input, project } => {
            let doc = coco::read_coco_json(&input)?;
            let report = coco::import_document(&store, doc, &project)?;
            println!(
                "Imported annotations for {} image(s) ({} newly registered)",
                report.images_written.len(),
                report.registered.len()
            );
            print!("{}", report.conversion);
            Ok(())
        }
        Commands::Export { project, output } => {
            let out_path =
                output.unwrap_or_else(|| PathBuf::from(export::default_archive_name(&project)));
            let report = export::export_project(&store, &project, &out_path)?;
            print!("{}", report);
            Ok(())
        }
    }
}

fn run_list(store: &RecordStore, project: &str, output: OutputFormat) -> Result<(), AnnostoreError> {
    let items = ProjectIndex::new(store).list(project)?;
    match output {
        OutputFormat::Json => println!("{}", to_pretty_json(&items)?),
        OutputFormat::Text => {
            for item in &items {
                println!(
                    "{}\t{}\t{}",
                    item.record.id, item.record.filename, item.record.storage_url
                );
            }
        }
    }
    Ok(())
}

fn run_set_annotations(
    store: &RecordStore,
    image_id: ImageId,
    payload: PathBuf,
) -> Result<(), AnnostoreError> {
    let file = File::open(&payload).map_err(|source| AnnostoreError::store_io(&payload, source))?;
    let raws: Vec<RawAnnotation> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            AnnostoreError::JsonParse {
                path: payload.clone(),
                source,
            }
        })?;

    let stored = store.put_annotations(&image_id, raws)?;
    println!("Stored {} annotation(s) for {}", stored.len(), image_id);
    Ok(())
}

fn to_pretty_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AnnostoreError> {
    serde_json::to_string_pretty(value).map_err(|source| AnnostoreError::JsonWrite {
        path: PathBuf::from("<stdout>"),
        source,
    })
}
