use clap::{Parser, Subcommand};
use photosite::cache::PhotoCache;
use photosite::cancel::CancelToken;
use photosite::imaging::{RustBackend, is_photo};
use photosite::metadata::{Extractor, PhotoSource};
use photosite::naming::filtered_file_name;
use photosite::render::GenerationId;
use photosite::site::{self, SiteRun};
use photosite::status::ErrorSink;
use photosite::{config, fsutil, output};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "photosite")]
#[command(about = "Static photo gallery generator")]
#[command(long_about = "\
Static photo gallery generator

Turns folders of photos into a browsable static site: one masonry wall per
gallery, an info panel per photo (EXIF, IPTC, Lightroom crop preview), sprite
strip thumbnails, an index page and a sitemap.

Source structure:

  photos/
  ├── site.toml                    # Site config: galleries, thumbnails, sitemap
  ├── static/                      # css/, js/, images/ → copied to output root
  └── galleries/
      ├── 2011MachuPicchu/         # One folder per [[gallery]] entry
      │   ├── _MG_8665-20110612.jpg
      │   └── W0512/               # Optional reduced copies for thumbnails
      └── Rome 2012/

Photo order within a gallery: title image, rating (high first), capture
time, file name. Metadata is cached in <output>/.photosite-cache.json and
reused while a photo's modification time is unchanged.

Run 'photosite gen-config' to generate a documented site.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Source directory (holds site.toml)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the site
    Build {
        /// Delete the output directory's contents first
        #[arg(long)]
        clean: bool,
        /// Ignore the photo cache and re-read every photo
        #[arg(long)]
        no_cache: bool,
    },
    /// Validate site.toml and list galleries without building
    Check,
    /// Print the metadata extracted from one photo as JSON
    Inspect {
        /// Photo to read
        path: PathBuf,
    },
    /// List camera models recorded in the photo cache
    Cameras,
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Build { clean, no_cache } => {
            let mut site_config = config::load_config(&cli.source)?;
            site_config.clean_build |= clean;
            init_thread_pool(&site_config.processing);
            std::fs::create_dir_all(&cli.output)?;

            let prior = if no_cache {
                PhotoCache::empty()
            } else {
                PhotoCache::load(&cli.output)
            };

            println!(
                "==> Building {} \u{2192} {}",
                cli.source.display(),
                cli.output.display()
            );
            let (tx, rx) = std::sync::mpsc::channel();
            let tree = site::status_tree(&site_config).with_events(tx);
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_status_event(&event) {
                        println!("{}", line);
                    }
                }
            });

            let backend = RustBackend::new();
            let id = GenerationId::now();
            let cancel = CancelToken::new();
            if let Err(e) = ctrlc::set_handler(cancel.trigger()) {
                tracing::warn!("Ctrl-C will not cancel the build: {e}");
            }
            let run = SiteRun {
                config: &site_config,
                source: &cli.source,
                destination: &cli.output,
                backend: &backend,
                id: &id,
                cancel: &cancel,
            };
            let result = site::generate_site(&run, &prior, &tree);
            let snapshot = tree.snapshot();
            // Dropping the tree closes the event channel
            drop(tree);
            printer.join().map_err(|_| "output thread panicked")?;

            println!();
            output::print_build_summary(&snapshot);
            let report = result?;
            println!(
                "==> Build complete: {} ({})",
                cli.output.display(),
                report.stats
            );
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let site_config = config::load_config(&cli.source)?;
            let galleries_root = cli.source.join(&site_config.galleries_dir);
            let counts: Vec<Option<usize>> = site_config
                .galleries
                .iter()
                .map(|g| fsutil::count_files(&galleries_root.join(&g.directory), is_photo).ok())
                .collect();
            output::print_check_output(&site_config, &counts);
            println!("==> Config is valid");
        }
        Command::Inspect { path } => {
            let site_config = config::load_config(&cli.source)?;
            let record = inspect(&path, site_config.crop.canvas)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Cameras => {
            let cache = PhotoCache::load(&cli.output);
            output::print_cameras(&cache.cameras());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Diagnostics for a one-off extraction go straight to the log.
struct LogSink;

impl ErrorSink for LogSink {
    fn log_error(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn handle_error(&self, context: &str, error: &dyn Display) {
        self.log_error(&format!("{context}: {error}"));
    }

    fn log_message(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn progress_tick(&self) {}
}

fn inspect(
    path: &Path,
    canvas: f64,
) -> Result<photosite::metadata::PhotoRecord, Box<dyn std::error::Error>> {
    let modified = std::fs::metadata(path)?.modified()?;
    let file_name = path
        .file_name()
        .map(|n| filtered_file_name(&n.to_string_lossy()))
        .ok_or("not a file path")?;
    let backend = RustBackend::new();
    let record = Extractor {
        backend: &backend,
        canvas,
    }
    .extract(
        &PhotoSource {
            path: path.to_path_buf(),
            modified,
            preview_src: file_name.clone(),
            file_name,
        },
        &LogSink,
    )?;
    Ok(record)
}
