use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant, SystemTime};

use clap::{Args, Parser, Subcommand};

use a4_preview::{Error, Margins, RenderOptions, read_document};

/// Paginate official letters onto A4 pages and render them to PDF
#[derive(Parser, Debug)]
#[command(name = "a4-preview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a document to PDF
    Render {
        /// Document record (JSON)
        input: PathBuf,

        /// Output PDF (defaults to the input with a .pdf extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Print the page partition as JSON
    Pages {
        /// Document record (JSON)
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Re-render whenever the document file changes
    Watch {
        /// Document record (JSON)
        input: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// File polling interval in milliseconds
        #[arg(long, default_value = "100")]
        interval: u64,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Output scale; does not change pagination
    #[arg(long, default_value = "1.0")]
    zoom: f32,

    /// All four margins in mm
    #[arg(long, value_name = "MM")]
    margin: Option<f32>,

    #[arg(long, value_name = "MM")]
    margin_top: Option<f32>,

    #[arg(long, value_name = "MM")]
    margin_right: Option<f32>,

    #[arg(long, value_name = "MM")]
    margin_bottom: Option<f32>,

    #[arg(long, value_name = "MM")]
    margin_left: Option<f32>,

    /// Font family from the system font directories (default: built-in Helvetica)
    #[arg(long, value_name = "FAMILY")]
    font: Option<String>,

    /// Directory that relative image paths are resolved against
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Accepted for parity with the editor; has no effect on layout
    #[arg(long)]
    readonly: bool,
}

impl LayoutArgs {
    fn options(&self, input: &Path) -> RenderOptions {
        let sides = [
            self.margin_top,
            self.margin_right,
            self.margin_bottom,
            self.margin_left,
        ];
        let margins = if self.margin.is_some() || sides.iter().any(Option::is_some) {
            let base = Margins::uniform(self.margin.unwrap_or(a4_preview::model::DEFAULT_MARGIN_MM));
            Some(Margins {
                top: self.margin_top.unwrap_or(base.top),
                right: self.margin_right.unwrap_or(base.right),
                bottom: self.margin_bottom.unwrap_or(base.bottom),
                left: self.margin_left.unwrap_or(base.left),
            })
        } else {
            None
        };
        // images are resolved next to the document unless told otherwise
        let assets = self
            .assets
            .clone()
            .or_else(|| input.parent().map(Path::to_path_buf));
        RenderOptions {
            margins,
            zoom: self.zoom,
            font_family: self.font.clone(),
            assets,
            readonly: self.readonly,
        }
    }
}

fn output_path(input: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension("pdf"))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            output,
            layout,
        } => {
            let output = output_path(&input, output);
            a4_preview::render_document_to_pdf(&input, &output, &layout.options(&input))?;
            println!("{} -> {}", input.display(), output.display());
        }
        Commands::Pages { input, layout } => {
            let document = read_document(&input)?;
            let pages = a4_preview::paginate_document(&document, &layout.options(&input))?;
            println!("{}", serde_json::to_string_pretty(&pages.summary())?);
        }
        Commands::Watch {
            input,
            output,
            interval,
            layout,
        } => {
            let output = output_path(&input, output);
            watch(&input, &output, Duration::from_millis(interval.max(10)), &layout)?;
        }
    }
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Poll `input` forever. Each change feeds the preview, whose debouncer
/// decides when a pass runs; every committed pass is written to `output`.
fn watch(input: &Path, output: &Path, interval: Duration, layout: &LayoutArgs) -> Result<(), Error> {
    let options = layout.options(input);
    let mut preview = options.preview(read_document(input)?)?;
    let mut last_seen = modified(input);
    log::info!("Watching {} (Ctrl-C to stop)", input.display());

    loop {
        let now = Instant::now();
        let stamp = modified(input);
        if stamp != last_seen {
            last_seen = stamp;
            match read_document(input) {
                Ok(doc) => {
                    if preview.set_document(doc, now) {
                        log::debug!("change queued");
                    }
                }
                // half-written files are common while an editor saves
                Err(e) => log::warn!("Ignoring {}: {e}", input.display()),
            }
        }

        if preview.poll(now) {
            let bytes = preview.render_pdf()?;
            std::fs::write(output, &bytes)?;
            println!(
                "{} -> {} ({} pages)",
                input.display(),
                output.display(),
                preview.pages().len()
            );
        }

        let sleep = preview
            .next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()).min(interval))
            .unwrap_or(interval);
        std::thread::sleep(sleep.max(Duration::from_millis(1)));
    }
}
