use clap::Parser;
use std::path::PathBuf;

/// Convert a PDF or EPUB into Quarto book chapters
#[derive(Parser, Debug)]
#[command(name = "convert", version, about)]
pub struct Cli {
    /// Path to the input PDF or EPUB file
    pub input_file: PathBuf,

    /// Target Quarto project directory
    #[arg(long, env = "QMD_OUTPUT_DIR", default_value = "mybook")]
    pub output_dir: PathBuf,

    /// Book title used when a new _quarto.yml has to be created.
    /// Defaults to the document's own title.
    #[arg(long)]
    pub title: Option<String>,

    /// Do not extract images (only convert text content)
    #[arg(long, default_value_t = false)]
    pub no_images: bool,
}
