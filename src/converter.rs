use crate::cli::Cli;
use crate::epub;
use crate::epub_reader::EpubData;
use crate::error::ConvertError;
use crate::format::InputFormat;
use crate::image::{ImageDir, ImageStore};
use crate::manifest;
use crate::pdf;
use crate::pdf_reader::PdfData;
use crate::reader::{Chapter, EpubSource, PdfSource};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn convert(cli: &Cli) -> Result<()> {
    if !cli.input_file.exists() {
        return Err(ConvertError::InputNotFound(cli.input_file.clone()).into());
    }
    let format = InputFormat::from_path(&cli.input_file)?;

    let (chapters, document_title) = match format {
        InputFormat::Epub => {
            info!(path = %cli.input_file.display(), "Processing EPUB");
            let epub = EpubData::open(&cli.input_file)?;
            let mut images = prepare_output(cli)?;
            let chapters = epub::extract_chapters(&epub, image_store(&mut images))?;
            (chapters, epub.title())
        }
        InputFormat::Pdf => {
            info!(path = %cli.input_file.display(), "Processing PDF");
            let pdf = PdfData::open(&cli.input_file)?;
            let mut images = prepare_output(cli)?;
            let chapters = pdf::extract_chapters(&pdf, image_store(&mut images))?;
            (chapters, pdf.title())
        }
    };

    let title = cli
        .title
        .clone()
        .or(document_title)
        .unwrap_or_else(|| manifest::DEFAULT_BOOK_TITLE.to_string());
    let filenames = publish(&cli.output_dir, &chapters, &title)?;
    if filenames.is_empty() {
        return Ok(());
    }

    let image_count: usize = chapters.iter().map(|c| c.images.len()).sum();
    eprintln!(
        "Converted {} chapters{} to {}",
        filenames.len(),
        if image_count > 0 {
            format!(" with {} image references", image_count)
        } else {
            String::new()
        },
        cli.output_dir.display()
    );

    Ok(())
}

/// Create the book directory and, unless images are disabled, its image folder.
fn prepare_output(cli: &Cli) -> Result<Option<ImageDir>> {
    fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            cli.output_dir.display()
        )
    })?;

    if cli.no_images {
        Ok(None)
    } else {
        ImageDir::create(&cli.output_dir).map(Some)
    }
}

fn image_store(images: &mut Option<ImageDir>) -> Option<&mut dyn ImageStore> {
    images.as_mut().map(|dir| dir as &mut dyn ImageStore)
}

/// Write the chapter files and register them in `_quarto.yml`.
///
/// With no chapters nothing is written and the project file is left alone.
pub fn publish(output_dir: &Path, chapters: &[Chapter], title: &str) -> Result<Vec<String>> {
    if chapters.is_empty() {
        println!("No chapters were generated.");
        return Ok(Vec::new());
    }

    let filenames = write_chapters(output_dir, chapters)?;

    let project_file = output_dir.join(manifest::PROJECT_FILE);
    manifest::update_project_file(&project_file, &filenames, title)
        .with_context(|| format!("Failed to update {}", project_file.display()))?;

    Ok(filenames)
}

/// Chapter file name for the 1-based position `index`
pub fn chapter_filename(index: usize) -> String {
    format!("chapter_{:02}.qmd", index)
}

/// Write each chapter as `chapter_NN.qmd` with a level-1 heading, returning
/// the file names in order.
pub fn write_chapters(output_dir: &Path, chapters: &[Chapter]) -> Result<Vec<String>> {
    let mut filenames = Vec::with_capacity(chapters.len());

    for (i, chapter) in chapters.iter().enumerate() {
        let filename = chapter_filename(i + 1);
        let path = output_dir.join(&filename);

        fs::write(&path, format!("# {}\n\n{}", chapter.title, chapter.body))
            .with_context(|| format!("Failed to write chapter: {}", path.display()))?;

        info!("Generated {}: {}", filename, chapter.title);
        filenames.push(filename);
    }

    Ok(filenames)
}
