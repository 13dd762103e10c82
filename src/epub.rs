use crate::html;
use crate::image::{self, ImageMap, ImageStore};
use crate::markdown;
use crate::reader::{Chapter, EpubSource};
use anyhow::Result;
use tracing::{debug, info};

/// Documents whose Markdown is shorter than this are covers, copyright
/// pages and similar boilerplate.
pub const MIN_CHAPTER_CHARS: usize = 50;

const IMAGE_BASE: &str = "img";

/// Extract chapters from an EPUB in spine order.
///
/// With `images` set, every image resource is stored first and references
/// in the markup are pointed at the stored copies.
pub fn extract_chapters(
    epub: &dyn EpubSource,
    images: Option<&mut dyn ImageStore>,
) -> Result<Vec<Chapter>> {
    let image_map = match images {
        Some(store) => store_images(epub, store)?,
        None => ImageMap::new(),
    };

    let mut chapters = Vec::new();
    for (position, html_content) in epub.documents()?.iter().enumerate() {
        let doc = html::prepare_document(html_content, &image_map);
        let body = markdown::html_to_markdown(&doc.html);

        let length = body.trim().chars().count();
        if length < MIN_CHAPTER_CHARS {
            debug!(position, length, "Skipping short spine document");
            continue;
        }

        let title = doc
            .title
            .unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1));

        chapters.push(Chapter {
            title,
            body,
            images: doc.images,
        });
    }

    Ok(chapters)
}

fn store_images(epub: &dyn EpubSource, store: &mut dyn ImageStore) -> Result<ImageMap> {
    let mut image_map = ImageMap::new();

    for img in epub.images()? {
        let ext = image::resource_extension(&img.original_href);
        let path = store.store(IMAGE_BASE, &ext, &img.data)?;
        debug!(href = %img.original_href, %path, "Extracted image");
        image_map.push((img.original_href, path));
    }

    if !image_map.is_empty() {
        info!(count = image_map.len(), "Extracted EPUB images");
    }

    Ok(image_map)
}
