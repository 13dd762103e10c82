use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Maps original image hrefs to their new relative paths in output, in manifest order
pub type ImageMap = Vec<(String, String)>;

/// Directory name for extracted images, relative to the book root
pub const IMAGES_DIR: &str = "images";

/// Destination for extracted images
pub trait ImageStore {
    /// Store `data` under a collision-free `base.ext` name and return the
    /// path to reference from a chapter.
    fn store(&mut self, base: &str, ext: &str, data: &[u8]) -> Result<String>;
}

/// Pick the first of `base.ext`, `base_1.ext`, `base_2.ext`, ... for which
/// `taken` returns false.
pub fn unique_filename(base: &str, ext: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut filename = format!("{}.{}", base, ext);
    let mut counter = 1;
    while taken(&filename) {
        filename = format!("{}_{}.{}", base, counter, ext);
        counter += 1;
    }
    filename
}

/// Images written into `<book>/images` on disk
pub struct ImageDir {
    dir: PathBuf,
}

impl ImageDir {
    pub fn create(book_dir: &Path) -> Result<Self> {
        let dir = book_dir.join(IMAGES_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create image directory: {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl ImageStore for ImageDir {
    fn store(&mut self, base: &str, ext: &str, data: &[u8]) -> Result<String> {
        let filename = unique_filename(base, ext, |name| self.dir.join(name).exists());
        let dest = self.dir.join(&filename);

        fs::write(&dest, data)
            .with_context(|| format!("Failed to write image: {}", dest.display()))?;

        Ok(format!("{}/{}", IMAGES_DIR, filename))
    }
}

/// Extension of an EPUB resource href, `jpg` when it has none
pub fn resource_extension(href: &str) -> String {
    Path::new(href)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "jpg".to_string())
}
