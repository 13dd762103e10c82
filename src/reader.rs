use anyhow::Result;

/// One unit of output, in reading order
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    /// Markdown body, without the level-1 heading
    pub body: String,
    /// Image paths (relative to the book root) referenced by the body
    pub images: Vec<String>,
}

/// An image resource embedded in an EPUB container
pub struct ImageResource {
    pub original_href: String,
    pub data: Vec<u8>,
}

/// An outline entry of a PDF document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: usize,
    pub title: String,
    /// 1-based page number where the entry starts
    pub page: u32,
}

/// An image drawn on a PDF page, already encoded for writing to disk
pub struct PageImage {
    pub data: Vec<u8>,
    pub ext: &'static str,
}

/// Read access to an EPUB container
pub trait EpubSource {
    /// Embedded images in manifest order
    fn images(&self) -> Result<Vec<ImageResource>>;
    /// Markup of each content document in spine order
    fn documents(&self) -> Result<Vec<String>>;
    /// Book title from the package metadata
    fn title(&self) -> Option<String>;
}

/// Read access to a PDF document
pub trait PdfSource {
    fn page_count(&self) -> u32;
    /// Outline entries; empty when the document has none
    fn outline(&self) -> Vec<TocEntry>;
    fn page_text(&self, page: u32) -> Result<String>;
    fn page_images(&self, page: u32) -> Result<Vec<PageImage>>;
    /// Document title from the Info dictionary
    fn title(&self) -> Option<String>;
}
