use crate::image::ImageStore;
use crate::reader::{Chapter, PdfSource, TocEntry};
use anyhow::Result;
use std::ops::Range;
use tracing::{debug, info};

/// Title of the single chapter produced for documents without an outline
pub const FULL_DOCUMENT_TITLE: &str = "Full Document";

/// An outline entry with the pages it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSpan {
    pub title: String,
    pub level: usize,
    pub pages: Range<u32>,
}

/// Compute the page range of every outline entry.
///
/// Each entry runs until the next entry starts; the last one runs to the end
/// of the document. Entries starting past the last page are dropped.
pub fn chapter_spans(outline: &[TocEntry], page_count: u32) -> Vec<ChapterSpan> {
    let synthetic;
    let entries = if outline.is_empty() {
        synthetic = [TocEntry {
            level: 1,
            title: FULL_DOCUMENT_TITLE.to_string(),
            page: 1,
        }];
        &synthetic[..]
    } else {
        outline
    };

    let end_of_document = page_count + 1;
    let mut spans = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let start = entry.page.max(1);
        if start > page_count {
            debug!(title = %entry.title, page = entry.page, "Outline entry starts past the last page");
            continue;
        }

        let next_start = entries
            .get(i + 1)
            .map(|next| next.page.max(1))
            .unwrap_or(end_of_document);
        let end = next_start.clamp(start, end_of_document);

        spans.push(ChapterSpan {
            title: entry.title.clone(),
            level: entry.level,
            pages: start..end,
        });
    }

    spans
}

/// Extract one chapter per outline entry.
///
/// Images are appended after the text of the page they appear on, since
/// plain text extraction carries no position to anchor them to.
pub fn extract_chapters(
    pdf: &dyn PdfSource,
    mut images: Option<&mut dyn ImageStore>,
) -> Result<Vec<Chapter>> {
    let page_count = pdf.page_count();
    let outline = pdf.outline();
    if outline.is_empty() {
        info!("No table of contents found in PDF, converting as a single chapter");
    }

    let mut chapters = Vec::new();
    for span in chapter_spans(&outline, page_count) {
        debug!(title = %span.title, level = span.level, pages = ?span.pages, "Extracting PDF chapter");
        let mut body = String::new();
        let mut chapter_images = Vec::new();

        for page in span.pages.clone() {
            body.push_str(&pdf.page_text(page)?);
            body.push_str("\n\n");

            let Some(store) = images.as_deref_mut() else {
                continue;
            };
            for img in pdf.page_images(page)? {
                let path = store.store(&format!("pdf_p{}_img", page), img.ext, &img.data)?;
                body.push_str(&format!("\n\n![]({})\n\n", path));
                chapter_images.push(path);
            }
        }

        chapters.push(Chapter {
            title: span.title,
            body,
            images: chapter_images,
        });
    }

    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::testing::MemoryStore;
    use crate::reader::PageImage;

    struct FakePdf {
        pages: Vec<&'static str>,
        outline: Vec<TocEntry>,
        /// Page number and image bytes
        images: Vec<(u32, &'static [u8])>,
    }

    impl PdfSource for FakePdf {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn outline(&self) -> Vec<TocEntry> {
            self.outline.clone()
        }

        fn page_text(&self, page: u32) -> Result<String> {
            Ok(self.pages[page as usize - 1].to_string())
        }

        fn page_images(&self, page: u32) -> Result<Vec<PageImage>> {
            Ok(self
                .images
                .iter()
                .filter(|(p, _)| *p == page)
                .map(|(_, data)| PageImage {
                    data: data.to_vec(),
                    ext: "png",
                })
                .collect())
        }

        fn title(&self) -> Option<String> {
            None
        }
    }

    fn toc(entries: &[(usize, &str, u32)]) -> Vec<TocEntry> {
        entries
            .iter()
            .map(|(level, title, page)| TocEntry {
                level: *level,
                title: title.to_string(),
                page: *page,
            })
            .collect()
    }

    #[test]
    fn outline_entries_split_pages() {
        let pdf = FakePdf {
            pages: vec!["one", "two", "three"],
            outline: toc(&[(1, "Intro", 1), (1, "Body", 2)]),
            images: vec![],
        };

        let chapters = extract_chapters(&pdf, None).unwrap();

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[0].body, "one\n\n");
        assert_eq!(chapters[1].title, "Body");
        assert_eq!(chapters[1].body, "two\n\nthree\n\n");
    }

    #[test]
    fn missing_outline_gives_one_chapter() {
        let pdf = FakePdf {
            pages: vec!["a", "b", "c", "d"],
            outline: vec![],
            images: vec![],
        };

        let chapters = extract_chapters(&pdf, None).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FULL_DOCUMENT_TITLE);
        assert_eq!(chapters[0].body, "a\n\nb\n\nc\n\nd\n\n");
    }

    #[test]
    fn spans_are_contiguous() {
        let outline = toc(&[(1, "A", 1), (2, "A.1", 3), (1, "B", 7), (1, "C", 9)]);
        let spans = chapter_spans(&outline, 12);

        assert_eq!(spans.first().unwrap().pages.start, 1);
        assert_eq!(spans.last().unwrap().pages.end, 13);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].pages.end, pair[1].pages.start);
        }
    }

    #[test]
    fn spans_past_the_end_are_dropped() {
        let outline = toc(&[(1, "A", 1), (1, "B", 2), (1, "Ghost", 9)]);
        let spans = chapter_spans(&outline, 3);

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].pages, 1..2);
        assert_eq!(spans[1].pages, 2..4);
    }

    #[test]
    fn entries_on_the_same_page_get_empty_ranges() {
        let outline = toc(&[(1, "Part", 0), (2, "Section", 1), (2, "Other", 2)]);
        let spans = chapter_spans(&outline, 2);

        assert_eq!(spans[0].pages, 1..1);
        assert_eq!(spans[1].pages, 1..2);
        assert_eq!(spans[2].pages, 2..3);
    }

    #[test]
    fn images_follow_their_page_text() {
        let pdf = FakePdf {
            pages: vec!["first", "second"],
            outline: vec![],
            images: vec![(1, &b"a"[..]), (1, &b"b"[..]), (2, &b"c"[..])],
        };
        let mut store = MemoryStore::default();

        let chapters = extract_chapters(&pdf, Some(&mut store)).unwrap();

        assert_eq!(
            chapters[0].body,
            "first\n\n\n\n![](images/pdf_p1_img.png)\n\n\n\n![](images/pdf_p1_img_1.png)\n\n\
             second\n\n\n\n![](images/pdf_p2_img.png)\n\n"
        );
        assert_eq!(store.files.len(), 3);
        assert_eq!(store.files["pdf_p1_img_1.png"], b"b");
        assert_eq!(chapters[0].images.len(), 3);
    }

    #[test]
    fn no_store_skips_images() {
        let pdf = FakePdf {
            pages: vec!["only"],
            outline: vec![],
            images: vec![(1, &b"a"[..])],
        };

        let chapters = extract_chapters(&pdf, None).unwrap();

        assert_eq!(chapters[0].body, "only\n\n");
        assert!(chapters[0].images.is_empty());
    }
}
