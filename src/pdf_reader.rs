use crate::reader::{PageImage, PdfSource, TocEntry};
use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

pub struct PdfData {
    doc: Document,
    /// Page number (1-based) to page object
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfData {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::load(path)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages
            .get(&page)
            .copied()
            .with_context(|| format!("Page {} is out of range", page))
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Append `item`, its siblings and their children in outline order.
    fn walk_outline(
        &self,
        item: &Object,
        level: usize,
        page_numbers: &HashMap<ObjectId, u32>,
        visited: &mut HashSet<ObjectId>,
        entries: &mut Vec<TocEntry>,
    ) {
        let mut next = Some(item);
        while let Some(obj) = next {
            if let Object::Reference(id) = obj {
                if !visited.insert(*id) {
                    tracing::debug!(?id, "Outline loops back on itself");
                    return;
                }
            }
            let Some(dict) = self.resolve(obj).and_then(|o| o.as_dict().ok()) else {
                return;
            };

            let title = dict
                .get(b"Title")
                .ok()
                .and_then(|t| self.resolve(t))
                .and_then(Self::info_text)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();

            match self.entry_page(dict, page_numbers) {
                Some(page) => entries.push(TocEntry { level, title, page }),
                None => tracing::debug!(%title, "Skipped outline entry without a page"),
            }

            if let Ok(child) = dict.get(b"First") {
                self.walk_outline(child, level + 1, page_numbers, visited, entries);
            }
            next = dict.get(b"Next").ok();
        }
    }

    /// Page an outline item points at, via `/Dest` or a GoTo action.
    fn entry_page(&self, item: &Dictionary, page_numbers: &HashMap<ObjectId, u32>) -> Option<u32> {
        let dest = match item.get(b"Dest") {
            Ok(dest) => dest,
            Err(_) => {
                let action = self.resolve(item.get(b"A").ok()?)?.as_dict().ok()?;
                action.get(b"D").ok()?
            }
        };
        self.destination_page(dest, page_numbers, 0)
    }

    fn destination_page(
        &self,
        dest: &Object,
        page_numbers: &HashMap<ObjectId, u32>,
        depth: u8,
    ) -> Option<u32> {
        if depth > 8 {
            return None;
        }
        match self.resolve(dest)? {
            Object::Array(items) => match items.first()? {
                Object::Reference(id) => page_numbers.get(id).copied(),
                // Remote destinations carry a 0-based page index
                Object::Integer(index) => u32::try_from(*index + 1).ok(),
                _ => None,
            },
            Object::Dictionary(dict) => {
                self.destination_page(dict.get(b"D").ok()?, page_numbers, depth + 1)
            }
            Object::Name(name) => {
                let dests = self.doc.catalog().ok()?.get(b"Dests").ok()?;
                let target = self.resolve(dests)?.as_dict().ok()?.get(name).ok()?;
                self.destination_page(target, page_numbers, depth + 1)
            }
            Object::String(name, _) => {
                let names = self.doc.catalog().ok()?.get(b"Names").ok()?;
                let tree = self.resolve(names)?.as_dict().ok()?.get(b"Dests").ok()?;
                let target = self.lookup_name_tree(tree, name, 0)?;
                self.destination_page(target, page_numbers, depth + 1)
            }
            _ => None,
        }
    }

    fn lookup_name_tree<'a>(&'a self, node: &'a Object, key: &[u8], depth: u8) -> Option<&'a Object> {
        if depth > 32 {
            return None;
        }
        let node = self.resolve(node)?.as_dict().ok()?;

        if let Some(names) = node.get(b"Names").ok().and_then(|n| self.resolve(n)) {
            for pair in names.as_array().ok()?.chunks(2) {
                if let [Object::String(name, _), value] = pair {
                    if name.as_slice() == key {
                        return Some(value);
                    }
                }
            }
        }

        if let Some(kids) = node.get(b"Kids").ok().and_then(|k| self.resolve(k)) {
            for kid in kids.as_array().ok()? {
                if let Some(found) = self.lookup_name_tree(kid, key, depth + 1) {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Decode a PDF text string (Info values, outline titles).
    fn info_text(obj: &Object) -> Option<String> {
        match obj {
            Object::String(bytes, _) => {
                // UTF-16BE carries a BOM, anything else is read as UTF-8 or Latin-1
                if bytes.starts_with(&[0xFE, 0xFF]) {
                    let utf16: Vec<u16> = bytes[2..]
                        .chunks(2)
                        .map(|chunk| {
                            u16::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)])
                        })
                        .collect();
                    String::from_utf16(&utf16).ok()
                } else {
                    Some(
                        String::from_utf8(bytes.clone())
                            .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect()),
                    )
                }
            }
            _ => None,
        }
    }
}

impl PdfSource for PdfData {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn outline(&self) -> Vec<TocEntry> {
        let page_numbers: HashMap<ObjectId, u32> =
            self.pages.iter().map(|(number, id)| (*id, *number)).collect();

        let first = self
            .doc
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get(b"Outlines").ok())
            .and_then(|outlines| self.resolve(outlines))
            .and_then(|outlines| outlines.as_dict().ok())
            .and_then(|outlines| outlines.get(b"First").ok());

        let Some(first) = first else {
            tracing::debug!("No outline in PDF");
            return Vec::new();
        };

        let mut entries = Vec::new();
        let mut visited = HashSet::new();
        self.walk_outline(first, 1, &page_numbers, &mut visited, &mut entries);
        entries
    }

    fn page_text(&self, page: u32) -> Result<String> {
        self.doc
            .extract_text(&[page])
            .with_context(|| format!("Failed to extract text from page {}", page))
    }

    fn page_images(&self, page: u32) -> Result<Vec<PageImage>> {
        let page_id = self.page_id(page)?;
        let images = self
            .doc
            .get_page_images(page_id)
            .with_context(|| format!("Failed to list images on page {}", page))?;

        let mut encoded = Vec::with_capacity(images.len());
        for img in &images {
            let filters = img.filters.as_deref().unwrap_or_default();
            let passthrough = filters.iter().find_map(|f| match f.as_str() {
                "DCTDecode" => Some("jpg"),
                "JPXDecode" => Some("jp2"),
                "JBIG2Decode" => Some("jb2"),
                _ => None,
            });

            if let Some(ext) = passthrough {
                encoded.push(PageImage {
                    data: img.content.to_vec(),
                    ext,
                });
                continue;
            }

            let samples = self
                .doc
                .get_object(img.id)
                .and_then(Object::as_stream)
                .and_then(|stream| stream.decompressed_content())
                .unwrap_or_else(|_| img.content.to_vec());

            let indexed = img.color_space.as_deref() == Some("Indexed");
            let png = match (img.bits_per_component, indexed) {
                (Some(8), false) => encode_png(img.width, img.height, &samples),
                _ => None,
            };

            encoded.push(match png {
                Some(data) => PageImage { data, ext: "png" },
                None => PageImage {
                    data: samples,
                    ext: "bin",
                },
            });
        }

        Ok(encoded)
    }

    fn title(&self) -> Option<String> {
        let info_ref = self.doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
        let info = self.doc.get_dictionary(info_ref).ok()?;
        let title = Self::info_text(info.get(b"Title").ok()?)?;
        let trimmed = title.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Re-encode raw 8-bit gray, RGB or CMYK samples as PNG. The component count
/// is inferred from the sample length.
fn encode_png(width: i64, height: i64, samples: &[u8]) -> Option<Vec<u8>> {
    let w = u32::try_from(width).ok()?;
    let h = u32::try_from(height).ok()?;
    let pixels = (w as usize).checked_mul(h as usize)?;
    if pixels == 0 || samples.len() % pixels != 0 {
        return None;
    }

    let image = match samples.len() / pixels {
        1 => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(w, h, samples.to_vec())?),
        3 => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(w, h, samples.to_vec())?),
        4 => {
            let rgb = samples
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - u16::from(cmyk[3]);
                    [0, 1, 2].map(|i| ((255 - u16::from(cmyk[i])) * k / 255) as u8)
                })
                .collect();
            image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(w, h, rgb)?)
        }
        _ => return None,
    };

    let mut png_data = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .ok()?;
    Some(png_data)
}
