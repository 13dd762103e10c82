//! XHTML pass over EPUB content documents: finds the chapter heading and
//! points image references at the extracted copies.

use crate::image::ImageMap;
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// A content document after the XHTML pass
pub struct PreparedDocument {
    /// Text of the first non-empty `h1`/`h2`/`h3`
    pub title: Option<String>,
    pub html: String,
    /// Rewritten image paths, in document order
    pub images: Vec<String>,
}

/// Rewrite image references against `image_map` and pick up the title.
///
/// Markup quick-xml cannot read is returned unchanged, without a title.
pub fn prepare_document(html: &str, image_map: &ImageMap) -> PreparedDocument {
    match rewrite(html, image_map) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "Unparsable content document, converting as-is");
            PreparedDocument {
                title: None,
                html: html.to_string(),
                images: Vec::new(),
            }
        }
    }
}

fn rewrite(html: &str, image_map: &ImageMap) -> anyhow::Result<PreparedDocument> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;

    let mut writer = Writer::new(Vec::with_capacity(html.len()));
    let mut title: Option<String> = None;
    let mut images = Vec::new();

    // Local name of the heading being captured, with its text so far
    let mut heading: Option<(Vec<u8>, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_ascii_lowercase();
                if title.is_none() && heading.is_none() && is_title_heading(&local) {
                    heading = Some((local, String::new()));
                }
                match rewrite_image(&e, image_map, &mut images) {
                    Some(rewritten) => writer.write_event(Event::Start(rewritten))?,
                    None => writer.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) => match rewrite_image(&e, image_map, &mut images) {
                Some(rewritten) => writer.write_event(Event::Empty(rewritten))?,
                None => writer.write_event(Event::Empty(e))?,
            },
            Event::End(e) => {
                let local = e.local_name().as_ref().to_ascii_lowercase();
                if matches!(&heading, Some((name, _)) if *name == local) {
                    if let Some((_, text)) = heading.take() {
                        let text = collapse_whitespace(&text);
                        if !text.is_empty() {
                            title = Some(text);
                        }
                    }
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Text(e) => {
                if let Some((_, text)) = heading.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
                writer.write_event(Event::Text(e))?;
            }
            Event::CData(e) => {
                if let Some((_, text)) = heading.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
                writer.write_event(Event::CData(e))?;
            }
            Event::GeneralRef(e) => {
                if let Some((_, text)) = heading.as_mut() {
                    if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                        text.push_str(&resolved);
                    }
                }
                writer.write_event(Event::GeneralRef(e))?;
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(PreparedDocument {
        title,
        html: String::from_utf8(writer.into_inner())?,
        images,
    })
}

fn is_title_heading(local: &[u8]) -> bool {
    matches!(local, b"h1" | b"h2" | b"h3")
}

/// Copy of `e` with its image reference replaced, or `None` when `e` is not
/// an image or its reference matches no extracted resource.
fn rewrite_image(
    e: &BytesStart<'_>,
    image_map: &ImageMap,
    images: &mut Vec<String>,
) -> Option<BytesStart<'static>> {
    let local = e.local_name().as_ref().to_ascii_lowercase();
    let ref_keys: &[&[u8]] = match local.as_slice() {
        b"img" => &[b"src".as_slice()],
        b"image" => &[b"href".as_slice(), b"xlink:href".as_slice()],
        _ => return None,
    };

    let mut rewritten = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    let mut changed = false;

    for attr in e.html_attributes().with_checks(false).flatten() {
        if ref_keys.contains(&attr.key.as_ref()) {
            let value = String::from_utf8_lossy(&attr.value);
            if let Some(new_path) = lookup_image(image_map, &value) {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                rewritten.push_attribute((key.as_str(), new_path));
                images.push(new_path.to_string());
                changed = true;
                continue;
            }
        }
        rewritten.push_attribute(attr);
    }

    changed.then_some(rewritten)
}

/// Find the extracted path whose original href has the same file name as
/// `reference`. The first entry in manifest order wins, so two resources
/// sharing a file name in different folders are ambiguous.
pub fn lookup_image<'a>(image_map: &'a ImageMap, reference: &str) -> Option<&'a str> {
    let wanted = basename(reference);
    if wanted.is_empty() {
        return None;
    }
    image_map
        .iter()
        .find(|(href, _)| basename(href) == wanted)
        .map(|(_, path)| path.as_str())
}

fn basename(href: &str) -> Cow<'_, str> {
    let path = href.split(['#', '?']).next().unwrap_or(href);
    let name = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(name).decode_utf8_lossy()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let resolved = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201D}",
        "ldquo" => "\u{201C}",
        _ => return None,
    };
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> ImageMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn title_comes_from_first_heading() {
        let html = r#"<html><body><p>intro</p><h2>The  Second
            Part</h2><h1>Later</h1></body></html>"#;
        let doc = prepare_document(html, &ImageMap::new());
        assert_eq!(doc.title.as_deref(), Some("The Second Part"));
    }

    #[test]
    fn title_resolves_entities_and_nested_markup() {
        let html = "<body><h1>Cats &amp; <em>Dogs</em>&#33;</h1></body>";
        let doc = prepare_document(html, &ImageMap::new());
        assert_eq!(doc.title.as_deref(), Some("Cats & Dogs!"));
    }

    #[test]
    fn empty_heading_is_skipped() {
        let html = "<body><h1></h1><h3>Real</h3></body>";
        let doc = prepare_document(html, &ImageMap::new());
        assert_eq!(doc.title.as_deref(), Some("Real"));
    }

    #[test]
    fn no_heading_means_no_title() {
        let doc = prepare_document("<body><h4>Small</h4><p>x</p></body>", &ImageMap::new());
        assert_eq!(doc.title, None);
    }

    #[test]
    fn image_sources_are_rewritten_by_file_name() {
        let images = map(&[
            ("OEBPS/Images/cover.jpg", "images/img.jpg"),
            ("OEBPS/Images/fig%201.png", "images/img.png"),
        ]);
        let html = r#"<body><img src="../Images/cover.jpg" alt="Cover"/><img src="fig%201.png"/><img src="missing.gif"/></body>"#;

        let doc = prepare_document(html, &images);

        assert!(doc.html.contains(r#"src="images/img.jpg""#));
        assert!(doc.html.contains(r#"alt="Cover""#));
        assert!(doc.html.contains(r#"src="images/img.png""#));
        assert!(doc.html.contains(r#"src="missing.gif""#));
        assert_eq!(doc.images, vec!["images/img.jpg", "images/img.png"]);
    }

    #[test]
    fn svg_image_href_is_rewritten() {
        let images = map(&[("cover.png", "images/img.png")]);
        let html = r#"<svg><image xlink:href="cover.png" width="10"/></svg>"#;
        let doc = prepare_document(html, &images);
        assert!(doc.html.contains(r#"xlink:href="images/img.png""#));
    }

    #[test]
    fn valueless_attributes_survive_rewrite() {
        let images = map(&[("cover.png", "images/img.png")]);
        let html = r#"<body><a href="map"><img src="cover.png" ismap alt="Map"></a></body>"#;

        let doc = prepare_document(html, &images);

        assert!(doc.html.contains(r#"src="images/img.png""#), "{}", doc.html);
        assert!(doc.html.contains("ismap"), "{}", doc.html);
        assert!(doc.html.contains(r#"alt="Map""#), "{}", doc.html);
        assert_eq!(doc.images, vec!["images/img.png"]);
    }

    #[test]
    fn shared_file_name_takes_first_manifest_entry() {
        let images = map(&[
            ("a/pic.png", "images/img.png"),
            ("b/pic.png", "images/img_1.png"),
        ]);
        assert_eq!(lookup_image(&images, "../b/pic.png"), Some("images/img.png"));
        assert_eq!(lookup_image(&images, ""), None);
    }
}
