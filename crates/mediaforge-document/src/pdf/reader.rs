// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open, inspect, merge, select, rotate, number, compress and
// extract text from existing PDF documents using the `lopdf` crate.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use mediaforge_core::{MediaError, PageNumberPosition, PageSelection, Result};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page inherits from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when a page declares no MediaBox anywhere.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

const PAGE_NUMBER_FONT_SIZE: f32 = 12.0;
/// Resource name of the font added for page numbers.
const PAGE_NUMBER_FONT: &str = "MFPageNo";

/// Reads and manipulates existing PDF files.
///
/// Wraps `lopdf::Document`. Every operation leaves the loaded document
/// untouched and returns a freshly serialised PDF.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(MediaError::invalid("Uploaded file is empty"));
        }
        let document = Document::load_mem(data)
            .map_err(|err| MediaError::Pdf(format!("failed to load PDF from memory: {err}")))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Width and height in points of a 1-indexed page, from its MediaBox.
    #[cfg(test)]
    pub(crate) fn page_size(&self, page_number: u32) -> Result<(f32, f32)> {
        let page_id = self.page_id(page_number)?;
        Ok(media_box_size(&self.document, page_id))
    }

    /// Fail with [`MediaError::PageOutOfRange`] unless the 1-indexed page exists.
    pub fn check_page(&self, page_number: u32) -> Result<()> {
        self.page_id(page_number).map(|_| ())
    }

    // -- Page selection -------------------------------------------------------

    /// Concatenate every page of every document, in order.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn merge(documents: &[PdfReader]) -> Result<Vec<u8>> {
        if documents.is_empty() {
            return Err(MediaError::invalid("No files provided"));
        }
        info!(
            total_pages = documents.iter().map(PdfReader::page_count).sum::<u32>(),
            "Merging PDFs"
        );

        let (mut merged, pages_id) = empty_document();
        for reader in documents {
            let mut copier = ObjectCopier::new(&reader.document);
            for page_id in reader.document.get_pages().into_values() {
                copier.copy_page(&mut merged, pages_id, page_id)?;
            }
        }

        save(&mut merged)
    }

    /// New document containing the selected pages, in selection order.
    #[instrument(skip_all, fields(selected = selection.len()))]
    pub fn select_pages(&self, selection: &PageSelection) -> Result<Vec<u8>> {
        if selection.is_empty() {
            return Err(MediaError::invalid("No valid pages selected"));
        }

        let (mut output, pages_id) = empty_document();
        let mut copier = ObjectCopier::new(&self.document);
        for &page_number in selection.pages() {
            let page_id = self.page_id(page_number)?;
            copier.copy_page(&mut output, pages_id, page_id)?;
        }

        info!(pages = selection.len(), "Pages selected");
        save(&mut output)
    }

    // -- Page transforms ------------------------------------------------------

    /// Set the absolute rotation of every page. `degrees` must be a multiple
    /// of 90 and is normalised into 0..360.
    #[instrument(skip(self))]
    pub fn rotate_all(&self, degrees: i32) -> Result<Vec<u8>> {
        if degrees % 90 != 0 {
            return Err(MediaError::invalid(format!(
                "Rotation must be a multiple of 90, got {degrees}"
            )));
        }
        let rotation = degrees.rem_euclid(360) as i64;

        let mut doc = self.document.clone();
        for page_id in doc.get_pages().into_values() {
            doc.get_dictionary_mut(page_id)
                .map_err(|err| MediaError::Pdf(format!("page {page_id:?} is not a dictionary: {err}")))?
                .set("Rotate", Object::Integer(rotation));
        }

        info!(rotation, pages = self.page_count(), "Pages rotated");
        save(&mut doc)
    }

    /// Stamp 1-based page numbers in 12pt Helvetica at `position`.
    #[instrument(skip(self))]
    pub fn add_page_numbers(&self, position: PageNumberPosition) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for (index, page_id) in pages.iter().enumerate() {
            let label = (index + 1).to_string();
            let (width, height) = media_box_size(&doc, *page_id);
            let (x, y) = position.origin(width, height, PAGE_NUMBER_FONT_SIZE, &label);

            install_font(&mut doc, *page_id, font_id)?;
            let stamp = format!(
                "q BT /{PAGE_NUMBER_FONT} {PAGE_NUMBER_FONT_SIZE} Tf 0 0 0 rg {x:.2} {y:.2} Td ({label}) Tj ET Q\n"
            );
            wrap_page_content(&mut doc, *page_id, stamp.into_bytes())?;
        }

        info!(pages = pages.len(), ?position, "Page numbers added");
        save(&mut doc)
    }

    /// Strip document metadata, drop unreferenced objects and Flate-compress
    /// every stream that allows it.
    #[instrument(skip(self))]
    pub fn compress(&self) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();

        if let Ok(Object::Reference(info_id)) = doc.trailer.get(b"Info").cloned() {
            doc.objects.remove(&info_id);
        }
        doc.trailer.remove(b"Info");
        if let Ok(Object::Reference(root_id)) = doc.trailer.get(b"Root").cloned()
            && let Ok(catalog) = doc.get_dictionary_mut(root_id)
        {
            catalog.remove(b"Metadata");
        }

        let pruned = doc.prune_objects();
        doc.delete_zero_length_streams();
        doc.compress();
        doc.renumber_objects();

        let output = save(&mut doc)?;
        info!(pruned = pruned.len(), output_bytes = output.len(), "PDF compressed");
        Ok(output)
    }

    // -- Text -----------------------------------------------------------------

    /// Text of every page, each preceded by a `--- Page N ---` header.
    #[instrument(skip(self))]
    pub fn extract_text(&self) -> Result<String> {
        let mut text = String::new();
        for page_number in self.document.get_pages().into_keys() {
            let page_text = match self.document.extract_text(&[page_number]) {
                Ok(extracted) => extracted,
                Err(err) => {
                    warn!(page_number, %err, "No extractable text on page");
                    String::new()
                }
            };
            text.push_str(&format!("\n--- Page {page_number} ---\n{}\n", page_text.trim_end()));
        }
        debug!(chars = text.len(), "Text extracted");
        Ok(text)
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages
            .get(&page_number)
            .copied()
            .ok_or(MediaError::PageOutOfRange {
                page: page_number,
                page_count: pages.len() as u32,
            })
    }
}

/// A document with an empty page tree and a catalog pointing at it.
fn empty_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(Vec::new()),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    (doc, pages_id)
}

fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| MediaError::Pdf(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

/// Copies pages and everything they reference from one document into
/// another. Each source object is copied at most once per copier, so shared
/// resources stay shared and reference cycles terminate.
struct ObjectCopier<'a> {
    source: &'a Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    /// Append a copy of `page_id` to the target's page tree. The page
    /// dictionary itself is always fresh so a page selected twice appears
    /// twice.
    fn copy_page(&mut self, target: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> Result<()> {
        let page = self
            .source
            .get_dictionary(page_id)
            .map_err(|err| MediaError::Pdf(format!("cannot read page object {page_id:?}: {err}")))?;

        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(target, value));
        }
        for key in INHERITABLE_KEYS {
            if !copy.has(key)
                && let Some(value) = inherited_attribute(self.source, page_id, key)
            {
                copy.set(key.to_vec(), self.copy_object(target, &value));
            }
        }
        copy.set("Parent", Object::Reference(pages_id));
        let new_page_id = target.add_object(copy);

        let pages = target
            .get_dictionary_mut(pages_id)
            .map_err(|err| MediaError::Pdf(format!("target page tree missing: {err}")))?;
        if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
            kids.push(Object::Reference(new_page_id));
        }
        if let Ok(Object::Integer(count)) = pages.get_mut(b"Count") {
            *count += 1;
        }
        Ok(())
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.copy_object(target, item)).collect())
            }
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    /// `/Parent` links are dropped; they point back into the source page tree.
    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(target, value));
        }
        copy
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(&existing) = self.copied.get(&id) {
            return existing;
        }
        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);

        let copy = match self.source.get_object(id) {
            Ok(object) => self.copy_object(target, object),
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        target.objects.insert(new_id, copy);
        new_id
    }
}

/// Look up `key` on the page, then on each ancestor page-tree node.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Bounded walk guards against malformed Parent cycles.
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn number(doc: &Document, object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| number(doc, o)),
        _ => None,
    }
}

fn media_box_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let resolved = inherited_attribute(doc, page_id, b"MediaBox").and_then(|value| match value {
        Object::Reference(id) => doc.get_object(id).ok().cloned(),
        other => Some(other),
    });
    let corners = match resolved {
        Some(Object::Array(items)) if items.len() == 4 => {
            let values: Vec<f32> = items.iter().filter_map(|item| number(doc, item)).collect();
            if values.len() == 4 {
                [values[0], values[1], values[2], values[3]]
            } else {
                DEFAULT_MEDIA_BOX
            }
        }
        _ => DEFAULT_MEDIA_BOX,
    };
    ((corners[2] - corners[0]).abs(), (corners[3] - corners[1]).abs())
}

/// Make `font_id` available to the page as `/MFPageNo`, editing the page's
/// effective resource dictionary in place.
fn install_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let resources = inherited_attribute(doc, page_id, b"Resources")
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
    let (shared_id, mut resource_dict) = match resources {
        Object::Reference(id) => (
            Some(id),
            doc.get_dictionary(id).cloned().unwrap_or_else(|_| Dictionary::new()),
        ),
        Object::Dictionary(dict) => (None, dict),
        _ => (None, Dictionary::new()),
    };

    match resource_dict.get(b"Font").ok().cloned() {
        Some(Object::Reference(fonts_id)) => {
            if let Ok(fonts) = doc.get_dictionary_mut(fonts_id) {
                fonts.set(PAGE_NUMBER_FONT, Object::Reference(font_id));
            }
        }
        Some(Object::Dictionary(mut fonts)) => {
            fonts.set(PAGE_NUMBER_FONT, Object::Reference(font_id));
            resource_dict.set("Font", Object::Dictionary(fonts));
        }
        _ => {
            let mut fonts = Dictionary::new();
            fonts.set(PAGE_NUMBER_FONT, Object::Reference(font_id));
            resource_dict.set("Font", Object::Dictionary(fonts));
        }
    }

    match shared_id {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(resource_dict));
        }
        None => {
            doc.get_dictionary_mut(page_id)
                .map_err(|err| MediaError::Pdf(format!("page {page_id:?} is not a dictionary: {err}")))?
                .set("Resources", Object::Dictionary(resource_dict));
        }
    }
    Ok(())
}

/// Wrap the page's existing content in `q`/`Q` and append `extra`, so the
/// graphics state left by the original content cannot displace it.
fn wrap_page_content(doc: &mut Document, page_id: ObjectId, extra: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
    {
        Some(Object::Array(items)) => items.clone(),
        Some(reference @ Object::Reference(_)) => vec![reference.clone()],
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"Q\n".to_vec();
    closing.extend_from_slice(&extra);
    let close_id = doc.add_object(Stream::new(Dictionary::new(), closing));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    doc.get_dictionary_mut(page_id)
        .map_err(|err| MediaError::Pdf(format!("page {page_id:?} is not a dictionary: {err}")))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A PDF with `pages` pages whose MediaBox and Resources live on the page
    /// tree root, so copying has to resolve inherited attributes.
    pub(crate) fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for n in 1..=pages {
            let content = format!("BT /F1 24 Tf 100 600 Td (Page {n}) Tj ET").into_bytes();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Sample"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn reload(bytes: &[u8]) -> PdfReader {
        PdfReader::from_bytes(bytes).unwrap()
    }

    fn page_content(bytes: &[u8], page: u32) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn counts_pages_and_reads_inherited_size() {
        let reader = reload(&sample_pdf(3));
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.page_size(2).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        assert!(matches!(PdfReader::from_bytes(b"%PDF-nope"), Err(MediaError::Pdf(_))));
        assert!(matches!(PdfReader::from_bytes(b""), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn merge_two_single_page_documents() {
        let a = reload(&sample_pdf(1));
        let b = reload(&sample_pdf(1));
        let merged = reload(&PdfReader::merge(&[a, b]).unwrap());
        assert_eq!(merged.page_count(), 2);
        // Inherited MediaBox survives the copy.
        assert_eq!(merged.page_size(2).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn select_first_two_of_five() {
        let reader = reload(&sample_pdf(5));
        let selection = PageSelection::parse("1-2", reader.page_count());
        let split = reload(&reader.select_pages(&selection).unwrap());
        assert_eq!(split.page_count(), 2);
    }

    #[test]
    fn selection_keeps_order_and_duplicates() {
        let bytes = sample_pdf(3);
        let reader = reload(&bytes);
        let selection = PageSelection::parse("3,1,3", 3);
        let out = reader.select_pages(&selection).unwrap();
        assert_eq!(reload(&out).page_count(), 3);
        assert!(page_content(&out, 1).contains("(Page 3)"));
        assert!(page_content(&out, 2).contains("(Page 1)"));
        assert!(page_content(&out, 3).contains("(Page 3)"));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let reader = reload(&sample_pdf(2));
        let selection = PageSelection::parse("9-12", 2);
        assert!(matches!(
            reader.select_pages(&selection),
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[test]
    fn page_check_names_the_page_count() {
        let reader = reload(&sample_pdf(2));
        let err = reader.check_page(5).unwrap_err();
        assert_eq!(err.to_string(), "Invalid page number. PDF has 2 pages");
        assert!(reader.check_page(2).is_ok());
        assert!(reader.check_page(0).is_err());
    }

    #[test]
    fn rotation_is_absolute_and_normalised() {
        let reader = reload(&sample_pdf(2));
        let rotated = Document::load_mem(&reader.rotate_all(-90).unwrap()).unwrap();
        for page_id in rotated.get_pages().into_values() {
            let rotate = rotated
                .get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .unwrap()
                .as_i64()
                .unwrap();
            assert_eq!(rotate, 270);
        }
    }

    #[test]
    fn rotation_must_be_right_angle() {
        let reader = reload(&sample_pdf(1));
        assert!(matches!(reader.rotate_all(45), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn page_numbers_are_stamped_on_every_page() {
        let reader = reload(&sample_pdf(2));
        let out = reader.add_page_numbers(PageNumberPosition::BottomRight).unwrap();
        let first = page_content(&out, 1);
        let second = page_content(&out, 2);
        assert!(first.contains("(1) Tj"));
        assert!(first.contains("545.00 20.00 Td"));
        assert!(second.contains("(2) Tj"));
        // Original content is kept.
        assert!(first.contains("(Page 1)"));
    }

    #[test]
    fn page_number_font_is_registered() {
        let reader = reload(&sample_pdf(1));
        let out = Document::load_mem(&reader.add_page_numbers(PageNumberPosition::default()).unwrap()).unwrap();
        let page_id = out.get_pages()[&1];
        let resources = match inherited_attribute(&out, page_id, b"Resources").unwrap() {
            Object::Reference(id) => out.get_dictionary(id).unwrap().clone(),
            Object::Dictionary(dict) => dict,
            other => panic!("unexpected resources {other:?}"),
        };
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(PAGE_NUMBER_FONT.as_bytes()));
        assert!(fonts.has(b"F1"));
    }

    #[test]
    fn compress_strips_info() {
        let reader = reload(&sample_pdf(2));
        let out = Document::load_mem(&reader.compress().unwrap()).unwrap();
        assert!(out.trailer.get(b"Info").is_err());
        assert_eq!(out.get_pages().len(), 2);
    }

    #[test]
    fn extracted_text_has_page_headers_in_order() {
        let reader = reload(&sample_pdf(2));
        let text = reader.extract_text().unwrap();
        let first = text.find("--- Page 1 ---").unwrap();
        let second = text.find("--- Page 2 ---").unwrap();
        assert!(text.starts_with('\n'));
        assert!(first < second);
    }
}
