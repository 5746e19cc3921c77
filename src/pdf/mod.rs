// Certificate rendering: overlays recipient text and a verification QR code onto
// the first page of a template PDF. Text uses the built-in Helvetica font so no
// font files are needed at runtime.
mod metrics;
mod qr;

pub use metrics::{encode_win_ansi, text_width};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::certificate::IssuanceRequest;
use crate::config::OverlayLayout;
use crate::error::IssueError;

const FONT_RESOURCE: &str = "CertmintF1";
const QR_RESOURCE: &str = "CertmintQr";

pub struct CertificateRenderer {
    layout: OverlayLayout,
    qr_enabled: bool,
}

impl CertificateRenderer {
    pub fn new(layout: OverlayLayout, qr_enabled: bool) -> Self {
        Self { layout, qr_enabled }
    }

    /// Renders `request` onto a fresh copy of `template`. `certificate_url` is
    /// encoded into the QR code when QR output is enabled.
    pub fn render(
        &self,
        template: &[u8],
        request: &IssuanceRequest,
        certificate_url: &str,
    ) -> Result<Vec<u8>, IssueError> {
        let fail = |reason: String| IssueError::RenderFailed {
            external_id: request.external_id.clone(),
            reason,
        };

        // Parsing per request gives each certificate its own document; the
        // template bytes are never modified.
        let mut doc = Document::load_mem(template).map_err(|e| fail(format!("invalid template: {e}")))?;
        let page_id = first_page(&doc).ok_or_else(|| fail("template has no pages".to_string()))?;
        let [x0, y0, x1, y1] = media_box(&doc, page_id).ok_or_else(|| fail("template page has no MediaBox".to_string()))?;
        let page_width = x1 - x0;

        let size = self.layout.font_size;
        let lines = [
            (request.display_line(), self.layout.name_baseline),
            (request.iso_date(), self.layout.date_baseline),
        ];

        let mut operations = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
        for (text, baseline) in &lines {
            let width = text_width(text, size).map_err(|c| fail(format!("no Helvetica glyph for {c:?}")))?;
            let encoded = encode_win_ansi(text).map_err(|c| fail(format!("no Helvetica glyph for {c:?}")))?;
            let x = x0 + (page_width - width) / 2.0;
            let y = y1 - baseline;
            operations.extend(text_operations(encoded, size, x, y));
        }

        let mut xobjects = Vec::new();
        if self.qr_enabled {
            let raster = qr::rasterize(certificate_url, self.layout.qr_module_px)
                .map_err(|e| fail(format!("QR encoding failed: {e}")))?;
            let image_id = doc.add_object(gray_image_stream(raster));
            xobjects.push((QR_RESOURCE, image_id));

            let qr_box = self.layout.qr_box;
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![qr_box.size.into(), 0.into(), 0.into(), qr_box.size.into(), (x0 + qr_box.x).into(), (y0 + qr_box.y).into()],
                ),
                Operation::new("Do", vec![Object::Name(QR_RESOURCE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ]);
        }
        operations.push(Operation::new("Q", vec![]));

        let overlay = Content { operations }
            .encode()
            .map_err(|e| fail(format!("encoding overlay failed: {e}")))?;

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        install_resources(&mut doc, page_id, font_id, &xobjects).map_err(fail)?;
        wrap_contents(&mut doc, page_id, overlay).map_err(fail)?;

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| fail(format!("serializing PDF failed: {e}")))?;
        Ok(out)
    }
}

fn text_operations(encoded: Vec<u8>, size: f32, x: f32, y: f32) -> [Operation; 6] {
    [
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

fn gray_image_stream(raster: image::GrayImage) -> Stream {
    let (width, height) = raster.dimensions();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        raster.into_raw(),
    )
}

fn first_page(doc: &Document) -> Option<ObjectId> {
    doc.get_pages().into_values().next()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Looks up `key` on the page dictionary, walking up the page tree for
/// inheritable attributes.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let values = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = number(resolve(doc, value)?)?;
    }
    Some(out)
}

/// Gives the page its own resource dictionary (copied from whatever it used or
/// inherited) with the overlay font and images added.
fn install_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    xobjects: &[(&str, ObjectId)],
) -> Result<(), String> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);

    let mut fonts = sub_dictionary(doc, &resources, b"Font");
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    if !xobjects.is_empty() {
        let mut entries = sub_dictionary(doc, &resources, b"XObject");
        for (name, id) in xobjects {
            entries.set(*name, Object::Reference(*id));
        }
        resources.set("XObject", Object::Dictionary(entries));
    }

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| format!("template page is not a dictionary: {e}"))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

/// Brackets the template's content in `q`, then appends the overlay, which
/// opens with `Q` so it starts from the page's default graphics state.
fn wrap_contents(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<(), String> {
    let existing = match doc.get_dictionary(page_id).map_err(|e| e.to_string())?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| format!("template page is not a dictionary: {e}"))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}
