//! Page import between PDF documents
//!
//! The first page of a source document is turned into a Form XObject and
//! painted, stretched, onto a page of the target document. This is used both
//! for PDF background templates and for assembling the combined sheet.

use crate::error::AppError;
use crate::layout::{PageSize, A4_HEIGHT_MM, A4_WIDTH_MM};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::path::Path;

/// Points per millimetre
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Resource name of the imported background form
const BACKGROUND_XOBJECT: &str = "FseBackground";

fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

// =============================================================================
// XObject Creation
// =============================================================================

pub fn first_page_id(doc: &Document) -> Result<ObjectId, AppError> {
    doc.get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| AppError::PdfError("document has no pages".to_string()))
}

/// Look up a page attribute, following `Parent` links for inherited ones.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// MediaBox of a page as `[x0, y0, x1, y1]` in points (A4 when missing).
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let default = [0.0, 0.0, mm_to_pt(A4_WIDTH_MM), mm_to_pt(A4_HEIGHT_MM)];
    let values = inherited(doc, page_id, b"MediaBox").and_then(|obj| match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok(),
        other => other.as_array().ok(),
    });
    match values {
        Some(arr) if arr.len() == 4 => {
            let mut out = default;
            for (slot, value) in out.iter_mut().zip(arr) {
                if let Some(n) = number(value) {
                    *slot = n;
                }
            }
            out
        }
        _ => default,
    }
}

/// Copy the first page of `source` into `output` as a Form XObject.
pub fn create_page_xobject(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId, AppError> {
    let bbox = media_box(source, page_id);
    let content = source.get_page_content(page_id).unwrap_or_default();

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set(
        "BBox",
        Object::Array(bbox.iter().map(|v| Object::Real(*v)).collect()),
    );

    if let Some(resources) = inherited(source, page_id, b"Resources") {
        xobject_dict.set("Resources", copy_object_deep(output, source, resources, cache)?);
    }

    Ok(output.add_object(Stream::new(xobject_dict, content)))
}

/// Deep copy an object from `source` into `output`, following references.
pub fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object, AppError> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }
            // Reserve the id first so reference cycles terminate
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);
            let copied = copy_object_deep(output, source, source.get_object(*id)?, cache)?;
            output.objects.insert(new_id, copied);
            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in dict.iter() {
                new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(arr) => {
            let items = arr
                .iter()
                .map(|item| copy_object_deep(output, source, item, cache))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Object::Array(items))
        }
        Object::Stream(stream) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in stream.dict.iter() {
                new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
            }
            Ok(Object::Stream(
                Stream::new(new_dict, stream.content.clone()).with_compression(false),
            ))
        }
        _ => Ok(obj.clone()),
    }
}

/// Content operator painting `name` so that `bbox` covers the whole page.
fn stretch_command(name: &str, bbox: [f32; 4], page: PageSize) -> String {
    let width = (bbox[2] - bbox[0]).max(f32::EPSILON);
    let height = (bbox[3] - bbox[1]).max(f32::EPSILON);
    let sx = mm_to_pt(page.width_mm) / width;
    let sy = mm_to_pt(page.height_mm) / height;
    format!(
        "q {} 0 0 {} {} {} cm /{} Do Q\n",
        sx,
        sy,
        -bbox[0] * sx,
        -bbox[1] * sy,
        name
    )
}

fn resolved_dict(doc: &Document, obj: Option<&Object>) -> Result<Dictionary, AppError> {
    Ok(match obj {
        Some(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    })
}

// =============================================================================
// Background Template
// =============================================================================

/// Paint the template's first page underneath everything already on the
/// sheet's first page.
pub fn underlay_template(
    sheet_bytes: &[u8],
    template: &Document,
    page: PageSize,
) -> Result<Vec<u8>, AppError> {
    let mut sheet = Document::load_mem(sheet_bytes)?;
    let sheet_page = first_page_id(&sheet)?;
    let template_page = first_page_id(template)?;

    let mut cache = HashMap::new();
    let xobject_id = create_page_xobject(&mut sheet, template, template_page, &mut cache)?;
    let command = stretch_command(BACKGROUND_XOBJECT, media_box(template, template_page), page);
    let background_id = sheet.add_object(Stream::new(Dictionary::new(), command.into_bytes()));

    let page_dict = sheet.get_dictionary(sheet_page)?.clone();
    let mut resources = resolved_dict(&sheet, inherited(&sheet, sheet_page, b"Resources"))?;
    let mut xobjects = resolved_dict(&sheet, resources.get(b"XObject").ok())?;
    xobjects.set(BACKGROUND_XOBJECT, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut contents = vec![Object::Reference(background_id)];
    match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
        Ok(Object::Array(arr)) => contents.extend(arr.iter().cloned()),
        _ => {}
    }

    let page_mut = sheet.get_object_mut(sheet_page)?.as_dict_mut()?;
    page_mut.set("Resources", Object::Dictionary(resources));
    page_mut.set("Contents", Object::Array(contents));

    let mut out = Vec::new();
    sheet.save_to(&mut out)?;
    Ok(out)
}

pub fn load_template(path: &Path) -> Result<Document, AppError> {
    let doc = Document::load(path)
        .map_err(|e| AppError::BackgroundError(format!("{}: {}", path.display(), e)))?;
    first_page_id(&doc)
        .map_err(|e| AppError::BackgroundError(format!("{}: {}", path.display(), e)))?;
    Ok(doc)
}

// =============================================================================
// Combined Document
// =============================================================================

/// Build one document holding the first page of every file, in order.
pub fn combine_first_pages(paths: &[impl AsRef<Path>], page: PageSize) -> Result<Document, AppError> {
    let mut output = Document::with_version("1.5");
    let pages_id = output.new_object_id();
    let mut kids = Vec::new();

    for (idx, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let source = Document::load(path)
            .map_err(|e| AppError::PdfError(format!("{}: {}", path.display(), e)))?;
        let source_page = first_page_id(&source)?;

        let mut cache = HashMap::new();
        let xobject_id = create_page_xobject(&mut output, &source, source_page, &mut cache)?;
        let name = format!("P{}", idx);
        let command = stretch_command(&name, media_box(&source, source_page), page);
        let content_id = output.add_object(Stream::new(Dictionary::new(), command.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set(name.as_bytes(), Object::Reference(xobject_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(mm_to_pt(page.width_mm)),
                Object::Real(mm_to_pt(page.height_mm)),
            ]),
        );
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(output.add_object(page_dict)));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    output.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = output.add_object(catalog);
    output.trailer.set("Root", Object::Reference(catalog_id));

    Ok(output)
}

pub fn write_combined(
    paths: &[impl AsRef<Path>],
    out_path: &Path,
    page: PageSize,
) -> Result<(), AppError> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut doc = combine_first_pages(paths, page)?;
    doc.save(out_path)?;
    Ok(())
}
