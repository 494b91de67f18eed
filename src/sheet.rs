use crate::config::Config;
use crate::error::AppError;
use crate::fonts::{FontAsset, FontMetrics};
use crate::layout::{field_box, PageLayout, PageSize, Rect};
use crate::merge;
use crate::roster::{format_person_name, Attendee, NAMES_PER_PAGE};
use crate::schedule::ABSENT;
use crate::text::{draw_text_fit, Align, FitOptions, TextSurface};
use ::image::{DynamicImage, Rgba, RgbImage};
use printpdf::*;
use std::path::{Path, PathBuf};

/// Left padding of attendee names inside their row
const STUDENT_ROW_INSET_MM: f32 = 3.0;

const STUDENT_ROW_FIELD: &str = "premier_nom_etudiant";

// ============================================================================
// PDF Surface
// ============================================================================

/// Text surface backed by a printpdf layer.
pub struct PdfSurface<'a> {
    layer: &'a PdfLayerReference,
    font: &'a IndirectFontRef,
    metrics: &'a FontMetrics,
    size: f32,
    page_height: f32,
}

impl<'a> PdfSurface<'a> {
    pub fn new(
        layer: &'a PdfLayerReference,
        font: &'a IndirectFontRef,
        metrics: &'a FontMetrics,
        size: f32,
        page_height: f32,
    ) -> Self {
        PdfSurface {
            layer,
            font,
            metrics,
            size,
            page_height,
        }
    }
}

impl TextSurface for PdfSurface<'_> {
    fn font_size(&self) -> f32 {
        self.size
    }

    fn set_font_size(&mut self, size_pt: f32) {
        self.size = size_pt;
    }

    fn text_width(&self, text: &str) -> f32 {
        self.metrics.width_mm(text, self.size)
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str) {
        // printpdf measures from the bottom edge
        self.layer
            .use_text(text, self.size, Mm(x), Mm(self.page_height - y), self.font);
    }
}

// ============================================================================
// Background
// ============================================================================

pub enum Background {
    Pdf(::lopdf::Document),
    Image(RgbImage),
}

impl Background {
    /// `.pdf` files are imported as vector templates, anything else is decoded
    /// as a raster image.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if path.as_os_str().is_empty() {
            return Err(AppError::BackgroundError(
                "pdf_template_image is not set".to_string(),
            ));
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            log::info!("Using PDF template {}", path.display());
            return merge::load_template(path).map(Background::Pdf);
        }

        let img = ::image::open(path)
            .map_err(|e| AppError::BackgroundError(format!("{}: {}", path.display(), e)))?;
        log::info!(
            "Using image template {} ({}x{})",
            path.display(),
            img.width(),
            img.height()
        );
        Ok(Background::Image(flatten_on_white(&img)))
    }
}

/// Composite against a white page so transparent templates print cleanly.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba_image = img.to_rgba8();
    let (width_px, height_px) = rgba_image.dimensions();

    let mut rgb_image = RgbImage::new(width_px, height_px);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)) as u8;
        rgb_image.put_pixel(x, y, ::image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb_image
}

/// Stretch the raster template over the whole page.
fn embed_background(layer: &PdfLayerReference, rgb_image: &RgbImage, page: PageSize) {
    let (width_px, height_px) = rgb_image.dimensions();
    if width_px == 0 || height_px == 0 {
        return;
    }

    let image = Image::from(ImageXObject {
        width: Px(width_px as usize),
        height: Px(height_px as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: rgb_image.as_raw().clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    // DPI fixes the width; the vertical scale absorbs any aspect mismatch
    let dpi = (width_px as f32) / (page.width_mm / 25.4);
    let natural_height_mm = height_px as f32 / dpi * 25.4;

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(dpi),
            scale_x: Some(1.0),
            scale_y: Some(page.height_mm / natural_height_mm),
            ..Default::default()
        },
    );
}

// ============================================================================
// Field Policies
// ============================================================================

/// One layout key with the text and fitting policy it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct PageField {
    pub key: &'static str,
    pub text: String,
    pub options: FitOptions,
}

impl PageField {
    fn new(key: &'static str, text: impl Into<String>, align: Align) -> Self {
        PageField {
            key,
            text: text.into(),
            options: FitOptions::new(align),
        }
    }
}

/// Every page-level field for sheet `page_index` (0-based) of `total`.
///
/// Numeric fields holding the absent sentinel are left out.
pub fn page_fields(config: &Config, page_index: usize, total: usize) -> Vec<PageField> {
    let mut fields = vec![
        PageField::new("theme_origin", config.theme_objet.as_str(), Align::Left),
        PageField::new("intitule", config.intitule.as_str(), Align::Left),
        PageField::new("fonds_concerne", config.fonds_concerne.as_str(), Align::Left),
        PageField {
            key: "commentaire",
            text: config.comment.clone(),
            options: FitOptions::new(Align::Center).wrapped(),
        },
    ];

    let durations = [
        ("duree_heures", config.event_hour_duration),
        ("duree_jours", config.event_days_duration),
    ];
    for (key, value) in durations {
        if value > ABSENT {
            fields.push(PageField::new(key, value.to_string(), Align::Center));
        }
    }

    let slots = [
        ("matin_h1", config.morning_start_at_hour),
        ("matin_m1", config.morning_start_at_minute),
        ("matin_h2", config.morning_end_at_hour),
        ("matin_m2", config.morning_end_at_minute),
        ("aprem_h1", config.afternoon_start_at_hour),
        ("aprem_m1", config.afternoon_start_at_minute),
        ("aprem_h2", config.afternoon_end_at_hour),
        ("aprem_m2", config.afternoon_end_at_minute),
    ];
    for (key, value) in slots {
        if value > ABSENT {
            fields.push(PageField::new(key, format!("{:02}", value), Align::Center));
        }
    }

    fields.push(PageField::new(
        "nom_surveillant",
        format_person_name(&config.teacher_first_name, &config.teacher_last_name),
        Align::Center,
    ));
    fields.push(PageField::new("date", config.date_string.as_str(), Align::Right));
    fields.push(PageField::new(
        "pagination",
        format!("{}/{}", page_index + 1, total),
        Align::Left,
    ));

    fields
}

/// Box of the `row`-th attendee, carved out of the student base box.
pub fn student_row_box(base: Rect, row: usize, max_width_mm: f32) -> Rect {
    let row_height = base.h / NAMES_PER_PAGE as f32;
    let mut width = base.w - STUDENT_ROW_INSET_MM;
    if max_width_mm > 0.0 {
        width = width.min(max_width_mm);
    }
    Rect {
        x: base.x + STUDENT_ROW_INSET_MM,
        y: base.y + row as f32 * row_height,
        w: width,
        h: row_height,
    }
}

/// Draw the fields and attendee rows of one sheet onto `surface`.
pub fn draw_page<S: TextSurface + ?Sized>(
    surface: &mut S,
    config: &Config,
    layout: &PageLayout,
    page: PageSize,
    group: &[Attendee],
    page_index: usize,
    total: usize,
) {
    for field in page_fields(config, page_index, total) {
        let Some(rect) = field_box(layout, field.key, page) else {
            continue;
        };
        draw_text_fit(surface, rect, &field.text, &field.options);
    }

    let Some(base) = field_box(layout, STUDENT_ROW_FIELD, page) else {
        log::debug!("No '{}' box in layout, attendee names skipped", STUDENT_ROW_FIELD);
        return;
    };
    let options = FitOptions::new(Align::Left).min_size(config.student_name_min_pt);
    for (row, attendee) in group.iter().take(NAMES_PER_PAGE).enumerate() {
        let rect = student_row_box(base, row, config.student_name_max_mm);
        draw_text_fit(surface, rect, &attendee.display_name(), &options);
    }
}

// ============================================================================
// Sheet Rendering
// ============================================================================

pub fn sheet_file_name(page_index: usize) -> String {
    format!("sheet_{:02}.pdf", page_index + 1)
}

/// Renders attendee pages to `sheet_NN.pdf` files.
pub struct SheetRenderer<'a> {
    config: &'a Config,
    layout: &'a PageLayout,
    page: PageSize,
    background: Background,
    font: FontAsset,
}

impl<'a> SheetRenderer<'a> {
    pub fn new(config: &'a Config, layout: &'a PageLayout) -> Result<Self, AppError> {
        let background = Background::load(&config.pdf_template_image)?;
        let font = FontAsset::load(&config.font)?;
        std::fs::create_dir_all(&config.output_folder)?;

        Ok(SheetRenderer {
            config,
            layout,
            page: PageSize::a4(config.landscape),
            background,
            font,
        })
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Render one group of attendees and write it to the output folder.
    pub fn compose_page(
        &self,
        group: &[Attendee],
        page_index: usize,
        total: usize,
    ) -> Result<PathBuf, AppError> {
        let (doc, page1, layer1) = PdfDocument::new(
            "Feuille d'emargement",
            Mm(self.page.width_mm),
            Mm(self.page.height_mm),
            "Layer 1",
        );
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = self.font.add_to(&doc)?;

        if let Background::Image(rgb_image) = &self.background {
            embed_background(&layer, rgb_image, self.page);
        }

        let mut surface = PdfSurface::new(
            &layer,
            &font,
            &self.font.metrics,
            self.font.base_size,
            self.page.height_mm,
        );
        draw_page(
            &mut surface,
            self.config,
            self.layout,
            self.page,
            group,
            page_index,
            total,
        );

        let mut bytes = doc
            .save_to_bytes()
            .map_err(|e| AppError::PdfError(e.to_string()))?;
        if let Background::Pdf(template) = &self.background {
            bytes = merge::underlay_template(&bytes, template, self.page)?;
        }

        let path = self.config.output_folder.join(sheet_file_name(page_index));
        std::fs::write(&path, bytes)?;
        log::info!(
            "Wrote {} ({} attendees, page {}/{})",
            path.display(),
            group.len(),
            page_index + 1,
            total
        );
        Ok(path)
    }

    /// Render every page in order, stopping at the first failure.
    pub fn render_all(&self, pages: &[&[Attendee]]) -> Result<Vec<PathBuf>, AppError> {
        let total = pages.len();
        pages
            .iter()
            .enumerate()
            .map(|(idx, group)| self.compose_page(group, idx, total))
            .collect()
    }
}
