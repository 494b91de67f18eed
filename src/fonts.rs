// Font selection and per-character advance metrics

use crate::config::FontConfig;
use crate::error::AppError;
use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};
use std::collections::HashMap;

/// Average Helvetica glyph advance as a fraction of the em size
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Millimetres per typographic point
pub const MM_PER_PT: f32 = 25.4 / 72.0;

/// Advance widths in em units, used to measure strings before drawing them.
#[derive(Debug, Clone)]
pub enum FontMetrics {
    /// Every character gets the same advance.
    FixedWidth { ratio: f32 },
    /// Advances read from a TrueType `hmtx` table, keyed by character.
    TrueType {
        advances: HashMap<char, f32>,
        fallback: f32,
    },
}

impl FontMetrics {
    pub fn helvetica() -> Self {
        FontMetrics::FixedWidth {
            ratio: HELVETICA_CHAR_WIDTH_RATIO,
        }
    }

    pub fn from_ttf(data: &[u8]) -> Result<Self, AppError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| AppError::PdfError(format!("Failed to parse font: {}", e)))?;
        let units_per_em = f32::from(face.units_per_em());

        let mut advances = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    let Some(c) = char::from_u32(codepoint) else {
                        return;
                    };
                    let advance = face
                        .glyph_index(c)
                        .and_then(|glyph| face.glyph_hor_advance(glyph));
                    if let Some(advance) = advance {
                        advances
                            .entry(c)
                            .or_insert(f32::from(advance) / units_per_em);
                    }
                });
            }
        }

        // .notdef advance for characters the font does not cover
        let fallback = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|advance| f32::from(advance) / units_per_em)
            .unwrap_or(HELVETICA_CHAR_WIDTH_RATIO);

        log::debug!("Loaded metrics for {} characters", advances.len());
        Ok(FontMetrics::TrueType { advances, fallback })
    }

    /// Width of `text` in em units.
    pub fn width_em(&self, text: &str) -> f32 {
        match self {
            FontMetrics::FixedWidth { ratio } => text.chars().count() as f32 * ratio,
            FontMetrics::TrueType { advances, fallback } => text
                .chars()
                .map(|c| advances.get(&c).copied().unwrap_or(*fallback))
                .sum(),
        }
    }

    /// Width of `text` in mm at `size_pt`.
    pub fn width_mm(&self, text: &str, size_pt: f32) -> f32 {
        self.width_em(text) * size_pt * MM_PER_PT
    }
}

/// The configured font: an embedded TrueType file or builtin Helvetica.
pub struct FontAsset {
    data: Option<Vec<u8>>,
    pub metrics: FontMetrics,
    pub base_size: f32,
}

impl FontAsset {
    pub fn load(config: &FontConfig) -> Result<Self, AppError> {
        let base_size = if config.size > 0.0 {
            config.size
        } else {
            FontConfig::DEFAULT_SIZE
        };

        if config.path.as_os_str().is_empty() {
            return Ok(FontAsset {
                data: None,
                metrics: FontMetrics::helvetica(),
                base_size,
            });
        }

        let data = std::fs::read(&config.path).map_err(|e| {
            AppError::PdfError(format!("Failed to read font {}: {}", config.path.display(), e))
        })?;
        let metrics = FontMetrics::from_ttf(&data)?;
        log::info!("Using font '{}' from {}", config.name, config.path.display());

        Ok(FontAsset {
            data: Some(data),
            metrics,
            base_size,
        })
    }

    /// Register the font with a document being built.
    pub fn add_to(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef, AppError> {
        match &self.data {
            Some(data) => doc.add_external_font(data.as_slice()),
            None => doc.add_builtin_font(BuiltinFont::Helvetica),
        }
        .map_err(|e| AppError::PdfError(e.to_string()))
    }
}
