// Percent-based field placement resolved against a concrete page size

use crate::error::AppError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// ISO A4 dimensions in mm (portrait)
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// One field's bounding box as fractions of the page width/height.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LayoutEntry {
    pub x_percent: f32,
    pub y_percent: f32,
    pub w_percent: f32,
    pub h_percent: f32,
}

/// Field name -> bounding box. Absent keys are not rendered.
pub type PageLayout = HashMap<String, LayoutEntry>;

/// A resolved rectangle in mm, origin at the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    pub fn a4(landscape: bool) -> Self {
        if landscape {
            PageSize {
                width_mm: A4_HEIGHT_MM,
                height_mm: A4_WIDTH_MM,
            }
        } else {
            PageSize {
                width_mm: A4_WIDTH_MM,
                height_mm: A4_HEIGHT_MM,
            }
        }
    }
}

impl LayoutEntry {
    pub fn is_valid(&self) -> bool {
        self.x_percent >= 0.0
            && self.y_percent >= 0.0
            && self.w_percent > 0.0
            && self.h_percent > 0.0
    }

    /// Resolve to physical units. `None` means the field is skipped.
    pub fn resolve(&self, page: PageSize) -> Option<Rect> {
        if !self.is_valid() {
            return None;
        }
        Some(Rect {
            x: self.x_percent * page.width_mm,
            y: self.y_percent * page.height_mm,
            w: self.w_percent * page.width_mm,
            h: self.h_percent * page.height_mm,
        })
    }
}

/// Look up a field and resolve it in one step.
pub fn field_box(layout: &PageLayout, name: &str, page: PageSize) -> Option<Rect> {
    let rect = layout.get(name).and_then(|entry| entry.resolve(page));
    if rect.is_none() && layout.contains_key(name) {
        log::debug!("Skipping field '{}': degenerate layout rectangle", name);
    }
    rect
}

pub fn load_page_layout(path: &Path) -> Result<PageLayout, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::LayoutError(format!("{}: {}", path.display(), e)))?;
    serde_yaml::from_str(&content)
        .map_err(|e| AppError::LayoutError(format!("Invalid YAML in {}: {}", path.display(), e)))
}
