// Auto-fitting text placement inside a resolved box
//
// The font size is decreased in fixed steps until the text fits; when nothing
// fits, the minimum size is used and the text is allowed to overflow.

use crate::fonts::MM_PER_PT;
use crate::layout::Rect;
use std::ops::{Deref, DerefMut};

/// Step between candidate font sizes
pub const FONT_SIZE_STEP: f32 = 0.5;

/// Minimum font size used when the caller passes a non-positive one
pub const DEFAULT_MIN_FONT_PT: f32 = 6.0;

/// Line height and ascent, as multiples of the font height
pub const LINE_HEIGHT_RATIO: f32 = 1.2;
pub const ASCENT_RATIO: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub align: Align,
    pub v_center: bool,
    pub wrap: bool,
    pub min_size_pt: f32,
}

impl FitOptions {
    pub fn new(align: Align) -> Self {
        FitOptions {
            align,
            v_center: true,
            wrap: false,
            min_size_pt: DEFAULT_MIN_FONT_PT,
        }
    }

    pub fn wrapped(mut self) -> Self {
        self.wrap = true;
        self
    }

    pub fn min_size(mut self, min_size_pt: f32) -> Self {
        self.min_size_pt = min_size_pt;
        self
    }
}

/// Something text can be measured against and drawn onto.
///
/// Coordinates are in mm with the origin at the top-left of the page; `y` in
/// `draw_text` is the baseline.
pub trait TextSurface {
    fn font_size(&self) -> f32;
    fn set_font_size(&mut self, size_pt: f32);
    /// Width of `text` in mm at the active font size.
    fn text_width(&self, text: &str) -> f32;
    fn draw_text(&mut self, x: f32, y: f32, text: &str);
}

/// Restores the surface's font size when dropped.
pub struct FontSizeGuard<'a, S: TextSurface + ?Sized> {
    surface: &'a mut S,
    original: f32,
}

impl<'a, S: TextSurface + ?Sized> FontSizeGuard<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        let original = surface.font_size();
        FontSizeGuard { surface, original }
    }

    pub fn original(&self) -> f32 {
        self.original
    }
}

impl<S: TextSurface + ?Sized> Deref for FontSizeGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: TextSurface + ?Sized> DerefMut for FontSizeGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: TextSurface + ?Sized> Drop for FontSizeGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.set_font_size(self.original);
    }
}

/// Outcome of the size search.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub size_pt: f32,
    pub lines: Vec<String>,
    pub line_height: f32,
    pub ascent: f32,
    /// True when even the minimum size did not fit.
    pub overflow: bool,
}

impl FittedText {
    fn at(size_pt: f32, lines: Vec<String>, overflow: bool) -> Self {
        let font_height = size_pt * MM_PER_PT;
        FittedText {
            size_pt,
            lines,
            line_height: font_height * LINE_HEIGHT_RATIO,
            ascent: font_height * ASCENT_RATIO,
            overflow,
        }
    }

    pub fn total_height(&self) -> f32 {
        self.line_height * self.lines.len() as f32
    }
}

/// Clamp the caller's minimum size against the base size.
pub fn effective_min_size(min_size_pt: f32, base_size_pt: f32) -> f32 {
    let min = if min_size_pt <= 0.0 {
        DEFAULT_MIN_FONT_PT
    } else {
        min_size_pt
    };
    min.min(base_size_pt)
}

/// Greedy word wrap against `max_width` at the surface's active size.
///
/// Explicit newlines start a new line; a word wider than the box is broken
/// between characters.
pub fn wrap_lines<S: TextSurface + ?Sized>(surface: &S, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.trim_end().split('\n') {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if surface.text_width(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if surface.text_width(word) <= max_width {
                current = word.to_string();
                continue;
            }

            for c in word.chars() {
                let mut next = current.clone();
                next.push(c);
                if !current.is_empty() && surface.text_width(&next) > max_width {
                    lines.push(std::mem::replace(&mut current, c.to_string()));
                } else {
                    current = next;
                }
            }
        }

        lines.push(current);
    }

    lines
}

fn break_lines<S: TextSurface + ?Sized>(surface: &S, text: &str, width: f32, wrap: bool) -> Vec<String> {
    if wrap {
        wrap_lines(surface, text, width)
    } else {
        vec![text.to_string()]
    }
}

/// Find the largest size, stepping down from the active size, at which `text`
/// fits `rect`. Leaves the surface at the chosen size.
pub fn fit_text<S: TextSurface + ?Sized>(
    surface: &mut S,
    rect: Rect,
    text: &str,
    options: &FitOptions,
) -> FittedText {
    let base = surface.font_size();
    let min = effective_min_size(options.min_size_pt, base);

    let mut size = base;
    while size >= min {
        surface.set_font_size(size);
        if !options.wrap && surface.text_width(text) > rect.w {
            size -= FONT_SIZE_STEP;
            continue;
        }
        let lines = break_lines(surface, text, rect.w, options.wrap);
        let fitted = FittedText::at(size, lines, false);
        if fitted.total_height() <= rect.h {
            return fitted;
        }
        size -= FONT_SIZE_STEP;
    }

    surface.set_font_size(min);
    let lines = break_lines(surface, text, rect.w, options.wrap);
    FittedText::at(min, lines, true)
}

/// Draw `text` inside `rect`, shrinking it to fit.
///
/// Returns what was drawn, or `None` for empty text or an empty box. The
/// surface's font size is the same before and after the call.
pub fn draw_text_fit<S: TextSurface + ?Sized>(
    surface: &mut S,
    rect: Rect,
    text: &str,
    options: &FitOptions,
) -> Option<FittedText> {
    if text.is_empty() || rect.w <= 0.0 || rect.h <= 0.0 {
        return None;
    }

    let mut guard = FontSizeGuard::new(surface);
    let fitted = fit_text(&mut *guard, rect, text, options);
    if fitted.overflow {
        log::debug!(
            "Text '{}' overflows its box at {}pt (base {}pt)",
            text,
            fitted.size_pt,
            guard.original()
        );
    }

    let start_y = if options.v_center {
        rect.y + (rect.h - fitted.total_height()) / 2.0 + fitted.ascent
    } else {
        rect.y + fitted.ascent
    };

    for (i, line) in fitted.lines.iter().enumerate() {
        let line_width = guard.text_width(line);
        let line_x = match options.align {
            Align::Left => rect.x,
            Align::Center => rect.x + (rect.w - line_width) / 2.0,
            Align::Right => rect.x + rect.w - line_width,
        };
        guard.draw_text(line_x, start_y + i as f32 * fitted.line_height, line);
    }

    Some(fitted)
}
