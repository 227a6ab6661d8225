//! Payload decoding and validation for client-originated messages.
//!
//! Each decoder takes the raw `payload` value of an envelope and either
//! returns a typed, validated value or a human-readable reason. The hub wraps
//! the reason into `HubError::MalformedPayload`.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::services::action_log::{DrawStroke, Point, Tool};

pub const DEFAULT_FONT: &str = "16px Arial";

/// Bounds applied to inbound payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadLimits {
    pub max_stroke_points: usize,
    pub max_brush_size: u32,
    pub max_text_length: usize,
    pub max_coordinate: f64,
}

impl PayloadLimits {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_stroke_points: config.max_stroke_points,
            max_brush_size: config.max_brush_size,
            max_text_length: config.max_text_length,
            max_coordinate: config.max_coordinate,
        }
    }
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self { max_stroke_points: 1000, max_brush_size: 100, max_text_length: 1000, max_coordinate: 10_000.0 }
    }
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

#[derive(Deserialize)]
struct RawDraw {
    tool: Tool,
    color: String,
    size: i64,
    points: Vec<Point>,
}

#[derive(Deserialize)]
struct RawText {
    content: String,
    x: f64,
    y: f64,
    font: Option<String>,
    color: String,
}

#[derive(Deserialize)]
struct RawCursor {
    x: f64,
    y: f64,
}

fn decode<T: for<'de> Deserialize<'de>>(payload: Option<&Value>, kind: &str) -> Result<T, String> {
    let Some(value) = payload else {
        return Err(format!("{kind} payload required"));
    };
    T::deserialize(value).map_err(|e| format!("invalid {kind} payload: {e}"))
}

// =============================================================================
// VALIDATORS
// =============================================================================

/// `#RRGGBB`, either case.
#[must_use]
pub fn is_hex_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

fn check_coordinate(v: f64, limits: &PayloadLimits) -> Result<(), String> {
    if !v.is_finite() || v.abs() > limits.max_coordinate {
        return Err(format!("coordinate out of range: {v}"));
    }
    Ok(())
}

/// Decode a `draw` payload into a stroke.
pub fn decode_draw(payload: Option<&Value>, limits: &PayloadLimits) -> Result<DrawStroke, String> {
    let raw: RawDraw = decode(payload, "draw")?;

    if raw.points.is_empty() {
        return Err("stroke must contain at least one point".into());
    }
    if raw.points.len() > limits.max_stroke_points {
        return Err(format!("too many points in stroke (max: {})", limits.max_stroke_points));
    }
    if raw.size <= 0 {
        return Err(format!("size must be positive, got {}", raw.size));
    }
    let size = u32::try_from(raw.size)
        .ok()
        .filter(|s| *s <= limits.max_brush_size)
        .ok_or_else(|| format!("size exceeds maximum of {}", limits.max_brush_size))?;
    if !is_hex_color(&raw.color) {
        return Err(format!("invalid color: {}", raw.color));
    }
    for p in &raw.points {
        check_coordinate(p.x, limits)?;
        check_coordinate(p.y, limits)?;
    }

    Ok(DrawStroke { tool: raw.tool, color: raw.color, size, points: raw.points })
}

/// Decode a `text` payload. Returns the normalized payload to store.
pub fn decode_text(payload: Option<&Value>, limits: &PayloadLimits) -> Result<Value, String> {
    let raw: RawText = decode(payload, "text")?;

    if raw.content.trim().is_empty() {
        return Err("text content must not be empty".into());
    }
    if raw.content.chars().count() > limits.max_text_length {
        return Err(format!("text too long (max: {})", limits.max_text_length));
    }
    if !is_hex_color(&raw.color) {
        return Err(format!("invalid color: {}", raw.color));
    }
    check_coordinate(raw.x, limits)?;
    check_coordinate(raw.y, limits)?;

    let font = raw.font.unwrap_or_else(|| DEFAULT_FONT.to_string());
    Ok(json!({
        "content": raw.content,
        "x": raw.x,
        "y": raw.y,
        "font": font,
        "color": raw.color,
    }))
}

/// Decode a `cursor` payload into a position.
pub fn decode_cursor(payload: Option<&Value>) -> Result<(f64, f64), String> {
    let raw: RawCursor = decode(payload, "cursor")?;
    if !raw.x.is_finite() || !raw.y.is_finite() {
        return Err("cursor position must be finite".into());
    }
    Ok((raw.x, raw.y))
}

#[cfg(test)]
#[path = "payload_test.rs"]
mod tests;
