//! Lightcurve line codec.
//!
//! Full form: `jd mag err x y aperture source_filename [comment]`.
//! Short forms accepted on read:
//! - `jd mag err` (x = y = 0, aperture = 1)
//! - `jd mag` (additionally err = 0.02)
//!
//! Lines that do not start with a digit are treated as comments when they are
//! shorter than 5 bytes, or when one of their first 10 bytes is `#`, `%`, `/`
//! or a letter.

use crate::domain::LightcurvePoint;

/// Error assumed for the two-column `jd mag` form.
const SHORT_FORM_MAG_ERROR: f64 = 0.02;

/// Parse one lightcurve line. Returns `None` for comments, headers and lines
/// that do not parse.
pub fn parse_lightcurve_line(line: &str) -> Option<LightcurvePoint> {
    let line = line.trim_end_matches(['\n', '\r']);
    if looks_like_comment(line) {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let numbers: Vec<f64> = tokens
        .iter()
        .take(6)
        .map_while(|t| t.parse::<f64>().ok())
        .collect();

    let point = if numbers.len() == 6 && tokens.len() >= 7 {
        LightcurvePoint {
            julian_date: numbers[0],
            magnitude: numbers[1],
            magnitude_error: numbers[2],
            x_pix: numbers[3],
            y_pix: numbers[4],
            aperture: numbers[5],
            source_filename: tokens[6].to_string(),
            comment: comment_after(line, 7),
        }
    } else if numbers.len() >= 2 {
        LightcurvePoint {
            julian_date: numbers[0],
            magnitude: numbers[1],
            magnitude_error: numbers.get(2).copied().unwrap_or(SHORT_FORM_MAG_ERROR),
            x_pix: 0.0,
            y_pix: 0.0,
            aperture: 1.0,
            source_filename: String::new(),
            comment: String::new(),
        }
    } else {
        return None;
    };

    let finite = [point.julian_date, point.magnitude, point.x_pix, point.y_pix]
        .iter()
        .all(|v| v.is_finite());
    finite.then_some(point)
}

/// Format one lightcurve line (without the trailing newline).
pub fn format_lightcurve_line(p: &LightcurvePoint) -> String {
    let mut line = format!(
        "{:.5} {:12.8} {:.8}  {:10.5} {:10.5} {:4.1} {}",
        p.julian_date, p.magnitude, p.magnitude_error, p.x_pix, p.y_pix, p.aperture, p.source_filename
    );
    if !p.comment.is_empty() {
        line.push_str("  ");
        line.push_str(&p.comment);
    }
    line
}

fn looks_like_comment(line: &str) -> bool {
    let bytes = line.as_bytes();
    if bytes.first().is_some_and(u8::is_ascii_digit) {
        return false;
    }
    if bytes.len() < 5 {
        return true;
    }
    bytes
        .iter()
        .take(10)
        .any(|&b| b == b'#' || b == b'%' || b == b'/' || b.is_ascii_alphabetic())
}

/// Text after the first `skip` whitespace-separated fields, up to a tab.
fn comment_after(line: &str, skip: usize) -> String {
    let mut rest = line;
    for _ in 0..skip {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    let rest = rest.trim_start();
    let end = rest.find('\t').unwrap_or(rest.len());
    rest[..end].trim_end().to_string()
}
