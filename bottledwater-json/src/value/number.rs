//! Textual forms of numbers and JSON number validation.

/// Text of a float the way the database prints it. Non-finite values use
/// the `NaN` / `Infinity` / `-Infinity` spellings.
pub fn float_text(value: f64) -> String {
    match non_finite_text(value) {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

/// Text of a single-precision float: the shortest form that round-trips
/// through `f32`, so `0.1` stays `0.1`.
pub fn real_text(value: f32) -> String {
    match non_finite_text(f64::from(value)) {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

fn non_finite_text(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value.is_infinite() {
        Some(if value.is_sign_positive() {
            "Infinity"
        } else {
            "-Infinity"
        })
    } else {
        None
    }
}

/// Whether `text` is a syntactically valid JSON number, with nothing
/// before or after it.
///
/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
pub fn is_json_number(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }

    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = skip_digits(bytes, i),
        _ => return false,
    }

    if bytes.get(i) == Some(&b'.') {
        let start = i + 1;
        i = skip_digits(bytes, start);
        if i == start {
            return false;
        }
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        i = skip_digits(bytes, start);
        if i == start {
            return false;
        }
    }

    i == bytes.len()
}

fn skip_digits(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    i
}
