use serde::{Deserialize, Serialize};
use unidiag_core::{
    classify, classify_str, diagnose, DecodeOutcome, HazardTag, Scalar, StreamDecoder, SubjectId,
};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format!($($t)*)))
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Decoder state shared by the REPL binding, free of JS types.
#[derive(Debug, Clone, Default)]
struct ReplDecoder {
    decoder: StreamDecoder,
    received: usize,
    replaced: usize,
}

impl ReplDecoder {
    fn emit(&mut self, outcome: DecodeOutcome, text: &mut String) {
        match outcome {
            DecodeOutcome::Scalar(scalar) => text.push(scalar.as_char()),
            DecodeOutcome::NeedMoreBytes => {}
            DecodeOutcome::Invalid(_) => {
                self.replaced += 1;
                text.push(char::REPLACEMENT_CHARACTER);
            }
        }
    }

    fn push(&mut self, bytes: &[u8]) -> String {
        self.received += bytes.len();
        let mut text = String::with_capacity(bytes.len());
        for &byte in bytes {
            for outcome in self.decoder.feed(byte) {
                self.emit(outcome, &mut text);
            }
        }
        text
    }

    fn finish(&mut self) -> String {
        let mut text = String::new();
        if let Some(truncated) = self.decoder.finish() {
            self.emit(DecodeOutcome::Invalid(truncated), &mut text);
        }
        text
    }
}

/// Incremental decoder for bytes typed into a browser REPL.
///
/// Keystrokes arrive in arbitrary pieces; a character split across pieces
/// is held back until its remaining bytes arrive.
#[wasm_bindgen]
#[derive(Default)]
pub struct ReplInput {
    inner: ReplDecoder,
}

#[wasm_bindgen]
impl ReplInput {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a piece of input. Invalid sequences become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let before = self.inner.replaced;
        let text = self.inner.push(bytes);
        let replaced = self.inner.replaced - before;
        if replaced > 0 {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "replaced {replaced} invalid UTF-8 sequence(s)"
            )));
        }
        text
    }

    /// Ends the input, returning U+FFFD if a character was left incomplete.
    pub fn finish(&mut self) -> String {
        let text = self.inner.finish();
        if !text.is_empty() {
            console_log!("input ended inside a character after {} bytes", self.inner.received);
        }
        text
    }

    /// `true` while a character is split across pushes.
    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn pending(&self) -> bool {
        self.inner.decoder.is_pending()
    }

    /// Total bytes pushed so far.
    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn received(&self) -> usize {
        self.inner.received
    }
}

/// JS-compatible view of a subject diagnosis.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WasmDiagnosis {
    pub hazards: Vec<String>,
    pub dominant: Option<String>,
    pub text: Option<String>,
    pub error: Option<String>,
}

impl WasmDiagnosis {
    fn from_bytes(bytes: &[u8]) -> Self {
        let diagnosis = diagnose(SubjectId::from("repl"), bytes);
        Self {
            hazards: diagnosis
                .hazards
                .iter()
                .map(|tag| tag.name().to_string())
                .collect(),
            dominant: diagnosis.dominant().map(|tag| tag.name().to_string()),
            text: diagnosis.decoded_text(),
            error: diagnosis.decode_error.map(|e| e.to_string()),
        }
    }
}

// JS numbers arrive as f64; only whole numbers reach the signed constructor.
#[allow(clippy::cast_possible_truncation)]
fn tag_names(value: f64) -> Result<Vec<&'static str>, String> {
    if !value.is_finite() || value.fract().abs() > 0.0 {
        return Err(format!("code point {value} is not an integer"));
    }
    let scalar = Scalar::from_i64(value as i64).map_err(|e| e.to_string())?;
    Ok(classify(scalar).iter().map(HazardTag::name).collect())
}

/// Hazard tag names for a code point. Throws for negative, out-of-range,
/// surrogate or non-integer values.
///
/// # Errors
///
/// The construction error message, as a JS string.
#[wasm_bindgen]
pub fn classify_code_point(value: f64) -> Result<JsValue, JsValue> {
    let names = tag_names(value).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&names).map_err(JsValue::from)
}

/// Hazard tag names found anywhere in `text`.
#[wasm_bindgen]
#[must_use]
pub fn classify_text(text: &str) -> js_sys::Array {
    classify_str(text)
        .iter()
        .map(|tag| JsValue::from_str(tag.name()))
        .collect()
}

/// Decodes and classifies a whole byte buffer.
///
/// # Errors
///
/// Fails only if the result cannot be converted to a JS value.
#[wasm_bindgen]
pub fn diagnose_bytes(bytes: &[u8]) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&WasmDiagnosis::from_bytes(bytes)).map_err(JsValue::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_character_is_held_until_complete() {
        let mut repl = ReplDecoder::default();
        assert_eq!(repl.push(&[0x68, 0xC3]), "h");
        assert!(repl.decoder.is_pending());
        assert_eq!(repl.push(&[0xA9]), "\u{e9}");
        assert_eq!(repl.finish(), "");
        assert_eq!(repl.received, 3);
    }

    #[test]
    fn byte_at_a_time_matches_whole_buffer() {
        let mut bytes = "\u{4F60}\u{597D} \u{1F600}".as_bytes().to_vec();
        bytes.extend([0xFF, 0xE2, 0x82]);
        let mut whole = ReplDecoder::default();
        let expected = whole.push(&bytes) + &whole.finish();

        let mut single = ReplDecoder::default();
        let mut got = String::new();
        for byte in &bytes {
            got.push_str(&single.push(std::slice::from_ref(byte)));
        }
        got.push_str(&single.finish());
        assert_eq!(got, expected);
    }

    #[test]
    fn invalid_and_truncated_input_is_replaced() {
        let mut repl = ReplDecoder::default();
        assert_eq!(repl.push(b"a\xffb\xf0\x9f"), "a\u{FFFD}b");
        assert_eq!(repl.finish(), "\u{FFFD}");
        assert_eq!(repl.replaced, 2);
    }

    #[test]
    fn tag_names_reject_invalid_code_points() {
        assert_eq!(tag_names(f64::from(0x1F600)), Ok(vec!["outside-bmp"]));
        assert_eq!(tag_names(65.0), Ok(vec![]));
        assert!(tag_names(f64::from(0xD800)).is_err());
        assert!(tag_names(f64::from(0x11_0000)).is_err());
    }

    #[test]
    fn negative_code_points_are_reported_as_negative() {
        let err = tag_names(-1.0).expect_err("negative");
        assert_eq!(err, "code point -1 is negative");
        assert!(tag_names(-1e300).expect_err("huge negative").contains("negative"));
    }

    #[test]
    fn fractional_and_non_finite_values_are_rejected() {
        assert_eq!(
            tag_names(65.5),
            Err("code point 65.5 is not an integer".to_string())
        );
        assert!(tag_names(f64::NAN).is_err());
        assert!(tag_names(f64::INFINITY).is_err());
        assert!(tag_names(1e300).expect_err("huge").contains("exceeds U+10FFFF"));
    }

    #[test]
    fn diagnosis_serializes_with_tag_names() {
        let diagnosis = WasmDiagnosis::from_bytes(b"\xed\xa0\x80");
        let json = serde_json::to_value(&diagnosis).expect("serializable");
        assert_eq!(json["hazards"], serde_json::json!(["surrogate"]));
        assert_eq!(json["dominant"], serde_json::json!("surrogate"));
        assert!(json["text"].is_null());
        assert!(json["error"].is_string());
    }
}
