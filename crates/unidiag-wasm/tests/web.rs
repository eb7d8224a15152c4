//! Browser-side checks for the REPL bindings. Run with `wasm-pack test`.

#![cfg(target_arch = "wasm32")]

use unidiag_wasm::{classify_code_point, diagnose_bytes, ReplInput};
use wasm_bindgen_test::wasm_bindgen_test;

#[wasm_bindgen_test]
fn repl_input_holds_split_emoji() {
    let mut input = ReplInput::new();
    assert_eq!(input.push(&[0xF0, 0x9F]), "");
    assert!(input.pending());
    assert_eq!(input.push(&[0x98, 0x80]), "\u{1F600}");
    assert_eq!(input.finish(), "");
    assert_eq!(input.received(), 4);
}

#[wasm_bindgen_test]
fn classify_code_point_throws_for_surrogates() {
    assert!(classify_code_point(f64::from(0xDC00)).is_err());
    let names: Vec<String> =
        serde_wasm_bindgen::from_value(classify_code_point(f64::from(0xF_0000)).unwrap()).unwrap();
    assert_eq!(names, vec!["outside-bmp", "private-use"]);
}

#[wasm_bindgen_test]
fn classify_code_point_throws_for_negative_values() {
    let err = classify_code_point(-1.0).unwrap_err();
    assert_eq!(err.as_string().as_deref(), Some("code point -1 is negative"));
}

#[wasm_bindgen_test]
fn diagnose_bytes_reports_overlong() {
    let value = diagnose_bytes(&[0xC0, 0x80]).unwrap();
    let diagnosis: unidiag_wasm::WasmDiagnosis = serde_wasm_bindgen::from_value(value).unwrap();
    assert_eq!(diagnosis.dominant.as_deref(), Some("overlong"));
    assert!(diagnosis.text.is_none());
}
