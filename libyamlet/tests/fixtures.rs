//! Test harness for the Yamlet decoder and encoder against fixture files.
//!
//! Every `test/yamlet/*.yamlet` file is parsed and compared with the JSON
//! document of the same name in `test/json/`, key order included. JSON has no
//! spelling for the special floats or for integers beyond 64 bits, so those
//! are compared as strings: `.NaN`, `.Inf`, `-.Inf` and decimal digits.
//!
//! Each `test/nay/*.nay` file must fail with the message in the matching
//! `.error` file.

use std::fs;
use std::path::{Path, PathBuf};

use libyamlet::{parse, parse_with_filename, to_string, Value};
use num_traits::ToPrimitive;
use serde_json::{Map as JsonMap, Number, Value as Json};

/// Compare two Values, treating NaN as equal to NaN.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => (a.is_nan() && b.is_nan()) || a == b,
        (Value::Sequence(a), Value::Sequence(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        _ => a == b,
    }
}

/// Convert a decoded value to JSON for comparison with the expected output.
fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(n) => match (n.to_i64(), n.to_u64()) {
            (Some(i), _) => Json::Number(i.into()),
            (None, Some(u)) => Json::Number(u.into()),
            (None, None) => Json::String(n.to_string()),
        },
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None if f.is_nan() => Json::String(".NaN".into()),
            None if *f > 0.0 => Json::String(".Inf".into()),
            None => Json::String("-.Inf".into()),
        },
        Value::String(s) => Json::String(s.clone()),
        Value::Sequence(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<JsonMap<_, _>>(),
        ),
    }
}

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// All files matching `pattern` under the test directory, sorted.
fn fixture_files(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .flatten()
        .collect();
    files.sort();
    files
}

/// Read a sibling fixture: same stem, different directory and extension.
fn read_companion(path: &Path, dir: &str, ext: &str) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    fs::read_to_string(test_root().join(dir).join(format!("{}.{}", stem, ext))).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Run a single .yamlet test file (expected to succeed).
fn run_yamlet_test(path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = file_name(path);

    let value = parse(&content)
        .map_err(|e| format!("{}: Unexpected parse error: {}", filename, e))?;

    match read_companion(path, "json", "json") {
        Some(expected_json) => {
            let expected: Json = serde_json::from_str(&expected_json)
                .map_err(|e| format!("{}: Bad expected JSON: {}", filename, e))?;
            // String comparison keeps key order significant.
            let expected = serde_json::to_string_pretty(&expected).unwrap();
            let actual = serde_json::to_string_pretty(&to_json(&value)).unwrap();
            if actual != expected {
                return Err(format!(
                    "{}: Output mismatch\n    expected: {}\n    actual:   {}",
                    filename, expected, actual
                ));
            }
            println!("  {} => ok", filename);
        }
        None => println!("  {} => {:?} (no expected output)", filename, value),
    }
    Ok(())
}

/// Run a single .nay test file (expected to fail with specific error).
fn run_nay_test(path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = file_name(path);

    match parse_with_filename(&content, Some(&filename)) {
        Ok(value) => Err(format!(
            "{}: Expected parse error, but got success: {:?}",
            filename, value
        )),
        Err(e) => {
            let actual_error = e.to_string();
            match read_expected_error(path) {
                Some(expected) if actual_error == expected => {
                    println!("  {} => error (as expected)", filename);
                    Ok(())
                }
                Some(expected) => Err(format!(
                    "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                    filename, expected, actual_error
                )),
                None => {
                    println!(
                        "  {} => error: {} (no .error file to compare)",
                        filename, actual_error
                    );
                    Ok(())
                }
            }
        }
    }
}

fn read_expected_error(path: &Path) -> Option<String> {
    read_companion(path, "nay", "error").map(|s| s.trim().to_string())
}

/// Decode, encode and decode again; both decodings must agree and a second
/// encoding must be byte-identical to the first.
fn run_round_trip_test(path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = file_name(path);

    let value = parse(&content).map_err(|e| format!("{}: parse error: {}", filename, e))?;
    let encoded = to_string(&value);
    let reparsed = parse(&encoded)
        .map_err(|e| format!("{}: re-parse error: {}\n{}", filename, e, encoded))?;
    if !values_equal(&value, &reparsed) {
        return Err(format!(
            "{}: Round trip mismatch\n    original: {:?}\n    reparsed: {:?}\n{}",
            filename, value, reparsed, encoded
        ));
    }
    let again = to_string(&reparsed);
    if again != encoded {
        return Err(format!(
            "{}: Encoding is not stable\n    first:  {:?}\n    second: {:?}",
            filename, encoded, again
        ));
    }
    Ok(())
}

/// Run `check` over every file, report, and fail if any check failed.
fn run_all(kind: &str, files: &[PathBuf], check: fn(&Path) -> Result<(), String>) {
    if files.is_empty() {
        println!("No {} test files found!", kind);
        return;
    }

    println!("\nRunning {} {} test files:", files.len(), kind);

    let mut passed = 0;
    let mut failed = 0;
    let mut errors: Vec<String> = Vec::new();

    for file in files {
        match check(file) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                errors.push(e);
            }
        }
    }

    println!("\nResults: {} passed, {} failed", passed, failed);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    assert!(failed == 0, "{} {} tests failed", failed, kind);
}

#[test]
fn test_all_yamlet_fixtures() {
    run_all(".yamlet", &fixture_files("yamlet/*.yamlet"), run_yamlet_test);
}

#[test]
fn test_all_nay_fixtures() {
    run_all(".nay", &fixture_files("nay/*.nay"), run_nay_test);
}

#[test]
fn test_round_trip_all_yamlet_fixtures() {
    run_all(
        "round-trip",
        &fixture_files("yamlet/*.yamlet"),
        run_round_trip_test,
    );
}

#[test]
fn test_fixture_corpus_is_present() {
    assert!(!fixture_files("yamlet/*.yamlet").is_empty());
    assert!(!fixture_files("nay/*.nay").is_empty());
}
