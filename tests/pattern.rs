// tests/pattern.rs

use logbeacon::pattern::{CompiledPattern, PatternEngine};

#[test]
fn matches_anywhere_in_the_line() {
    let pattern = CompiledPattern::new("ERROR").unwrap();
    assert!(PatternEngine::evaluate("2024-01-01 ERROR disk full", &pattern));
    assert!(!PatternEngine::evaluate("2024-01-01 error disk full", &pattern));
    assert!(!PatternEngine::evaluate("", &pattern));
}

#[test]
fn anchors_and_alternation() {
    let pattern = CompiledPattern::new(r"^(FATAL|PANIC)\b").unwrap();
    assert!(PatternEngine::evaluate("PANIC: out of memory", &pattern));
    assert!(!PatternEngine::evaluate("caught PANIC", &pattern));
    assert!(!PatternEngine::evaluate("FATALITY", &pattern));
}

#[test]
fn case_insensitive_option() {
    let pattern = CompiledPattern::with_options("timeout", true).unwrap();
    assert!(pattern.is_case_insensitive());
    assert!(PatternEngine::evaluate("upstream TIMEOUT after 30s", &pattern));
}

#[test]
fn invalid_pattern_is_rejected_at_compile_time() {
    assert!(CompiledPattern::new("(unclosed").is_err());
}

#[test]
fn captures_return_groups() {
    let pattern = CompiledPattern::new(r"status=(\d+)(?: code=(\w+))?").unwrap();
    assert_eq!(
        PatternEngine::captures("GET / status=503", &pattern),
        Some(vec!["status=503".to_string(), "503".to_string(), String::new()])
    );
    assert_eq!(PatternEngine::captures("nothing here", &pattern), None);
}

#[test]
fn batch_evaluation_reports_indices() {
    let pattern = CompiledPattern::new("WARN|ERROR").unwrap();
    let lines = ["INFO up", "WARN slow", "INFO ok", "ERROR down"];
    assert_eq!(
        PatternEngine::matching_indices(lines.iter().copied(), &pattern),
        vec![1, 3]
    );
}

#[test]
fn equality_ignores_compiled_state() {
    let a = CompiledPattern::new("x+").unwrap();
    let b = CompiledPattern::new("x+").unwrap();
    let c = CompiledPattern::with_options("x+", true).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str(), "x+");
}
