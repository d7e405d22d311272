use equity_engine_core::error::ErrorResponse;
use serde_json::Value;

/// Pretty-print JSON to stdout.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// Print an engine rejection as `{ "error": { code, message, details } }`.
pub fn print_error(resp: &ErrorResponse) {
    print_json(&serde_json::json!({ "error": resp }));
}
