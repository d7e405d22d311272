use serde_json::Value;
use std::io::{self, Read};

use equity_engine_core::boundary::Operation;

/// Read a JSON request for `op` from stdin when data is piped.
/// Returns None if stdin is a TTY or the pipe is empty.
pub fn read_stdin(op: Operation) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| format!("Failed to read {op} request from stdin: {e}"))?;

    parse_piped(op, &buffer)
}

/// Parse piped text as a JSON request; blank input means no request.
fn parse_piped(op: Operation, text: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse {op} request from stdin: {e}"))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_pipe_is_no_request() {
        assert!(parse_piped(Operation::ComputeNpv, "  \n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_pipe_names_the_operation() {
        let err = parse_piped(Operation::ComputeWaterfall, "{ not json").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to parse compute-waterfall request from stdin"));
    }

    #[test]
    fn test_piped_request_is_parsed() {
        let value = parse_piped(Operation::ComputeIrr, r#"{"cash_flows": ["-100", "110"]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(value["cash_flows"][1], "110");
    }
}
