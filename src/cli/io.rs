//! JSON output for one-shot commands
//!
//! Each command prints exactly one JSON object on stdout:
//! `{"status":"ok","data":...}` or `{"status":"error","code":..,"message":..}`.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use super::errors::CliResult;

/// Write a success response to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_value(&mut io::stdout(), &response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_value(&mut io::stdout(), &response)
}

fn write_value<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_value_is_one_line() {
        let mut out = Vec::new();
        write_value(&mut out, &serde_json::json!({"status": "ok", "data": [1, 2]})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"data\":[1,2],\"status\":\"ok\"}\n");
    }
}
