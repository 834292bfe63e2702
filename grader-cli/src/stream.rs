//! Stream adapter: one JSON request on stdin, one JSON result on stdout.
//!
//! Success writes `{"proficiency": x}` to stdout and exits with 0. Any
//! failure writes `{"error": "..."}` to stderr and exits with 1.

use std::io::{self, Read, Write};
use std::path::Path;

use grader_core::ProficiencyScorer;

use crate::config::AppConfig;
use crate::request::{ErrorResponse, ProficiencyResponse, handle_payload};

/// Runs the adapter on the process streams and returns the exit code.
pub fn run_stdio(config_path: Option<&Path>) -> i32 {
    let stderr = io::stderr();
    let scorer = AppConfig::load(config_path)
        .and_then(|config| Ok(ProficiencyScorer::new(config.analysis)?));

    let result = match scorer {
        Ok(scorer) => run(io::stdin().lock(), io::stdout().lock(), stderr.lock(), &scorer),
        Err(e) => write_error(stderr.lock(), &format!("Unexpected error: {e:#}")).map(|_| 1),
    };

    result.unwrap_or_else(|e| {
        log::error!("Failed to write result: {e}");
        1
    })
}

/// Reads one request from `input` and answers on `out` or `err`.
pub fn run<R: Read, W: Write, E: Write>(
    mut input: R,
    mut out: W,
    err: E,
    scorer: &ProficiencyScorer,
) -> io::Result<i32> {
    let mut body = String::new();
    if let Err(e) = input.read_to_string(&mut body) {
        write_error(err, &format!("Failed to read stdin: {e}"))?;
        return Ok(1);
    }
    if body.trim().is_empty() {
        write_error(err, "No input data received from stdin.")?;
        return Ok(1);
    }

    match handle_payload(&body, scorer) {
        Ok(proficiency) => {
            serde_json::to_writer(&mut out, &ProficiencyResponse { proficiency })?;
            writeln!(out)?;
            out.flush()?;
            Ok(0)
        }
        Err(e) => {
            // stderr must hold the error object and nothing else.
            write_error(err, &e.to_string())?;
            Ok(1)
        }
    }
}

fn write_error<E: Write>(mut err: E, message: &str) -> io::Result<()> {
    serde_json::to_writer(&mut err, &ErrorResponse { error: message.to_string() })?;
    writeln!(err)?;
    err.flush()
}
