//! Newline-delimited JSON over a reader/writer pair: one request per line in,
//! one response per line out.

use std::io::{BufRead, Write};

use anyhow::Result;
use log::{info, warn};

use crate::error::CommandError;
use crate::response::Response;
use crate::router::CommandRouter;

pub fn serve<R: BufRead, W: Write>(
    router: &mut CommandRouter,
    mut input: R,
    mut output: W,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => router.handle_line(line.trim_end_matches(['\n', '\r'])),
            Err(err) => {
                warn!("Request is not valid UTF-8: {err}");
                Response::from_error(&CommandError::InvalidJson(err.to_string()))
            }
        };
        writeln!(output, "{response}")?;
        output.flush()?;
    }
    info!("Input closed, shutting down");
    Ok(())
}

/// Serve on the process's stdin/stdout until stdin closes.
pub fn run_stdio(router: &mut CommandRouter) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(router, stdin.lock(), stdout.lock())
}

/// The one response written when the server cannot start.
pub fn startup_failure(err: &anyhow::Error) -> Response {
    Response::from_error(&CommandError::internal("Failed to start pcb-edit", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestKernel;
    use serde_json::Value;

    #[test]
    fn one_response_per_request_line() {
        let mut router = CommandRouter::new(Box::new(TestKernel::default()));
        let input =
            "\n{\"command\": \"get_nets_list\"}\n   \nnot json\n{\"command\": \"bogus\"}\n";
        let mut output = Vec::new();
        serve(&mut router, input.as_bytes(), &mut output).unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["errorCode"], "NO_BOARD_LOADED");
        assert_eq!(responses[1]["errorCode"], "INVALID_JSON");
        assert_eq!(responses[2]["errorCode"], "UNKNOWN_COMMAND");
    }

    #[test]
    fn invalid_utf8_does_not_stop_the_loop() {
        let mut router = CommandRouter::new(Box::new(TestKernel::default()));
        let input = b"{\"command\": \"bo\xffgus\"}\n{\"command\": \"get_nets_list\"}";
        let mut output = Vec::new();
        serve(&mut router, &input[..], &mut output).unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["errorCode"], "INVALID_JSON");
        assert_eq!(responses[1]["errorCode"], "NO_BOARD_LOADED");
    }

    #[test]
    fn startup_failure_carries_the_cause() {
        let err =
            anyhow::anyhow!("/missing is not a directory").context("Invalid footprint library");
        let value = startup_failure(&err).to_value();
        assert_eq!(value["success"], false);
        assert_eq!(value["message"], "Failed to start pcb-edit");
        assert_eq!(
            value["errorDetails"],
            "Invalid footprint library: /missing is not a directory"
        );
    }
}
