//! freebusy-handler - one-shot adapter for the free/busy pipeline
//!
//! Reads one JSON request per line on stdin:
//!   {"method": "GET", "query": {"start": "...", "end": "..."}}
//! and writes one JSON response per line on stdout:
//!   {"status": 200, "body": {"busy": [...]}}
//!
//! Event records stay cached across requests for as long as the process lives.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use tracing::{error, warn};

use freebusy_core::protocol::{ErrorBody, Request, Response, STATUS_BAD_REQUEST, handle_request};
use freebusy_server::config::Config;
use freebusy_server::state::AppState;
use freebusy_server::telemetry::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load()?;
    let state = AppState::from_config(&config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(state.freebusy(), &request).await,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::error(
                    STATUS_BAD_REQUEST,
                    ErrorBody::new(format!("Failed to parse request: {}", e)),
                )
            }
        };

        write_response(&mut stdout, &response)?;
    }

    Ok(())
}

fn write_response(out: &mut impl Write, response: &Response) -> Result<()> {
    let line = serde_json::to_string(response).context("Failed to serialize response")?;
    writeln!(out, "{}", line).context("Failed to write response")?;
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
