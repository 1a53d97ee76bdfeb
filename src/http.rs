use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::{Error, Result};

/// Turn a response into its JSON body, mapping 429 to `RateLimited` and any
/// other non-2xx status to `Api` with the body text as the message.
pub(crate) async fn read_json(service: &'static str, resp: Response) -> Result<Value> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited { service });
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            service,
            status: status.as_u16(),
            message,
        });
    }
    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read a required, non-empty environment variable.
pub(crate) fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{name} is not set"))),
    }
}
