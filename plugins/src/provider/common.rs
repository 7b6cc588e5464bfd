//! Shared plumbing for inference provider callers: response-text
//! extraction, body previews for logs, and transport error mapping.

use prorab_core::api as core_api;
use serde_json::Value;

const BODY_PREVIEW_LIMIT: usize = 512;

/// Pull the completion text out of a provider response. Tolerates the two
/// envelopes we actually call (OpenAI chat completions and Gemini
/// generateContent) plus a bare top-level "text" field.
pub fn extract_completion_text(value: &Value) -> Option<String> {
    // OpenAI: choices[0].message.content
    if let Some(text) = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }
    // Gemini: candidates[0].content.parts[0].text
    if let Some(text) = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
    {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }
    None
}

pub fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

pub fn transport_error(err: reqwest::Error, url: &str) -> core_api::LlmError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_body() {
        "body"
    } else {
        "request"
    };
    core_api::LlmError::Transport(anyhow::anyhow!(
        "provider call failed kind={kind} url={url}: {err}"
    ))
}

/// Shared send loop: rotate through pool keys up to the retry ceiling,
/// marking health on the pool after every outcome. `display_url` is the
/// endpoint without any key material, safe for logs.
pub async fn call_with_rotation<F>(
    pool: &core_api::KeyPool,
    provider: core_api::Provider,
    display_url: &str,
    mut build: F,
) -> Result<String, core_api::LlmError>
where
    F: FnMut(&str) -> reqwest::RequestBuilder,
{
    let mut last_err: Option<core_api::LlmError> = None;
    let mut rate_limits = 0u32;

    for attempt in 1..=core_api::RETRY_CEILING {
        let key = pool.get_active_key(provider)?;

        let resp = match build(&key).send().await {
            Ok(r) => r,
            Err(err) => {
                pool.mark_failed(&key);
                tracing::warn!(
                    target: "prorab.llm",
                    stage = "provider.transport",
                    provider = %provider,
                    attempt,
                    url = %display_url,
                    error = %err,
                );
                last_err = Some(transport_error(err, display_url));
                continue;
            }
        };

        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(err) => {
                pool.mark_failed(&key);
                last_err = Some(transport_error(err, display_url));
                continue;
            }
        };

        if status == 429 {
            pool.mark_rate_limited(&key);
            rate_limits += 1;
            tracing::warn!(
                target: "prorab.llm",
                stage = "provider.rate_limited",
                provider = %provider,
                attempt,
            );
            last_err = Some(core_api::LlmError::RateLimited { attempts: attempt });
            continue;
        }

        if status == 401 || status == 403 {
            pool.mark_invalid(&key);
            tracing::error!(
                target: "prorab.llm",
                stage = "provider.key_rejected",
                provider = %provider,
                status,
            );
            last_err = Some(core_api::LlmError::RequestFailed {
                status,
                body: preview_body(&body),
            });
            continue;
        }

        if !(200..300).contains(&status) {
            pool.mark_failed(&key);
            last_err = Some(core_api::LlmError::RequestFailed {
                status,
                body: preview_body(&body),
            });
            continue;
        }

        let value: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(err) => {
                pool.mark_failed(&key);
                last_err = Some(core_api::LlmError::ParseFailed(format!(
                    "provider returned non-JSON body: {} | body={}",
                    err,
                    preview_body(&body)
                )));
                continue;
            }
        };

        match extract_completion_text(&value) {
            Some(text) => {
                pool.mark_success(&key);
                return Ok(text);
            }
            None => {
                // The HTTP call itself succeeded; an empty envelope is a
                // provider quirk, not a key problem, and retrying the same
                // prompt will not fill it in.
                pool.mark_success(&key);
                tracing::warn!(
                    target: "prorab.llm",
                    stage = "provider.empty_response",
                    provider = %provider,
                    body = %preview_body(&body),
                );
                return Err(core_api::LlmError::EmptyResponse);
            }
        }
    }

    if rate_limits >= core_api::RETRY_CEILING {
        return Err(core_api::LlmError::RateLimited {
            attempts: rate_limits,
        });
    }
    Err(last_err.unwrap_or(core_api::LlmError::KeyPoolExhausted { provider }))
}
