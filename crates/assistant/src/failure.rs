//! User-facing descriptions of provider failures.
//!
//! Provider errors never reach the caller as errors: each class becomes a
//! reply that tells the user what went wrong and what to do about it.

use rb_domain::error::Error;

/// Reply text for a failed provider call.
pub fn describe_provider_failure(err: &Error) -> String {
    match err {
        Error::Auth(detail) => format!(
            "[API Key Error] The configured API key is invalid, expired or revoked. \
             Please provide a valid key in the assistant settings. Details: {detail}"
        ),
        Error::Unavailable(detail) => format!(
            "[Server Error] The language model service is experiencing an outage. \
             Please retry your query after a brief wait. Details: {detail}"
        ),
        Error::Provider { message, .. } => format!(
            "[Server Error] The language model service returned a temporary error. \
             Please retry your query after a brief wait. Details: {message}"
        ),
        Error::Http(detail) => format!(
            "[Connection Error] The language model service could not be reached. Please check \
             network settings, proxy configuration, SSL certificates or firewall rules. Details: {detail}"
        ),
        Error::RateLimited(detail) => format!(
            "[Rate Limit Error] The request rate limit has been reached. \
             Please send queries less frequently. Details: {detail}"
        ),
        Error::Timeout(detail) => format!(
            "[Request Timeout] The query timed out, please retry after a brief wait. Details: {detail}"
        ),
        Error::InvalidRequest(detail) if detail.contains("reduce") => format!(
            "[Token Limit Warning] {detail} Alternatively choose a model with a larger context \
             window. To release token usage, reset the conversation to clear the message history."
        ),
        _ => "[Query Fails] Your query cannot be processed by this version of the assistant, \
              please contact your administrator."
            .into(),
    }
}
