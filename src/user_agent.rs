//! User-Agent string shared by the REST host client and the attachment fetcher.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/attachment-bundler";

/// Default User-Agent for every outgoing request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("attachment-bundler/{version} (+{PROJECT_UA_URL})")
}
