use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::config::InstallConfig;

/// Shared client for every remote fetch of an installation.
pub fn build_http_client(config: &InstallConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(format!(
            "{}/{}",
            config.launcher_name, config.launcher_version
        ))
        .default_headers(default_headers)
        .connect_timeout(Duration::from_secs(config.network_timeout_secs))
        .read_timeout(Duration::from_secs(config.network_timeout_secs))
        .build()
}
