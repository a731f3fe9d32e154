// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use capview_app::DetailView;
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Blocking client for the capture server's JSON endpoints.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }

        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("parse server.base_url {trimmed:?}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "server.base_url {trimmed:?} must use http or https, got {}",
                base_url.scheme()
            );
        }
        if base_url.cannot_be_a_base() {
            bail!("server.base_url {trimmed:?} cannot carry a path");
        }

        // The delete route answers with a redirect back to the HTML gallery;
        // the redirect itself is the success signal.
        let http = HttpClient::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET /captures/view/{file_name}`, rendered as an image pointing at the
    /// returned `fullpath`.
    pub fn view_capture(&self, file_name: &str) -> Result<DetailView> {
        let url = self.capture_url(&["captures", "view"], file_name)?;
        debug!(%url, "requesting capture detail");

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ViewResponse = response
            .json()
            .with_context(|| format!("decode detail response for {file_name:?}"))?;
        if parsed.fullpath.trim().is_empty() {
            bail!("server returned an empty fullpath for {file_name:?}");
        }

        Ok(DetailView {
            file_name: file_name.to_owned(),
            src: parsed.fullpath,
        })
    }

    /// `POST /captures/delete/{file_name}`.
    pub fn delete_capture(&self, file_name: &str) -> Result<()> {
        let url = self.capture_url(&["captures", "delete"], file_name)?;
        debug!(%url, "deleting capture");

        let response = self
            .http
            .post(url)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(clean_error_response(status, &body))
    }

    fn capture_url(&self, route: &[&str], file_name: &str) -> Result<Url> {
        if file_name.is_empty() {
            bail!("capture file name must not be empty");
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("server.base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(route)
            .push(file_name);
        Ok(url)
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "capture server {base_url} timed out -- raise [server].timeout or check the camera's load"
        );
    }
    anyhow!(
        "cannot reach capture server {base_url} -- check that it is running and [server].base_url is right ({error})"
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains(['{', '<']) {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    fullpath: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
}
