//! Signed HTTP plumbing shared by every API operation.
//!
//! Every call except login carries the three signing query parameters; every
//! call after login carries the bearer token. Non-success statuses surface as
//! [`Error::Transfer`] with the operation and response body for diagnostics.

use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use transfertpro_protocol::TokenResponse;

use crate::{Client, Error};

impl Client {
    /// Performs the `POST /Token` login exchange and stores the result.
    pub(crate) async fn login(&mut self) -> Result<(), Error> {
        let url = format!("{}/Token", self.endpoints.api);
        let form = [
            ("grant_type", "password"),
            ("username", self.session.user()),
            ("password", self.session.password()),
        ];
        let resp = self.http.post(&url).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Authentication {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                status: status.as_u16(),
                body: format!("malformed token response: {e}"),
            })?;
        let expires_at = parse_expiry(&token.expires);
        if expires_at.is_none() {
            warn!(expires = %token.expires, "unparseable token expiry, token will not refresh early");
        }
        self.session.store_token(token.access_token, expires_at);
        debug!(url = %url, "connected");
        Ok(())
    }

    /// Re-logs in when the token is absent or inside the expiry margin.
    pub(crate) async fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.session.needs_login() {
            if self.session.user().is_empty() {
                return Err(Error::Validation(
                    "not connected: call connect() first".into(),
                ));
            }
            self.login().await?;
        }
        Ok(())
    }

    pub(crate) async fn api_get<T: DeserializeOwned>(&mut self, operation: &str) -> Result<T, Error> {
        let body = self.api_call(Method::GET, operation, None::<&()>).await?;
        serde_json::from_str(&body).map_err(|e| Error::Transfer {
            context: format!("GET {operation}: malformed response: {e}"),
            status: None,
            body,
        })
    }

    pub(crate) async fn api_post<B: Serialize>(
        &mut self,
        operation: &str,
        body: &B,
    ) -> Result<(), Error> {
        self.api_call(Method::POST, operation, Some(body)).await?;
        Ok(())
    }

    pub(crate) async fn api_delete(&mut self, operation: &str) -> Result<(), Error> {
        self.api_call(Method::DELETE, operation, None::<&()>).await?;
        Ok(())
    }

    /// Issues one signed API call and returns the response body.
    async fn api_call<B: Serialize>(
        &mut self,
        method: Method,
        operation: &str,
        json: Option<&B>,
    ) -> Result<String, Error> {
        self.ensure_connected().await?;
        let url = format!("{}{}", self.endpoints.api, operation);
        let params = self.session.sign_request();
        let started = Instant::now();

        let mut req = self.http.request(method.clone(), &url).query(&params);
        req = self.authorize(req);
        if let Some(body) = json {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(
            %method,
            operation,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api call"
        );
        if !status.is_success() {
            return Err(Error::Transfer {
                context: format!("{method} {operation} returned status {status}"),
                status: Some(status.as_u16()),
                body,
            });
        }
        Ok(body)
    }

    /// Adds the bearer header once authenticated.
    pub(crate) fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.token() {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }
}

/// Parses the vendor's `.expires` stamp.
///
/// The service emits .NET-style HTTP dates, so RFC 2822 is accepted next to
/// RFC 3339.
pub(crate) fn parse_expiry(stamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(stamp)
        .or_else(|_| DateTime::parse_from_rfc2822(stamp))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
