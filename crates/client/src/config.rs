//! Tenant selection and service base URLs.
//!
//! TransfertPro exposes three surfaces per tenant: the JSON API, the
//! download server, and the upload (chunk) server.

/// TransfertPro hosting tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tenant {
    /// Regular hosting (`ext.transfertpro.com`).
    #[default]
    Default,
    /// French health-data hosting (`ext-sante.transfertpro.com`).
    Hds,
}

/// Base URLs for the three service surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub download: String,
    pub upload: String,
}

impl Endpoints {
    /// Production endpoints for `tenant`.
    pub fn for_tenant(tenant: Tenant) -> Self {
        match tenant {
            Tenant::Default => Self::custom(
                "https://ext.transfertpro.com",
                "https://dl.transfertpro.com",
                "https://up.transfertpro.com",
            ),
            Tenant::Hds => Self::custom(
                "https://ext-sante.transfertpro.com",
                "https://dl-sante.transfertpro.com",
                "https://up-sante.transfertpro.com",
            ),
        }
    }

    /// Explicit base URLs (staging environments, tests).
    pub fn custom(
        api: impl Into<String>,
        download: impl Into<String>,
        upload: impl Into<String>,
    ) -> Self {
        Self {
            api: api.into(),
            download: download.into(),
            upload: upload.into(),
        }
    }
}
