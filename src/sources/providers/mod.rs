// src/sources/providers/mod.rs
pub mod business_documents;
pub mod careers_page;
pub mod google_cse;
pub mod greenhouse;
pub mod serpapi_jobs;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{ScannerConfig, ENV_GOOGLE_API_KEY, ENV_GOOGLE_CSE_ID, ENV_SERPAPI_API_KEY};
use crate::sources::{SignalSource, SourceContext};

use self::business_documents::BusinessDocumentsSource;
use self::careers_page::CareersPageSource;
use self::google_cse::{CseAccess, GoogleCseSource};
use self::greenhouse::GreenhouseSource;
use self::serpapi_jobs::SerpApiJobsSource;

/// Credentials that switch optional connectors on.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub serpapi_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        fn non_empty(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        }
        Self {
            google_api_key: non_empty(ENV_GOOGLE_API_KEY),
            google_cse_id: non_empty(ENV_GOOGLE_CSE_ID),
            serpapi_api_key: non_empty(ENV_SERPAPI_API_KEY),
        }
    }
}

/// The connector set for a scan. Greenhouse, careers pages and business documents
/// always run; Google CSE needs a CSE id (the API key is optional) and SerpApi needs
/// its key.
pub fn default_sources(
    config: Arc<ScannerConfig>,
    creds: &Credentials,
) -> Result<Vec<Box<dyn SignalSource>>> {
    let ctx = SourceContext::new(config)?;
    let mut out: Vec<Box<dyn SignalSource>> = vec![Box::new(GreenhouseSource::new(ctx.clone()))];

    match &creds.serpapi_api_key {
        Some(key) => out.push(Box::new(SerpApiJobsSource::new(ctx.clone(), key.clone()))),
        None => tracing::warn!("{ENV_SERPAPI_API_KEY} not set, skipping job search"),
    }

    match (&creds.google_api_key, &creds.google_cse_id) {
        (Some(api_key), Some(cse_id)) => out.push(Box::new(GoogleCseSource::new(
            ctx.clone(),
            CseAccess::Api {
                api_key: api_key.clone(),
                cse_id: cse_id.clone(),
            },
        ))),
        (None, Some(cse_id)) => out.push(Box::new(GoogleCseSource::new(
            ctx.clone(),
            CseAccess::PublicPage {
                cse_id: cse_id.clone(),
            },
        ))),
        _ => tracing::warn!("{ENV_GOOGLE_CSE_ID} not set, skipping google search"),
    }

    let mut careers = CareersPageSource::new(ctx.clone());
    if let (Some(key), Some(cx)) = (&creds.google_api_key, &creds.google_cse_id) {
        careers = careers.with_website_search(key.clone(), cx.clone());
    }
    out.push(Box::new(careers));

    let mut docs = BusinessDocumentsSource::new(ctx);
    if let Some(cx) = &creds.google_cse_id {
        docs = docs.with_cse_id(cx.clone());
    }
    out.push(Box::new(docs));

    tracing::info!(
        sources = ?out.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "configured signal sources"
    );
    Ok(out)
}
