use crate::error::FetchError;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPLATE_API_URL: &str = "https://api.imgflip.com/get_memes";
pub const NO_TEMPLATES_MESSAGE: &str = "No memes available. Please try again later.";

/// A template image as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub url: String,
    pub name: String,
}

pub trait TemplateProvider {
    fn fetch(&self) -> Result<Vec<TemplateRef>, FetchError>;
}

#[derive(Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Deserialize)]
struct ApiData {
    memes: Vec<TemplateRef>,
}

/// Decode a `{ success, data: { memes: [...] } }` payload.
pub fn parse_response(body: &str) -> Result<Vec<TemplateRef>, FetchError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if !response.success {
        return Err(FetchError::Unsuccessful);
    }
    response
        .data
        .map(|data| data.memes)
        .ok_or_else(|| FetchError::Decode("successful response without `data`".into()))
}

/// Blocking client for the imgflip-style listing endpoint.
pub struct ImgflipProvider {
    client: Client,
    url: String,
}

impl ImgflipProvider {
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent("meme-composer template fetcher")
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TemplateProvider for ImgflipProvider {
    fn fetch(&self) -> Result<Vec<TemplateRef>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let templates = parse_response(&body)?;
        tracing::debug!(url = %self.url, count = templates.len(), "fetched templates");
        Ok(templates)
    }
}

/// Templates available to the session. Loading never fails; a fetch error
/// leaves the catalog empty and is kept for a retry affordance.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<TemplateRef>,
    last_error: Option<String>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<TemplateRef>) -> Self {
        Self {
            templates,
            last_error: None,
        }
    }

    pub fn load(provider: &dyn TemplateProvider) -> Self {
        match provider.fetch() {
            Ok(templates) => Self::new(templates),
            Err(e) => {
                tracing::error!("failed to fetch templates: {e}");
                Self {
                    templates: Vec::new(),
                    last_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn templates(&self) -> &[TemplateRef] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn find(&self, id: &str) -> Option<&TemplateRef> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&TemplateRef> {
        self.templates.choose(rng)
    }
}
