use crate::error::LoadError;
use crate::meme::compress::decode_data_url;
use image::RgbaImage;
use reqwest::blocking::Client;
use std::path::PathBuf;
use url::Url;

/// How cross-origin template images are requested and drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossOriginPolicy {
    /// Request images in CORS mode so approved responses stay readable.
    pub use_cors: bool,
    /// Draw images that are not origin-clean anyway. This taints the canvas
    /// and makes the final read-back fail.
    pub allow_taint: bool,
}

impl Default for CrossOriginPolicy {
    fn default() -> Self {
        Self {
            use_cors: true,
            allow_taint: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub pixels: RgbaImage,
    /// Pixel data may be read back after drawing.
    pub origin_clean: bool,
}

pub trait ImageLoader {
    fn load(&self, url: &str, policy: CrossOriginPolicy) -> Result<LoadedImage, LoadError>;
}

/// Loads `http(s)://` over the network, `data:` URLs inline and everything
/// else from disk.
pub struct DefaultImageLoader {
    client: Client,
}

impl DefaultImageLoader {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent("meme-composer image loader")
            .build()?;
        Ok(Self { client })
    }

    fn load_http(&self, url: &str, policy: CrossOriginPolicy) -> Result<LoadedImage, LoadError> {
        let fetch_err = |reason: String| LoadError::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut request = self.client.get(url);
        if policy.use_cors {
            request = request.header(reqwest::header::ORIGIN, "null");
        }
        let response = request.send().map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(format!("status {}", response.status())));
        }

        let cors_approved = response
            .headers()
            .contains_key(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN);
        let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
        let pixels = decode(url, &bytes)?;

        Ok(LoadedImage {
            pixels,
            origin_clean: policy.use_cors && cors_approved,
        })
    }

    fn load_file(&self, url: &str) -> Result<LoadedImage, LoadError> {
        let path = match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => {
                parsed.to_file_path().map_err(|_| LoadError::Read {
                    path: url.to_string(),
                    reason: "not a local file URL".into(),
                })?
            }
            _ => PathBuf::from(url),
        };

        let bytes = std::fs::read(&path).map_err(|e| LoadError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(LoadedImage {
            pixels: decode(url, &bytes)?,
            origin_clean: true,
        })
    }
}

impl ImageLoader for DefaultImageLoader {
    fn load(&self, url: &str, policy: CrossOriginPolicy) -> Result<LoadedImage, LoadError> {
        if url.starts_with("data:") {
            let (bytes, _mime) = decode_data_url(url).map_err(|reason| LoadError::Decode {
                url: truncate(url),
                reason,
            })?;
            return Ok(LoadedImage {
                pixels: decode(url, &bytes)?,
                origin_clean: true,
            });
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return self.load_http(url, policy);
        }

        self.load_file(url)
    }
}

fn decode(url: &str, bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| LoadError::Decode {
            url: truncate(url),
            reason: e.to_string(),
        })
}

fn truncate(url: &str) -> String {
    const MAX: usize = 64;
    if url.len() <= MAX {
        return url.to_string();
    }
    let mut end = MAX;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &url[..end])
}
