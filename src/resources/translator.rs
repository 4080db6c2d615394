use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use async_trait::async_trait;

use super::LoadError;

/// Messages for one language, keyed by msgid.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  language: String,
  messages: HashMap<String, String>,
}

impl Catalog {
  pub fn new(language: impl Into<String>, messages: HashMap<String, String>) -> Self {
    Catalog {
      language: language.into(),
      messages,
    }
  }

  pub fn language(&self) -> &str {
    &self.language
  }

  pub fn gettext<'a>(&'a self, msgid: &'a str) -> &'a str {
    self.messages.get(msgid).map(String::as_str).unwrap_or(msgid)
  }
}

#[derive(Debug, Clone)]
pub struct Translator {
  default_language: String,
  catalogs: HashMap<String, Catalog>,
}

impl Translator {
  /// Fails when the default language has no catalog.
  pub fn new(default_language: &str, catalogs: Vec<Catalog>) -> Result<Self, LoadError> {
    let catalogs: HashMap<String, Catalog> = catalogs
      .into_iter()
      .map(|catalog| (catalog.language.to_lowercase(), catalog))
      .collect();

    let default_language = default_language.to_lowercase();
    if !catalogs.contains_key(&default_language) {
      return Err(LoadError::Translations(format!(
        "no catalog for default language {}",
        default_language
      )));
    }

    Ok(Translator {
      default_language,
      catalogs,
    })
  }

  pub fn languages(&self) -> Vec<&str> {
    let mut languages: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
    languages.sort_unstable();
    languages
  }

  pub fn default_catalog(&self) -> &Catalog {
    &self.catalogs[&self.default_language]
  }

  /// Picks the catalog that best matches an `Accept-Language` header value.
  pub fn negotiate(&self, accept_language: Option<&str>) -> &Catalog {
    let Some(header) = accept_language else {
      return self.default_catalog();
    };

    for tag in parse_accept_language(header) {
      if tag == "*" {
        break;
      }
      if let Some(catalog) = self.catalogs.get(&tag) {
        return catalog;
      }
      if let Some((primary, _)) = tag.split_once('-') {
        if let Some(catalog) = self.catalogs.get(primary) {
          return catalog;
        }
      }
    }

    self.default_catalog()
  }
}

/// Language tags ordered by descending quality; tags with `q=0` are dropped.
fn parse_accept_language(header: &str) -> Vec<String> {
  let mut weighted: Vec<(String, f32)> = header
    .split(',')
    .filter_map(|entry| {
      let mut parts = entry.split(';');
      let tag = parts.next()?.trim().to_lowercase().replace('_', "-");
      if tag.is_empty() {
        return None;
      }
      let quality = parts
        .filter_map(|param| param.trim().strip_prefix("q="))
        .find_map(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0);
      (quality > 0.0).then_some((tag, quality))
    })
    .collect();

  // stable sort keeps header order among equal weights
  weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
  weighted.into_iter().map(|(tag, _)| tag).collect()
}

#[async_trait]
pub trait TranslatorLoader: Send + Sync {
  async fn load(&self, supported_languages: &[String], default_language: &str) -> Result<Translator, LoadError>;
}

/// Reads `<dir>/<language>.json` catalogs, each a flat msgid to translation object.
pub struct FsTranslatorLoader {
  dir: PathBuf,
}

impl FsTranslatorLoader {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    FsTranslatorLoader { dir: dir.into() }
  }

  async fn read_catalog(&self, language: &str) -> Result<Option<Catalog>, LoadError> {
    let path = self.dir.join(format!("{}.json", language));
    let raw = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(io_error(&path, e)),
    };

    let messages: HashMap<String, String> = serde_json::from_str(&raw)
      .map_err(|e| LoadError::Translations(format!("{}: {}", path.display(), e)))?;
    Ok(Some(Catalog::new(language, messages)))
  }
}

fn io_error(path: &Path, e: std::io::Error) -> LoadError {
  LoadError::Translations(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl TranslatorLoader for FsTranslatorLoader {
  async fn load(&self, supported_languages: &[String], default_language: &str) -> Result<Translator, LoadError> {
    let mut catalogs = Vec::with_capacity(supported_languages.len());
    for language in supported_languages {
      match self.read_catalog(language).await? {
        Some(catalog) => catalogs.push(catalog),
        None => tracing::warn!(language = %language, dir = %self.dir.display(), "missing translation catalog"),
      }
    }

    Translator::new(default_language, catalogs)
  }
}
