//! Translation catalogs and mail templates loaded once at startup.

pub mod templates;
pub mod translator;

use std::error::Error;

pub use templates::{FsTemplateLoader, MailTemplate, Template, TemplateLoader, TemplateSet};
pub use translator::{Catalog, FsTranslatorLoader, Translator, TranslatorLoader};

use crate::config::I18nConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
  Translations(String),
  Templates(String),
}

impl Error for LoadError {}

impl std::fmt::Display for LoadError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LoadError::Translations(msg) => write!(f, "Failed to load translations: {}", msg),
      LoadError::Templates(msg) => write!(f, "Failed to load templates: {}", msg),
    }
  }
}

/// Loads the translator and the template set concurrently.
///
/// Resolves to `(translator, templates)` once both loads succeed and fails
/// with the first error either load reports, without waiting for the other.
pub async fn load_resources(
  translations: &dyn TranslatorLoader,
  templates: &dyn TemplateLoader,
  i18n: &I18nConfig,
) -> Result<(Translator, TemplateSet), LoadError> {
  tokio::try_join!(
    translations.load(&i18n.supported_languages, &i18n.default_language),
    templates.load(),
  )
}
