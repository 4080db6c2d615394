use std::{
  collections::{BTreeMap, HashMap},
  path::PathBuf,
  sync::OnceLock,
};

use async_trait::async_trait;
use regex::Regex;

use super::{translator::Catalog, LoadError};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
  Literal(String),
  Variable(String),
  Translate(String),
}

fn placeholder() -> &'static Regex {
  static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
  PLACEHOLDER.get_or_init(|| {
    Regex::new(r#"\{\{\s*(?:t\s+"([^"]*)"|([A-Za-z_][A-Za-z0-9_]*))\s*\}\}"#).expect("valid placeholder pattern")
  })
}

/// A template body split into literal text, `{{ name }}` variables and
/// `{{ t "msgid" }}` translated strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
  segments: Vec<Segment>,
}

impl Template {
  pub fn compile(source: &str) -> Self {
    let mut segments = Vec::new();
    let mut last = 0;

    for captures in placeholder().captures_iter(source) {
      let Some(whole) = captures.get(0) else { continue };
      if whole.start() > last {
        segments.push(Segment::Literal(source[last..whole.start()].to_string()));
      }
      if let Some(msgid) = captures.get(1) {
        segments.push(Segment::Translate(msgid.as_str().to_string()));
      } else if let Some(name) = captures.get(2) {
        segments.push(Segment::Variable(name.as_str().to_string()));
      }
      last = whole.end();
    }
    if last < source.len() {
      segments.push(Segment::Literal(source[last..].to_string()));
    }

    Template { segments }
  }

  /// Unknown variables render as empty text.
  pub fn render(&self, catalog: &Catalog, vars: &HashMap<&str, String>) -> String {
    let mut out = String::new();
    for segment in &self.segments {
      match segment {
        Segment::Literal(text) => out.push_str(text),
        Segment::Variable(name) => {
          if let Some(value) = vars.get(name.as_str()) {
            out.push_str(value);
          }
        }
        Segment::Translate(msgid) => out.push_str(catalog.gettext(msgid)),
      }
    }
    out
  }
}

#[derive(Debug, Clone)]
pub struct MailTemplate {
  pub text: Template,
  pub html: Option<Template>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
  templates: BTreeMap<String, MailTemplate>,
}

impl TemplateSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, text: &str, html: Option<&str>) {
    self.templates.insert(
      name.into(),
      MailTemplate {
        text: Template::compile(text),
        html: html.map(Template::compile),
      },
    );
  }

  pub fn get(&self, name: &str) -> Option<&MailTemplate> {
    self.templates.get(name)
  }

  pub fn names(&self) -> Vec<&str> {
    self.templates.keys().map(String::as_str).collect()
  }
}

#[async_trait]
pub trait TemplateLoader: Send + Sync {
  async fn load(&self) -> Result<TemplateSet, LoadError>;
}

/// Loads `<name>.txt` bodies and their optional `<name>.html` alternatives.
pub struct FsTemplateLoader {
  dir: PathBuf,
}

impl FsTemplateLoader {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    FsTemplateLoader { dir: dir.into() }
  }
}

#[async_trait]
impl TemplateLoader for FsTemplateLoader {
  async fn load(&self) -> Result<TemplateSet, LoadError> {
    let templates_error = |e: std::io::Error| LoadError::Templates(format!("{}: {}", self.dir.display(), e));

    let mut texts = BTreeMap::new();
    let mut htmls = HashMap::new();
    let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(templates_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(templates_error)? {
      let path = entry.path();
      let (Some(stem), Some(extension)) = (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
      ) else {
        continue;
      };

      if extension != "txt" && extension != "html" {
        continue;
      }

      let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| LoadError::Templates(format!("{}: {}", path.display(), e)))?;
      if extension == "txt" {
        texts.insert(stem.to_string(), source);
      } else {
        htmls.insert(stem.to_string(), source);
      }
    }

    let mut set = TemplateSet::new();
    for (name, text) in texts {
      let html = htmls.remove(&name);
      set.insert(name, &text, html.as_deref());
    }
    for name in htmls.keys() {
      tracing::warn!(template = %name, "html template without text counterpart ignored");
    }

    Ok(set)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn catalog() -> Catalog {
    Catalog::new(
      "de",
      HashMap::from([("Verify your email".to_string(), "E-Mail bestätigen".to_string())]),
    )
  }

  #[test]
  fn test_render_substitutes_variables_and_translations() {
    let template = Template::compile("{{ t \"Verify your email\" }}: {{link}} ({{ email }})");
    let vars = HashMap::from([
      ("link", "https://example.com/v".to_string()),
      ("email", "a@b.com".to_string()),
    ]);

    assert_eq!(
      template.render(&catalog(), &vars),
      "E-Mail bestätigen: https://example.com/v (a@b.com)"
    );
  }

  #[test]
  fn test_render_unknown_variable_is_empty() {
    let template = Template::compile("Hi {{name}}!");
    assert_eq!(template.render(&catalog(), &HashMap::new()), "Hi !");
  }

  #[test]
  fn test_compile_keeps_text_without_placeholders() {
    let template = Template::compile("plain { text } }}");
    assert_eq!(template.render(&catalog(), &HashMap::new()), "plain { text } }}");
  }

  #[test]
  fn test_untranslated_msgid_renders_itself() {
    let template = Template::compile("{{ t \"Thanks\" }}");
    assert_eq!(template.render(&catalog(), &HashMap::new()), "Thanks");
  }

  #[tokio::test]
  async fn test_fs_loader_pairs_text_and_html() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("verifyEmail.txt"), "text {{link}}").expect("write txt");
    std::fs::write(dir.path().join("verifyEmail.html"), "<a href=\"{{link}}\">x</a>").expect("write html");
    std::fs::write(dir.path().join("unlockEmail.txt"), "unlock").expect("write txt");
    std::fs::write(dir.path().join("README.md"), "ignored").expect("write md");

    let set = FsTemplateLoader::new(dir.path()).load().await.expect("load");

    assert_eq!(set.names(), vec!["unlockEmail", "verifyEmail"]);
    assert!(set.get("verifyEmail").and_then(|t| t.html.as_ref()).is_some());
    assert!(set.get("unlockEmail").and_then(|t| t.html.as_ref()).is_none());
  }

  #[tokio::test]
  async fn test_fs_loader_fails_for_missing_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = FsTemplateLoader::new(dir.path().join("missing")).load().await;
    assert!(matches!(result, Err(LoadError::Templates(_))));
  }
}
