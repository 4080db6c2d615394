use anyhow::{Context, Result};
use url::Url;

/// Builds the content-server links embedded in outgoing mail.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
  base: Url,
}

impl LinkBuilder {
  pub fn new(content_server_url: &str) -> Result<Self> {
    let base = Url::parse(content_server_url)
      .with_context(|| format!("invalid content server url: {}", content_server_url))?;
    if base.cannot_be_a_base() {
      anyhow::bail!("content server url cannot be a base: {}", content_server_url);
    }
    Ok(LinkBuilder { base })
  }

  /// Joins `path` onto the base url and appends every present query pair in order.
  pub fn link(&self, path: &str, query: &[(&str, Option<&str>)]) -> String {
    let mut url = self.base.clone();
    {
      let base_path = url.path().trim_end_matches('/').to_string();
      url.set_path(&format!("{}/{}", base_path, path.trim_start_matches('/')));
    }

    let present: Vec<(&str, &str)> = query
      .iter()
      .filter_map(|(key, value)| value.map(|value| (*key, value)))
      .collect();
    if !present.is_empty() {
      url.query_pairs_mut().extend_pairs(present);
    }

    url.to_string()
  }
}
