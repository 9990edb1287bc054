//! Documentation UI pages for the generated API document.
//!
//! Pages are small HTML shells rendered with `minijinja` that load the UI
//! bundle from a CDN and point it at the served document.

use crate::error::ContractError;
use minijinja::Environment;
use serde_json::json;

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{{ title }}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({ url: "{{ spec_url }}", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

const REDOC: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{{ title }}</title>
</head>
<body>
  <redoc spec-url="{{ spec_url }}"></redoc>
  <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
</body>
</html>
"#;

const RAPIDOC: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{{ title }}</title>
  <script type="module" src="https://unpkg.com/rapidoc/dist/rapidoc-min.js"></script>
</head>
<body>
  <rapi-doc spec-url="{{ spec_url }}" render-style="read"></rapi-doc>
</body>
</html>
"#;

/// Which documentation UI to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocUi {
    #[default]
    SwaggerUi,
    Redoc,
    RapiDoc,
}

impl DocUi {
    fn template(self) -> &'static str {
        match self {
            DocUi::SwaggerUi => SWAGGER_UI,
            DocUi::Redoc => REDOC,
            DocUi::RapiDoc => RAPIDOC,
        }
    }

    /// Render the page.
    ///
    /// # Arguments
    ///
    /// * `title` - Page title, usually the document's `info.title`
    /// * `spec_url` - URL the UI fetches the document from
    ///
    /// # Errors
    ///
    /// [`ContractError::Template`] when rendering fails.
    pub fn render(self, title: &str, spec_url: &str) -> Result<String, ContractError> {
        let mut env = Environment::new();
        env.add_template("page", self.template())
            .map_err(|e| ContractError::Template(e.to_string()))?;
        let tmpl = env
            .get_template("page")
            .map_err(|e| ContractError::Template(e.to_string()))?;
        tmpl.render(json!({ "title": title, "spec_url": spec_url }))
            .map_err(|e| ContractError::Template(e.to_string()))
    }
}
