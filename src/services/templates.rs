//! Template Matcher
//!
//! Serves canned responses for common requests without contacting the
//! backend. Patterns are case-insensitive regexes matched against the latest
//! user message; the first template with a matching pattern wins.

use regex::{Regex, RegexBuilder};
use tracing::{info, warn};

use crate::models::settings::TemplateSpec;

struct CompiledTemplate {
    name: String,
    patterns: Vec<Regex>,
    body: String,
}

/// Matches user text against a fixed template set.
pub struct TemplateMatcher {
    templates: Vec<CompiledTemplate>,
}

impl TemplateMatcher {
    /// Compile a template set. Patterns that fail to compile are skipped.
    pub fn new(specs: &[TemplateSpec]) -> Self {
        let templates = specs
            .iter()
            .map(|spec| CompiledTemplate {
                name: spec.name.clone(),
                patterns: spec
                    .patterns
                    .iter()
                    .filter_map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| {
                                warn!(
                                    "[TemplateMatcher] Skipping pattern '{}' of '{}': {}",
                                    p, spec.name, e
                                )
                            })
                            .ok()
                    })
                    .collect(),
                body: spec.body.clone(),
            })
            .collect();
        Self { templates }
    }

    /// Configured templates, or the built-in set when none are configured.
    pub fn from_config(specs: &[TemplateSpec]) -> Self {
        if specs.is_empty() {
            Self::new(&default_templates())
        } else {
            Self::new(specs)
        }
    }

    /// A matcher that never matches.
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Client-facing response for the first matching template.
    pub fn match_text(&self, latest_user_text: &str) -> Option<String> {
        let text = latest_user_text.trim();
        if text.is_empty() {
            return None;
        }
        let template = self
            .templates
            .iter()
            .find(|t| t.patterns.iter().any(|re| re.is_match(text)))?;
        info!("[TemplateMatcher] Matched template '{}'", template.name);
        Some(format!("Here's what you asked for:\n\n{}", template.body))
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(&default_templates())
    }
}

/// Built-in templates for boilerplate requests.
pub fn default_templates() -> Vec<TemplateSpec> {
    vec![
        TemplateSpec {
            name: "html_page".to_string(),
            patterns: vec![
                r"^(create|make|give me) (a |an )?(basic |simple |blank )?html (page|boilerplate|template)$".to_string(),
            ],
            body: HTML_PAGE.to_string(),
        },
        TemplateSpec {
            name: "rust_hello_world".to_string(),
            patterns: vec![r"^(write |show me )?(a )?hello world (program )?in rust$".to_string()],
            body: RUST_HELLO.to_string(),
        },
        TemplateSpec {
            name: "python_hello_world".to_string(),
            patterns: vec![r"^(write |show me )?(a )?hello world (program )?in python$".to_string()],
            body: PYTHON_HELLO.to_string(),
        },
    ]
}

const HTML_PAGE: &str = r#"```html
<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Page</title>
</head>
<body>
  <h1>Hello</h1>
</body>
</html>
```"#;

const RUST_HELLO: &str = r#"```rust
fn main() {
    println!("Hello, world!");
}
```"#;

const PYTHON_HELLO: &str = r#"```python
print("Hello, world!")
```"#;
