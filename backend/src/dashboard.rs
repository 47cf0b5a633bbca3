use std::path::Path;

use crate::config::FirebaseConfig;

pub const CONFIG_PLACEHOLDER: &str = "{{ firebase_config }}";

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/dashboard.html");

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Template has no firebase_config placeholder")]
    MissingPlaceholder,
    #[error("Failed to serialize Firebase config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Dashboard page with the Firebase client config baked in. Rendered once,
/// since the environment does not change after startup.
#[derive(Debug, Clone)]
pub struct Dashboard {
    page: String,
}

impl Dashboard {
    pub fn render(template: &str, firebase: &FirebaseConfig) -> Result<Self, DashboardError> {
        if !template.contains(CONFIG_PLACEHOLDER) {
            return Err(DashboardError::MissingPlaceholder);
        }
        // the config lands inside a <script> block
        let config_json = serde_json::to_string(firebase)?.replace("</", "<\\/");
        Ok(Self {
            page: template.replace(CONFIG_PLACEHOLDER, &config_json),
        })
    }

    /// Renders the template at `path`, falling back to the copy compiled
    /// into the binary when the file is missing or unusable.
    pub fn load(path: &Path, firebase: &FirebaseConfig) -> Result<Self, DashboardError> {
        match std::fs::read_to_string(path) {
            Ok(template) => match Self::render(&template, firebase) {
                Ok(dashboard) => return Ok(dashboard),
                Err(e) => log::warn!(
                    "Dashboard template {} unusable ({}), using built-in template",
                    path.display(),
                    e
                ),
            },
            Err(e) => log::warn!(
                "Dashboard template {} not readable ({}), using built-in template",
                path.display(),
                e
            ),
        }
        Self::render(BUILTIN_TEMPLATE, firebase)
    }

    pub fn page(&self) -> &str {
        &self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firebase() -> FirebaseConfig {
        FirebaseConfig {
            api_key: Some("abc".to_string()),
            database_url: Some("https://hydro.firebaseio.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn injects_config_as_json() {
        let dashboard =
            Dashboard::render("<script>const c = {{ firebase_config }};</script>", &firebase())
                .unwrap();
        assert!(dashboard.page().contains(r#""apiKey":"abc""#));
        assert!(dashboard.page().contains(r#""databaseURL":"https://hydro.firebaseio.com""#));
        assert!(dashboard.page().contains(r#""appId":null"#));
        assert!(!dashboard.page().contains(CONFIG_PLACEHOLDER));
    }

    #[test]
    fn script_terminators_in_values_are_escaped() {
        let config = FirebaseConfig {
            app_id: Some("</script><b>".to_string()),
            ..Default::default()
        };
        let dashboard = Dashboard::render("{{ firebase_config }}", &config).unwrap();
        assert!(!dashboard.page().contains("</script>"));
        assert!(dashboard.page().contains(r"<\/script>"));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        assert!(matches!(
            Dashboard::render("<html></html>", &firebase()),
            Err(DashboardError::MissingPlaceholder)
        ));
    }

    #[test]
    fn missing_template_falls_back_to_builtin() {
        let dashboard =
            Dashboard::load(Path::new("/nonexistent/dashboard.html"), &firebase()).unwrap();
        assert!(dashboard.page().contains("Hydroponic Monitor"));
        assert!(dashboard.page().contains(r#""apiKey":"abc""#));
    }
}
