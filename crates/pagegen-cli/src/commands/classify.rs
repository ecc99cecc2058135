use std::sync::Arc;

use anyhow::Result;
use pagegen_core::{Config, PathClassifier, Registry};

/// Print the intent for `path` as JSON.
pub fn classify(config: &Config, path: &str) -> Result<()> {
    let classifier = PathClassifier::new(Arc::new(Registry::new()), config.site.year);
    let intent = classifier.classify(path)?;

    let mut value = serde_json::to_value(&intent)?;
    value["template"] = intent.template().into();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
