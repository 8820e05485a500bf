//! Reclassification rules from TOML files or the built-in CDL presets
//!
//! ```toml
//! no_data = 0
//!
//! [[class]]
//! low = 1.0
//! high = 59.5
//! code = 1
//! ```

use anyhow::{bail, Context, Result};
use gwpump_algorithms::imagery::{presets, ClassRule, ClassificationRule};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    no_data: Option<f64>,
    #[serde(rename = "class", default)]
    classes: Vec<ClassRule>,
}

/// Validated rules plus the no-data code they were declared with
#[derive(Debug)]
pub struct LoadedRules {
    pub rules: ClassificationRule,
    pub no_data: f64,
}

pub fn parse_rules(text: &str) -> Result<LoadedRules> {
    let file: RuleFile = toml::from_str(text).context("Invalid rule file")?;
    let rules = ClassificationRule::new(file.classes).context("Invalid class rule")?;
    Ok(LoadedRules {
        rules,
        no_data: file.no_data.unwrap_or(presets::CDL_NO_DATA),
    })
}

pub fn load_rules(path: &Path) -> Result<LoadedRules> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))?;
    parse_rules(&text).with_context(|| format!("In {}", path.display()))
}

pub fn preset(name: &str) -> Result<LoadedRules> {
    let rules = match name.to_lowercase().as_str() {
        "arizona" | "az" => presets::cdl_arizona(),
        "kansas" | "ks" => presets::cdl_kansas(),
        _ => bail!("Unknown preset: {}. Use: arizona, kansas", name),
    };
    Ok(LoadedRules {
        rules,
        no_data: presets::CDL_NO_DATA,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules_in_file_order() {
        let loaded = parse_rules(
            r#"
            no_data = -1

            [[class]]
            low = 61.0
            high = 120.7
            code = 999

            [[class]]
            low = 0.3
            high = 1.0
            code = 60
            "#,
        )
        .unwrap();

        assert_eq!(loaded.no_data, -1.0);
        assert_eq!(loaded.rules.len(), 2);
        assert_eq!(loaded.rules.rules()[0], ClassRule::new(61.0, 120.7, 999.0));
        assert_eq!(loaded.rules.classify(1.0), Some(60.0));
    }

    #[test]
    fn test_no_data_defaults_to_background() {
        let loaded = parse_rules("[[class]]\nlow = 0\nhigh = 1\ncode = 5\n").unwrap();
        assert_eq!(loaded.no_data, 0.0);
    }

    #[test]
    fn test_inverted_rule_is_rejected() {
        let err = parse_rules("[[class]]\nlow = 5\nhigh = 1\ncode = 2\n").unwrap_err();
        assert!(format!("{err:#}").contains("Invalid class rule"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(parse_rules("nodata = 0\n").is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(preset("Kansas").unwrap().rules.len(), 9);
        assert_eq!(preset("az").unwrap().rules.len(), 8);
        assert!(preset("nebraska").is_err());
    }

    #[test]
    fn test_load_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "[[class]]\nlow = 0\nhigh = 10\ncode = 1\n").unwrap();
        assert_eq!(load_rules(&path).unwrap().rules.len(), 1);
        assert!(load_rules(&dir.path().join("missing.toml")).is_err());
    }
}
