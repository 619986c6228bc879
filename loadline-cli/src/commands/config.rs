//! `loadline config validate|generate`

use anyhow::{anyhow, Context, Result};
use loadline_config::{ConfigLoader, LoadlineConfig};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", config_file));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handle sample configuration generation
pub fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, LoadlineConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Sample configuration generated at: {:?}", output);
    println!("🔧 Validate with: loadline config validate --config-file {:?}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_sample_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loadline.yaml");

        handle_config_generate(&path, false).unwrap();
        handle_config_validate(&path).unwrap();
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadline.yaml");
        fs::write(&path, "target: {}\n").unwrap();

        assert!(handle_config_generate(&path, false).is_err());
        handle_config_generate(&path, true).unwrap();
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "target:\n  base_url: \"not a url\"\n").unwrap();

        assert!(handle_config_validate(&path).is_err());
        assert!(handle_config_validate(&dir.path().join("missing.yaml")).is_err());
    }
}
