use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "symbiosis.toml";

const STARTER_CONFIG: &str = r#"# Symbiosis configuration

[agent]
model = "x-ai/grok-4.1-fast"
subject_name = "User"
subject_pronouns = "they/them"

[completion]
base_url = "https://openrouter.ai/api/v1"
# timeout_secs = 15
# max_attempts = 3
# base_delay_ms = 1000

[memory]
# backend_url = "https://your-memory-service.example/exec"   # or env: SYMBIOSIS_BACKEND_URL
db_path = "symbiosis.db"
# history_limit = 10

[pipeline]
# ghost_audit_probability = 0.05
# drill_down_limit = 15
# time_gap_hours = 6
# importance_threshold = 4

[logging]
level = "info"
# format = "pretty"   # pretty | compact | json

[services]
# openrouter_api_key = "sk-or-..."   # or env: OPENROUTER_API_KEY
"#;

pub(super) fn cmd_init(local: bool) -> symbiosis_core::Result<()> {
    let dir = if local {
        std::env::current_dir()?
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".symbiosis")
    };

    match write_starter_config(&dir)? {
        Some(path) => {
            println!("✅ Created {}", path.display());
            println!("   Set your API key, then run: symbiosis chat");
        }
        None => println!("⚠️  {} already exists", dir.join(CONFIG_FILE).display()),
    }
    Ok(())
}

/// Write the starter config into `dir`. `None` when a config is already there.
fn write_starter_config(dir: &Path) -> symbiosis_core::Result<Option<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(None);
    }
    std::fs::write(&path, STARTER_CONFIG)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbiosis_config::SymbiosisConfig;

    #[test]
    fn test_starter_config_parses() {
        let config: SymbiosisConfig = toml::from_str(STARTER_CONFIG).unwrap();
        assert_eq!(config.agent.model, "x-ai/grok-4.1-fast");
        assert!(config.memory.backend_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_starter_config(dir.path()).unwrap();
        assert!(first.is_some());

        std::fs::write(dir.path().join(CONFIG_FILE), "[agent]\nmodel = \"mine\"\n").unwrap();
        assert!(write_starter_config(dir.path()).unwrap().is_none());
        let kept = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(kept.contains("mine"));
    }
}
