#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use symbiosis_config::ConfigLoader;
    use symbiosis_config::schema::*;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_symbiosis_config_defaults() {
        let config = SymbiosisConfig::default();
        assert_eq!(config.agent.model, "x-ai/grok-4.1-fast");
        assert_eq!(config.agent.subject_name, "User");
        assert!(config.memory.backend_url.is_none());
        assert_eq!(config.memory.history_limit, 10);
    }

    #[test]
    fn test_completion_config_defaults() {
        let config = CompletionConfig::default();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.ghost_audit_probability, 0.05);
        assert_eq!(config.drill_down_limit, 15);
        assert_eq!(config.time_gap_hours, 6);
        assert_eq!(config.importance_threshold, 4);
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    // ── Parsing tests ──────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SymbiosisConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed: SymbiosisConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.agent.model, config.agent.model);
        assert_eq!(parsed.pipeline.drill_down_limit, config.pipeline.drill_down_limit);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let raw = r#"
[agent]
subject_name = "Dana"

[memory]
backend_url = "https://example.com/api/memory"
"#;
        let config: SymbiosisConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.agent.subject_name, "Dana");
        assert_eq!(config.agent.model, "x-ai/grok-4.1-fast");
        assert_eq!(
            config.memory.backend_url.as_deref(),
            Some("https://example.com/api/memory")
        );
        assert_eq!(config.completion.max_attempts, 3);
    }

    // ── Override tests ─────────────────────────────────────────

    #[test]
    fn test_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("SYMBIOSIS_MODEL", "openai/gpt-4o-mini"),
            ("SYMBIOSIS_SUBJECT", "Robin"),
            ("SYMBIOSIS_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();
        let config = ConfigLoader::apply_overrides(SymbiosisConfig::default(), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.agent.model, "openai/gpt-4o-mini");
        assert_eq!(config.agent.subject_name, "Robin");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_api_key_file_takes_priority_over_env() {
        let mut config = SymbiosisConfig::default();
        config.services.openrouter_api_key = Some("from-file".into());
        let config = ConfigLoader::apply_overrides(config, |k| {
            (k == "OPENROUTER_API_KEY").then(|| "from-env".to_string())
        });
        assert_eq!(config.services.openrouter_api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_api_key_env_fills_missing() {
        let config = ConfigLoader::apply_overrides(SymbiosisConfig::default(), |k| {
            (k == "OPENROUTER_API_KEY").then(|| "from-env".to_string())
        });
        assert_eq!(config.services.openrouter_api_key.as_deref(), Some("from-env"));
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_is_valid_with_key_warning() {
        let warnings = SymbiosisConfig::default().validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "services.openrouter_api_key"));
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = SymbiosisConfig::default();
        config.completion.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("completion.max_attempts"));
    }

    #[test]
    fn test_validate_rejects_bad_probability() {
        let mut config = SymbiosisConfig::default();
        config.pipeline.ghost_audit_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_warns_on_unknown_format() {
        let mut config = SymbiosisConfig::default();
        config.logging.format = "xml".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "logging.format"));
    }

    #[test]
    fn test_warning_display_includes_hint() {
        let w = ConfigWarning {
            field: "agent.model".into(),
            message: "model is empty".into(),
            severity: WarningSeverity::Error,
            hint: Some("set it".into()),
        };
        let text = w.to_string();
        assert!(text.contains("agent.model: model is empty"));
        assert!(text.contains("↳ set it"));
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("symbiosis.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[agent]
subject_name = "Sam"

[pipeline]
drill_down_limit = 5
ghost_audit_probability = 0.0

[services]
openrouter_api_key = "sk-test"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.agent.subject_name, "Sam");
        assert_eq!(config.pipeline.drill_down_limit, 5);
        assert_eq!(config.pipeline.ghost_audit_probability, 0.0);
        assert_eq!(config.services.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loader = ConfigLoader::load(Some(missing.as_path())).unwrap();
        assert_eq!(loader.get().memory.history_limit, 10);
    }

    #[test]
    fn test_config_loader_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("symbiosis.toml");
        std::fs::write(&config_path, "[agent\nmodel = ").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_config_loader_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("symbiosis.toml");
        std::fs::write(&config_path, "[memory]\nhistory_limit = 0\n").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let p = std::path::Path::new("/tmp/custom.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(p)), p.to_path_buf());
    }
}
