//! 配置与可观测性集成测试
//!
//! 测试环境变量覆盖、指标记录与日志初始化的对外行为。

mod config_tests {
    use conditions_shared::config::AppConfig;

    #[test]
    fn test_env_overrides_engine_config() {
        // 本文件中只有这一个测试修改环境变量
        unsafe {
            std::env::set_var("CONDITIONS_ENGINE__REGEX_CACHE_CAPACITY", "32");
            std::env::set_var("CONDITIONS_ENGINE__DOTTED_PATHS", "false");
        }

        let config =
            AppConfig::load_from_dir("condition-engine", "/nonexistent-config-dir").unwrap();

        assert_eq!(config.engine.regex_cache_capacity, 32);
        assert!(!config.engine.dotted_paths);
        assert!(!config.engine.trace_enabled);

        unsafe {
            std::env::remove_var("CONDITIONS_ENGINE__REGEX_CACHE_CAPACITY");
            std::env::remove_var("CONDITIONS_ENGINE__DOTTED_PATHS");
        }
    }
}

mod metrics_tests {
    use conditions_shared::observability::metrics::{
        describe_metrics, record_expression_evaluation, record_pattern_error, record_rule_check,
    };

    #[test]
    fn test_record_without_recorder() {
        // 未安装 recorder 时全部为空操作
        describe_metrics();
        record_expression_evaluation(true, 0.0001);
        record_expression_evaluation(false, 0.002);
        record_rule_check("value", "=", true);
        record_rule_check("length", "BETWEEN", false);
        record_rule_check("custom", "custom", true);
        record_pattern_error();
    }
}

mod tracing_tests {
    use conditions_shared::observability::{self, ObservabilityConfig};

    #[test]
    fn test_init_json_logs() {
        let config = ObservabilityConfig {
            json_logs: true,
            log_level: "debug".to_string(),
            ..Default::default()
        }
        .with_service_name("condition-engine-test");

        let guard = observability::init(&config);
        assert!(guard.is_ok());

        tracing::info!(field = "age", "日志已初始化");
    }
}
