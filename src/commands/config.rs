//! `config`: print the effective configuration.

use forge_core::config::AppConfig;
use forge_core::AppResult;

use crate::output::{self, OutputFormat};

/// Execute the config command
pub fn execute(config: &AppConfig, format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Json => output::print_json(config),
        OutputFormat::Table => {
            let converter = &config.converter;
            let unset = || "(auto)".to_string();

            println!("Logging");
            output::print_kv("level", &config.logging.level);
            output::print_kv("format", &config.logging.format);
            output::print_kv(
                "echo_process_output",
                &config.logging.echo_process_output.to_string(),
            );

            println!("Converter");
            output::print_kv(
                "spine_path",
                &converter
                    .spine_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(unset),
            );
            output::print_kv("timeout_seconds", &converter.timeout_seconds.to_string());
            output::print_kv(
                "version_probe_timeout_seconds",
                &converter.version_probe_timeout_seconds.to_string(),
            );
            output::print_kv(
                "temp_root",
                &converter.effective_temp_root().display().to_string(),
            );
            output::print_kv(
                "default_settings_path",
                &converter
                    .default_settings_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(unset),
            );
            output::print_kv("force_utf8_env", &converter.force_utf8_env.to_string());
        }
    }
    Ok(())
}
