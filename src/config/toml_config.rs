use crate::core::ConfigProvider;
use crate::domain::model::OutputFilenames;
use crate::domain::ports::{DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::{FixedOffset, Local, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

pub const SOURCE_EXTENSIONS: [&str; 4] = ["csv", "tsv", "xlsx", "xls"];
pub const OUTPUT_FORMATS: [&str; 3] = ["csv", "json", "xlsx"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    pub schedule: Option<ScheduleConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// source header -> canonical column (`name`, `email`, `dob`)
    pub field_mapping: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    pub reject_ambiguous_dates: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
    pub filenames: Option<FilenameConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilenameConfig {
    pub cleaned_csv: Option<String>,
    pub rejected_csv: Option<String>,
    pub cleaned_json: Option<String>,
    pub cleaned_xlsx: Option<String>,
    pub report_json: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Smtp,
    Webhook,
    #[default]
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub transport: Transport,
    pub from: Option<String>,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub concurrency: Option<usize>,
    pub smtp: Option<SmtpConfig>,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Offset used to decide what "today" is; host local time when absent.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SMTP_PASSWORD})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("source.path", &self.source.path)?;
        validation::validate_file_extension("source.path", &self.source.path, &SOURCE_EXTENSIONS)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        for format in &self.load.output_formats {
            if !OUTPUT_FORMATS.contains(&format.as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "load.output_formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        OUTPUT_FORMATS.join(", ")
                    ),
                });
            }
        }

        if let Some(compression) = &self.load.compression {
            if compression.enabled {
                validation::validate_non_empty_string(
                    "load.compression.filename",
                    &compression.filename,
                )?;
            }
        }

        if let Some(mapping) = &self.extract.field_mapping {
            for target in mapping.values() {
                if !["name", "email", "dob"].contains(&target.as_str()) {
                    return Err(EtlError::InvalidConfigValueError {
                        field: "extract.field_mapping".to_string(),
                        value: target.clone(),
                        reason: "Targets must be one of: name, email, dob".to_string(),
                    });
                }
            }
        }

        validation::validate_positive_number("notify.concurrency", self.notify_concurrency(), 1)?;

        match self.notify.transport {
            Transport::Smtp => {
                let smtp = validation::validate_required_field("notify.smtp", &self.notify.smtp)?;
                validation::validate_non_empty_string("notify.smtp.host", &smtp.host)?;
                if let Some(port) = smtp.port {
                    validation::validate_range("notify.smtp.port", port, 1, u16::MAX)?;
                }
                let from = validation::validate_required_field("notify.from", &self.notify.from)?;
                validation::validate_non_empty_string("notify.from", from)?;
            }
            Transport::Webhook => {
                let webhook =
                    validation::validate_required_field("notify.webhook", &self.notify.webhook)?;
                validation::validate_url("notify.webhook.endpoint", &webhook.endpoint)?;
            }
            Transport::Log => {}
        }

        if let Some(offset) = self.schedule.as_ref().and_then(|s| s.utc_offset_minutes) {
            validation::validate_range("schedule.utc_offset_minutes", offset, -14 * 60, 14 * 60)?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// The run's logical date: today in the configured offset.
    pub fn today(&self) -> NaiveDate {
        match self
            .schedule
            .as_ref()
            .and_then(|s| s.utc_offset_minutes)
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
        {
            Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
            None => Local::now().date_naive(),
        }
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.source.path
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn field_mapping(&self) -> Option<&HashMap<String, String>> {
        self.extract.field_mapping.as_ref()
    }

    fn reject_ambiguous_dates(&self) -> bool {
        self.transform.reject_ambiguous_dates.unwrap_or(false)
    }

    fn notify_concurrency(&self) -> usize {
        self.notify.concurrency.unwrap_or(1)
    }

    fn subject_template(&self) -> &str {
        self.notify
            .subject_template
            .as_deref()
            .unwrap_or(DEFAULT_SUBJECT_TEMPLATE)
    }

    fn body_template(&self) -> &str {
        self.notify
            .body_template
            .as_deref()
            .unwrap_or(DEFAULT_BODY_TEMPLATE)
    }

    fn output_filenames(&self) -> OutputFilenames {
        let mut names = OutputFilenames::default();
        if let Some(overrides) = &self.load.filenames {
            let pick = |custom: &Option<String>, slot: &mut String| {
                if let Some(name) = custom {
                    *slot = name.clone();
                }
            };
            pick(&overrides.cleaned_csv, &mut names.cleaned_csv);
            pick(&overrides.rejected_csv, &mut names.rejected_csv);
            pick(&overrides.cleaned_json, &mut names.cleaned_json);
            pick(&overrides.cleaned_xlsx, &mut names.cleaned_xlsx);
            pick(&overrides.report_json, &mut names.report_json);
        }
        names
    }

    fn archive_name(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
