use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub debug: bool,
    /// Accepted from `SECRET_KEY` for deployment compatibility; nothing reads it yet.
    pub secret_key: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub s3_endpoint_url: Option<String>,
    pub presign_expiry_secs: u64,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ollama_base_url: String,
    pub prompt_dir: PathBuf,
    pub work_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
    pub otel_enabled: bool,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: "development".to_string(),
            debug: false,
            secret_key: uuid::Uuid::new_v4().simple().to_string(),
            s3_bucket: "default-bucket-name".to_string(),
            s3_region: "us-east-1".to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            s3_endpoint_url: None,
            presign_expiry_secs: 3600,
            llm_provider: "openai".to_string(),
            llm_model: "gpt-4.1-mini".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 2048,
            openai_api_key: None,
            anthropic_api_key: None,
            ollama_base_url: "http://localhost:11434".to_string(),
            prompt_dir: PathBuf::from("prompts"),
            work_dir: env::temp_dir().join("medical-report-analyzer"),
            max_upload_bytes: 20 * 1024 * 1024,
            request_timeout_secs: 300,
            otel_enabled: true,
            otel_service_name: "medical-report-analyzer".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            port: env::var("APP_PORT")
                .map(|v| v.parse().expect("APP_PORT must be a number"))
                .unwrap_or(defaults.port),
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            debug: env::var("DEBUG").map(|v| parse_flag(&v)).unwrap_or(defaults.debug),
            secret_key: env::var("SECRET_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.secret_key),
            s3_bucket: env::var("S3_BUCKET").unwrap_or(defaults.s3_bucket),
            s3_region: env::var("S3_REGION").unwrap_or(defaults.s3_region),
            aws_access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            s3_endpoint_url: non_empty_var("S3_ENDPOINT_URL"),
            presign_expiry_secs: env::var("PRESIGN_EXPIRY_SECS")
                .map(|v| v.parse().expect("PRESIGN_EXPIRY_SECS must be a number"))
                .unwrap_or(defaults.presign_expiry_secs),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or(defaults.llm_provider),
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_temperature: env::var("LLM_TEMPERATURE")
                .map(|v| v.parse().expect("LLM_TEMPERATURE must be a number"))
                .unwrap_or(defaults.llm_temperature),
            llm_max_tokens: env::var("LLM_MAX_TOKENS")
                .map(|v| v.parse().expect("LLM_MAX_TOKENS must be a number"))
                .unwrap_or(defaults.llm_max_tokens),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            ollama_base_url: env::var("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            prompt_dir: env::var("PROMPT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompt_dir),
            work_dir: env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .map(|v| v.parse().expect("MAX_UPLOAD_BYTES must be a number"))
                .unwrap_or(defaults.max_upload_bytes),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .map(|v| v.parse().expect("REQUEST_TIMEOUT_SECS must be a number"))
                .unwrap_or(defaults.request_timeout_secs),
            otel_enabled: env::var("OTEL_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.otel_enabled),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or(defaults.otel_service_name),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otel_exporter_endpoint),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn has_static_credentials(&self) -> bool {
        self.aws_access_key_id.is_some() && self.aws_secret_access_key.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("True"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("False"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.presign_expiry_secs, 3600);
        assert_eq!(config.s3_region, "us-east-1");
        assert_eq!(config.prompt_dir, PathBuf::from("prompts"));
        assert!(!config.is_production());
        assert!(!config.has_static_credentials());
        assert!(!config.secret_key.is_empty());
    }

    #[test]
    fn test_static_credentials_need_both_halves() {
        let config = Config {
            aws_access_key_id: Some("AKIA".to_string()),
            ..Config::default()
        };
        assert!(!config.has_static_credentials());

        let config = Config {
            aws_secret_access_key: Some("secret".to_string()),
            ..config
        };
        assert!(config.has_static_credentials());
    }
}
