use serde::Deserialize;

/// Base URLs for each bureau endpoint, loaded from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct BureauEndpoints {
    pub autenticador_url: String,
    pub prospector_url: String,
    pub estimador_ingresos_url: String,
    pub informe_buro_url: String,
    pub monitor_url: String,
    pub reporte_credito_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// API key callers must present on every request.
    pub service_api_key: String,
    /// Credentials sent to the bureau endpoints.
    pub buro_api_key: String,
    pub endpoints: BureauEndpoints,
}

/// First `max_chars` characters of a value, for redacted logging.
/// Counts chars, not bytes, so multibyte credentials cannot split a boundary.
fn redacted_prefix(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

fn require_url(name: &str) -> anyhow::Result<String> {
    require_env(name).and_then(|url| {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("{} must start with http:// or https://", name);
        }
        Ok(url)
    })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            service_api_key: require_env("SERVICE_API_KEY")?,
            buro_api_key: require_env("BURO_API_KEY")?,
            endpoints: BureauEndpoints {
                autenticador_url: require_url("BURO_API_AUTENTICADOR_URL")?,
                prospector_url: require_url("BURO_API_PROSPECTOR_URL")?,
                estimador_ingresos_url: require_url("BURO_API_ESTIMADOR_INGRESOS_URL")?,
                informe_buro_url: require_url("BURO_API_INFORME_BURO_URL")?,
                monitor_url: require_url("BURO_API_MONITOR_URL")?,
                reporte_credito_url: require_url("BURO_API_REPORTE_CREDITO_URL")?,
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            redacted_prefix(&config.database_url, 20)
        );
        tracing::debug!(
            "Bureau authenticator URL: {}",
            config.endpoints.autenticador_url
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_truncates_on_char_boundaries() {
        // 'í' occupies bytes 19-20, straddling the byte boundary a naive
        // 20-byte slice would take
        let url = "postgresql://señoría:contraseña@db/buro";
        let prefix = redacted_prefix(url, 20);
        assert_eq!(prefix.chars().count(), 20);
        assert!(url.starts_with(&prefix));
    }

    #[test]
    fn redaction_keeps_short_values_whole() {
        assert_eq!(redacted_prefix("postgres://x", 20), "postgres://x");
    }
}
