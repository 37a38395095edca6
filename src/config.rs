use serde::Deserialize;

/// Module-level billing settings, passed explicitly into the billing
/// computations instead of being looked up from ambient state.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BillingSettings {
    /// Day of month on which recurring charges are raised (1-28 so every
    /// month has it).
    pub billing_day: u32,
    /// Month of the yearly account-closure run.
    pub closure_month: u32,
    /// Day of month of the yearly account-closure run; clamped to the
    /// month's length when applied.
    pub closure_day: u32,
}

impl BillingSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=28).contains(&self.billing_day) {
            anyhow::bail!("BILLING_DAY must be between 1 and 28");
        }
        if !(1..=12).contains(&self.closure_month) {
            anyhow::bail!("CLOSURE_MONTH must be between 1 and 12");
        }
        if !(1..=31).contains(&self.closure_day) {
            anyhow::bail!("CLOSURE_DAY must be between 1 and 31");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub billing: BillingSettings,
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
            billing: BillingSettings {
                billing_day: std::env::var("BILLING_DAY")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("BILLING_DAY must be a valid day of month"))?,
                closure_month: std::env::var("CLOSURE_MONTH")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("CLOSURE_MONTH must be a valid month number"))?,
                closure_day: std::env::var("CLOSURE_DAY")
                    .unwrap_or_else(|_| "31".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("CLOSURE_DAY must be a valid day of month"))?,
            },
        };

        config.billing.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Billing day: {}, closure: {}/{}",
            config.billing.billing_day,
            config.billing.closure_day,
            config.billing.closure_month
        );

        Ok(config)
    }
}
