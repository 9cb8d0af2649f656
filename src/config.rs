use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub idle_timeout_secs: u64,

    // Guilds autorizadas (None = sin restricción)
    pub allowed_guilds: Option<HashSet<u64>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutos
                .parse()?,

            // Lista separada por comas: ALLOWED_GUILDS=123,456
            allowed_guilds: std::env::var("ALLOWED_GUILDS").ok().map(|s| {
                s.split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect()
            }),
        };

        config.validate()?;

        Ok(config)
    }

    /// Verifica que los valores de configuración sean coherentes antes de
    /// arrancar el bot.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "DEFAULT_VOLUME debe estar entre 0.0 y 1.0, recibido: {}",
                self.default_volume
            );
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT_SECS debe ser mayor que 0");
        }

        Ok(())
    }

    /// Resumen de la configuración para el log de arranque (sin el token).
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), volumen {}%, timeout de inactividad {}s, guilds autorizadas: {}",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.idle_timeout_secs,
            self.allowed_guilds
                .as_ref()
                .map_or("todas".to_string(), |g| g.len().to_string()),
        )
    }

    /// Indica si el bot puede permanecer en una guild.
    pub fn is_guild_allowed(&self, guild_id: u64) -> bool {
        match &self.allowed_guilds {
            Some(allowed) => allowed.contains(&guild_id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            discord_token: String::new(),
            application_id: 1,
            guild_id: None,
            default_volume: 0.5,
            idle_timeout_secs: 300,
            allowed_guilds: None,
        }
    }

    #[test]
    fn test_validate_volume_range() {
        let mut config = base_config();
        assert!(config.validate().is_ok());

        config.default_volume = 1.5;
        assert!(config.validate().is_err());

        config.default_volume = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_idle_timeout() {
        let mut config = base_config();
        config.idle_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_guild_allowlist() {
        let mut config = base_config();
        assert!(config.is_guild_allowed(42));

        config.allowed_guilds = Some([42].into_iter().collect());
        assert!(config.is_guild_allowed(42));
        assert!(!config.is_guild_allowed(43));
    }
}
