//! Privacy settings operations (singleton row)

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::{PrivacySettings, PrivacySettingsUpdate};

impl Database {
    /// Get the privacy settings, creating the defaults on first access
    pub fn get_privacy_settings(&self) -> Result<PrivacySettings> {
        let conn = self.conn()?;
        let defaults = PrivacySettings::default();
        conn.execute(
            r#"
            INSERT OR IGNORE INTO privacy_settings
                (id, obfuscation_enabled, ollama_obfuscation, openrouter_obfuscation,
                 anthropic_obfuscation, openai_obfuscation)
            VALUES (1, ?, ?, ?, ?, ?)
            "#,
            params![
                defaults.obfuscation_enabled,
                defaults.ollama_obfuscation,
                defaults.openrouter_obfuscation,
                defaults.anthropic_obfuscation,
                defaults.openai_obfuscation,
            ],
        )?;

        let settings = conn.query_row(
            r#"
            SELECT obfuscation_enabled, ollama_obfuscation, openrouter_obfuscation,
                   anthropic_obfuscation, openai_obfuscation
            FROM privacy_settings WHERE id = 1
            "#,
            [],
            |row| {
                Ok(PrivacySettings {
                    obfuscation_enabled: row.get(0)?,
                    ollama_obfuscation: row.get(1)?,
                    openrouter_obfuscation: row.get(2)?,
                    anthropic_obfuscation: row.get(3)?,
                    openai_obfuscation: row.get(4)?,
                })
            },
        )?;
        Ok(settings)
    }

    /// Apply a partial update and return the resulting settings
    pub fn update_privacy_settings(&self, update: &PrivacySettingsUpdate) -> Result<PrivacySettings> {
        let mut settings = self.get_privacy_settings()?;

        if let Some(enabled) = update.obfuscation_enabled {
            settings.obfuscation_enabled = enabled;
        }
        for provider in &update.provider_settings {
            settings.set_provider(provider.provider, provider.obfuscation_enabled);
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE privacy_settings
            SET obfuscation_enabled = ?, ollama_obfuscation = ?, openrouter_obfuscation = ?,
                anthropic_obfuscation = ?, openai_obfuscation = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = 1
            "#,
            params![
                settings.obfuscation_enabled,
                settings.ollama_obfuscation,
                settings.openrouter_obfuscation,
                settings.anthropic_obfuscation,
                settings.openai_obfuscation,
            ],
        )?;

        Ok(settings)
    }
}
