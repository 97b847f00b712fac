//! Privacy settings command implementations

use anyhow::Result;
use cloak_core::db::Database;
use cloak_core::models::{AiProvider, PrivacySettings, PrivacySettingsUpdate, ProviderPrivacy};

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn print_settings(settings: &PrivacySettings) {
    println!();
    println!("🛡️  Privacy Settings");
    println!("   ─────────────────────────────");
    println!("   Obfuscation: {}", on_off(settings.obfuscation_enabled));
    for p in settings.providers() {
        let effective = if settings.should_obfuscate(p.provider) {
            "tokenized"
        } else {
            "sent as-is"
        };
        let location = if p.provider.is_local() {
            "local"
        } else {
            "cloud"
        };
        println!(
            "   {:12} {:5} {:3} ({})",
            p.provider.as_str(),
            location,
            on_off(p.obfuscation_enabled),
            effective
        );
    }
}

pub fn cmd_privacy_show(db: &Database) -> Result<()> {
    let settings = db.get_privacy_settings()?;
    print_settings(&settings);
    Ok(())
}

pub fn cmd_privacy_set(
    db: &Database,
    enabled: Option<bool>,
    provider: Option<&str>,
    obfuscate: Option<bool>,
) -> Result<PrivacySettings> {
    let mut update = PrivacySettingsUpdate {
        obfuscation_enabled: enabled,
        provider_settings: Vec::new(),
    };

    match (provider, obfuscate) {
        (Some(p), Some(on)) => {
            let provider: AiProvider = p.parse().map_err(anyhow::Error::msg)?;
            update.provider_settings.push(ProviderPrivacy {
                provider,
                obfuscation_enabled: on,
            });
        }
        (None, None) => {}
        _ => anyhow::bail!("--provider and --obfuscate must be given together"),
    }

    if update.obfuscation_enabled.is_none() && update.provider_settings.is_empty() {
        anyhow::bail!("Nothing to change. Use --enabled or --provider with --obfuscate");
    }

    let settings = db.update_privacy_settings(&update)?;
    println!("✅ Privacy settings updated");
    print_settings(&settings);

    Ok(settings)
}
