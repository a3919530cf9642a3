use rb_domain::config::{Config, ConfigSeverity};
use rb_providers::util::{keychain_fallback_env_name, store_in_keychain};

const DEFAULT_SERVICE: &str = "recordbot";
const DEFAULT_ACCOUNT: &str = "openai-api-key";

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors are found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML. A
/// plaintext API key is masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(key) = config.llm.provider.auth.key.as_mut() {
        *key = "********".into();
    }
    let output = toml::to_string_pretty(&config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}

/// Prompt for the API key and store it in the OS keychain under the
/// configured service/account.
pub fn set_secret(config: &Config) -> anyhow::Result<()> {
    let auth = &config.llm.provider.auth;
    let service = auth.service.as_deref().unwrap_or(DEFAULT_SERVICE);
    let account = auth.account.as_deref().unwrap_or(DEFAULT_ACCOUNT);

    let secret = rpassword::prompt_password_stderr(&format!("API key for {service}/{account}: "))?;
    let secret = secret.trim();
    if secret.is_empty() {
        anyhow::bail!("no key entered");
    }

    store_in_keychain(service, account, secret)?;
    println!("Stored API key in the OS keychain ({service}/{account}).");

    if auth.service.is_none() || auth.account.is_none() {
        println!(
            "Add service = \"{service}\" and account = \"{account}\" to [llm.provider.auth] to use it."
        );
    }
    println!(
        "On systems without a keychain, set {} instead.",
        keychain_fallback_env_name(service, account)
    );
    Ok(())
}
