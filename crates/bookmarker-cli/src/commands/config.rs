use std::env;

use bookmarker_core::config::{SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = init_profile(
                &mut config,
                profile.as_deref().or(global_profile),
                supabase_url,
                supabase_anon_key,
                no_activate,
            )?;

            let path = config.save().map_err(CliError::Config)?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );

            let missing_fields = config
                .profile(&profile_name)
                .map(CliProfile::missing_fields)
                .unwrap_or_default();
            if missing_fields.is_empty() {
                println!(
                    "Profile '{profile_name}' is ready. Run `bookmarker auth login --email <email> --password <password>`."
                );
            } else {
                println!(
                    "Profile '{}' is missing: {}",
                    profile_name,
                    missing_fields.join(", ")
                );
            }
            Ok(())
        }
    }
}

/// Merge explicit flags, then environment, then existing values into a profile.
///
/// Returns the profile name that was written.
pub fn init_profile(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged_supabase_url = normalize_text_option(supabase_url)
        .or_else(|| normalize_text_option(env::var(SUPABASE_URL_ENV).ok()))
        .or_else(|| existing_profile.supabase_url());
    let merged_supabase_anon_key = normalize_text_option(supabase_anon_key)
        .or_else(|| normalize_text_option(env::var(SUPABASE_ANON_KEY_ENV).ok()))
        .or_else(|| existing_profile.supabase_anon_key());

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = merged_supabase_url {
        profile.supabase_url = Some(value);
    }
    if let Some(value) = merged_supabase_anon_key {
        profile.supabase_anon_key = Some(value);
    }
    validate_profile_urls(profile)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

pub fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
