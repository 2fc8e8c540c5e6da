use crate::auth::{auth_client_for_profile, clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::{auth_error, resolve_client_config};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let (profile_name, client_config) =
                resolve_client_config(profile.as_deref().or(global_profile))?;
            let client =
                auth_client_for_profile(&profile_name, &client_config).map_err(auth_error)?;
            let session = client
                .sign_in(&email, &password)
                .await
                .map_err(auth_error)?;
            println!(
                "Signed in profile '{profile_name}' as {}",
                session.user.display_name()
            );
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let (profile_name, client_config) =
                resolve_client_config(profile.as_deref().or(global_profile))?;
            let client =
                auth_client_for_profile(&profile_name, &client_config).map_err(auth_error)?;

            if let Some(session) = client.restore_session().await.map_err(auth_error)? {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let requested = profile.as_deref().or(global_profile);
            let profile_name = match resolve_client_config(requested) {
                Ok((profile_name, client_config)) => {
                    let client = auth_client_for_profile(&profile_name, &client_config)
                        .map_err(auth_error)?;
                    if let Some(session) = load_stored_session(&profile_name).map_err(auth_error)? {
                        if let Err(error) = client.sign_out(&session.access_token).await {
                            tracing::warn!("Remote sign out failed: {}", error);
                            client.clear_local_session().map_err(auth_error)?;
                        }
                    }
                    profile_name
                }
                // Without project settings only the local session can be forgotten.
                Err(
                    error @ (CliError::Config(_)
                    | CliError::Core(bookmarker_core::Error::Config(_))),
                ) => {
                    tracing::debug!("Skipping remote sign out: {}", error);
                    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
                    let profile_name = config.resolve_profile_name(requested);
                    clear_stored_session(&profile_name).map_err(auth_error)?;
                    profile_name
                }
                Err(error) => return Err(error),
            };

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
