//! User management commands.

use crate::cli::{Output, UserAction};
use crate::config::Settings;
use crate::error::TipsterError;
use crate::orchestrator::Orchestrator;
use crate::store::{NewUser, UserRecord};
use crate::usage::{month_token, Tier};
use anyhow::Result;
use chrono::Utc;

fn print_user(orchestrator: &Orchestrator, user: &UserRecord) {
    let now = Utc::now();
    let policy = orchestrator.policy();

    Output::kv("Email", &user.email);
    Output::kv("Name", &user.name);
    Output::kv("Tier", &user.tier.to_string());
    Output::kv(
        &format!("Usage ({})", month_token(now)),
        &policy.effective_count(user, now).to_string(),
    );
    match policy.remaining(user, now) {
        Some(left) => Output::kv("Remaining", &format!("{} of {}", left, policy.free_quota())),
        None => Output::kv("Remaining", "unlimited"),
    }
}

/// Run a user subcommand.
pub async fn run_user(action: &UserAction, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match action {
        UserAction::Add { email, name, image } => {
            let new_user = NewUser {
                email: email.clone(),
                name: name.clone(),
                image: image.clone(),
            };
            let user = orchestrator.register_user(&new_user, Utc::now()).await?;
            Output::success(&format!("User {} registered.", user.email));
            print_user(&orchestrator, &user);
        }

        UserAction::Tier { email, tier } => {
            let tier: Tier = tier.parse().map_err(TipsterError::InvalidInput)?;
            orchestrator.set_tier(email, tier).await?;
            Output::success(&format!("{} is now on the {} tier.", email, tier));
        }

        UserAction::Show { email } => {
            let user = orchestrator
                .users()
                .find_user(email)
                .await?
                .ok_or_else(|| TipsterError::UnknownUser(email.clone()))?;
            Output::header(&user.name);
            print_user(&orchestrator, &user);
        }
    }

    Ok(())
}
