//! Session and profile commands.
//!
//! Commands that act on the signed-in customer restore the persisted session
//! first, which re-verifies the stored token with the backend.

use clap::Args;

use nursery_core::Email;
use nursery_storefront::models::{Address, AddressUpdate, ProfileUpdate, SessionStatus, UserProfile};
use nursery_storefront::services::{LoginCredentials, PasswordChange, Registration};
use nursery_storefront::Storefront;
use secrecy::SecretString;

use super::CliError;

/// Address flags shared by `register` and `profile update`.
#[derive(Args)]
pub struct AddressArgs {
    #[arg(long)]
    street: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    zip_code: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(short, long)]
    email: String,

    #[arg(long, env = "NURSERY_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    phone: Option<String>,

    #[command(flatten)]
    address: AddressArgs,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[command(flatten)]
    address: AddressArgs,
}

impl AddressArgs {
    fn into_update(self) -> Option<AddressUpdate> {
        if self.street.is_none() && self.city.is_none() && self.zip_code.is_none() {
            return None;
        }
        Some(AddressUpdate {
            street: self.street,
            city: self.city,
            zip_code: self.zip_code,
        })
    }
}

impl ProfileArgs {
    fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            address: self.address.into_update(),
        }
    }
}

pub async fn login(storefront: &Storefront, email: &str, password: String) -> Result<(), CliError> {
    let credentials = LoginCredentials::new(email, password)?;
    let profile = storefront.sessions().login(&credentials).await?;
    print_profile("Signed in as", &profile);
    Ok(())
}

pub async fn register(storefront: &Storefront, args: RegisterArgs) -> Result<(), CliError> {
    let address = Address {
        street: args.address.street,
        city: args.address.city,
        zip_code: args.address.zip_code,
    };
    let registration = Registration {
        first_name: args.first_name,
        last_name: args.last_name,
        email: Email::parse(&args.email)?,
        password: SecretString::from(args.password),
        phone: args.phone,
        address: (address != Address::default()).then_some(address),
    };

    let profile = storefront.sessions().register(&registration).await?;
    print_profile("Registered and signed in as", &profile);
    Ok(())
}

pub async fn logout(storefront: &Storefront) {
    let sessions = storefront.sessions();
    sessions.bootstrap().await;
    sessions.logout().await;
    tracing::info!("Signed out");
}

pub async fn whoami(storefront: &Storefront) {
    let sessions = storefront.sessions();
    sessions.bootstrap().await;
    match sessions.current_session().identity() {
        Some(profile) => print_profile("Signed in as", profile),
        None => print_line("Not signed in"),
    }
}

pub async fn show_profile(storefront: &Storefront) -> Result<(), CliError> {
    restore(storefront).await?;
    let profile = storefront.sessions().refresh_profile().await?;
    print_profile("Profile for", &profile);
    Ok(())
}

pub async fn update_profile(storefront: &Storefront, args: ProfileArgs) -> Result<(), CliError> {
    let update = args.into_update();
    if update.is_empty() {
        tracing::warn!("Nothing to update");
        return Ok(());
    }

    restore(storefront).await?;
    let profile = storefront.sessions().update_profile(&update).await?;
    print_profile("Updated", &profile);
    Ok(())
}

pub async fn change_password(
    storefront: &Storefront,
    current: String,
    new: String,
) -> Result<(), CliError> {
    restore(storefront).await?;
    let change = PasswordChange {
        current_password: SecretString::from(current),
        new_password: SecretString::from(new),
    };
    storefront.sessions().change_password(&change).await?;
    print_line("Password changed");
    Ok(())
}

pub async fn forgot_password(storefront: &Storefront, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let message = storefront.sessions().forgot_password(&email).await?;
    print_line(
        message
            .as_deref()
            .unwrap_or("If that address has an account, a reset link is on its way."),
    );
    Ok(())
}

async fn restore(storefront: &Storefront) -> Result<(), CliError> {
    match storefront.sessions().bootstrap().await {
        SessionStatus::Authenticated => Ok(()),
        SessionStatus::Anonymous | SessionStatus::Verifying => Err(CliError::NotSignedIn),
    }
}

#[allow(clippy::print_stdout)]
fn print_profile(heading: &str, profile: &UserProfile) {
    println!("{heading} {} <{}>", profile.full_name(), profile.email);
    if let Some(phone) = &profile.phone {
        println!("  phone:   {phone}");
    }
    let address = &profile.address;
    let lines: Vec<&str> = [&address.street, &address.city, &address.zip_code]
        .into_iter()
        .filter_map(Option::as_deref)
        .collect();
    if !lines.is_empty() {
        println!("  address: {}", lines.join(", "));
    }
    if profile.is_admin {
        println!("  role:    admin");
    }
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_args_without_flags_is_empty_update() {
        let args = ProfileArgs {
            first_name: None,
            last_name: None,
            phone: None,
            address: AddressArgs {
                street: None,
                city: None,
                zip_code: None,
            },
        };
        let update = args.into_update();
        assert!(update.is_empty());
        assert!(update.address.is_none());
    }

    #[test]
    fn test_profile_args_carry_address_fields() {
        let args = ProfileArgs {
            first_name: None,
            last_name: None,
            phone: Some("555-0101".to_string()),
            address: AddressArgs {
                street: None,
                city: Some("Portland".to_string()),
                zip_code: None,
            },
        };
        let update = args.into_update();
        assert_eq!(update.phone.as_deref(), Some("555-0101"));
        assert_eq!(
            update.address.and_then(|a| a.city).as_deref(),
            Some("Portland")
        );
    }
}
