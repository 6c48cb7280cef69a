//! Optional demo accounts, created at startup when `SEED_DEMO_USERS=true`.
//!
//! The built-in roles themselves come from the migrations.

use gatehouse_core::roles::RoleName;
use gatehouse_db::models::user::CreateUser;
use gatehouse_db::repositories::{RoleRepo, UserRepo};
use gatehouse_db::DbPool;

use crate::auth::password::hash_password;

/// Errors that abort seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Role {0} is missing; were the migrations applied?")]
    MissingRole(RoleName),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// A demo account. Passwords satisfy the default password policy.
struct DemoUser {
    username: &'static str,
    email: &'static str,
    password: &'static str,
    role: RoleName,
}

const DEMO_USERS: [DemoUser; 3] = [
    DemoUser {
        username: "admin",
        email: "admin@example.com",
        password: "Admin@123",
        role: RoleName::Admin,
    },
    DemoUser {
        username: "editor",
        email: "editor@example.com",
        password: "Editor@123",
        role: RoleName::Editor,
    },
    DemoUser {
        username: "viewer",
        email: "viewer@example.com",
        password: "Viewer@123",
        role: RoleName::Viewer,
    },
];

/// Create any demo account whose email is not registered yet.
///
/// Returns the number of accounts created. Running it again is a no-op.
pub async fn seed_demo_users(pool: &DbPool) -> Result<usize, SeedError> {
    let mut created = 0;
    for demo in &DEMO_USERS {
        if UserRepo::find_by_email(pool, demo.email).await?.is_some() {
            tracing::debug!(username = demo.username, "Demo user already present");
            continue;
        }

        let role = RoleRepo::find_by_name(pool, demo.role.as_str())
            .await?
            .ok_or(SeedError::MissingRole(demo.role))?;
        let password_hash =
            hash_password(demo.password).map_err(|e| SeedError::Hash(e.to_string()))?;

        let user = UserRepo::create(
            pool,
            &CreateUser {
                username: demo.username.to_string(),
                email: demo.email.to_string(),
                password_hash,
                role_id: role.id,
                is_verified: true,
            },
        )
        .await?;

        tracing::info!(user_id = user.id, username = demo.username, role = %demo.role, "Demo user created");
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::security::PasswordPolicy;

    #[test]
    fn demo_passwords_satisfy_default_policy() {
        let policy = PasswordPolicy::default();
        for demo in &DEMO_USERS {
            assert!(policy.check(demo.password).is_ok(), "{}", demo.username);
        }
    }

    #[test]
    fn one_demo_user_per_role() {
        for role in RoleName::ALL {
            assert_eq!(DEMO_USERS.iter().filter(|d| d.role == role).count(), 1);
        }
    }
}
