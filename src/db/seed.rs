//! Demo accounts for local development.

use tracing::info;

use super::{Database, NewNgo, Role};
use crate::auth::hash_password;

struct DemoAccount {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
    ngo: Option<(&'static str, bool)>,
}

const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        name: "Admin User",
        email: "admin@example.com",
        password: "admin123",
        role: Role::Admin,
        ngo: None,
    },
    DemoAccount {
        name: "John Donor",
        email: "donor@example.com",
        password: "donor123",
        role: Role::Donor,
        ngo: None,
    },
    DemoAccount {
        name: "Hope Foundation",
        email: "hope@ngo.com",
        password: "ngo123",
        role: Role::Ngo,
        ngo: Some(("Providing food and shelter to the homeless", true)),
    },
    DemoAccount {
        name: "Green Earth Initiative",
        email: "green@ngo.com",
        password: "ngo123",
        role: Role::Ngo,
        ngo: Some(("Environmental conservation and sustainability", false)),
    },
];

/// Insert the demo accounts that do not exist yet. Returns how many were created.
pub async fn seed_demo_accounts(db: &Database) -> Result<usize, sqlx::Error> {
    let mut created = 0;

    for account in DEMO_ACCOUNTS {
        if db.users().email_exists(account.email).await? {
            continue;
        }

        let uuid = uuid::Uuid::new_v4().to_string();
        let password_hash = hash_password(account.password.to_string())
            .await
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

        match account.ngo {
            Some((description, verified)) => {
                let ngo = NewNgo {
                    uuid: uuid::Uuid::new_v4().to_string(),
                    name: account.name.to_string(),
                    description: Some(description.to_string()),
                    verified,
                };
                db.users()
                    .create_with_ngo(&uuid, account.name, account.email, &password_hash, &ngo)
                    .await?;
            }
            None => {
                db.users()
                    .create(&uuid, account.name, account.email, &password_hash, account.role)
                    .await?;
            }
        }

        info!(email = %account.email, role = %account.role, "Created demo account");
        created += 1;
    }

    Ok(created)
}
