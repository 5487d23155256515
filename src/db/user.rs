use sqlx::sqlite::SqlitePool;
use std::str::FromStr;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Account role. The set is closed: anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Donor,
    Ngo,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "DONOR",
            Role::Ngo => "NGO",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl std::fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DONOR" => Ok(Role::Donor),
            "NGO" => Ok(Role::Ngo),
            "ADMIN" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// UUID of the NGO profile owned by this account, if any
    pub ngo_uuid: Option<String>,
}

/// A user together with the stored password hash. Only the login handler
/// should ever need this.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// NGO profile created alongside an NGO account.
#[derive(Debug, Clone)]
pub struct NewNgo {
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub verified: bool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    ngo_uuid: Option<String>,
}

impl TryFrom<UserRow> for Credentials {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            user: User {
                id: row.id,
                uuid: row.uuid,
                name: row.name,
                email: row.email,
                role,
                ngo_uuid: row.ngo_uuid,
            },
            password_hash: row.password_hash,
        })
    }
}

macro_rules! select_user {
    ($filter:literal) => {
        concat!(
            "SELECT u.id, u.uuid, u.name, u.email, u.password_hash, u.role, n.uuid AS ngo_uuid \
             FROM users u LEFT JOIN ngos n ON n.user_id = u.id ",
            $filter
        )
    };
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user without an NGO profile. Returns the user ID.
    pub async fn create(
        &self,
        uuid: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, name, email, password_hash, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create an NGO account and its profile in one transaction. Returns the user ID.
    pub async fn create_with_ngo(
        &self,
        uuid: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        ngo: &NewNgo,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query(
            "INSERT INTO users (uuid, name, email, password_hash, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Role::Ngo.as_str())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO ngos (uuid, user_id, name, description, verified) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&ngo.uuid)
        .bind(user_id)
        .bind(&ngo.name)
        .bind(&ngo.description)
        .bind(ngo.verified)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    /// Look up a user and password hash by email (case-insensitive).
    pub async fn get_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Credentials::try_from).transpose()
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.uuid = ?"))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(Credentials::try_from)
            .transpose()?
            .map(|creds| creds.user))
    }

    /// Check whether an account already uses this email.
    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }
}
