use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use tracing::warn;

use crate::observability::AUTH_FAILURES_TOTAL;

/// What a session may do. Chosen by the startup user name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full read/write.
    Admin,
    /// SELECT only.
    Visitor,
}

impl Role {
    pub fn from_user(user: &str) -> Option<Role> {
        match user {
            "admin" => Some(Role::Admin),
            "visitor" => Some(Role::Visitor),
            _ => None,
        }
    }

    pub fn may_mutate(self) -> bool {
        self == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub admin_password: String,
    pub visitor_password: String,
}

impl Credentials {
    pub fn password_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_password,
            Role::Visitor => &self.visitor_password,
        }
    }
}

#[derive(Debug)]
pub struct RentalAuthSource {
    credentials: Credentials,
}

impl RentalAuthSource {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AuthSource for RentalAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user = login.user().unwrap_or_default();
        let Some(role) = Role::from_user(user) else {
            metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
            warn!(user, "login refused: unknown user");
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                format!("unknown user {user:?}"),
            ))));
        };
        Ok(Password::new(
            None,
            self.credentials.password_for(role).as_bytes().to_vec(),
        ))
    }
}
