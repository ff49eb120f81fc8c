use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Provider;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Provider,
    Customer,
}

impl Role {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "provider" => Some(Role::Provider),
            "customer" | "user" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// Identity attached by the upstream gateway. Authentication happens there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    /// Admins may act on any provider, providers only on the ones they own.
    pub fn ensure_can_manage(&self, provider: &Provider) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Provider if provider.owner_user_id == self.user_id => Ok(()),
            _ => Err(AppError::Forbidden(
                "Not authorized to manage quality data for this provider".into(),
            )),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let user_id = header(USER_ID_HEADER)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| AppError::Forbidden("Missing or invalid caller identity".into()))?;
        let role = header(USER_ROLE_HEADER)
            .and_then(|raw| Role::parse(&raw))
            .ok_or_else(|| AppError::Forbidden("Missing or invalid caller role".into()))?;

        Ok(Caller { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn provider(owner_user_id: Uuid) -> Provider {
        Provider {
            id: Uuid::new_v4(),
            name: "Harbor Family Clinic".to_string(),
            email: "frontdesk@harborfamilyclinic.com".to_string(),
            category: "clinic".to_string(),
            owner_user_id,
        }
    }

    async fn extract(headers: &[(&str, &str)]) -> Result<Caller, AppError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_identity_headers() {
        let user_id = Uuid::new_v4().to_string();
        let caller = extract(&[(USER_ID_HEADER, user_id.as_str()), (USER_ROLE_HEADER, "Admin")])
            .await
            .unwrap();
        assert_eq!(caller.role, Role::Admin);
        assert_eq!(caller.user_id.to_string(), user_id);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_identity() {
        assert!(matches!(extract(&[]).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "not-a-uuid"), (USER_ROLE_HEADER, "admin")]).await,
            Err(AppError::Forbidden(_))
        ));
        let user_id = Uuid::new_v4().to_string();
        assert!(matches!(
            extract(&[(USER_ID_HEADER, user_id.as_str()), (USER_ROLE_HEADER, "superuser")]).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn providers_manage_only_their_own_listing() {
        let owner = Uuid::new_v4();
        let listing = provider(owner);

        let as_owner = Caller { user_id: owner, role: Role::Provider };
        let as_other = Caller { user_id: Uuid::new_v4(), role: Role::Provider };
        let as_admin = Caller { user_id: Uuid::new_v4(), role: Role::Admin };
        let as_customer = Caller { user_id: owner, role: Role::Customer };

        assert!(as_owner.ensure_can_manage(&listing).is_ok());
        assert!(as_admin.ensure_can_manage(&listing).is_ok());
        assert!(as_other.ensure_can_manage(&listing).is_err());
        assert!(as_customer.ensure_can_manage(&listing).is_err());
    }
}
