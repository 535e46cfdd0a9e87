use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, ImageStatus, Uploadable, UserId};

/// Object-key prefix for avatars.
pub const AVATAR_PREFIX: &str = "avatars";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub name: String,
    /// A replacement avatar accompanies the request.
    pub with_avatar: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub image_status: ImageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

impl User {
    pub fn create(cmd: CreateUser, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = validate_name(&cmd.name)?;
        let email = cmd.email.trim().to_ascii_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(DomainError::validation("email is not valid")),
        }

        Ok(Self {
            id: UserId::new(),
            name,
            email,
            avatar_url: None,
            image_status: ImageStatus::Default,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a profile update. With an avatar a new upload cycle starts, which
    /// fails with `Conflict` while a previous avatar is still in flight.
    pub fn update_profile(&mut self, cmd: UpdateProfile, now: DateTime<Utc>) -> DomainResult<()> {
        let name = validate_name(&cmd.name)?;
        if cmd.with_avatar {
            self.begin_upload()?;
        }
        self.name = name;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for User {
    const KIND: &'static str = "user";
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Uploadable for User {
    fn image_status(&self) -> ImageStatus {
        self.image_status
    }

    fn image_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    fn store_image(&mut self, status: ImageStatus, url: Option<String>) {
        self.image_status = status;
        self.avatar_url = url;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::create(
            CreateUser {
                name: "Ayu".into(),
                email: "Ayu@Example.com".into(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_normalizes_email() {
        assert_eq!(user().email, "ayu@example.com");
    }

    #[test]
    fn create_rejects_bad_email() {
        let res = User::create(
            CreateUser {
                name: "Ayu".into(),
                email: "nope".into(),
            },
            Utc::now(),
        );
        assert!(matches!(res, Err(DomainError::Validation(_))));
    }

    #[test]
    fn profile_update_with_avatar_starts_upload() {
        let mut u = user();
        u.update_profile(
            UpdateProfile {
                name: "Ayu Lestari".into(),
                with_avatar: true,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(u.name, "Ayu Lestari");
        assert_eq!(u.image_status, ImageStatus::Uploading);
    }

    #[test]
    fn profile_update_conflicts_during_upload_and_keeps_name() {
        let mut u = user();
        u.begin_upload().unwrap();
        u.advance_image(ImageStatus::Local, None).unwrap();

        let err = u
            .update_profile(
                UpdateProfile {
                    name: "Other".into(),
                    with_avatar: true,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(u.name, "Ayu");
        assert_eq!(u.image_status, ImageStatus::Local);
    }
}
