use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{
    RoleService,
    error::{ServiceError, ServiceResult},
    outcome::{MirrorStatus, MutationOutcome, mirror},
    password::PasswordHasher,
    role_names,
};
use crate::{
    config::UsersConfig,
    db::Repos,
    idp::{IdentityProvider, IdpCredential, IdpUser},
    models::{CreateUser, Page, Role, UpdateUserProfile, User, UserQuery, UserSearch, UserView},
};

/// User administration.
#[derive(Clone)]
pub struct UserService {
    repos: Repos,
    roles: RoleService,
    idp: Arc<dyn IdentityProvider>,
    hasher: Arc<dyn PasswordHasher>,
    config: UsersConfig,
}

fn idp_user(user: &User) -> IdpUser {
    let mut attributes = BTreeMap::new();
    if let Some(phone) = &user.phone_number {
        attributes.insert("phone_number".to_string(), vec![phone.clone()]);
    }
    IdpUser {
        id: None,
        username: user.username.clone(),
        email: Some(user.email.clone()),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        enabled: true,
        attributes,
        credentials: Vec::new(),
    }
}

impl UserService {
    pub fn new(
        repos: Repos,
        roles: RoleService,
        idp: Arc<dyn IdentityProvider>,
        hasher: Arc<dyn PasswordHasher>,
        config: UsersConfig,
    ) -> Self {
        Self {
            repos,
            roles,
            idp,
            hasher,
            config,
        }
    }

    async fn active(&self, id: Uuid) -> ServiceResult<User> {
        self.repos
            .users
            .get_by_id(id)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| ServiceError::NotFound(format!("User {id}")))
    }

    async fn view(&self, user: &User) -> ServiceResult<UserView> {
        let roles = role_names(&*self.repos.roles, &user.role_ids).await?;
        Ok(UserView::new(user, roles))
    }

    async fn ensure_phone_free(&self, phone: Option<&str>, owner: Option<Uuid>) -> ServiceResult<()> {
        let Some(phone) = phone else {
            return Ok(());
        };
        match self.repos.users.get_by_phone(phone).await? {
            Some(other) if Some(other.id) != owner => Err(ServiceError::Conflict(
                "Phone number is already registered".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Register a new user with the default role.
    ///
    /// Steps, in order: uniqueness checks, password hashing, default role
    /// (created if absent), local insert, then identity-provider creation and
    /// role sync. Only the local steps can fail the call.
    pub async fn register(&self, input: CreateUser) -> ServiceResult<MutationOutcome<UserView>> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        if self.repos.users.get_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{username}' is already taken"
            )));
        }
        if self.repos.users.get_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email '{email}' is already registered"
            )));
        }
        self.ensure_phone_free(input.phone_number.as_deref(), None)
            .await?;

        let password_hash = self.hasher.hash(&input.password)?;
        let (default_role, role_mirror) = self
            .roles
            .ensure(&self.config.default_role, &self.config.default_role_description)
            .await?;

        let now = Utc::now();
        let user = self
            .repos
            .users
            .create(User {
                id: Uuid::new_v4(),
                username,
                email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                phone_number: input.phone_number,
                address: input.address,
                role_ids: BTreeSet::from([default_role.id]),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let mut representation = idp_user(&user);
        representation.credentials = vec![IdpCredential::password(&input.password)];
        let desired = BTreeSet::from([default_role.name.clone()]);
        let idp = mirror(&*self.idp, "idp.register_user", async {
            self.idp.create_user(&representation).await?;
            self.idp.sync_user_roles(&user.username, &desired).await
        })
        .await;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(MutationOutcome::new(
            UserView::new(&user, desired),
            MirrorStatus::Skipped,
            role_mirror.and(idp),
        ))
    }

    pub async fn get_basic_info(&self, id: Uuid) -> ServiceResult<UserView> {
        let user = self.active(id).await?;
        self.view(&user).await
    }

    pub async fn get_roles(&self, id: Uuid) -> ServiceResult<Vec<Role>> {
        let user = self.active(id).await?;
        let ids: Vec<Uuid> = user.role_ids.into_iter().collect();
        Ok(self.repos.roles.get_many(&ids).await?)
    }

    /// Update name, phone number and address.
    pub async fn update_profile(
        &self,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> ServiceResult<MutationOutcome<UserView>> {
        let mut user = self.active(id).await?;
        self.ensure_phone_free(input.phone_number.as_deref(), Some(id))
            .await?;

        if input.first_name.is_some() {
            user.first_name = input.first_name;
        }
        if input.last_name.is_some() {
            user.last_name = input.last_name;
        }
        if input.phone_number.is_some() {
            user.phone_number = input.phone_number;
        }
        if input.address.is_some() {
            user.address = input.address;
        }
        user.updated_at = Utc::now();

        let user = self.repos.users.update(user).await?;
        let representation = idp_user(&user);
        let idp = mirror(
            &*self.idp,
            "idp.update_user",
            self.idp.update_user(&user.username, &representation),
        )
        .await;

        Ok(MutationOutcome::new(
            self.view(&user).await?,
            MirrorStatus::Skipped,
            idp,
        ))
    }

    /// Soft delete. The user disappears from reads and searches and is
    /// removed from the identity provider.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<MutationOutcome<UserView>> {
        let mut user = self.active(id).await?;
        user.is_deleted = true;
        user.updated_at = Utc::now();
        let user = self.repos.users.update(user).await?;

        let idp = mirror(&*self.idp, "idp.delete_user", self.idp.delete_user(&user.username)).await;

        info!(user_id = %user.id, username = %user.username, "User deleted");
        Ok(MutationOutcome::new(
            self.view(&user).await?,
            MirrorStatus::Skipped,
            idp,
        ))
    }

    pub async fn add_role(
        &self,
        id: Uuid,
        role_name: &str,
    ) -> ServiceResult<MutationOutcome<UserView>> {
        let role = self.roles.get_by_name(role_name).await?;
        let mut user = self.active(id).await?;
        if user.role_ids.insert(role.id) {
            user.updated_at = Utc::now();
            user = self.repos.users.update(user).await?;
        }
        self.sync_roles(user).await
    }

    pub async fn remove_role(
        &self,
        id: Uuid,
        role_name: &str,
    ) -> ServiceResult<MutationOutcome<UserView>> {
        let role = self.roles.get_by_name(role_name).await?;
        let mut user = self.active(id).await?;
        if user.role_ids.remove(&role.id) {
            user.updated_at = Utc::now();
            user = self.repos.users.update(user).await?;
        }
        self.sync_roles(user).await
    }

    async fn sync_roles(&self, user: User) -> ServiceResult<MutationOutcome<UserView>> {
        let view = self.view(&user).await?;
        let idp = mirror(
            &*self.idp,
            "idp.sync_user_roles",
            self.idp.sync_user_roles(&user.username, &view.roles),
        )
        .await;
        Ok(MutationOutcome::new(view, MirrorStatus::Skipped, idp))
    }

    /// Push the stored profile and roles to the identity provider again.
    ///
    /// For reconciling after a partial failure. Creates the provider-side
    /// user (without credentials) if it is missing.
    ///
    /// # Errors
    /// `Upstream` when the provider call fails; nothing local changes.
    pub async fn resync(&self, id: Uuid) -> ServiceResult<MirrorStatus> {
        let user = self.active(id).await?;
        if !self.idp.is_enabled() {
            return Ok(MirrorStatus::Skipped);
        }

        let representation = idp_user(&user);
        if self.idp.find_user(&user.username).await?.is_some() {
            self.idp
                .update_user(&user.username, &representation)
                .await?;
        } else {
            self.idp.create_user(&representation).await?;
        }
        let roles = role_names(&*self.repos.roles, &user.role_ids).await?;
        self.idp.sync_user_roles(&user.username, &roles).await?;

        info!(user_id = %user.id, "User resynced to identity provider");
        Ok(MirrorStatus::Applied)
    }

    /// Search active users by username substring and role names.
    ///
    /// Unknown role names match nobody.
    pub async fn search(&self, search: UserSearch) -> ServiceResult<Page<UserView>> {
        let size = search
            .size
            .unwrap_or(self.config.page_size_default)
            .clamp(1, self.config.page_size_max);

        let wanted = search.role_names();
        let mut role_ids = BTreeSet::new();
        for name in &wanted {
            if let Some(role) = self.repos.roles.get_by_name(name).await? {
                role_ids.insert(role.id);
            }
        }
        if !wanted.is_empty() && role_ids.is_empty() {
            return Ok(Page {
                items: Vec::new(),
                page: search.page,
                size,
                total: 0,
            });
        }

        let (users, total) = self
            .repos
            .users
            .search(&UserQuery {
                username_contains: search.username,
                role_ids,
                page: search.page,
                size,
            })
            .await?;

        let mut items = Vec::with_capacity(users.len());
        for user in &users {
            items.push(self.view(user).await?);
        }
        Ok(Page {
            items,
            page: search.page,
            size,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Address,
        services::{
            password::Argon2PasswordHasher,
            test_support::{FakeIdp, create_user, harness},
        },
    };

    #[tokio::test]
    async fn test_register_assigns_default_role_everywhere() {
        let idp = Arc::new(FakeIdp::default());
        let h = harness(idp.clone());

        let outcome = h.services.users.register(create_user("alice")).await.unwrap();
        assert_eq!(outcome.identity_provider, MirrorStatus::Applied);
        assert!(outcome.entity.roles.contains("ROLE_USER"));

        let role = h.services.roles.get_by_name("ROLE_USER").await.unwrap();
        assert_eq!(role.description.as_deref(), Some("default user role"));
        assert!(idp.users.lock()["alice"].contains("ROLE_USER"));
    }

    #[tokio::test]
    async fn test_register_stores_salted_hash() {
        let h = harness(Arc::new(FakeIdp::default()));
        let view = h.services.users.register(create_user("alice")).await.unwrap().entity;

        let stored = h.repos.users.get_by_id(view.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "correct horse battery");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(Argon2PasswordHasher::default().verify("correct horse battery", &stored.password_hash));
    }

    #[tokio::test]
    async fn test_register_conflicts_before_any_change() {
        let idp = Arc::new(FakeIdp::default());
        let h = harness(idp.clone());
        h.services.users.register(create_user("alice")).await.unwrap();

        let mut same_email = create_user("alice2");
        same_email.email = "ALICE@example.com".into();
        let err = h.services.users.register(same_email).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = h.services.users.register(create_user("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(idp.users.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_register_reports_partial_success_when_idp_down() {
        let h = harness(Arc::new(FakeIdp::failing()));

        let outcome = h.services.users.register(create_user("alice")).await.unwrap();
        assert!(outcome.is_partial());
        assert!(matches!(outcome.identity_provider, MirrorStatus::Failed { .. }));

        // Local state is kept.
        let found = h.services.users.get_basic_info(outcome.entity.id).await;
        assert!(found.is_ok());
    }

    #[tokio::test]
    async fn test_resync_surfaces_upstream_failure() {
        let idp = Arc::new(FakeIdp::failing());
        let h = harness(idp.clone());
        let view = h.services.users.register(create_user("alice")).await.unwrap().entity;

        let err = h.services.users.resync(view.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));

        idp.set_failing(false);
        assert_eq!(
            h.services.users.resync(view.id).await.unwrap(),
            MirrorStatus::Applied
        );
        assert!(idp.users.lock()["alice"].contains("ROLE_USER"));
    }

    #[tokio::test]
    async fn test_add_and_remove_role_sync_provider() {
        let idp = Arc::new(FakeIdp::default());
        let h = harness(idp.clone());
        let user = h.register("alice").await;
        h.services
            .roles
            .create(crate::models::CreateRole {
                name: "ROLE_ADMIN".into(),
                description: None,
            })
            .await
            .unwrap();

        let outcome = h.services.users.add_role(user.id, "ROLE_ADMIN").await.unwrap();
        assert!(outcome.entity.roles.contains("ROLE_ADMIN"));
        assert!(idp.users.lock()["alice"].contains("ROLE_ADMIN"));

        h.services.users.remove_role(user.id, "ROLE_ADMIN").await.unwrap();
        assert!(!idp.users.lock()["alice"].contains("ROLE_ADMIN"));

        let err = h.services.users.add_role(user.id, "ROLE_NOPE").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let h = harness(Arc::new(FakeIdp::default()));
        let alice = h.register("alice").await;
        let bob = h.register("bob").await;
        h.services
            .users
            .update_profile(
                bob.id,
                UpdateUserProfile {
                    phone_number: Some("+15550000001".into()),
                    ..UpdateUserProfile::default()
                },
            )
            .await
            .unwrap();

        let err = h
            .services
            .users
            .update_profile(
                alice.id,
                UpdateUserProfile {
                    phone_number: Some("+15550000001".into()),
                    ..UpdateUserProfile::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = h
            .services
            .users
            .update_profile(
                alice.id,
                UpdateUserProfile {
                    last_name: Some("Liddell".into()),
                    address: Some(Address {
                        city: Some("Oxford".into()),
                        ..Address::default()
                    }),
                    ..UpdateUserProfile::default()
                },
            )
            .await
            .unwrap()
            .entity;
        assert_eq!(updated.last_name.as_deref(), Some("Liddell"));
        assert_eq!(
            updated.address.and_then(|a| a.city).as_deref(),
            Some("Oxford")
        );
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_hides_user() {
        let idp = Arc::new(FakeIdp::default());
        let h = harness(idp.clone());
        let user = h.register("alice").await;

        h.services.users.delete(user.id).await.unwrap();

        assert!(matches!(
            h.services.users.get_basic_info(user.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(h.repos.users.get_by_id(user.id).await.unwrap().unwrap().is_deleted);
        assert!(!idp.users.lock().contains_key("alice"));
    }

    #[tokio::test]
    async fn test_search_by_username_and_role() {
        let h = harness(Arc::new(FakeIdp::default()));
        for name in ["alice", "alfred", "bob"] {
            h.register(name).await;
        }
        h.services
            .roles
            .create(crate::models::CreateRole {
                name: "ROLE_ADMIN".into(),
                description: None,
            })
            .await
            .unwrap();
        let bob = h
            .services
            .users
            .search(UserSearch {
                username: Some("bob".into()),
                ..UserSearch::default()
            })
            .await
            .unwrap()
            .items
            .remove(0);
        h.services.users.add_role(bob.id, "ROLE_ADMIN").await.unwrap();

        let page = h
            .services
            .users
            .search(UserSearch {
                username: Some("AL".into()),
                ..UserSearch::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.size, 20);

        let page = h
            .services
            .users
            .search(UserSearch {
                roles: Some("ROLE_ADMIN".into()),
                ..UserSearch::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "bob");

        let page = h
            .services
            .users
            .search(UserSearch {
                roles: Some("ROLE_UNKNOWN".into()),
                size: Some(500),
                ..UserSearch::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.size, 100);
    }
}
