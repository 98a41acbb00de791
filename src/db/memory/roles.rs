use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, repos::RoleRepo},
    models::Role,
};

#[derive(Default)]
pub struct MemoryRoleRepo {
    roles: RwLock<HashMap<Uuid, Role>>,
}

fn name_taken(roles: &HashMap<Uuid, Role>, candidate: &Role) -> bool {
    roles
        .values()
        .any(|r| r.id != candidate.id && r.name == candidate.name)
}

#[async_trait]
impl RoleRepo for MemoryRoleRepo {
    async fn create(&self, role: Role) -> DbResult<Role> {
        let mut roles = self.roles.write();
        if roles.contains_key(&role.id) || name_taken(&roles, &role) {
            return Err(DbError::Conflict(format!(
                "Role '{}' already exists",
                role.name
            )));
        }
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Role>> {
        Ok(self.roles.read().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> DbResult<Vec<Role>> {
        let roles = self.roles.read();
        Ok(ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
    }

    async fn list(&self) -> DbResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.read().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update(&self, role: Role) -> DbResult<Role> {
        let mut roles = self.roles.write();
        if !roles.contains_key(&role.id) {
            return Err(DbError::NotFound);
        }
        if name_taken(&roles, &role) {
            return Err(DbError::Conflict(format!(
                "Role '{}' already exists",
                role.name
            )));
        }
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        self.roles
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }
}
