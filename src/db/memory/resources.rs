use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, repos::ResourceRepo},
    models::Resource,
};

#[derive(Default)]
pub struct MemoryResourceRepo {
    resources: RwLock<HashMap<Uuid, Resource>>,
}

fn pattern_taken(resources: &HashMap<Uuid, Resource>, candidate: &Resource) -> bool {
    resources
        .values()
        .any(|r| r.id != candidate.id && r.pattern == candidate.pattern)
}

fn conflict(resource: &Resource) -> DbError {
    DbError::Conflict(format!(
        "A resource with pattern '{}' already exists",
        resource.pattern
    ))
}

#[async_trait]
impl ResourceRepo for MemoryResourceRepo {
    async fn create(&self, resource: Resource) -> DbResult<Resource> {
        let mut resources = self.resources.write();
        if resources.contains_key(&resource.id) || pattern_taken(&resources, &resource) {
            return Err(conflict(&resource));
        }
        resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Resource>> {
        Ok(self.resources.read().get(&id).cloned())
    }

    async fn get_by_pattern(&self, pattern: &str) -> DbResult<Option<Resource>> {
        Ok(self
            .resources
            .read()
            .values()
            .find(|r| r.pattern == pattern)
            .cloned())
    }

    async fn list(&self) -> DbResult<Vec<Resource>> {
        let mut resources: Vec<Resource> = self.resources.read().values().cloned().collect();
        resources.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(resources)
    }

    async fn list_by_role(&self, role_id: Uuid) -> DbResult<Vec<Resource>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| r.role_ids.contains(&role_id))
            .collect())
    }

    async fn update(&self, resource: Resource) -> DbResult<Resource> {
        let mut resources = self.resources.write();
        if !resources.contains_key(&resource.id) {
            return Err(DbError::NotFound);
        }
        if pattern_taken(&resources, &resource) {
            return Err(conflict(&resource));
        }
        resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        self.resources
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};

    use super::*;

    fn resource(pattern: &str, priority: i64) -> Resource {
        let now = Utc::now();
        Resource {
            id: Uuid::new_v4(),
            name: pattern.into(),
            pattern: pattern.into(),
            http_method: None,
            description: None,
            priority,
            is_active: true,
            role_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_duplicate_pattern_conflicts() {
        let repo = MemoryResourceRepo::default();
        repo.create(resource("/admin/**", 1)).await.unwrap();

        let err = repo.create(resource("/admin/**", 2)).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_then_age() {
        let repo = MemoryResourceRepo::default();
        let mut older = resource("/b/**", 1);
        older.created_at -= Duration::seconds(5);
        repo.create(resource("/c/**", 2)).await.unwrap();
        repo.create(resource("/a/**", 1)).await.unwrap();
        repo.create(older).await.unwrap();

        let patterns: Vec<_> = repo.list().await.unwrap().into_iter().map(|r| r.pattern).collect();
        assert_eq!(patterns, vec!["/b/**", "/a/**", "/c/**"]);
    }

    #[tokio::test]
    async fn test_list_by_role() {
        let repo = MemoryResourceRepo::default();
        let role = Uuid::new_v4();
        let mut guarded = resource("/guarded/**", 1);
        guarded.role_ids.insert(role);
        repo.create(guarded).await.unwrap();
        repo.create(resource("/open/**", 2)).await.unwrap();

        let found = repo.list_by_role(role).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern, "/guarded/**");
    }
}
