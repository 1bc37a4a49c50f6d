//! Read-through cache over a template provider

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::{DefaultTemplate, TemplateProvider};
use crate::error::ServiceError;
use crate::kind::TemplateKind;

/// Memoizes lookups per `(project, kind)`
///
/// Failed lookups are not cached.
pub struct CachedTemplateProvider {
    inner: Arc<dyn TemplateProvider>,
    cache: RwLock<HashMap<(String, TemplateKind), DefaultTemplate>>,
}

impl CachedTemplateProvider {
    pub fn new(inner: Arc<dyn TemplateProvider>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached template
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

#[async_trait]
impl TemplateProvider for CachedTemplateProvider {
    async fn default_template(
        &self,
        project_id: &str,
        kind: TemplateKind,
    ) -> Result<DefaultTemplate, ServiceError> {
        let key = (project_id.to_string(), kind);
        if let Some(template) = self.cache.read().await.get(&key) {
            trace!(project_id, %kind, "template cache hit");
            return Ok(template.clone());
        }

        trace!(project_id, %kind, "template cache miss");
        let template = self.inner.default_template(project_id, kind).await?;
        self.cache.write().await.insert(key, template.clone());
        Ok(template)
    }
}
