//! Model Registry — the catalog of registered models grouped by task type,
//! and the cost/quality-aware candidate selector the gateway walks on a miss.

use std::collections::HashMap;

use tracing::debug;

use crate::models::model::{ComplexityTier, ModelConfig, RoutingCriteria};

/// Immutable after construction. The routing table maps a task type to an
/// ordered list of model ids; ids the catalog does not know are dropped at
/// load time with a warning.
#[derive(Debug)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
    routing: HashMap<String, Vec<String>>,
    fallback_task: String,
}

impl ModelRegistry {
    pub fn new(
        models: Vec<ModelConfig>,
        routing: HashMap<String, Vec<String>>,
        fallback_task: impl Into<String>,
    ) -> Self {
        let models: HashMap<String, ModelConfig> =
            models.into_iter().map(|m| (m.id.clone(), m)).collect();

        let routing = routing
            .into_iter()
            .map(|(task, ids)| {
                let known: Vec<String> = ids
                    .into_iter()
                    .filter(|id| {
                        let found = models.contains_key(id);
                        if !found {
                            tracing::warn!(model_id = %id, task = %task, "routing table references unknown model, dropping");
                        }
                        found
                    })
                    .collect();
                (task, known)
            })
            .collect();

        Self {
            models,
            routing,
            fallback_task: fallback_task.into(),
        }
    }

    /// Every distinct provider named by the catalog. Used to build the
    /// breaker registry at startup.
    pub fn providers(&self) -> Vec<String> {
        let mut providers: Vec<String> =
            self.models.values().map(|m| m.provider.clone()).collect();
        providers.sort();
        providers.dedup();
        providers
    }

    /// The ordered candidate list for one request.
    ///
    /// Unrouted task types fall back to the default task's list. Models whose
    /// tier cannot satisfy the request are dropped; survivors are ordered by
    /// the routing criteria (cost: ascending cost then priority; quality:
    /// ascending priority then cost).
    pub fn select_candidates(
        &self,
        task_type: &str,
        complexity: ComplexityTier,
        criteria: RoutingCriteria,
    ) -> Vec<&ModelConfig> {
        let ids = self
            .routing
            .get(task_type)
            .or_else(|| self.routing.get(&self.fallback_task));

        let mut candidates: Vec<&ModelConfig> = ids
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.models.get(id))
                    .filter(|m| m.satisfies(complexity))
                    .collect()
            })
            .unwrap_or_default();

        match criteria {
            RoutingCriteria::Cost => candidates.sort_by(|a, b| {
                a.cost_per_token
                    .total_cmp(&b.cost_per_token)
                    .then(a.priority.cmp(&b.priority))
            }),
            RoutingCriteria::Quality => candidates.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.cost_per_token.total_cmp(&b.cost_per_token))
            }),
        }

        debug!(
            task = task_type,
            ?complexity,
            ?criteria,
            count = candidates.len(),
            "selected candidate models"
        );
        candidates
    }
}
