// SPDX-License-Identifier: MIT

//! Dynamic routing node

use super::{resolve_identity, Node};
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use crate::kinetic::workflow::state::ExecutionContext;
use crate::kinetic::workflow::types::NodeType;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Computes the route key for the current context
pub type RouterFn = Arc<dyn Fn(&ExecutionContext) -> String + Send + Sync>;

#[derive(Default, Clone)]
pub struct RouterConfig {
    pub id: String,
    pub name: String,
    pub router: Option<RouterFn>,
    /// Route key to node; a `None` node is a no-op route
    pub routes: HashMap<String, Option<Arc<dyn Node>>>,
}

/// Runs the node registered under the key returned by the router function
pub struct Router {
    id: String,
    name: String,
    router: RouterFn,
    routes: HashMap<String, Option<Arc<dyn Node>>>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Result<Self, WorkflowError> {
        let router = config
            .router
            .ok_or_else(|| WorkflowError::config("router function is required"))?;
        if config.routes.is_empty() {
            return Err(WorkflowError::config("router requires at least one route"));
        }
        let (id, name) = resolve_identity("router", config.id, config.name);
        Ok(Self {
            id,
            name,
            router,
            routes: config.routes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered route keys, sorted
    pub fn route_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[async_trait]
impl Node for Router {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Router
    }

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let route = (self.router)(exec);
        exec.set(
            format!("router_{}_selected", self.id),
            Value::String(route.clone()),
        );

        match self.routes.get(&route) {
            Some(Some(node)) => node.execute(ctx, exec).await,
            Some(None) => Ok(()),
            None => Err(WorkflowError::RouteNotFound {
                router: self.id.clone(),
                route,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::node::testing::suffix_step;

    fn by_prefix() -> RouterFn {
        Arc::new(|exec: &ExecutionContext| {
            exec.current_input()
                .split(':')
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }

    fn router() -> Router {
        Router::new(RouterConfig {
            name: "support".to_string(),
            router: Some(by_prefix()),
            routes: HashMap::from([
                ("billing".to_string(), Some(suffix_step("billing", " -> billing"))),
                ("tech".to_string(), Some(suffix_step("tech", " -> tech"))),
                ("ignore".to_string(), None),
            ]),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_router_requires_function_and_routes() {
        assert!(Router::new(RouterConfig::default()).is_err());
        assert!(Router::new(RouterConfig {
            router: Some(by_prefix()),
            ..Default::default()
        })
        .is_err());
        assert_eq!(router().id(), "router-support");
        assert_eq!(router().route_keys(), vec!["billing", "ignore", "tech"]);
    }

    #[tokio::test]
    async fn test_router_selects_route() {
        let node = router();
        let mut exec = ExecutionContext::new("tech: printer on fire");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert_eq!(exec.output, "tech: printer on fire -> tech");
        assert_eq!(
            exec.get("router_router-support_selected"),
            Some(&Value::String("tech".to_string()))
        );
    }

    #[tokio::test]
    async fn test_nil_route_is_noop() {
        let node = router();
        let mut exec = ExecutionContext::new("ignore: spam");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert!(exec.output.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route_fails() {
        let node = router();
        let mut exec = ExecutionContext::new("sales: quote");
        let err = node.execute(&CancelContext::new(), &mut exec).await.unwrap_err();
        assert_eq!(err.to_string(), "router router-support: route 'sales' not found");
        // the selection is still recorded
        assert_eq!(
            exec.get("router_router-support_selected"),
            Some(&Value::String("sales".to_string()))
        );
    }
}
