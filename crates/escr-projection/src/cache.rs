//! Cache invalidation signals derived from projected node events.
//!
//! Rendered output is cached under tags naming the node, its ancestors and
//! its type. [`CacheFlushingHook`] collects which tags an event touches and
//! hands them to a [`CacheFlusher`] once catch-up is done. Structural events
//! are recorded before they apply as well as after, so both the old and the
//! new location of a node get flushed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use escr_events::{ContentRepositoryEvent, EventEnvelope};
use escr_graph::ProjectionContentGraph;
use escr_types::{ContentStreamId, NodeAggregateId, NodeTypeName, WorkspaceName};

use crate::error::{ProjectionError, ProjectionResult};
use crate::hooks::CatchUpHook;

pub const EVERYTHING_TAG: &str = "Everything";

/// Flush everything cached for one aggregate and the subtrees it sits in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushNodeAggregateRequest {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: Option<NodeTypeName>,
    pub ancestor_node_aggregate_ids: BTreeSet<NodeAggregateId>,
}

impl FlushNodeAggregateRequest {
    pub fn cache_tags(&self) -> Vec<String> {
        let cs = &self.content_stream_id;
        let mut tags = vec![
            EVERYTHING_TAG.to_string(),
            format!("Node_%{cs}%_{}", self.node_aggregate_id),
            format!("DescendantOf_%{cs}%_{}", self.node_aggregate_id),
        ];
        tags.extend(
            self.ancestor_node_aggregate_ids
                .iter()
                .map(|ancestor| format!("DescendantOf_%{cs}%_{ancestor}")),
        );
        if let Some(node_type) = &self.node_type_name {
            tags.push(format!("NodeType_%{cs}%_{node_type}"));
        }
        tags
    }

    fn merge(&mut self, other: FlushNodeAggregateRequest) {
        self.ancestor_node_aggregate_ids
            .extend(other.ancestor_node_aggregate_ids);
        if self.node_type_name.is_none() {
            self.node_type_name = other.node_type_name;
        }
    }
}

/// Flush everything rendered for a workspace whose content was discarded.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlushWorkspaceRequest {
    pub workspace_name: WorkspaceName,
}

impl FlushWorkspaceRequest {
    pub fn cache_tags(&self) -> Vec<String> {
        vec![
            EVERYTHING_TAG.to_string(),
            format!("Workspace_{}", self.workspace_name),
        ]
    }
}

/// Receiver of cache tags to invalidate.
pub trait CacheFlusher: Send {
    fn flush_tags(&mut self, tags: &[String]) -> ProjectionResult<()>;
}

/// Logs the tags instead of flushing a real cache.
#[derive(Debug, Default)]
pub struct TracingCacheFlusher;

impl CacheFlusher for TracingCacheFlusher {
    fn flush_tags(&mut self, tags: &[String]) -> ProjectionResult<()> {
        info!(count = tags.len(), tags = ?tags, "cache tags flushed");
        Ok(())
    }
}

/// Keeps flushed tags in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingCacheFlusher {
    flushed: Arc<Mutex<Vec<String>>>,
}

impl RecordingCacheFlusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushed(&self) -> Vec<String> {
        self.flushed
            .lock()
            .map(|tags| tags.clone())
            .unwrap_or_default()
    }
}

impl CacheFlusher for RecordingCacheFlusher {
    fn flush_tags(&mut self, tags: &[String]) -> ProjectionResult<()> {
        let mut flushed = self
            .flushed
            .lock()
            .map_err(|_| ProjectionError::Hook("recording flusher poisoned".into()))?;
        flushed.extend(tags.iter().cloned());
        Ok(())
    }
}

/// Catch-up hook that turns node events into flush requests.
pub struct CacheFlushingHook<F: CacheFlusher> {
    flusher: F,
    enabled: bool,
    node_requests: BTreeMap<(ContentStreamId, NodeAggregateId), FlushNodeAggregateRequest>,
    workspace_requests: BTreeSet<FlushWorkspaceRequest>,
}

impl<F: CacheFlusher> CacheFlushingHook<F> {
    pub fn new(flusher: F) -> Self {
        Self {
            flusher,
            enabled: true,
            node_requests: BTreeMap::new(),
            workspace_requests: BTreeSet::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn pending(&self) -> usize {
        self.node_requests.len() + self.workspace_requests.len()
    }

    fn record_node(
        &mut self,
        graph: &ProjectionContentGraph<'_>,
        content_stream_id: &ContentStreamId,
        node_aggregate_id: &NodeAggregateId,
    ) -> ProjectionResult<()> {
        let request = FlushNodeAggregateRequest {
            content_stream_id: content_stream_id.clone(),
            node_aggregate_id: node_aggregate_id.clone(),
            node_type_name: graph.find_node_type_name(content_stream_id, node_aggregate_id)?,
            ancestor_node_aggregate_ids: ancestors(graph, content_stream_id, node_aggregate_id)?,
        };
        let key = (content_stream_id.clone(), node_aggregate_id.clone());
        match self.node_requests.get_mut(&key) {
            Some(existing) => existing.merge(request),
            None => {
                self.node_requests.insert(key, request);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> ProjectionResult<()> {
        let nodes = std::mem::take(&mut self.node_requests);
        let workspaces = std::mem::take(&mut self.workspace_requests);
        let mut tags = BTreeSet::new();
        for request in nodes.values() {
            tags.extend(request.cache_tags());
        }
        for request in &workspaces {
            tags.extend(request.cache_tags());
        }
        if tags.is_empty() {
            return Ok(());
        }
        let tags: Vec<String> = tags.into_iter().collect();
        debug!(
            nodes = nodes.len(),
            workspaces = workspaces.len(),
            tags = tags.len(),
            "dispatching cache flush"
        );
        self.flusher.flush_tags(&tags)
    }
}

/// Events whose node is flushed in its old location, before it applies.
fn flushed_before(event: &ContentRepositoryEvent) -> bool {
    matches!(
        event,
        ContentRepositoryEvent::NodeAggregateWasRemoved(_)
            | ContentRepositoryEvent::NodeAggregateWasMoved(_)
    )
}

impl<F: CacheFlusher> CatchUpHook for CacheFlushingHook<F> {
    fn on_before_event(
        &mut self,
        graph: &ProjectionContentGraph<'_>,
        envelope: &EventEnvelope,
    ) -> ProjectionResult<()> {
        if !self.enabled || !flushed_before(&envelope.event) {
            return Ok(());
        }
        if let (Some(cs), Some(aggregate)) = (
            envelope.event.content_stream_id(),
            envelope.event.node_aggregate_id(),
        ) {
            self.record_node(graph, cs, aggregate)?;
        }
        Ok(())
    }

    fn on_after_event(
        &mut self,
        graph: &ProjectionContentGraph<'_>,
        envelope: &EventEnvelope,
    ) -> ProjectionResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match &envelope.event {
            ContentRepositoryEvent::NodeAggregateWasRemoved(_) => Ok(()),
            ContentRepositoryEvent::WorkspaceWasDiscarded(e)
            | ContentRepositoryEvent::WorkspaceWasPartiallyDiscarded(e) => {
                self.workspace_requests.insert(FlushWorkspaceRequest {
                    workspace_name: e.workspace_name.clone(),
                });
                Ok(())
            }
            event => match (event.content_stream_id(), event.node_aggregate_id()) {
                (Some(cs), Some(aggregate)) => self.record_node(graph, cs, aggregate),
                _ => Ok(()),
            },
        }
    }

    fn on_after_catch_up(&mut self) -> ProjectionResult<()> {
        self.flush()
    }
}

/// Every aggregate above `aggregate` in any point of the content stream.
fn ancestors(
    graph: &ProjectionContentGraph<'_>,
    content_stream_id: &ContentStreamId,
    aggregate: &NodeAggregateId,
) -> ProjectionResult<BTreeSet<NodeAggregateId>> {
    let mut found = BTreeSet::new();
    let mut queue = VecDeque::from([aggregate.clone()]);
    while let Some(current) = queue.pop_front() {
        for parent in graph.find_parent_node_aggregate_ids(content_stream_id, &current)? {
            if parent != *aggregate && found.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }
    Ok(found)
}
