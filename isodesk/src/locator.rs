use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::selector::Query;
use crate::types::Capability;
use tracing::{debug, instrument};

pub const DEFAULT_POINT_SCAN_LIMIT: usize = 8000;
pub const DEFAULT_QUERY_MATCH_LIMIT: usize = 6000;
pub const DEFAULT_ANCESTOR_HOPS: usize = 20;

/// Resolves elements inside one window's accessibility tree.
///
/// Every walk is capped so a pathological tree costs bounded time.
#[derive(Debug, Clone, Copy)]
pub struct ElementLocator {
    point_scan_limit: usize,
    query_match_limit: usize,
    ancestor_hops: usize,
}

impl Default for ElementLocator {
    fn default() -> Self {
        Self {
            point_scan_limit: DEFAULT_POINT_SCAN_LIMIT,
            query_match_limit: DEFAULT_QUERY_MATCH_LIMIT,
            ancestor_hops: DEFAULT_ANCESTOR_HOPS,
        }
    }
}

impl ElementLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point_scan_limit(mut self, limit: usize) -> Self {
        self.point_scan_limit = limit;
        self
    }

    pub fn with_query_match_limit(mut self, limit: usize) -> Self {
        self.query_match_limit = limit;
        self
    }

    pub fn with_ancestor_hops(mut self, hops: usize) -> Self {
        self.ancestor_hops = hops;
        self
    }

    /// Smallest descendant of `root` whose bounds contain the screen point.
    ///
    /// The root is never a candidate. Equal areas resolve to the element seen
    /// first in pre-order, so the result is stable for a static tree.
    #[instrument(level = "debug", skip(self, root))]
    pub fn find_at_point(
        &self,
        root: &UIElement,
        x: i32,
        y: i32,
    ) -> Result<Option<UIElement>, AutomationError> {
        let mut best: Option<(i64, UIElement)> = None;
        for candidate in root.descendants(self.point_scan_limit)? {
            let Ok(bounds) = candidate.bounds() else {
                continue;
            };
            if !bounds.contains(x, y) {
                continue;
            }
            let area = bounds.area();
            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                best = Some((area, candidate));
            }
        }
        Ok(best.map(|(_, element)| element))
    }

    /// First element under `root` matching `query`; the root itself for the empty query.
    #[instrument(level = "debug", skip(self, root), fields(query = %query))]
    pub fn find_by_query(
        &self,
        root: &UIElement,
        query: &Query,
    ) -> Result<Option<UIElement>, AutomationError> {
        if query.is_root() {
            return Ok(Some(root.clone()));
        }
        let candidates = if query.has_structured() {
            root.find_all(query, self.query_match_limit)?
        } else {
            root.descendants(self.query_match_limit)?
        };
        debug!("{} candidates for '{}'", candidates.len(), query);
        Ok(candidates.into_iter().find(|el| query.matches_contains(el)))
    }

    /// `element` or its nearest ancestor exposing the Scroll capability.
    pub fn find_scrollable_ancestor(&self, element: &UIElement) -> Option<UIElement> {
        let mut current = element.clone();
        for _ in 0..=self.ancestor_hops {
            if current.has_capability(Capability::Scroll) {
                return Some(current);
            }
            match current.parent() {
                Ok(Some(parent)) => current = parent,
                _ => return None,
            }
        }
        None
    }

    /// First descendant flagged as the default push button of its dialog.
    pub fn find_default_button(&self, root: &UIElement) -> Result<Option<UIElement>, AutomationError> {
        Ok(root
            .descendants(self.point_scan_limit)?
            .into_iter()
            .find(UIElement::is_default_button))
    }

    /// First descendant that accepts text: SetValue capable and not read-only.
    pub fn find_editable(&self, root: &UIElement) -> Result<Option<UIElement>, AutomationError> {
        Ok(root
            .descendants(self.point_scan_limit)?
            .into_iter()
            .find(|el| el.has_capability(Capability::SetValue) && !el.is_read_only().unwrap_or(true)))
    }
}
