use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use webrunner_core_types::{LoadState, PageState};

/// Metadata keys the stability probe reads from [`PageState::metadata`].
/// Drivers that cannot report a signal simply omit the key; absent counts
/// read as zero and absent booleans read as true.
const KEY_PENDING_REQUESTS: &str = "pending_requests";
const KEY_ACTIVE_ANIMATIONS: &str = "active_animations";
const KEY_VISIBLE_LOADERS: &str = "visible_loaders";
const KEY_PENDING_JS_TASKS: &str = "pending_js_tasks";
const KEY_DOM_MUTATIONS: &str = "dom_mutations";
const KEY_IMAGES_LOADED: &str = "images_loaded";
const KEY_FONTS_LOADED: &str = "fonts_loaded";

/// A condition the stability wait polls for.
#[derive(Clone)]
pub enum StabilityCondition {
    NetworkIdle,
    DomStable,
    AnimationsComplete,
    LoadersHidden,
    JavaScriptIdle,
    ImagesLoaded,
    FontsLoaded,
    PageLoad,
    DomContentLoaded,
    /// Caller-supplied predicate over the current metrics snapshot.
    Custom {
        label: String,
        predicate: Arc<dyn Fn(&StabilityMetrics) -> bool + Send + Sync>,
    },
}

impl StabilityCondition {
    pub fn custom(
        label: impl Into<String>,
        predicate: impl Fn(&StabilityMetrics) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            StabilityCondition::NetworkIdle => "network_idle",
            StabilityCondition::DomStable => "dom_stable",
            StabilityCondition::AnimationsComplete => "animations_complete",
            StabilityCondition::LoadersHidden => "loaders_hidden",
            StabilityCondition::JavaScriptIdle => "javascript_idle",
            StabilityCondition::ImagesLoaded => "images_loaded",
            StabilityCondition::FontsLoaded => "fonts_loaded",
            StabilityCondition::PageLoad => "page_load",
            StabilityCondition::DomContentLoaded => "dom_content_loaded",
            StabilityCondition::Custom { label, .. } => label,
        }
    }

    pub fn is_satisfied(&self, metrics: &StabilityMetrics) -> bool {
        match self {
            StabilityCondition::NetworkIdle => metrics.network_idle,
            StabilityCondition::DomStable => metrics.dom_stable,
            StabilityCondition::AnimationsComplete => metrics.animations_complete,
            StabilityCondition::LoadersHidden => metrics.loaders_hidden,
            StabilityCondition::JavaScriptIdle => metrics.javascript_idle,
            StabilityCondition::ImagesLoaded => metrics.images_loaded,
            StabilityCondition::FontsLoaded => metrics.fonts_loaded,
            StabilityCondition::PageLoad => metrics.page_loaded,
            StabilityCondition::DomContentLoaded => metrics.dom_content_loaded,
            StabilityCondition::Custom { predicate, .. } => predicate(metrics),
        }
    }
}

impl fmt::Debug for StabilityCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of page-stability signals plus the derived score.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub dom_stable: bool,
    pub animations_complete: bool,
    pub network_idle: bool,
    pub loaders_hidden: bool,
    pub javascript_idle: bool,
    pub images_loaded: bool,
    pub fonts_loaded: bool,
    pub page_loaded: bool,
    pub dom_content_loaded: bool,
    pub pending_requests: u64,
    pub active_animations: u64,
    pub visible_loaders: u64,
    pub pending_js_tasks: u64,
    pub dom_mutations: u64,
    /// Weighted stability score in [0, 1].
    pub stability_score: f64,
    /// False when the wait gave up before all flags settled.
    pub is_stable: bool,
}

impl StabilityMetrics {
    /// Derive a metrics snapshot from a page-state probe.
    pub fn from_page_state(state: &PageState) -> Self {
        let pending_requests = state.metadata_u64(KEY_PENDING_REQUESTS).unwrap_or(0);
        let active_animations = state.metadata_u64(KEY_ACTIVE_ANIMATIONS).unwrap_or(0);
        let visible_loaders = state.metadata_u64(KEY_VISIBLE_LOADERS).unwrap_or(0);
        let pending_js_tasks = state.metadata_u64(KEY_PENDING_JS_TASKS).unwrap_or(0);
        let dom_mutations = state.metadata_u64(KEY_DOM_MUTATIONS).unwrap_or(0);

        let dom_content_loaded = state.load_state != LoadState::Loading;
        let page_loaded = matches!(state.load_state, LoadState::Load | LoadState::NetworkIdle);
        let network_idle = pending_requests == 0 || state.load_state == LoadState::NetworkIdle;
        let dom_stable = dom_mutations == 0 && dom_content_loaded;

        let mut metrics = Self {
            dom_stable,
            animations_complete: active_animations == 0,
            network_idle,
            loaders_hidden: visible_loaders == 0,
            javascript_idle: pending_js_tasks == 0,
            images_loaded: state.metadata_bool(KEY_IMAGES_LOADED).unwrap_or(true),
            fonts_loaded: state.metadata_bool(KEY_FONTS_LOADED).unwrap_or(true),
            page_loaded,
            dom_content_loaded,
            pending_requests,
            active_animations,
            visible_loaders,
            pending_js_tasks,
            dom_mutations,
            stability_score: 0.0,
            is_stable: false,
        };
        metrics.stability_score = metrics.score();
        metrics.is_stable = metrics.all_flags_stable();
        metrics
    }

    /// A page is stable iff all five core flags hold.
    pub fn all_flags_stable(&self) -> bool {
        self.dom_stable
            && self.animations_complete
            && self.network_idle
            && self.loaders_hidden
            && self.javascript_idle
    }

    fn score(&self) -> f64 {
        fn component(count: u64) -> f64 {
            1.0 / (1.0 + count as f64)
        }
        let dom = component(self.dom_mutations);
        let net = component(self.pending_requests);
        let anim = component(self.active_animations);
        let loaders = component(self.visible_loaders);
        let js = component(self.pending_js_tasks);
        0.30 * dom + 0.25 * net + 0.15 * anim + 0.15 * loaders + 0.15 * js
    }
}
