//! Typed artifact handles passed between pipeline steps.
//!
//! A handle is the tracker-relative path of a logged artifact (for example
//! `xtrain/xtrain.csv`) or a run-qualified URI (`runs:/<run_id>/xtrain/xtrain.csv`).
//! The kind parameter keeps a features handle from being passed where a model
//! handle is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Scheme prefix for run-qualified artifact URIs.
pub const RUNS_SCHEME: &str = "runs:/";

pub trait HandleKind {
    const LABEL: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Features;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Model;

impl HandleKind for Dataset {
    const LABEL: &'static str = "dataset";
}

impl HandleKind for Features {
    const LABEL: &'static str = "features";
}

impl HandleKind for Target {
    const LABEL: &'static str = "target";
}

impl HandleKind for Model {
    const LABEL: &'static str = "model";
}

#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Handle<K> {
    path: String,
    #[serde(skip)]
    _kind: PhantomData<K>,
}

pub type DatasetHandle = Handle<Dataset>;
pub type FeaturesHandle = Handle<Features>;
pub type TargetHandle = Handle<Target>;
pub type ModelHandle = Handle<Model>;

impl<K> Handle<K> {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), _kind: PhantomData }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Split a `runs:/<run_id>/<path>` handle into its run id and relative path.
    #[must_use]
    pub fn run_scope(&self) -> Option<(&str, &str)> {
        self.path.strip_prefix(RUNS_SCHEME)?.split_once('/')
    }

    /// Qualify a relative handle with the run that owns it.
    #[must_use]
    pub fn qualified(&self, run_id: &str) -> Self {
        if self.run_scope().is_some() {
            return self.clone();
        }
        Self::new(format!("{RUNS_SCHEME}{run_id}/{}", self.path))
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl<K: HandleKind> Handle<K> {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        K::LABEL
    }
}

// Implemented by hand so the marker type needs none of these traits.
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.path).finish()
    }
}

impl<K> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

impl<K> AsRef<str> for Handle<K> {
    fn as_ref(&self) -> &str {
        &self.path
    }
}
