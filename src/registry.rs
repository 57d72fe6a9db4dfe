//! # Model Registry
//!
//! Process-wide cache of validated [`ClientModel`]s, one per declared
//! interface.
//!
//! ## Overview
//!
//! Building a model means analyzing the declaration, validating it and
//! compiling a request template per method. That work is done once per
//! interface for the lifetime of the process; every client bound to the same
//! interface shares the resulting `Arc<ClientModel>`. Rejected interfaces are
//! cached too, so a bad declaration is reported the same way on every bind
//! without being re-analyzed.
//!
//! ## Thread Safety
//!
//! Slots live in a `DashMap` keyed by `TypeId`. Each slot is an
//! `Arc<OnceCell<..>>`; the map guard is released before the cell is
//! initialized, so:
//! - unrelated interfaces build concurrently
//! - concurrent first requests for the same interface block on the cell and
//!   observe the single model it produces

use crate::analyzer::InterfaceDecl;
use crate::error::{Error, Result};
use crate::model::ClientModel;
use crate::validator::{self, Diagnostic, Validated};
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A type that carries an interface declaration.
///
/// Implemented by the marker types `#[brrtclient_macros::api]` emits, or by
/// hand for interfaces declared with the runtime builders.
pub trait Declared: 'static {
    fn declaration() -> InterfaceDecl;

    /// Name of the declared interface.
    fn interface_name() -> String {
        Self::declaration().name
    }
}

#[derive(Debug)]
struct Rejected {
    interface: String,
    diagnostics: Vec<Diagnostic>,
}

type Built = std::result::Result<Arc<ClientModel>, Arc<Rejected>>;
type Slot = Arc<OnceCell<Built>>;

/// Compute-once cache of client models
#[derive(Debug, Default)]
pub struct ModelRegistry {
    slots: DashMap<TypeId, Slot>,
    builds: AtomicUsize,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for `D`, building it on first use.
    pub fn get_or_build<D: Declared>(&self) -> Result<Arc<ClientModel>> {
        self.get_or_build_with(TypeId::of::<D>(), || {
            let decl = D::declaration();
            validator::build(&&decl)
        })
    }

    /// Model for `key`, building it with `build` on first use.
    pub fn get_or_build_with<F>(&self, key: TypeId, build: F) -> Result<Arc<ClientModel>>
    where
        F: FnOnce() -> Validated,
    {
        // Clone the slot out so the shard lock is not held while building
        let slot: Slot = Arc::clone(self.slots.entry(key).or_default().value());

        if let Some(built) = slot.get() {
            debug!(?key, "Model cache hit");
            return Self::result(built);
        }

        let built = slot.get_or_init(|| {
            let validated = build();
            self.builds.fetch_add(1, Ordering::Relaxed);
            match validated.model {
                Some(model) => {
                    info!(
                        interface = %model.name(),
                        methods = model.templates().len(),
                        diagnostics = model.diagnostics.len(),
                        "Built client model"
                    );
                    Ok(Arc::new(model))
                }
                None => {
                    let interface = validated
                        .diagnostics
                        .first()
                        .map(|d| d.location.interface.clone())
                        .unwrap_or_default();
                    info!(
                        interface = %interface,
                        diagnostics = validated.diagnostics.len(),
                        "Rejected client model"
                    );
                    Err(Arc::new(Rejected {
                        interface,
                        diagnostics: validated.diagnostics,
                    }))
                }
            }
        });
        Self::result(built)
    }

    fn result(built: &Built) -> Result<Arc<ClientModel>> {
        match built {
            Ok(model) => Ok(Arc::clone(model)),
            Err(rejected) => Err(Error::InvalidDeclaration {
                interface: rejected.interface.clone(),
                diagnostics: rejected.diagnostics.clone(),
            }),
        }
    }

    /// Number of cached interfaces, rejected ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// How many times a model was actually built
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

static REGISTRY: Lazy<ModelRegistry> = Lazy::new(ModelRegistry::new);

/// The process-wide registry.
pub fn registry() -> &'static ModelRegistry {
    &REGISTRY
}

/// Model for `D` from the process-wide registry.
pub fn model<D: Declared>() -> Result<Arc<ClientModel>> {
    registry().get_or_build::<D>()
}
