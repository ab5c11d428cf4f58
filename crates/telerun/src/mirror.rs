//! # Class Mirror
//!
//! Outgoing side: remembers which classes the peer has seen and sends a
//! description for each lineage, root ancestor first, awaiting the
//! `class` ack before the instance that needs it can travel.
//!
//! Incoming side: the `className → description` table that stub
//! dispatch resolves against, walking the parent chain on miss.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use telewire::ClassDesc;
use telewire::Fault;
use telewire::FaultKind;
use telewire::GetterDesc;
use telewire::IteratorKind;
use telewire::Verb;

use crate::object::ClassShape;
use crate::transport::Channel;

pub(crate) struct Mirror {
    /// Classes already described to the peer.
    sent: Mutex<HashSet<String>>,
    /// Classes the peer has described to us.
    received: DashMap<String, ClassDesc>,
}

impl Mirror {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(HashSet::new()),
            received: DashMap::new(),
        }
    }

    /// Guarantees a completed `class` exchange for the shape and every
    /// ancestor, parent before child. Duplicate sends can race between
    /// concurrent marshals; the receiving side ignores repeats.
    pub(crate) async fn ensure_described(
        &self,
        shape: &ClassShape,
        channel: &Arc<dyn Channel>,
    ) -> Result<(), Fault> {
        for ancestor in shape.lineage() {
            if self.sent.lock().await.contains(&ancestor.name) {
                continue;
            }
            let payload = serde_json::to_value(vec![describe(ancestor)])
                .map_err(|e| Fault::protocol(format!("class description encoding: {}", e)))?;
            channel
                .call_remote(Verb::Class.as_str(), payload)
                .await
                .map_err(Fault::from)?;
            self.sent.lock().await.insert(ancestor.name.clone());
        }
        Ok(())
    }

    /// Installs a peer-described class. Duplicates are ignored; a child
    /// arriving before its parent is a protocol-order violation.
    pub(crate) fn receive(&self, desc: ClassDesc) -> Result<(), Fault> {
        if self.received.contains_key(&desc.class_name) {
            return Ok(());
        }
        if let Some(parent) = &desc.extends {
            if !self.received.contains_key(parent) {
                return Err(Fault::new(
                    FaultKind::UnknownParentClass,
                    format!(
                        "class '{}' extends '{}', which has not been described",
                        desc.class_name, parent
                    ),
                ));
            }
        }
        tracing::debug!(class = %desc.class_name, "mirrored class");
        self.received.insert(desc.class_name.clone(), desc);
        Ok(())
    }

    /// True when the class or an ancestor declares the method.
    pub(crate) fn has_function(&self, class: &str, method: &str) -> bool {
        self.walk(class, |desc| {
            desc.functions.iter().any(|f| f == method).then_some(())
        })
        .is_some()
    }

    /// The getter declaration for a property, searching the chain.
    pub(crate) fn getter(&self, class: &str, property: &str) -> Option<GetterDesc> {
        self.walk(class, |desc| {
            desc.getters.iter().find(|g| g.name == property).cloned()
        })
    }

    /// The iteration protocol the class (or an ancestor) implements.
    pub(crate) fn iterator_kind(&self, class: &str) -> Option<IteratorKind> {
        self.walk(class, |desc| desc.iterator)
    }

    fn walk<T>(&self, class: &str, pick: impl Fn(&ClassDesc) -> Option<T>) -> Option<T> {
        let mut cursor = Some(class.to_string());
        while let Some(name) = cursor {
            let desc = self.received.get(&name)?;
            if let Some(found) = pick(&desc) {
                return Some(found);
            }
            cursor = desc.extends.clone();
        }
        None
    }
}

/// The wire description of a declared shape: non-underscore members
/// only, with the parent named for ordering enforcement.
fn describe(shape: &ClassShape) -> ClassDesc {
    ClassDesc {
        class_name: shape.name.clone(),
        extends: shape.parent.as_ref().map(|parent| parent.name.clone()),
        iterator: shape.iterator,
        functions: shape
            .functions
            .iter()
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect(),
        getters: shape
            .getters
            .iter()
            .filter(|getter| !getter.name.starts_with('_'))
            .cloned()
            .collect(),
        properties: shape
            .properties
            .iter()
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect(),
    }
}
