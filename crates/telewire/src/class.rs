//! # Class Descriptions
//!
//! The wire record of a class's stable shape. A description is sent at
//! most once per class per direction per session, and a parent is always
//! described before any child or instance that names it.

use serde::Deserialize;
use serde::Serialize;

/// Which iteration protocol a class implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IteratorKind {
    #[serde(rename = "iterator")]
    Iterator,
    #[serde(rename = "asyncIterator")]
    AsyncIterator,
}

/// One mirrored getter, with its companion-setter flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetterDesc {
    pub name: String,
    pub has_setter: bool,
}

impl GetterDesc {
    pub fn new(name: impl Into<String>, has_setter: bool) -> Self {
        Self {
            name: name.into(),
            has_setter,
        }
    }
}

/// The shape of a class as transmitted over the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDesc {
    pub class_name: String,
    /// Parent class name. The parent's description must arrive first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator: Option<IteratorKind>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub getters: Vec<GetterDesc>,
    /// Declared data-property names transmitted with each instance.
    #[serde(default)]
    pub properties: Vec<String>,
}
