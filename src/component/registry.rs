use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub name: String,
    #[serde(default)]
    pub required_props: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_props: Vec::new(),
            description: None,
        }
    }

    pub fn require(mut self, prop: impl Into<String>) -> Self {
        self.required_props.push(prop.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    #[error("component `{component}` is missing required prop `{prop}`")]
    MissingProp { component: String, prop: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl Validation {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Lookup of component definitions, supplied by the host renderer.
pub trait ComponentRegistry {
    fn get(&self, name: &str) -> Option<&ComponentDefinition>;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn validate(&self, name: &str, props: &Map<String, Value>) -> Validation {
        let Some(def) = self.get(name) else {
            return Validation::from_errors(vec![ValidationError::UnknownComponent(name.to_string())]);
        };
        let errors = def
            .required_props
            .iter()
            .filter(|prop| !props.contains_key(prop.as_str()))
            .map(|prop| ValidationError::MissingProp {
                component: name.to_string(),
                prop: prop.clone(),
            })
            .collect();
        Validation::from_errors(errors)
    }
}

/// Map-backed [`ComponentRegistry`].
#[derive(Debug, Clone, Default)]
pub struct Components {
    defs: FxHashMap<String, ComponentDefinition>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: ComponentDefinition) -> Option<ComponentDefinition> {
        self.defs.insert(def.name.clone(), def)
    }

    pub fn with(mut self, def: ComponentDefinition) -> Self {
        self.register(def);
        self
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.defs.values()
    }
}

impl FromIterator<ComponentDefinition> for Components {
    fn from_iter<I: IntoIterator<Item = ComponentDefinition>>(iter: I) -> Self {
        Self {
            defs: iter.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}

impl ComponentRegistry for Components {
    fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.defs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn validates_required_props() {
        let reg = Components::new().with(ComponentDefinition::new("Card").require("title"));
        assert!(reg.validate("Card", &props(json!({"title": "x"}))).valid);

        let v = reg.validate("Card", &props(json!({})));
        assert!(!v.valid);
        assert_eq!(
            v.errors,
            vec![ValidationError::MissingProp {
                component: "Card".into(),
                prop: "title".into()
            }]
        );
    }

    #[test]
    fn unknown_component_is_invalid() {
        let reg = Components::new();
        let v = reg.validate("Nope", &Map::new());
        assert_eq!(v.errors, vec![ValidationError::UnknownComponent("Nope".into())]);
        assert!(!reg.has("Nope"));
    }

    #[test]
    fn definitions_deserialize_with_defaults() {
        let def: ComponentDefinition = serde_json::from_str(r#"{"name":"Chart"}"#).unwrap();
        assert_eq!(def, ComponentDefinition::new("Chart"));
    }
}
