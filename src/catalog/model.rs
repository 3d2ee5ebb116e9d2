//! Catalog data model: the retrieved form and the applyable form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One desired-state resource in the catalog graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub type_name: String,
    pub title: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    /// Canonical reference used as the resource-index key, `Type[title]`.
    pub fn reference(&self) -> String {
        format!("{}[{}]", self.type_name, self.title)
    }
}

/// A catalog as obtained from the source, before conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_version: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// The finalized form handed to the applier: indexes written, retrieval
/// duration recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyableCatalog {
    pub name: String,
    pub environment: String,
    pub configuration_version: Option<String>,
    pub resources: Vec<Resource>,
    /// Resource reference (`Type[title]`) to position in `resources`.
    pub resource_index: BTreeMap<String, usize>,
    pub classes: Vec<String>,
    /// How long catalog retrieval took, carried into apply for reporting.
    pub retrieval_duration: Duration,
}

impl Catalog {
    /// Convert to the applyable form. Pure with respect to the input: the
    /// retrieved catalog is left untouched and repeated conversions yield the
    /// same result.
    pub fn convert(&self, retrieval_duration: Duration) -> ApplyableCatalog {
        let resource_index = self
            .resources
            .iter()
            .enumerate()
            .map(|(idx, resource)| (resource.reference(), idx))
            .collect();

        ApplyableCatalog {
            name: self.name.clone(),
            environment: self.environment.clone(),
            configuration_version: self.configuration_version.clone(),
            resources: self.resources.clone(),
            resource_index,
            classes: self.classes.clone(),
            retrieval_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog {
            name: "node.example".to_string(),
            environment: "production".to_string(),
            transaction_uuid: Some("uuid-1".to_string()),
            job_id: None,
            configuration_version: Some("1766058591".to_string()),
            resources: vec![
                Resource {
                    type_name: "File".to_string(),
                    title: "/etc/motd".to_string(),
                    parameters: serde_json::Map::new(),
                },
                Resource {
                    type_name: "Service".to_string(),
                    title: "sshd".to_string(),
                    parameters: serde_json::Map::new(),
                },
            ],
            classes: vec!["base".to_string()],
        }
    }

    #[test]
    fn convert_builds_resource_index() {
        let applyable = catalog().convert(Duration::from_millis(120));
        assert_eq!(applyable.resource_index.len(), 2);
        assert_eq!(applyable.resource_index.get("File[/etc/motd]"), Some(&0));
        assert_eq!(applyable.resource_index.get("Service[sshd]"), Some(&1));
    }

    #[test]
    fn convert_is_pure_and_repeatable() {
        let retrieved = catalog();
        let first = retrieved.convert(Duration::from_secs(1));
        let second = retrieved.convert(Duration::from_secs(1));
        assert_eq!(first, second);
        // The retrieved form is unchanged by conversion.
        assert_eq!(retrieved, catalog());
    }

    #[test]
    fn convert_records_retrieval_duration() {
        let applyable = catalog().convert(Duration::from_millis(345));
        assert_eq!(applyable.retrieval_duration, Duration::from_millis(345));
    }
}
