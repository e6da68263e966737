use serde::Deserialize;

use super::lenient;

/// Catalogue entry from `LLMRef` / `EmbLLMRef`: `type` is the vendor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelRef {
    #[serde(rename = "type", default, deserialize_with = "lenient::string")]
    pub vendor: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

/// Models grouped by vendor, vendors in the order the catalogue lists them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelCatalog {
    pub vendors: Vec<(String, Vec<String>)>,
}

impl ModelCatalog {
    pub fn from_refs(refs: &[ModelRef]) -> Self {
        let mut vendors: Vec<(String, Vec<String>)> = Vec::new();
        for model in refs {
            match vendors.iter_mut().find(|(vendor, _)| *vendor == model.vendor) {
                Some((_, models)) => models.push(model.name.clone()),
                None => vendors.push((model.vendor.clone(), vec![model.name.clone()])),
            }
        }
        Self { vendors }
    }

    pub fn vendor_names(&self) -> Vec<&str> {
        self.vendors.iter().map(|(v, _)| v.as_str()).collect()
    }

    pub fn models_for(&self, vendor: &str) -> &[String] {
        self.vendors
            .iter()
            .find(|(v, _)| v == vendor)
            .map(|(_, models)| models.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_models_by_vendor_in_first_seen_order() {
        let refs: Vec<ModelRef> = serde_json::from_str(
            r#"[{"type":"OpenAI","name":"gpt-4"},{"type":"AzureOpenAI","name":"gpt-4o"},{"type":"OpenAI","name":"gpt-3.5"}]"#,
        )
        .unwrap();
        let catalog = ModelCatalog::from_refs(&refs);
        assert_eq!(catalog.vendor_names(), vec!["OpenAI", "AzureOpenAI"]);
        assert_eq!(catalog.models_for("OpenAI"), ["gpt-4", "gpt-3.5"]);
        assert!(catalog.models_for("Mistral").is_empty());
    }
}
