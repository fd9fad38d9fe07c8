//! Serializable policy documents.
//!
//! [`PolicyConfig`] mirrors every [`PolicyBuilder`] option so a policy can be
//! kept in a JSON file, reviewed, and loaded at startup. Missing fields take
//! the builder defaults and unknown fields are rejected.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PolicyError, PolicyResult};
use crate::policy::{ElementAction, Policy, PolicyBuilder, RelativeUrls};

/// How relative URLs are handled, in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RelativeUrlsConfig {
    #[default]
    Allow,
    Deny,
    RewriteWithBase { base: String },
}

/// One forced attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedAttribute {
    pub name: String,
    pub value: String,
}

/// A policy as it appears in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PolicyConfig {
    pub allowed_elements: BTreeSet<String>,
    /// Element name (or `*`) to attribute names.
    pub allowed_attributes: BTreeMap<String, BTreeSet<String>>,
    pub allowed_attribute_prefixes: BTreeSet<String>,
    pub allowed_url_schemes: BTreeSet<String>,
    pub url_attributes: BTreeSet<String>,
    pub relative_urls: RelativeUrlsConfig,
    pub element_actions: BTreeMap<String, ElementAction>,
    pub default_action: ElementAction,
    /// Element name to attributes set on every kept instance, in order.
    pub force_attributes: BTreeMap<String, Vec<ForcedAttribute>>,
    pub allowed_classes: BTreeMap<String, BTreeSet<String>>,
    /// Element name to class prefixes kept alongside `allowed_classes`.
    pub allowed_class_prefixes: BTreeMap<String, BTreeSet<String>>,
    /// Element name (or `*`) to attribute name to the only values it may take.
    pub allowed_attribute_values: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    /// Element name to the URL attribute it cannot do without.
    pub require_urls: BTreeMap<String, String>,
    pub rename_elements: BTreeMap<String, String>,
    /// Input element name to the element put around it.
    pub wrap_elements: BTreeMap<String, String>,
    /// Signed so that a negative value is reported as a policy error rather
    /// than a parse error.
    pub max_nesting_depth: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::from_builder(&PolicyBuilder::new())
    }
}

impl PolicyConfig {
    /// Parse a JSON policy document.
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty JSON with sorted keys, suitable for review and diffing.
    pub fn to_json_pretty(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_builder(builder: &PolicyBuilder) -> Self {
        Self {
            allowed_elements: builder.allowed_elements.iter().cloned().collect(),
            allowed_attributes: builder
                .allowed_attributes
                .iter()
                .map(|(element, names)| (element.clone(), names.iter().cloned().collect()))
                .collect(),
            allowed_attribute_prefixes: builder.allowed_attribute_prefixes.iter().cloned().collect(),
            allowed_url_schemes: builder.allowed_url_schemes.iter().cloned().collect(),
            url_attributes: builder.url_attributes.iter().cloned().collect(),
            relative_urls: match &builder.relative_urls {
                RelativeUrls::Allow => RelativeUrlsConfig::Allow,
                RelativeUrls::Deny => RelativeUrlsConfig::Deny,
                RelativeUrls::RewriteWithBase(base) => RelativeUrlsConfig::RewriteWithBase {
                    base: base.to_string(),
                },
            },
            element_actions: builder
                .element_actions
                .iter()
                .map(|(element, action)| (element.clone(), *action))
                .collect(),
            default_action: builder.default_action,
            force_attributes: builder
                .force_attributes
                .iter()
                .map(|(element, pairs)| {
                    let forced = pairs
                        .iter()
                        .map(|(name, value)| ForcedAttribute {
                            name: name.clone(),
                            value: value.clone(),
                        })
                        .collect();
                    (element.clone(), forced)
                })
                .collect(),
            allowed_classes: builder
                .allowed_classes
                .iter()
                .map(|(element, classes)| (element.clone(), classes.iter().cloned().collect()))
                .collect(),
            allowed_class_prefixes: builder
                .allowed_class_prefixes
                .iter()
                .map(|(element, prefixes)| (element.clone(), prefixes.iter().cloned().collect()))
                .collect(),
            allowed_attribute_values: builder
                .allowed_attribute_values
                .iter()
                .map(|(element, constraints)| {
                    let constraints: BTreeMap<String, BTreeSet<String>> = constraints
                        .iter()
                        .map(|(attr, values)| (attr.clone(), values.iter().cloned().collect()))
                        .collect();
                    (element.clone(), constraints)
                })
                .collect(),
            require_urls: builder
                .required_urls
                .iter()
                .map(|(element, attr)| (element.clone(), attr.clone()))
                .collect(),
            rename_elements: builder
                .renamed_elements
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            wrap_elements: builder
                .wrapped_elements
                .iter()
                .map(|(element, wrapper)| (element.clone(), wrapper.clone()))
                .collect(),
            max_nesting_depth: i64::try_from(builder.max_nesting_depth).unwrap_or(i64::MAX),
        }
    }
}

impl Policy {
    /// Export the policy for audit or storage.
    pub fn to_config(&self) -> PolicyConfig {
        PolicyConfig::from_builder(&self.to_builder())
    }

    /// Build and validate a policy from its configuration form.
    pub fn from_config(config: &PolicyConfig) -> PolicyResult<Self> {
        if config.max_nesting_depth <= 0 {
            return Err(PolicyError::InvalidPolicy(format!(
                "max_nesting_depth must be positive, got {}",
                config.max_nesting_depth
            )));
        }
        let max_nesting_depth = usize::try_from(config.max_nesting_depth).unwrap_or(usize::MAX);

        let relative_urls = match &config.relative_urls {
            RelativeUrlsConfig::Allow => RelativeUrls::Allow,
            RelativeUrlsConfig::Deny => RelativeUrls::Deny,
            RelativeUrlsConfig::RewriteWithBase { base } => {
                RelativeUrls::RewriteWithBase(Url::parse(base)?)
            }
        };

        // Start from an empty builder so the document fully replaces the defaults.
        let mut builder = PolicyBuilder::new()
            .clear_url_schemes()
            .allow_elements(&config.allowed_elements)
            .allow_attribute_prefixes(&config.allowed_attribute_prefixes)
            .allow_url_schemes(&config.allowed_url_schemes)
            .relative_urls(relative_urls)
            .default_action(config.default_action)
            .max_nesting_depth(max_nesting_depth);
        builder.url_attributes.clear();
        builder.element_actions.clear();
        builder = builder.url_attributes(&config.url_attributes);

        for (element, names) in &config.allowed_attributes {
            builder = builder.allow_attributes(element, names);
        }
        for (element, action) in &config.element_actions {
            builder = builder.element_action(element, *action);
        }
        for (element, forced) in &config.force_attributes {
            for attr in forced {
                builder = builder.force_attribute(element, &attr.name, &attr.value);
            }
        }
        for (element, classes) in &config.allowed_classes {
            builder = builder.allow_classes(element, classes);
        }
        for (element, prefixes) in &config.allowed_class_prefixes {
            builder = builder.allow_class_prefixes(element, prefixes);
        }
        for (element, constraints) in &config.allowed_attribute_values {
            for (attr, values) in constraints {
                builder = builder.allow_attribute_values(element, attr, values);
            }
        }
        for (element, attr) in &config.require_urls {
            builder = builder.require_url(element, attr);
        }
        for (from, to) in &config.rename_elements {
            builder = builder.rename_element(from, to);
        }
        for (element, wrapper) in &config.wrap_elements {
            builder = builder.wrap_element(element, wrapper);
        }

        builder.build()
    }

    /// Shorthand for [`PolicyConfig::from_json`] followed by [`Policy::from_config`].
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        Self::from_config(&PolicyConfig::from_json(json)?)
    }
}
