use crate::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
pub const TAG_VERSION: &str = "BagIt-Version";
pub const TAG_ENCODING: &str = "Tag-File-Character-Encoding";
pub const TAG_OXUM: &str = "Payload-Oxum";
pub const TAG_BAG_SIZE: &str = "Bag-Size";
pub const TAG_BAGGING_DATE: &str = "Bagging-Date";

pub const DEFAULT_BAGIT_VERSION: &str = "0.97";
pub const TAR_MIME: &str = "application/tar";

/// Whether a bag must, may, or must not be serialized into an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    Required,
    #[default]
    Optional,
    Forbidden,
}

impl FromStr for Serialization {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "required" => Ok(Serialization::Required),
            "optional" => Ok(Serialization::Optional),
            "forbidden" => Ok(Serialization::Forbidden),
            other => Err(ProfileError::BadSerialization(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ProfileError {
    #[error("Unknown serialization requirement `{0}`")]
    BadSerialization(String),
    #[error("Failed to parse profile JSON: {0}")]
    Json(String),
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] crate::algorithm::UnsupportedAlgorithm),
}

/// One tag a profile requires or allows in a tag file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    /// Tag file this tag lives in, e.g. `bag-info.txt`
    pub tag_file: String,
    pub tag_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub empty_ok: bool,
    /// Allowed values; empty means unconstrained
    #[serde(default)]
    pub allowed_values: Vec<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    /// Runtime override, set by the caller or by the bagger for
    /// system-managed tags
    #[serde(default)]
    pub user_value: Option<String>,
}

impl TagDefinition {
    pub fn new(tag_file: &str, tag_name: &str) -> Self {
        Self {
            tag_file: tag_file.to_string(),
            tag_name: tag_name.to_string(),
            required: false,
            empty_ok: false,
            allowed_values: Vec::new(),
            default_value: None,
            user_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.user_value = Some(value.to_string());
        self
    }

    /// User value if set, otherwise the default.
    pub fn effective_value(&self) -> Option<&str> {
        self.user_value
            .as_deref()
            .or(self.default_value.as_deref())
    }
}

/// Declarative contract a bag must satisfy: accepted versions, required
/// manifest algorithms, tag definitions, serialization rules.
///
/// Immutable during a validation run. The bagger mutates tag values once,
/// before any manifest work starts, to inject `Payload-Oxum`, `Bag-Size`
/// and `Bagging-Date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagItProfile {
    #[serde(default)]
    pub accepted_bagit_versions: Vec<String>,
    #[serde(default)]
    pub accepted_serializations: Vec<String>,
    #[serde(default)]
    pub serialization: Serialization,
    #[serde(default)]
    pub allow_fetch_file: bool,
    #[serde(default)]
    pub manifests_required: Vec<Algorithm>,
    #[serde(default)]
    pub manifests_allowed: Vec<Algorithm>,
    #[serde(default)]
    pub tag_manifests_required: Vec<Algorithm>,
    #[serde(default)]
    pub tag_manifests_allowed: Vec<Algorithm>,
    /// Glob patterns (only `*` wildcards) or `*` for any
    #[serde(default)]
    pub tag_files_allowed: Vec<String>,
    #[serde(default)]
    pub tags: Vec<TagDefinition>,
}

impl BagItProfile {
    /// Empty profile; callers fill in requirements before use.
    pub fn empty() -> Self {
        Self {
            accepted_bagit_versions: Vec::new(),
            accepted_serializations: Vec::new(),
            serialization: Serialization::Optional,
            allow_fetch_file: false,
            manifests_required: Vec::new(),
            manifests_allowed: Vec::new(),
            tag_manifests_required: Vec::new(),
            tag_manifests_allowed: Vec::new(),
            tag_files_allowed: vec!["*".to_string()],
            tags: Vec::new(),
        }
    }

    /// Smallest useful profile: one payload algorithm, `bagit.txt` tags with
    /// their RFC 8493 defaults, a `bag-info.txt` that may hold the injected
    /// tags.
    pub fn minimal(algorithms: &[Algorithm]) -> Self {
        let mut profile = Self::empty();
        profile.accepted_bagit_versions = vec![DEFAULT_BAGIT_VERSION.to_string(), "1.0".to_string()];
        profile.manifests_required = algorithms.to_vec();
        profile.manifests_allowed = algorithms.to_vec();
        profile.tags = vec![
            TagDefinition::new(BAGIT_TXT, TAG_VERSION)
                .required()
                .with_default(DEFAULT_BAGIT_VERSION),
            TagDefinition::new(BAGIT_TXT, TAG_ENCODING)
                .required()
                .with_default("UTF-8"),
        ];
        profile
    }

    /// Import the external "standard" BagIt-profile JSON dialect
    /// (`Accept-BagIt-Version`, `Manifests-Required`, `Bag-Info`, ...).
    ///
    /// A pure mapping into the internal shape; unknown keys are ignored.
    pub fn from_standard_json(json: &str) -> Result<Self, ProfileError> {
        let standard: StandardProfile =
            serde_json::from_str(json).map_err(|e| ProfileError::Json(e.to_string()))?;

        standard.into_profile()
    }

    /// All tag definitions living in `tag_file`, in declaration order.
    pub fn tags_for_file<'a>(&'a self, tag_file: &'a str) -> impl Iterator<Item = &'a TagDefinition> {
        self.tags.iter().filter(move |tag| tag.tag_file == tag_file)
    }

    /// Tag files named by at least one definition, in declaration order.
    pub fn tag_file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for tag in &self.tags {
            if !names.contains(&tag.tag_file.as_str()) {
                names.push(&tag.tag_file);
            }
        }
        names
    }

    /// Set (or define) a tag's runtime value. Used by the bagger for
    /// system-managed tags like `Payload-Oxum`.
    pub fn set_tag_value(&mut self, tag_file: &str, tag_name: &str, value: &str) {
        if let Some(tag) = self
            .tags
            .iter_mut()
            .find(|t| t.tag_file == tag_file && t.tag_name == tag_name)
        {
            tag.user_value = Some(value.to_string());
        } else {
            self.tags
                .push(TagDefinition::new(tag_file, tag_name).with_value(value));
        }
    }

    /// True when the profile's serialization rule mandates a tar target and
    /// nothing else.
    pub fn requires_tar(&self) -> bool {
        self.serialization == Serialization::Required
            && self.accepted_serializations.iter().all(|s| s == TAR_MIME)
            && !self.accepted_serializations.is_empty()
    }

    pub fn accepts_tar(&self) -> bool {
        self.serialization != Serialization::Forbidden
            && self.accepted_serializations.iter().any(|s| s == TAR_MIME)
    }

    /// Is `name` allowed as a tag file under `tag_files_allowed`?
    pub fn tag_file_allowed(&self, name: &str) -> bool {
        if self.tag_files_allowed.is_empty() {
            return true;
        }
        self.tag_files_allowed
            .iter()
            .any(|pattern| wildcard_match(pattern, name))
    }

    /// Pre-flight completeness check. Returns the full ordered list of
    /// problems; an empty list means the profile can drive a run.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.manifests_required.is_empty() {
            errors.push("Profile requires no payload manifest algorithm.".to_string());
        }
        for (file, name) in [(BAGIT_TXT, TAG_VERSION), (BAGIT_TXT, TAG_ENCODING)] {
            if !self
                .tags
                .iter()
                .any(|t| t.tag_file == file && t.tag_name == name)
            {
                errors.push(format!("Profile must define tag {name} in {file}."));
            }
        }
        for tag in &self.tags {
            match tag.effective_value() {
                Some(value) => {
                    if !tag.allowed_values.is_empty()
                        && !tag.allowed_values.iter().any(|v| v == value)
                    {
                        errors.push(format!(
                            "Tag {} in {} has value '{}' which is not in the list of allowed values.",
                            tag.tag_name, tag.tag_file, value
                        ));
                    }
                    if value.is_empty() && tag.required && !tag.empty_ok {
                        errors.push(format!(
                            "Tag {} in {} is required but empty.",
                            tag.tag_name, tag.tag_file
                        ));
                    }
                }
                None => {
                    if tag.required && !tag.empty_ok {
                        errors.push(format!(
                            "Required tag {} in {} has no value.",
                            tag.tag_name, tag.tag_file
                        ));
                    }
                }
            }
        }

        errors
    }
}

/// `*`-only wildcard match, anchored at both ends.
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut remainder = name;
    let mut first = true;
    let mut parts = pattern.split('*').peekable();
    while let Some(part) = parts.next() {
        if first {
            first = false;
            remainder = match remainder.strip_prefix(part) {
                Some(rest) => rest,
                None => return false,
            };
            continue;
        }
        if parts.peek().is_none() {
            // Last literal must anchor at the end
            return part.is_empty() || remainder.ends_with(part);
        }
        match remainder.find(part) {
            Some(at) => remainder = &remainder[at + part.len()..],
            None => return false,
        }
    }
    // Pattern had no '*' at all
    pattern == name || remainder.is_empty()
}

/// External BagIt-profile JSON dialect, field names per
/// <https://bagit-profiles.github.io/bagit-profiles-specification/>.
#[derive(Debug, Default, Deserialize)]
struct StandardProfile {
    #[serde(rename = "Accept-BagIt-Version", default)]
    accept_bagit_version: Vec<String>,
    #[serde(rename = "Accept-Serialization", default)]
    accept_serialization: Vec<String>,
    #[serde(rename = "Serialization", default)]
    serialization: Option<String>,
    #[serde(rename = "Allow-Fetch.txt", default)]
    allow_fetch_txt: bool,
    #[serde(rename = "Manifests-Required", default)]
    manifests_required: Vec<String>,
    #[serde(rename = "Manifests-Allowed", default)]
    manifests_allowed: Vec<String>,
    #[serde(rename = "Tag-Manifests-Required", default)]
    tag_manifests_required: Vec<String>,
    #[serde(rename = "Tag-Manifests-Allowed", default)]
    tag_manifests_allowed: Vec<String>,
    #[serde(rename = "Tag-Files-Allowed", default)]
    tag_files_allowed: Vec<String>,
    #[serde(rename = "Bag-Info", default)]
    bag_info: BTreeMap<String, StandardTag>,
}

#[derive(Debug, Default, Deserialize)]
struct StandardTag {
    #[serde(default)]
    required: bool,
    #[serde(default)]
    values: Vec<String>,
    #[serde(rename = "defaultValue", default)]
    default_value: Option<String>,
}

impl StandardProfile {
    fn into_profile(self) -> Result<BagItProfile, ProfileError> {
        let parse_all = |names: Vec<String>| -> Result<Vec<Algorithm>, ProfileError> {
            names
                .into_iter()
                .map(|name| name.parse().map_err(ProfileError::from))
                .collect()
        };

        let mut profile = BagItProfile::minimal(&[]);
        profile.manifests_required = parse_all(self.manifests_required)?;
        profile.manifests_allowed = parse_all(self.manifests_allowed)?;
        profile.tag_manifests_required = parse_all(self.tag_manifests_required)?;
        profile.tag_manifests_allowed = parse_all(self.tag_manifests_allowed)?;
        if !self.accept_bagit_version.is_empty() {
            profile.accepted_bagit_versions = self.accept_bagit_version;
        }
        profile.accepted_serializations = self.accept_serialization;
        if let Some(serialization) = self.serialization {
            profile.serialization = serialization.parse()?;
        }
        profile.allow_fetch_file = self.allow_fetch_txt;
        if !self.tag_files_allowed.is_empty() {
            profile.tag_files_allowed = self.tag_files_allowed;
        }

        for (name, tag) in self.bag_info {
            let mut definition = TagDefinition::new(BAG_INFO_TXT, &name);
            definition.required = tag.required;
            definition.allowed_values = tag.values;
            definition.default_value = tag.default_value;
            profile.tags.push(definition);
        }

        Ok(profile)
    }
}
