use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sparse deployment options as written by the user.
///
/// Every field is optional; [`crate::config::resolve`] turns this into a
/// fully-defaulted [`crate::types::DeploymentPlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOptions {
    #[serde(default, deserialize_with = "lenient::path")]
    pub root_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub remote_dir: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub only_update_env: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub skip_post_commands: Option<bool>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub clear_folders: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub ensure_folders: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::delete_paths")]
    pub delete_paths: Option<DeletePathsOptions>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub upload: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub commands: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub env_fields: Option<Vec<String>>,
    /// Prefix of the deployment-scoped variable checked before the bare name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub env_prefix: Option<String>,
    /// Remote-relative name of the generated env file.
    #[serde(default, deserialize_with = "lenient::string")]
    pub env_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePathsOptions {
    #[serde(default, deserialize_with = "lenient::list")]
    pub dirs: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub files: Option<Vec<String>>,
}

/// Decoders that treat malformed optional fields as absent instead of
/// failing the whole manifest.
mod lenient {
    use super::DeletePathsOptions;
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};
    use std::path::PathBuf;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Item {
        Text(String),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListShape {
        Many(Vec<Item>),
        One(String),
        Other(IgnoredAny),
    }

    pub fn list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let shape = Option::<ListShape>::deserialize(deserializer)?;
        Ok(match shape {
            Some(ListShape::Many(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Text(text) => Some(text),
                        Item::Other(_) => None,
                    })
                    .collect(),
            ),
            Some(ListShape::One(text)) => Some(vec![text]),
            Some(ListShape::Other(_)) | None => None,
        })
    }

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Item>::deserialize(deserializer)? {
            Some(Item::Text(text)) => Some(text),
            _ => None,
        })
    }

    pub fn path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string(deserializer)?.map(PathBuf::from))
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Other(IgnoredAny),
        }

        Ok(match Option::<Flag>::deserialize(deserializer)? {
            Some(Flag::Bool(value)) => Some(value),
            _ => None,
        })
    }

    pub fn delete_paths<'de, D>(deserializer: D) -> Result<Option<DeletePathsOptions>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Paths(DeletePathsOptions),
            Other(IgnoredAny),
        }

        Ok(match Option::<Shape>::deserialize(deserializer)? {
            Some(Shape::Paths(paths)) => Some(paths),
            _ => None,
        })
    }
}

/// SSH endpoint the deployment targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTarget {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Extra `-o` options handed to ssh verbatim.
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

fn default_port() -> u16 {
    22
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: None,
            identity_file: None,
            ssh_options: Vec::new(),
        }
    }

    /// `user@host`, or just `host` when no username is configured.
    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// On-disk deployment manifest: where to deploy plus what to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployManifest {
    #[serde(default)]
    pub remote: Option<RemoteTarget>,
    #[serde(flatten)]
    pub options: DeployOptions,
}
