use crate::config::{ConfigError, Result};
use crate::types::DeployManifest;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest names searched in the working directory, in order.
pub const MANIFEST_CANDIDATES: [&str; 3] = ["deploy.json", "deploy.yaml", "deploy.yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Json,
        }
    }
}

pub fn parse_manifest(content: &str, format: ManifestFormat) -> Result<DeployManifest> {
    match format {
        ManifestFormat::Json => Ok(serde_json::from_str(content)?),
        ManifestFormat::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

pub fn load_manifest(path: &Path) -> Result<DeployManifest> {
    debug!("Loading deployment manifest from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content, ManifestFormat::from_path(path))
}

/// First manifest candidate present in `dir`.
pub fn discover_manifest(dir: &Path) -> Option<PathBuf> {
    MANIFEST_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load the explicit manifest if given, otherwise discover one in `dir`.
pub fn locate_and_load(explicit: Option<&Path>, dir: &Path) -> Result<(PathBuf, DeployManifest)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => discover_manifest(dir).ok_or_else(|| ConfigError::NotFound {
            dir: dir.to_path_buf(),
        })?,
    };
    let manifest = load_manifest(&path)?;
    Ok((path, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("deploy.yml")),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("deploy.yaml")),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("deploy.json")),
            ManifestFormat::Json
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("deploy")),
            ManifestFormat::Json
        );
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = parse_manifest(
            r#"
remote:
  host: example.org
  username: deploy
remoteDir: /srv/app
ensureFolders:
  - logs
deletePaths:
  dirs: [tmp]
envFields: [DB_HOST]
"#,
            ManifestFormat::Yaml,
        )
        .unwrap();

        let remote = manifest.remote.unwrap();
        assert_eq!(remote.host, "example.org");
        assert_eq!(remote.port, 22);
        assert_eq!(manifest.options.remote_dir.as_deref(), Some("/srv/app"));
        assert_eq!(manifest.options.ensure_folders, Some(vec!["logs".to_string()]));
        assert_eq!(
            manifest.options.delete_paths.unwrap().dirs,
            Some(vec!["tmp".to_string()])
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let result = parse_manifest("{ not json", ManifestFormat::Json);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_discovery_order() {
        let dir = TempDir::new().unwrap();
        assert!(discover_manifest(dir.path()).is_none());

        fs::write(dir.path().join("deploy.yml"), "upload: [a]").unwrap();
        fs::write(dir.path().join("deploy.json"), r#"{"upload": ["b"]}"#).unwrap();

        let (path, manifest) = locate_and_load(None, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("deploy.json"));
        assert_eq!(manifest.options.upload, Some(vec!["b".to_string()]));
    }

    #[test]
    fn test_missing_manifest_reports_directory() {
        let dir = TempDir::new().unwrap();
        let result = locate_and_load(None, dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));

        let result = locate_and_load(Some(&dir.path().join("nope.json")), dir.path());
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
