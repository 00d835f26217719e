//! Vendor catalog loading and ordering.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use naner_schema::{DescriptorError, VendorDescriptor, VendorName};
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../catalog/vendors.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Duplicate vendor name: {0}")]
    Duplicate(VendorName),

    #[error("{vendor}: extractDirectory '{path}' overlaps the directory of {other}")]
    OverlappingDirectory {
        vendor: VendorName,
        other: VendorName,
        path: String,
    },

    #[error("Dependency cycle involving {0}")]
    Cycle(VendorName),

    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),
}

/// An ordered collection of vendor descriptors.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    vendors: Vec<VendorDescriptor>,
}

impl Catalog {
    /// Build a catalog, validating every descriptor and rejecting duplicates.
    ///
    /// Two vendors may not share an extract directory, and neither may live
    /// inside the other's.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for invalid descriptors, duplicate names or
    /// overlapping extract directories.
    pub fn new(vendors: Vec<VendorDescriptor>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut dirs: Vec<(Vec<String>, &VendorName)> = Vec::with_capacity(vendors.len());
        for vendor in &vendors {
            vendor.validate()?;
            if !seen.insert(vendor.name.clone()) {
                return Err(CatalogError::Duplicate(vendor.name.clone()));
            }

            let dir = dir_components(&vendor.extract_directory);
            if let Some((_, other)) = dirs
                .iter()
                .find(|(existing, _)| existing.starts_with(&dir) || dir.starts_with(existing))
            {
                return Err(CatalogError::OverlappingDirectory {
                    vendor: vendor.name.clone(),
                    other: (*other).clone(),
                    path: vendor.extract_directory.clone(),
                });
            }
            dirs.push((dir, &vendor.name));
        }
        Ok(Self { vendors })
    }

    /// Parse a JSON array of descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for malformed JSON or invalid descriptors.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Self::new(serde_json::from_str(text)?)
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// The default vendor set compiled into the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded catalog itself is invalid.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn vendors(&self) -> &[VendorDescriptor] {
        &self.vendors
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&VendorDescriptor> {
        self.vendors.iter().find(|v| v.name == name)
    }

    /// Vendors in processing order: catalog order, except that every vendor
    /// comes after the vendors it depends on.
    ///
    /// Unknown dependencies are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Cycle`] when dependencies form a cycle.
    pub fn ordered(&self) -> Result<Vec<&VendorDescriptor>, CatalogError> {
        let by_name: HashMap<&str, &VendorDescriptor> = self
            .vendors
            .iter()
            .map(|v| (v.name.as_str(), v))
            .collect();

        let mut ordered = Vec::with_capacity(self.vendors.len());
        let mut done = HashSet::new();
        let mut visiting = HashSet::new();

        for vendor in &self.vendors {
            visit(vendor, &by_name, &mut visiting, &mut done, &mut ordered)?;
        }
        Ok(ordered)
    }

    /// Ordered vendors restricted to `names`. An empty filter selects everything.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownVendor`] for names not in the catalog,
    /// or any error from [`Catalog::ordered`].
    pub fn select(&self, names: &[String]) -> Result<Vec<&VendorDescriptor>, CatalogError> {
        if let Some(missing) = names.iter().find(|n| self.find(n).is_none()) {
            return Err(CatalogError::UnknownVendor(missing.clone()));
        }
        let ordered = self.ordered()?;
        if names.is_empty() {
            return Ok(ordered);
        }
        Ok(ordered
            .into_iter()
            .filter(|v| names.iter().any(|n| v.name == n.as_str()))
            .collect())
    }
}

fn visit<'a>(
    vendor: &'a VendorDescriptor,
    by_name: &HashMap<&str, &'a VendorDescriptor>,
    visiting: &mut HashSet<VendorName>,
    done: &mut HashSet<VendorName>,
    ordered: &mut Vec<&'a VendorDescriptor>,
) -> Result<(), CatalogError> {
    if done.contains(&vendor.name) {
        return Ok(());
    }
    if !visiting.insert(vendor.name.clone()) {
        return Err(CatalogError::Cycle(vendor.name.clone()));
    }

    for dep in &vendor.dependencies {
        match by_name.get(dep.as_str()) {
            Some(dep_vendor) => visit(dep_vendor, by_name, visiting, done, ordered)?,
            None => tracing::warn!("{} depends on unknown vendor {}", vendor.name, dep),
        }
    }

    visiting.remove(&vendor.name);
    done.insert(vendor.name.clone());
    ordered.push(vendor);
    Ok(())
}

/// Lowercased path components, so `Tools/X` and `tools\x` compare equal.
fn dir_components(dir: &str) -> Vec<String> {
    dir.split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(name: &str, deps: &[&str]) -> String {
        let deps: Vec<String> = deps.iter().map(|d| format!("\"{d}\"")).collect();
        format!(
            r#"{{"name": "{name}", "extractDirectory": "{name}", "dependencies": [{}],
                "source": {{"type": "static", "url": "https://example.com/{name}.zip"}}}}"#,
            deps.join(",")
        )
    }

    fn catalog(entries: &[String]) -> Result<Catalog, CatalogError> {
        Catalog::from_json(&format!("[{}]", entries.join(",")))
    }

    fn names(vendors: &[&VendorDescriptor]) -> Vec<String> {
        vendors.iter().map(|v| v.name.to_string()).collect()
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        let ordered = catalog.ordered().unwrap();
        assert_eq!(ordered[0].name, "7zip");
        assert!(catalog.find("windows-terminal").unwrap().preserve_state_on_update);
    }

    #[test]
    fn dependencies_come_first_and_order_is_stable() {
        let c = catalog(&[
            vendor("msys2", &["7zip"]),
            vendor("node", &[]),
            vendor("7zip", &[]),
            vendor("go", &[]),
        ])
        .unwrap();
        assert_eq!(
            names(&c.ordered().unwrap()),
            vec!["7zip", "msys2", "node", "go"]
        );
    }

    #[test]
    fn unknown_dependency_is_ignored() {
        let c = catalog(&[vendor("a", &["ghost"]), vendor("b", &[])]).unwrap();
        assert_eq!(names(&c.ordered().unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let c = catalog(&[vendor("a", &["b"]), vendor("b", &["a"])]).unwrap();
        assert!(matches!(c.ordered(), Err(CatalogError::Cycle(_))));
    }

    #[test]
    fn duplicates_are_rejected() {
        let result = catalog(&[vendor("a", &[]), vendor("A", &[])]);
        assert!(matches!(result, Err(CatalogError::Duplicate(_))));
    }

    fn vendor_in(name: &str, dir: &str) -> String {
        format!(
            r#"{{"name": "{name}", "extractDirectory": "{dir}",
                "source": {{"type": "static", "url": "https://example.com/{name}.zip"}}}}"#
        )
    }

    #[test]
    fn shared_extract_directory_is_rejected() {
        let result = catalog(&[vendor_in("a", "tools"), vendor_in("b", "Tools")]);
        match result {
            Err(CatalogError::OverlappingDirectory { vendor, other, .. }) => {
                assert_eq!(vendor, "b");
                assert_eq!(other, "a");
            }
            other => panic!("expected overlap error, got {other:?}"),
        }
    }

    #[test]
    fn nested_extract_directory_is_rejected() {
        let nested = catalog(&[vendor_in("a", "tools"), vendor_in("b", "tools/x")]);
        assert!(matches!(nested, Err(CatalogError::OverlappingDirectory { .. })));

        let parent_second = catalog(&[vendor_in("a", "tools/x"), vendor_in("b", "tools")]);
        assert!(matches!(
            parent_second,
            Err(CatalogError::OverlappingDirectory { .. })
        ));
    }

    #[test]
    fn sibling_directories_with_common_prefix_are_allowed() {
        let c = catalog(&[
            vendor_in("a", "tools/x"),
            vendor_in("b", "tools/y"),
            vendor_in("c", "toolsx"),
        ])
        .unwrap();
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn select_filters_and_validates_names() {
        let c = catalog(&[vendor("a", &[]), vendor("b", &[]), vendor("c", &[])]).unwrap();
        let picked = c.select(&["C".to_string(), "a".to_string()]).unwrap();
        assert_eq!(names(&picked), vec!["a", "c"]);
        assert_eq!(c.select(&[]).unwrap().len(), 3);
        assert!(matches!(
            c.select(&["zzz".to_string()]),
            Err(CatalogError::UnknownVendor(_))
        ));
    }
}
