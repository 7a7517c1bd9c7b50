//! Mapping human-readable camera names to device paths.

use super::error::SetupError;
use crate::config::CameraConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default sysfs directory listing video4linux devices.
pub const SYSFS_VIDEO_CLASS: &str = "/sys/class/video4linux";

/// One enumerated video device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Kernel identifier, e.g. `video0`.
    pub id: String,
    /// Name reported by the driver.
    pub name: String,
    /// Device node path.
    pub path: PathBuf,
}

/// A source of video device entries.
pub trait DeviceCatalog {
    /// Lists the devices currently present.
    fn entries(&self) -> io::Result<Vec<DeviceEntry>>;
}

/// Catalog backed by the sysfs `video4linux` class directory.
#[derive(Debug, Clone)]
pub struct SysfsCatalog {
    class_dir: PathBuf,
    dev_dir: PathBuf,
}

impl Default for SysfsCatalog {
    fn default() -> Self {
        Self::new(SYSFS_VIDEO_CLASS, "/dev")
    }
}

impl SysfsCatalog {
    /// Creates a catalog reading `class_dir` and resolving nodes under `dev_dir`.
    pub fn new(class_dir: impl AsRef<Path>, dev_dir: impl AsRef<Path>) -> Self {
        Self {
            class_dir: class_dir.as_ref().to_path_buf(),
            dev_dir: dev_dir.as_ref().to_path_buf(),
        }
    }
}

impl DeviceCatalog for SysfsCatalog {
    fn entries(&self) -> io::Result<Vec<DeviceEntry>> {
        let mut entries = Vec::new();

        for dir_entry in fs::read_dir(&self.class_dir)? {
            let dir_entry = dir_entry?;
            let id = dir_entry.file_name().to_string_lossy().into_owned();
            let name_file = dir_entry.path().join("name");

            let name = match fs::read_to_string(&name_file) {
                Ok(name) => name.trim_end().to_string(),
                Err(e) => {
                    tracing::debug!(
                        device = %id,
                        error = %e,
                        "Skipping device without readable name"
                    );
                    continue;
                }
            };

            entries.push(DeviceEntry {
                path: self.dev_dir.join(&id),
                id,
                name,
            });
        }

        Ok(entries)
    }
}

/// Returns the entry whose name contains `needle`, choosing the
/// lexicographically smallest identifier when several match.
pub fn select_device<'a>(entries: &'a [DeviceEntry], needle: &str) -> Option<&'a DeviceEntry> {
    entries
        .iter()
        .filter(|entry| entry.name.contains(needle))
        .min_by(|a, b| a.id.cmp(&b.id))
}

/// Resolves camera names against a [`DeviceCatalog`].
pub struct DeviceResolver<'c> {
    catalog: &'c dyn DeviceCatalog,
}

impl<'c> DeviceResolver<'c> {
    /// Creates a resolver over `catalog`.
    pub fn new(catalog: &'c dyn DeviceCatalog) -> Self {
        Self { catalog }
    }

    /// Finds the device path for a camera name substring.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SetupError> {
        let entries = self.catalog.entries().map_err(SetupError::Catalog)?;

        let entry = select_device(&entries, name).ok_or_else(|| SetupError::DeviceNotFound {
            camera: name.to_string(),
        })?;

        tracing::debug!(camera = %name, device = %entry.path.display(), "Resolved camera");
        Ok(entry.path.clone())
    }

    /// Returns the configured device path, resolving by name only when
    /// the configuration does not name one explicitly.
    pub fn device_path(&self, config: &CameraConfig) -> Result<PathBuf, SetupError> {
        match &config.device {
            Some(path) => Ok(path.clone()),
            None => self.resolve(&config.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    struct FixedCatalog {
        entries: Vec<DeviceEntry>,
        calls: Cell<usize>,
    }

    impl FixedCatalog {
        fn new(devices: &[(&str, &str)]) -> Self {
            let entries = devices
                .iter()
                .map(|&(id, name)| DeviceEntry {
                    id: id.to_string(),
                    name: name.to_string(),
                    path: PathBuf::from("/dev").join(id),
                })
                .collect();
            Self {
                entries,
                calls: Cell::new(0),
            }
        }
    }

    impl DeviceCatalog for FixedCatalog {
        fn entries(&self) -> io::Result<Vec<DeviceEntry>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.entries.clone())
        }
    }

    #[test]
    fn test_resolve_picks_smallest_matching_id() {
        let catalog = FixedCatalog::new(&[
            ("video3", "HD Pro Webcam C920"),
            ("video1", "HD Pro Webcam C920"),
            ("video0", "Integrated Camera"),
        ]);
        let resolver = DeviceResolver::new(&catalog);

        assert_eq!(resolver.resolve("C920").unwrap(), PathBuf::from("/dev/video1"));
    }

    #[test]
    fn test_resolve_not_found() {
        let catalog = FixedCatalog::new(&[("video0", "Integrated Camera")]);
        let resolver = DeviceResolver::new(&catalog);

        assert!(matches!(
            resolver.resolve("C920"),
            Err(SetupError::DeviceNotFound { camera }) if camera == "C920"
        ));
    }

    #[test]
    fn test_explicit_device_skips_catalog() {
        let catalog = FixedCatalog::new(&[("video0", "printer cam")]);
        let resolver = DeviceResolver::new(&catalog);
        let config = CameraConfig::new("printer cam", "secret").with_device("/dev/video7");

        assert_eq!(resolver.device_path(&config).unwrap(), PathBuf::from("/dev/video7"));
        assert_eq!(catalog.calls.get(), 0);
    }

    #[test]
    fn test_sysfs_catalog_reads_names() {
        let root = tempfile::tempdir().unwrap();
        for (id, name) in [("video0", "Integrated Camera\n"), ("video2", "C920 \n")] {
            let dir = root.path().join(id);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("name"), name).unwrap();
        }
        fs::create_dir(root.path().join("video9")).unwrap();

        let catalog = SysfsCatalog::new(root.path(), "/dev");
        let mut entries = catalog.entries().unwrap();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "C920");
        assert_eq!(entries[1].path, PathBuf::from("/dev/video2"));
    }

    proptest! {
        #[test]
        fn prop_smallest_matching_id_wins(
            ids in prop::collection::btree_set("video[0-9]{1,2}", 2..8),
            order in any::<u64>()
        ) {
            let mut ids: Vec<String> = ids.into_iter().collect();
            let expected = ids[0].clone();
            let len = ids.len();
            ids.rotate_left((order as usize) % len);

            let mut entries: Vec<DeviceEntry> = ids
                .iter()
                .map(|id| DeviceEntry {
                    id: id.clone(),
                    name: format!("USB Cam {}", id),
                    path: PathBuf::from("/dev").join(id),
                })
                .collect();
            entries.push(DeviceEntry {
                id: "aaa".to_string(),
                name: "Other".to_string(),
                path: PathBuf::from("/dev/aaa"),
            });

            let selected = select_device(&entries, "USB Cam").unwrap();
            prop_assert_eq!(&selected.id, &expected);
        }
    }
}
