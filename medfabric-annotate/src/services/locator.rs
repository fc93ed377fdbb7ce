//! Storage locator: where an image set's slices live on disk
//!
//! Only used to validate that a set is addressable; pixel data is never read
//! here.

use std::path::{Path, PathBuf};

use medfabric_common::db::models::ImageSet;

pub trait StorageLocator: Send + Sync {
    /// Folder for the set, or `None` when it cannot be determined
    fn locate(&self, image_set: &ImageSet) -> Option<PathBuf>;
}

/// `<data_root>/<patient_id>/<image_set_id>` unless the set names its folder
#[derive(Debug, Clone)]
pub struct RootFolderLocator {
    data_root: PathBuf,
}

impl RootFolderLocator {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Locator rooted at `<root_folder>/data`
    pub fn for_root_folder(root_folder: &Path) -> Self {
        Self::new(root_folder.join("data"))
    }
}

impl StorageLocator for RootFolderLocator {
    fn locate(&self, image_set: &ImageSet) -> Option<PathBuf> {
        if let Some(folder) = image_set.folder_path.as_deref().filter(|f| !f.trim().is_empty()) {
            return Some(self.data_root.join(folder));
        }

        image_set
            .patient_id
            .as_deref()
            .map(|patient| self.data_root.join(patient).join(&image_set.image_set_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(folder: Option<&str>, patient: Option<&str>) -> ImageSet {
        ImageSet {
            set_index: 1,
            image_set_id: "scan-1".to_string(),
            patient_id: patient.map(str::to_string),
            num_images: 3,
            folder_path: folder.map(str::to_string),
            conflicted: false,
            description: None,
        }
    }

    #[test]
    fn test_explicit_folder_wins() {
        let locator = RootFolderLocator::new("/data");
        assert_eq!(
            locator.locate(&set(Some("custom/dir"), Some("p1"))),
            Some(PathBuf::from("/data/custom/dir"))
        );
    }

    #[test]
    fn test_patient_layout_and_unlocatable() {
        let locator = RootFolderLocator::for_root_folder(Path::new("/srv/medfabric"));
        assert_eq!(
            locator.locate(&set(None, Some("p1"))),
            Some(PathBuf::from("/srv/medfabric/data/p1/scan-1"))
        );
        assert_eq!(locator.locate(&set(Some("  "), None)), None);
    }
}
