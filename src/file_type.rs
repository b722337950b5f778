// File type lookup and resolution
use crate::model::FileType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

// Read-only view of the stored file types
pub trait FileTypeLookup {
    // `extension` includes the leading dot, e.g. ".java"
    fn find_by_extension(&self, extension: &str) -> Option<FileType>;

    fn find_by_name(&self, name: &str) -> Option<FileType>;
}

impl<T: FileTypeLookup + ?Sized> FileTypeLookup for &T {
    fn find_by_extension(&self, extension: &str) -> Option<FileType> {
        (**self).find_by_extension(extension)
    }

    fn find_by_name(&self, name: &str) -> Option<FileType> {
        (**self).find_by_name(name)
    }
}

impl<T: FileTypeLookup + ?Sized> FileTypeLookup for Arc<T> {
    fn find_by_extension(&self, extension: &str) -> Option<FileType> {
        (**self).find_by_extension(extension)
    }

    fn find_by_name(&self, name: &str) -> Option<FileType> {
        (**self).find_by_name(name)
    }
}

// Resolves an extension (without dot) to a file type id, falling back to a named type
pub struct FileTypeResolver<'a, L: ?Sized> {
    lookup: &'a L,
    fallback_name: &'a str,
}

impl<'a, L: FileTypeLookup + ?Sized> FileTypeResolver<'a, L> {
    pub fn new(lookup: &'a L, fallback_name: &'a str) -> Self {
        Self {
            lookup,
            fallback_name,
        }
    }

    pub fn resolve(&self, extension: &str) -> Option<i64> {
        if !extension.is_empty() {
            if let Some(file_type) = self.lookup.find_by_extension(&format!(".{}", extension)) {
                return Some(file_type.id);
            }
            warn!(
                extension,
                fallback = self.fallback_name,
                "Unknown file extension, using fallback file type"
            );
        }

        let fallback = self.lookup.find_by_name(self.fallback_name);
        if fallback.is_none() {
            warn!(fallback = self.fallback_name, "Fallback file type is not registered");
        }
        fallback.map(|file_type| file_type.id)
    }
}

#[derive(Debug, Default)]
struct FileTypeIndex {
    by_extension: HashMap<String, FileType>,
    by_name: HashMap<String, FileType>,
}

// In-memory file type store; both indexes are updated under one lock
#[derive(Debug, Default)]
pub struct FileTypeRegistry {
    index: RwLock<FileTypeIndex>,
}

impl FileTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file_type: FileType) {
        let mut index = self.index.write();
        if let Some(previous) = index.by_name.remove(&file_type.name) {
            if let Some(extension) = &previous.file_extension {
                index.by_extension.remove(extension);
            }
        }
        if let Some(extension) = &file_type.file_extension {
            index.by_extension.insert(extension.clone(), file_type.clone());
        }
        index.by_name.insert(file_type.name.clone(), file_type);
    }

    pub fn len(&self) -> usize {
        self.index.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().by_name.is_empty()
    }
}

impl FromIterator<FileType> for FileTypeRegistry {
    fn from_iter<I: IntoIterator<Item = FileType>>(iter: I) -> Self {
        let registry = Self::new();
        for file_type in iter {
            registry.register(file_type);
        }
        registry
    }
}

impl FileTypeLookup for FileTypeRegistry {
    fn find_by_extension(&self, extension: &str) -> Option<FileType> {
        self.index.read().by_extension.get(extension).cloned()
    }

    fn find_by_name(&self, name: &str) -> Option<FileType> {
        self.index.read().by_name.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn file_type(id: i64, name: &str, extension: Option<&str>) -> FileType {
        FileType {
            id,
            name: name.to_string(),
            file_extension: extension.map(str::to_string),
        }
    }

    fn registry() -> FileTypeRegistry {
        [
            file_type(1, "Makefile", None),
            file_type(2, "Java", Some(".java")),
            file_type(3, "Python", Some(".py")),
        ]
        .into_iter()
        .collect()
    }

    #[test_case("java", Some(2); "#1 known extension")]
    #[test_case("py", Some(3); "#2 another known extension")]
    #[test_case("rb", Some(1); "#3 unknown extension falls back")]
    #[test_case("", Some(1); "#4 empty extension falls back")]
    #[test_case("JAVA", Some(1); "#5 extension match is exact")]
    fn test_resolve(extension: &str, expected: Option<i64>) {
        let registry = registry();
        let resolver = FileTypeResolver::new(&registry, "Makefile");
        assert_eq!(resolver.resolve(extension), expected);
    }

    #[test]
    fn test_missing_fallback_resolves_to_none() {
        let registry = registry();
        let resolver = FileTypeResolver::new(&registry, "Plain Text");
        assert_eq!(resolver.resolve("rb"), None);
        assert_eq!(resolver.resolve("py"), Some(3));
    }

    #[test]
    fn test_register_reindexes_changed_extension() {
        let registry = registry();
        registry.register(file_type(7, "Python", Some(".py3")));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find_by_extension(".py"), None);
        assert_eq!(registry.find_by_extension(".py3").map(|t| t.id), Some(7));
        assert_eq!(registry.find_by_name("Python").map(|t| t.id), Some(7));
    }
}
