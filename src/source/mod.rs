//! Source file management.
//!
//! [`SourceContext`] owns every source buffer that takes part in a
//! translation unit and hands out [`FileId`]s for them. Two ids are reserved
//! for the system and user preambles; the main file and every `#include`d
//! header get fresh ids. Buffers are `Arc<str>` so a tokenizer can keep one
//! alive while the context continues to open files.

pub mod position;
pub mod scanner;

pub use position::{TextPosition, TextRange};
pub use scanner::SourceScanner;

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifies one source buffer inside a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileId(u32);

impl FileId {
    /// The null id. Returned by failed opens.
    pub const INVALID: FileId = FileId(0);
    /// The built-in standard library preamble.
    pub const SYSTEM_PREAMBLE: FileId = FileId(1);
    /// The user-supplied preamble.
    pub const USER_PREAMBLE: FileId = FileId(2);

    const FIRST_USER_FILE: u32 = 3;

    pub fn is_valid(self) -> bool {
        self != FileId::INVALID
    }

    pub fn is_system_preamble(self) -> bool {
        self == FileId::SYSTEM_PREAMBLE
    }

    pub fn is_user_preamble(self) -> bool {
        self == FileId::USER_PREAMBLE
    }

    /// True for the main file and included headers, false for preambles.
    pub fn is_user_file(self) -> bool {
        self.0 >= Self::FIRST_USER_FILE
    }
}

#[derive(Debug)]
struct SourceFileEntry {
    path: Option<PathBuf>,
    content: Arc<str>,
}

/// Owns source buffers and resolves `#include` names to files.
#[derive(Debug, Default)]
pub struct SourceContext {
    base: Option<Arc<SourceContext>>,
    next_id: u32,
    entries: HashMap<u32, SourceFileEntry>,
    opened_paths: HashMap<PathBuf, FileId>,
    finalized: bool,
}

impl SourceContext {
    pub fn new() -> Self {
        SourceContext {
            base: None,
            next_id: FileId::FIRST_USER_FILE,
            entries: HashMap::new(),
            opened_paths: HashMap::new(),
            finalized: false,
        }
    }

    /// Layer over a finalized preamble context. Preamble buffers stay
    /// readable through the new context; fresh ids continue past the base.
    pub fn layered(base: Arc<SourceContext>) -> Self {
        let next_id = base.next_id;
        SourceContext {
            base: Some(base),
            next_id,
            entries: HashMap::new(),
            opened_paths: HashMap::new(),
            finalized: false,
        }
    }

    pub fn set_system_preamble(&mut self, content: &str) {
        debug_assert!(!self.finalized);
        self.entries.insert(
            FileId::SYSTEM_PREAMBLE.0,
            SourceFileEntry { path: None, content: content.into() },
        );
    }

    pub fn set_user_preamble(&mut self, content: &str) {
        debug_assert!(!self.finalized);
        self.entries.insert(
            FileId::USER_PREAMBLE.0,
            SourceFileEntry { path: None, content: content.into() },
        );
    }

    /// Open the main file from an in-memory buffer.
    pub fn open_from_buffer(&mut self, content: &str) -> FileId {
        debug_assert!(!self.finalized);
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id.0, SourceFileEntry { path: None, content: content.into() });
        id
    }

    /// Open a file from disk. A missing or unreadable file yields the
    /// invalid id, not an error.
    pub fn open_from_file(&mut self, path: &Path) -> FileId {
        debug_assert!(!self.finalized);
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(&id) = self.opened_paths.get(&canonical) {
            return id;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            return FileId::INVALID;
        };
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id.0,
            SourceFileEntry { path: Some(canonical.clone()), content: content.into() },
        );
        self.opened_paths.insert(canonical, id);
        id
    }

    /// Resolve a header name against the including file's directory (quoted
    /// form only) and then the configured include directories.
    pub fn resolve_include(
        &mut self,
        header_name: &str,
        includer: FileId,
        quoted: bool,
        include_paths: &[PathBuf],
    ) -> FileId {
        if quoted {
            if let Some(dir) = self.file_path(includer).and_then(|p| p.parent().map(Path::to_path_buf)) {
                let candidate = dir.join(header_name);
                if candidate.is_file() {
                    return self.open_from_file(&candidate);
                }
            }
        }
        for dir in include_paths {
            let candidate = dir.join(header_name);
            if candidate.is_file() {
                return self.open_from_file(&candidate);
            }
        }
        FileId::INVALID
    }

    pub fn content(&self, file: FileId) -> Option<Arc<str>> {
        if let Some(entry) = self.entries.get(&file.0) {
            return Some(entry.content.clone());
        }
        self.base.as_ref().and_then(|base| base.content(file))
    }

    pub fn file_path(&self, file: FileId) -> Option<PathBuf> {
        if let Some(entry) = self.entries.get(&file.0) {
            return entry.path.clone();
        }
        self.base.as_ref().and_then(|base| base.file_path(file))
    }

    /// Drop mutable bookkeeping. Contents stay readable.
    pub fn finalize(&mut self) {
        self.opened_paths.clear();
        self.opened_paths.shrink_to_fit();
        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_files_get_distinct_ids() {
        let mut ctx = SourceContext::new();
        let a = ctx.open_from_buffer("int a;");
        let b = ctx.open_from_buffer("int b;");
        assert_ne!(a, b);
        assert!(a.is_user_file());
        assert_eq!(&*ctx.content(a).unwrap(), "int a;");
    }

    #[test]
    fn missing_file_yields_invalid_id() {
        let mut ctx = SourceContext::new();
        let id = ctx.open_from_file(Path::new("/definitely/not/here.glsl"));
        assert!(!id.is_valid());
    }

    #[test]
    fn preamble_ids_are_reserved() {
        let mut ctx = SourceContext::new();
        ctx.set_system_preamble("float sin(float x);");
        let main = ctx.open_from_buffer("void main() {}");
        assert!(main.is_user_file());
        assert!(FileId::SYSTEM_PREAMBLE.is_system_preamble());
        assert!(!FileId::SYSTEM_PREAMBLE.is_user_file());
        assert!(ctx.content(FileId::SYSTEM_PREAMBLE).is_some());
        assert!(ctx.content(FileId::USER_PREAMBLE).is_none());
    }

    #[test]
    fn layered_context_reads_base_buffers() {
        let mut base = SourceContext::new();
        base.set_system_preamble("void f();");
        base.finalize();
        let base = Arc::new(base);

        let mut layered = SourceContext::layered(base);
        let main = layered.open_from_buffer("void main() {}");
        assert!(layered.content(FileId::SYSTEM_PREAMBLE).is_some());
        assert!(layered.content(main).is_some());
    }
}
