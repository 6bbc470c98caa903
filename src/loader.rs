//! Runtime loading of the native operation provider.
//!
//! The provider ships as a shared library exporting the entry points declared
//! in [`crate::abi`]. [`NativeProvider`] opens it with `libloading`, resolves
//! every entry point eagerly so a missing symbol fails at load time instead of
//! mid-call, and keeps the library mapped for as long as the provider lives.

use std::env;
use std::path::{Path, PathBuf};

use libc::c_char;
use libloading::Library;
use thiserror::Error;

use crate::abi::{
    FreeIntFn, FreeResultFn, FreeStringFn, OperateFn, Provider, RawResult, SYM_FREE_BOXED_INT32,
    SYM_FREE_NATIVE_STRING, SYM_FREE_TAGGED_RESULT, SYM_OPERATE,
};

/// Errors raised while locating or loading the provider library.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No search path contained the library.
    #[error("provider library '{0}' not found in any search path")]
    NotFound(String),

    /// The library file could not be opened.
    #[error("failed to load provider library '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The library is missing one of the required entry points.
    #[error("provider library has no '{name}' entry point: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// The real operation provider: a shared library resolved at runtime.
#[derive(Debug)]
pub struct NativeProvider {
    // Keeps the mapping alive for the function pointers below.
    _library: Library,
    operate: OperateFn,
    free_native_string: FreeStringFn,
    free_tagged_result: FreeResultFn,
    free_boxed_int32: FreeIntFn,
}

impl NativeProvider {
    /// Load the provider from an explicit library path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();

        // Safety: loading a dynamic library runs its initializers. We trust
        // the artifact the caller pointed us at, the same trust extended to
        // any linked dependency.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let operate = resolve::<OperateFn>(&library, SYM_OPERATE, "operate")?;
        let free_native_string =
            resolve::<FreeStringFn>(&library, SYM_FREE_NATIVE_STRING, "free_native_string")?;
        let free_tagged_result =
            resolve::<FreeResultFn>(&library, SYM_FREE_TAGGED_RESULT, "free_tagged_result")?;
        let free_boxed_int32 =
            resolve::<FreeIntFn>(&library, SYM_FREE_BOXED_INT32, "free_boxed_int32")?;

        Ok(NativeProvider {
            _library: library,
            operate,
            free_native_string,
            free_tagged_result,
            free_boxed_int32,
        })
    }

    /// Load the provider by name, searching the usual places.
    ///
    /// `name` may be a path (used as-is when it exists) or a bare library
    /// name expanded to the platform filename (`libopcore.so`,
    /// `libopcore.dylib`, `opcore.dll`) and probed through the current
    /// directory, the platform's dynamic loader path variable, and the
    /// standard system directories.
    pub fn discover(name: &str) -> Result<Self, LoadError> {
        let path = find_library(name).ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        Self::load(path)
    }
}

impl Provider for NativeProvider {
    unsafe fn operate(&self, op: u8, x: i32, y: i32) -> *mut RawResult {
        (self.operate)(op as c_char, x, y)
    }

    unsafe fn free_native_string(&self, ptr: *mut c_char) {
        (self.free_native_string)(ptr)
    }

    unsafe fn free_tagged_result(&self, ptr: *mut RawResult) {
        (self.free_tagged_result)(ptr)
    }

    unsafe fn free_boxed_int32(&self, ptr: *mut i32) {
        (self.free_boxed_int32)(ptr)
    }
}

/// Extract one typed entry point from the library.
fn resolve<T: Copy>(library: &Library, symbol: &[u8], name: &'static str) -> Result<T, LoadError> {
    // Safety: the entry-point signatures are fixed by the provider contract;
    // a library exporting these names with different types is out of
    // contract, exactly as with link-time bindings.
    unsafe { library.get::<T>(symbol) }
        .map(|sym| *sym)
        .map_err(|source| LoadError::MissingSymbol { name, source })
}

/// Find a provider library by path or by name in the search paths.
fn find_library(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.exists() {
        return Some(direct.to_path_buf());
    }

    let file_name = library_filename(name);
    search_paths()
        .into_iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.exists())
}

/// Directories probed for the provider library, in order.
fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(ld_path) = env::var("LD_LIBRARY_PATH") {
            paths.extend(env::split_paths(&ld_path));
        }
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/lib64"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(dyld_path) = env::var("DYLD_LIBRARY_PATH") {
            paths.extend(env::split_paths(&dyld_path));
        }
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));
        paths.push(PathBuf::from("/usr/lib"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = env::var("PATH") {
            paths.extend(env::split_paths(&path));
        }
    }

    paths
}

/// Expand a bare library name to the platform filename.
fn library_filename(name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if name.starts_with("lib") && name.ends_with(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }
}
