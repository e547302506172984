// Locating the files that belong to one instance. A problem, its transport
// times and its configuration usually share a name prefix (`WT1.fjs`,
// `WT1a.transport`, `WT1a.properties`) and live in the same folder.

use std::{
    env,
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
};

use log::{debug, trace};

pub const PROBLEM_FILE_EXTENSION: &str = "fjs";
pub const TRANSPORT_FILE_EXTENSION: &str = "transport";
pub const CONFIG_FILE_EXTENSION: &str = "properties";

/// Search path list (platform separator) for files that are not found verbatim.
pub const RESOURCE_PATH_ENV: &str = "FJSSTT_RESOURCE_PATH";

fn is_readable(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Looks a path up below the directories listed in [`RESOURCE_PATH_ENV`].
/// Absolute paths are treated as relative to each resource directory.
pub fn resolve_resource(path: &Path) -> Option<PathBuf> {
    let roots = env::var_os(RESOURCE_PATH_ENV)?;
    resolve_resource_in(&roots, path)
}

/// Looks a path up below `roots`, a search path list in the platform format.
pub fn resolve_resource_in(roots: &OsStr, path: &Path) -> Option<PathBuf> {
    let relative: PathBuf = path
        .components()
        .filter(|component| {
            matches!(
                component,
                Component::Normal(_) | Component::CurDir | Component::ParentDir
            )
        })
        .collect();

    let found = env::split_paths(roots)
        .map(|root| root.join(&relative))
        .find(|candidate| is_readable(candidate));

    trace!("resource lookup for {}: {:?}", path.display(), found);
    found
}

/// Sorted regular files of a folder. Unreadable folders yield nothing.
fn files_in(folder: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(folder) else {
        debug!("cannot list {}", folder.display());
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Returns the file itself, or every file ending in `extension` when `path` is
/// a directory. Paths that do not exist are looked up as resources.
pub fn check_or_find_file(path: &Path, extension: &str) -> Vec<PathBuf> {
    let found = if is_readable(path) {
        Some(path.to_path_buf())
    } else {
        resolve_resource(path)
    };

    match found {
        Some(found) if found.is_dir() => files_in(&found)
            .into_iter()
            .filter(|file| file_name(file).ends_with(extension))
            .collect(),
        Some(found) if found.is_file() => vec![found],
        _ => Vec::new(),
    }
}

/// Finds the sibling files ending in `extension` that share the longest
/// possible name prefix with `path`. The prefix starts as the file stem and
/// loses one character at a time until something matches. A directory matches
/// all of its files.
pub fn find_files(path: &Path, extension: &str) -> Vec<PathBuf> {
    let origin = if is_readable(path) {
        path.to_path_buf()
    } else {
        match check_or_find_file(path, extension).into_iter().next() {
            Some(found) => found,
            None => return Vec::new(),
        }
    };

    let (folder, stem) = if origin.is_dir() {
        (origin.clone(), String::new())
    } else {
        let folder = match origin.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => return Vec::new(),
        };
        let stem = origin
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        (folder, stem)
    };

    let candidates: Vec<(String, PathBuf)> = files_in(&folder)
        .into_iter()
        .map(|file| (file_name(&file), file))
        .filter(|(name, _)| name.ends_with(extension))
        .collect();

    let mut prefix = stem.as_str();
    loop {
        let matches: Vec<PathBuf> = candidates
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, file)| file.clone())
            .collect();

        if !matches.is_empty() || prefix.is_empty() {
            debug!(
                "{} `{extension}` files share the prefix `{prefix}` with {}",
                matches.len(),
                origin.display()
            );
            return matches;
        }

        let mut chars = prefix.chars();
        chars.next_back();
        prefix = chars.as_str();
    }
}
