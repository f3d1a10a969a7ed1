// sprig-core/src/install/steps.rs
// One uniform interpreter for every install step kind.

use std::path::{Path, PathBuf};

use sprig_aio::fs::{atomic_write_file, contained_join, ensure_dir, install_file, is_executable};
use sprig_common::model::{InstallStep, InstalledArtifact};
use tracing::debug;
use walkdir::WalkDir;

use super::InstalledLayout;
use crate::template::TemplateVars;

const EXECUTABLE_MODE: u32 = 0o755;
const DATA_MODE: u32 = 0o644;

type StepResult = std::result::Result<(), String>;

pub(crate) fn run_step(
    step: &InstallStep,
    staged_root: &Path,
    layout: &mut InstalledLayout,
    vars: &TemplateVars,
) -> StepResult {
    match step {
        InstallStep::Bin { source, .. } => {
            let target = step.bin_target().ok_or("bin step has no target name")?;
            if target.is_empty() || target.contains(['/', '\\']) || target == ".." {
                return Err(format!("'{target}' is not a valid command name"));
            }
            let src = staged_file(staged_root, source)?;
            let dest = layout.bin_dir.join(&target);
            install_file(&src, &dest, EXECUTABLE_MODE).map_err(|e| e.to_string())?;
            layout.record(InstalledArtifact::Binary { path: dest });
            Ok(())
        }
        InstallStep::Share { source, dir } => {
            let dir = dir.as_deref().unwrap_or(&layout.program).to_string();
            let dest_dir =
                contained_join(&layout.share_dir, Path::new(&dir)).map_err(|e| e.to_string())?;
            let src = contained_join(staged_root, source).map_err(|e| e.to_string())?;
            if !src.exists() {
                return Err(format!("{} not found in artifact", source.display()));
            }
            if ensure_dir(&dest_dir).map_err(|e| e.to_string())? {
                debug!("Created share dir {}", dest_dir.display());
            }
            layout.record(InstalledArtifact::Directory {
                path: dest_dir.clone(),
            });
            let name = src
                .file_name()
                .ok_or_else(|| format!("{} has no file name", source.display()))?;
            if src.is_dir() {
                share_tree(&src, &dest_dir.join(name), layout)
            } else {
                let dest = dest_dir.join(name);
                install_file(&src, &dest, file_mode(&src)).map_err(|e| e.to_string())?;
                layout.record(InstalledArtifact::SharedFile { path: dest });
                Ok(())
            }
        }
        InstallStep::Mkdir { path } => {
            let dest = contained_join(&layout.prefix, &render_path(path, vars))
                .map_err(|e| e.to_string())?;
            ensure_dir(&dest).map_err(|e| e.to_string())?;
            layout.record(InstalledArtifact::Directory { path: dest });
            Ok(())
        }
        InstallStep::Write { path, content } => {
            let dest = contained_join(&layout.prefix, &render_path(path, vars))
                .map_err(|e| e.to_string())?;
            if dest.is_dir() {
                return Err(format!("{} is a directory", dest.display()));
            }
            let rendered = vars.render(content);
            atomic_write_file(&dest, rendered.as_bytes(), DATA_MODE)
                .map_err(|e| e.to_string())?;
            layout.record(InstalledArtifact::GeneratedFile { path: dest });
            Ok(())
        }
    }
}

fn render_path(path: &Path, vars: &TemplateVars) -> PathBuf {
    PathBuf::from(vars.render(&path.to_string_lossy()))
}

fn staged_file(staged_root: &Path, source: &Path) -> std::result::Result<PathBuf, String> {
    let src = contained_join(staged_root, source).map_err(|e| e.to_string())?;
    if !src.is_file() {
        return Err(format!("{} not found in artifact", source.display()));
    }
    Ok(src)
}

fn file_mode(path: &Path) -> u32 {
    if is_executable(path) {
        EXECUTABLE_MODE
    } else {
        DATA_MODE
    }
}

/// Copies a staged directory verbatim, recording every file and directory.
fn share_tree(src: &Path, dest: &Path, layout: &mut InstalledLayout) -> StepResult {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| e.to_string())?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| e.to_string())?;
        let target = if relative.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(relative)
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            ensure_dir(&target).map_err(|e| e.to_string())?;
            layout.record(InstalledArtifact::Directory { path: target });
        } else if file_type.is_file() {
            install_file(entry.path(), &target, file_mode(entry.path()))
                .map_err(|e| e.to_string())?;
            layout.record(InstalledArtifact::SharedFile { path: target });
        } else {
            debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(())
}
