// src/output.rs
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{error, info};

/// Walk up from the current working directory (at most 6 levels) looking for
/// a `frontend/` directory; fall back to the CWD. Keeps artifact paths stable
/// no matter where inside the repo the process is launched.
pub fn guess_repo_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut p = cwd.clone();
    for _ in 0..6 {
        if p.join("frontend").is_dir() {
            return p;
        }
        match p.parent() {
            Some(parent) => p = parent.to_path_buf(),
            None => break,
        }
    }
    cwd
}

/// `<repo>/frontend/public`, created if missing.
pub fn public_dir() -> PathBuf {
    let dir = guess_repo_root().join("frontend").join("public");
    fs::create_dir_all(&dir).ok();
    dir
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

/// Write-temp-then-rename replace. When the rename fails (e.g. the temp
/// landed on another filesystem), fall back to writing the destination
/// directly.
pub fn write_file_atomic(path: &Path, data: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).ok();
        }
    }
    let tmp = tmp_path(path);
    {
        let mut f = File::create(&tmp).with_context(|| format!("create tmp {tmp:?}"))?;
        f.write_all(data.as_bytes())?;
        f.sync_all().ok();
    }
    if fs::rename(&tmp, path).is_err() {
        let mut f = File::create(path).with_context(|| format!("create {path:?}"))?;
        f.write_all(data.as_bytes())?;
        fs::remove_file(&tmp).ok();
    }
    Ok(())
}

/// Dump the session's full-depth book JSON to `final_book.json` and, when a
/// symbol was adopted, `final_book_<symbol>.json` in the public output
/// directory.
pub fn write_final_books(book_json: &str, symbol: &str) {
    let outdir = public_dir();

    let out = outdir.join("final_book.json");
    match write_file_atomic(&out, book_json) {
        Ok(()) => info!("wrote {} ({} bytes)", out.display(), book_json.len()),
        Err(e) => error!("final book write failed: {e:?}"),
    }

    if !symbol.is_empty() {
        let out = outdir.join(format!("final_book_{symbol}.json"));
        match write_file_atomic(&out, book_json) {
            Ok(()) => info!("wrote {} ({} bytes)", out.display(), book_json.len()),
            Err(e) => error!("final book write failed: {e:?}"),
        }
    }
}
