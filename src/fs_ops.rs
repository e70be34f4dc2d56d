//! Filesystem primitives behind the HTTP handlers.
//!
//! Everything here is scheduler-agnostic: callers are expected to hold
//! the relevant path locks before touching the disk. Bulk work (archive
//! creation, recursive copies) runs on the blocking pool.

use std::{
    io,
    path::{Path, PathBuf},
};

use md5::{Digest, Md5};
use sha2::Sha256;
use tokio::{fs, io::AsyncReadExt};

pub async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

pub async fn is_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::metadata(path).await?.is_dir())
}

/// Newline-joined child names of a directory, dotfiles filtered, sorted.
pub async fn children_of_dir_text(path: &Path) -> io::Result<String> {
    let mut entries = fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names.join("\n"))
}

/// Write `bytes` to `path`, refusing to overwrite an existing entity.
pub async fn save_new_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if exists(path).await {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("entity already exists at {}", path.display()),
        ));
    }
    fs::write(path, bytes).await
}

/// Remove a file or directory tree; missing paths are not an error.
pub async fn remove_all(path: &Path) -> io::Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

/// Copy a file, or a directory tree recursively.
pub async fn copy_recursive(from: PathBuf, to: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || copy_recursive_sync(&from, &to))
        .await
        .map_err(io::Error::other)?
}

fn copy_recursive_sync(from: &Path, to: &Path) -> io::Result<()> {
    let meta = std::fs::metadata(from)?;
    if meta.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive_sync(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        std::fs::copy(from, to).map(|_| ())
    }
}

/// Archive a file or directory tree into a fresh zip at `dest`.
pub async fn zip_entity(src: PathBuf, dest: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || zip_entity_sync(&src, &dest))
        .await
        .map_err(io::Error::other)?
}

fn zip_entity_sync(src: &Path, dest: &Path) -> io::Result<()> {
    let file = std::fs::File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let meta = std::fs::metadata(src)?;
    if meta.is_dir() {
        zip_dir_sync(&mut writer, src, Path::new(""), options)?;
    } else {
        let name = src
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(name, options).map_err(io::Error::other)?;
        let mut source = std::fs::File::open(src)?;
        io::copy(&mut source, &mut writer)?;
    }
    writer.finish().map_err(io::Error::other)?;
    Ok(())
}

fn zip_dir_sync(
    writer: &mut zip::ZipWriter<std::fs::File>,
    dir: &Path,
    prefix: &Path,
    options: zip::write::SimpleFileOptions,
) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        let entry_name = name.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            writer
                .add_directory(entry_name, options)
                .map_err(io::Error::other)?;
            zip_dir_sync(writer, &path, &name, options)?;
        } else {
            writer
                .start_file(entry_name, options)
                .map_err(io::Error::other)?;
            let mut source = std::fs::File::open(&path)?;
            io::copy(&mut source, writer)?;
        }
    }
    Ok(())
}

/// Extract a zip archive into `dest`.
pub async fn unzip_archive(src: PathBuf, dest: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&src)?;
        let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
        archive.extract(&dest).map_err(io::Error::other)
    })
    .await
    .map_err(io::Error::other)?
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

/// Lowercase hex digest of a file's contents, read incrementally.
pub async fn file_hash(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    match algorithm {
        HashAlgorithm::Md5 => digest_file::<Md5>(path).await,
        HashAlgorithm::Sha256 => digest_file::<Sha256>(path).await,
    }
}

async fn digest_file<D: Digest>(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_children_listing_filters_dotfiles() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("beta.txt"), b"b").await.unwrap();
        fs::write(dir.path().join("alpha.txt"), b"a").await.unwrap();
        fs::write(dir.path().join(".hidden"), b"x").await.unwrap();
        fs::create_dir(dir.path().join("sub")).await.unwrap();

        let listing = children_of_dir_text(dir.path()).await.unwrap();
        assert_eq!(listing, "alpha.txt\nbeta.txt\nsub");
    }

    #[tokio::test]
    async fn test_save_new_file_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("data.bin");
        save_new_file(&target, b"one").await.unwrap();

        let err = save_new_file(&target, b"two").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&target).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_remove_all_handles_missing_and_trees() {
        let dir = tempdir().unwrap();
        remove_all(&dir.path().join("nothing-here")).await.unwrap();

        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("nested")).await.unwrap();
        fs::write(tree.join("nested/file"), b"x").await.unwrap();
        remove_all(&tree).await.unwrap();
        assert!(!exists(&tree).await);
    }

    #[tokio::test]
    async fn test_copy_recursive_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("inner")).await.unwrap();
        fs::write(src.join("top.txt"), b"top").await.unwrap();
        fs::write(src.join("inner/leaf.txt"), b"leaf").await.unwrap();

        let dest = dir.path().join("dest");
        copy_recursive(src.clone(), dest.clone()).await.unwrap();

        assert_eq!(fs::read(dest.join("top.txt")).await.unwrap(), b"top");
        assert_eq!(fs::read(dest.join("inner/leaf.txt")).await.unwrap(), b"leaf");
        // Source untouched.
        assert_eq!(fs::read(src.join("top.txt")).await.unwrap(), b"top");
    }

    #[tokio::test]
    async fn test_zip_unzip_round_trip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("payload");
        fs::create_dir_all(src.join("docs")).await.unwrap();
        fs::write(src.join("readme.txt"), b"hello").await.unwrap();
        fs::write(src.join("docs/note.txt"), b"note").await.unwrap();

        let archive = dir.path().join("payload.zip");
        zip_entity(src.clone(), archive.clone()).await.unwrap();
        assert!(exists(&archive).await);

        let out = dir.path().join("restored");
        unzip_archive(archive, out.clone()).await.unwrap();
        assert_eq!(fs::read(out.join("readme.txt")).await.unwrap(), b"hello");
        assert_eq!(fs::read(out.join("docs/note.txt")).await.unwrap(), b"note");
    }

    #[tokio::test]
    async fn test_file_hash_known_digests() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hello.txt");
        fs::write(&target, b"hello").await.unwrap();

        assert_eq!(
            file_hash(&target, HashAlgorithm::Md5).await.unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            file_hash(&target, HashAlgorithm::Sha256).await.unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
