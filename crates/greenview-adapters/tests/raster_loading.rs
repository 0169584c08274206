//! Integration tests for image discovery and raster loading.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use greenview_adapters::{collect_images, FsImageLoader};
use greenview_core::ImageLoader;
use greenview_test_support::SyntheticImageBuilder;
use image::{DynamicImage, ImageFormat, RgbImage};

fn write_as(dir: &Path, name: &str, format: ImageFormat) {
    let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
    img.save_with_format(dir.join(name), format).unwrap();
}

fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_as(dir.path(), "c.jpg", ImageFormat::Jpeg);
    write_as(dir.path(), "a.png", ImageFormat::Png);
    write_as(dir.path(), "b.bmp", ImageFormat::Bmp);
    write_as(dir.path(), "d.tiff", ImageFormat::Tiff);
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    dir
}

#[test]
fn test_directory_scan_is_sorted_and_filtered() {
    let dir = fixture_dir();
    let images = collect_images(&[dir.path().to_path_buf()], false);

    let names: Vec<_> = images
        .iter()
        .map(|r| r.path().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "b.bmp", "c.jpg", "d.tiff"]);
}

#[test]
fn test_every_supported_format_loads() {
    let dir = fixture_dir();
    for source in collect_images(&[dir.path().to_path_buf()], false) {
        let info = FsImageLoader
            .load(&source)
            .unwrap_or_else(|e| panic!("{source} should load: {e}"));
        assert_eq!((info.width, info.height), (8, 8));
        assert_eq!(info.source, source);
    }
}

#[test]
fn test_recursive_scan() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("district/street");
    std::fs::create_dir_all(&nested).unwrap();
    SyntheticImageBuilder::write_png(dir.path(), "top.png", 4, 4).unwrap();
    SyntheticImageBuilder::write_png(&nested, "deep.png", 4, 4).unwrap();

    assert_eq!(collect_images(&[dir.path().to_path_buf()], false).len(), 1);
    assert_eq!(collect_images(&[dir.path().to_path_buf()], true).len(), 2);
}

#[test]
fn test_explicit_files_keep_argument_order() {
    let dir = fixture_dir();
    let paths = vec![dir.path().join("c.jpg"), dir.path().join("a.png")];
    let images = collect_images(&paths, false);
    assert_eq!(images[0].path(), paths[0].as_path());
    assert_eq!(images[1].path(), paths[1].as_path());
}

#[test]
fn test_missing_and_unsupported_paths_skipped() {
    let dir = fixture_dir();
    let paths = vec![
        dir.path().join("missing.jpg"),
        dir.path().join("notes.txt"),
    ];
    assert!(collect_images(&paths, false).is_empty());
}

#[test]
fn test_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not a jpeg").unwrap();

    let source = collect_images(&[path], false).pop().unwrap();
    let err = FsImageLoader.load(&source).unwrap_err();
    assert!(err.to_string().contains("broken.jpg"));
}
