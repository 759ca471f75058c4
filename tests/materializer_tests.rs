use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dataset2yolo::layout::count_entries;
use dataset2yolo::{
    prepare_dataset, AnnotatedImage, Annotation, Dataset, DatasetLayout, Manifest,
    MaterializeError, Materializer, MaterializerConfig, Polygon, Split, SplitStrategy,
    StaleReason, Validation,
};

fn quiet(split_strategy: SplitStrategy) -> Materializer {
    Materializer::new(MaterializerConfig {
        split_strategy,
        show_progress: false,
    })
}

fn categories(names: &[&str]) -> BTreeMap<i64, String> {
    names
        .iter()
        .enumerate()
        .map(|(id, name)| (id as i64, name.to_string()))
        .collect()
}

// Write `count` fake image files and a dataset describing them
fn synthetic_dataset(source_dir: &Path, count: usize) -> Dataset {
    let images = (0..count)
        .map(|i| {
            let path = source_dir.join(format!("img_{:03}.jpg", i));
            fs::write(&path, format!("image-{}", i)).unwrap();
            AnnotatedImage::new(path, 100, 200)
                .with_annotation(Annotation::new(
                    (i % 2) as i64,
                    vec![Polygon::new(vec![
                        (10.0, 20.0),
                        (90.0, 20.0),
                        (90.0, 180.0),
                        (10.0, 180.0),
                    ])],
                ))
                .with_annotation(Annotation::new(1, vec![]))
        })
        .collect();
    Dataset::new(images, categories(&["cat", "dog"]))
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn split_counts(layout: &DatasetLayout, split: Split) -> (usize, usize) {
    (
        count_entries(&layout.images_dir(split)).unwrap(),
        count_entries(&layout.labels_dir(split)).unwrap(),
    )
}

#[test]
fn test_prepare_splits_ten_images() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 10);
    let target_dir = target.path().join("yolo");

    let manifest_path = quiet(SplitStrategy::Random)
        .prepare(&dataset, &target_dir, 0.8)
        .unwrap();

    let layout = DatasetLayout::new(&target_dir);
    assert_eq!(manifest_path, layout.manifest_path());
    assert_eq!(split_counts(&layout, Split::Train), (8, 8));
    assert_eq!(split_counts(&layout, Split::Val), (2, 2));

    let manifest = Manifest::from_yaml_file(&manifest_path).unwrap();
    assert_eq!(manifest.nc, 2);
    assert_eq!(manifest.names, vec!["cat", "dog"]);
    assert_eq!(manifest.train, fs::canonicalize(layout.images_dir(Split::Train)).unwrap());
    assert_eq!(manifest.val, fs::canonicalize(layout.images_dir(Split::Val)).unwrap());
}

#[test]
fn test_every_image_has_matching_label() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 6);

    quiet(SplitStrategy::Seeded(1))
        .prepare(&dataset, target.path(), 0.5)
        .unwrap();

    let layout = DatasetLayout::new(target.path());
    let mut seen = Vec::new();
    for split in Split::ALL {
        for name in file_names(&layout.images_dir(split)) {
            let stem = name.trim_end_matches(".jpg");
            let label = layout.labels_dir(split).join(format!("{}.txt", stem));
            assert!(label.is_file(), "missing label for {}", name);
            seen.push(name);
        }
    }
    seen.sort();
    assert_eq!(seen.len(), 6);
    seen.dedup();
    assert_eq!(seen.len(), 6);

    let label = layout
        .labels_dir(Split::Train)
        .join(file_names(&layout.labels_dir(Split::Train))[0].clone());
    let content = fs::read_to_string(label).unwrap();
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]
        .ends_with(" 0.100000 0.100000 0.900000 0.100000 0.900000 0.900000 0.100000 0.900000\n"));
    assert_eq!(lines[1], "1 \n");
}

#[test]
fn test_prepare_reuses_valid_dataset() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 10);
    let materializer = quiet(SplitStrategy::Random);

    let first = materializer.prepare(&dataset, target.path(), 0.8).unwrap();

    // Tamper with a copied image; a re-copy would restore it
    let layout = DatasetLayout::new(target.path());
    let train_dir = layout.images_dir(Split::Train);
    let marked = train_dir.join(&file_names(&train_dir)[0]);
    fs::write(&marked, "marker").unwrap();

    assert!(matches!(
        materializer.validate_existing(&dataset, target.path(), 0.8).unwrap(),
        Validation::Reusable(_)
    ));
    let second = materializer.prepare(&dataset, target.path(), 0.8).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&marked).unwrap(), "marker");
}

#[test]
fn test_prepare_rebuilds_after_label_deleted() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 10);
    let materializer = quiet(SplitStrategy::Random);
    let layout = DatasetLayout::new(target.path());

    materializer.prepare(&dataset, target.path(), 0.8).unwrap();

    let train_images = layout.images_dir(Split::Train);
    fs::write(train_images.join(&file_names(&train_images)[0]), "marker").unwrap();
    let train_labels = layout.labels_dir(Split::Train);
    fs::remove_file(train_labels.join(&file_names(&train_labels)[0])).unwrap();

    match materializer.validate_existing(&dataset, target.path(), 0.8).unwrap() {
        Validation::Stale(StaleReason::SplitCountMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, 8);
            assert_eq!(found, 7);
        }
        other => panic!("unexpected validation: {:?}", other),
    }

    materializer.prepare(&dataset, target.path(), 0.8).unwrap();

    assert_eq!(split_counts(&layout, Split::Train), (8, 8));
    assert_eq!(split_counts(&layout, Split::Val), (2, 2));
    for split in Split::ALL {
        let dir = layout.images_dir(split);
        for name in file_names(&dir) {
            assert_ne!(fs::read_to_string(dir.join(name)).unwrap(), "marker");
        }
    }
}

#[test]
fn test_validate_existing_reports_missing_and_class_mismatch() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 4);
    let materializer = quiet(SplitStrategy::Seeded(3));

    assert_eq!(
        materializer.validate_existing(&dataset, target.path(), 0.75).unwrap(),
        Validation::Missing
    );

    materializer.prepare(&dataset, target.path(), 0.75).unwrap();

    let mut grown = dataset.clone();
    grown.categories.insert(2, "bird".to_string());
    assert_eq!(
        materializer.validate_existing(&grown, target.path(), 0.75).unwrap(),
        Validation::Stale(StaleReason::ClassCountMismatch {
            expected: 3,
            recorded: 2,
        })
    );

    let manifest_path = materializer.prepare(&grown, target.path(), 0.75).unwrap();
    let manifest = Manifest::from_yaml_file(&manifest_path).unwrap();
    assert_eq!(manifest.nc, 3);
    assert_eq!(manifest.names, vec!["cat", "dog", "bird"]);
}

#[test]
fn test_validate_existing_detects_changed_split_ratio() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 10);
    let materializer = quiet(SplitStrategy::Random);

    materializer.prepare(&dataset, target.path(), 0.8).unwrap();

    assert!(matches!(
        materializer.validate_existing(&dataset, target.path(), 0.5).unwrap(),
        Validation::Stale(StaleReason::SplitCountMismatch { .. })
    ));
}

#[test]
fn test_unreadable_manifest_triggers_rebuild() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 5);
    let materializer = quiet(SplitStrategy::Random);
    fs::write(target.path().join("dataset.yaml"), "nc: [not a number").unwrap();

    assert!(matches!(
        materializer.validate_existing(&dataset, target.path(), 0.6).unwrap(),
        Validation::Stale(StaleReason::UnreadableManifest(_))
    ));

    let manifest_path = materializer.prepare(&dataset, target.path(), 0.6).unwrap();
    assert_eq!(Manifest::from_yaml_file(&manifest_path).unwrap().nc, 2);
}

#[test]
fn test_missing_image_dir_is_stale() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 5);
    let materializer = quiet(SplitStrategy::Random);

    materializer.prepare(&dataset, target.path(), 0.6).unwrap();
    let val_dir = DatasetLayout::new(target.path()).images_dir(Split::Val);
    fs::remove_dir_all(&val_dir).unwrap();

    match materializer.validate_existing(&dataset, target.path(), 0.6).unwrap() {
        Validation::Stale(StaleReason::MissingImageDir(dir)) => {
            assert!(dir.ends_with("images/val"))
        }
        other => panic!("unexpected validation: {:?}", other),
    }
}

#[test]
fn test_invalidate_and_rebuild_removes_foreign_files() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 4);
    let materializer = quiet(SplitStrategy::Random);
    let stray = target.path().join("notes.txt");
    fs::write(&stray, "scratch").unwrap();

    let manifest_path = materializer
        .invalidate_and_rebuild(
            &dataset,
            target.path(),
            0.5,
            &StaleReason::MissingImageDir(PathBuf::from("images/train")),
        )
        .unwrap();

    assert!(!stray.exists());
    assert!(manifest_path.is_file());
    let layout = DatasetLayout::new(target.path());
    assert_eq!(split_counts(&layout, Split::Train), (2, 2));
    assert_eq!(split_counts(&layout, Split::Val), (2, 2));
}

#[test]
fn test_seeded_split_is_stable_across_targets() {
    let source = tempfile::tempdir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 12);
    let materializer = quiet(SplitStrategy::Seeded(17));

    materializer.prepare(&dataset, first.path(), 0.75).unwrap();
    materializer.prepare(&dataset, second.path(), 0.75).unwrap();

    let val_of = |root: &Path| file_names(&DatasetLayout::new(root).images_dir(Split::Val));
    assert_eq!(val_of(first.path()).len(), 3);
    assert_eq!(val_of(first.path()), val_of(second.path()));
}

#[test]
fn test_full_train_ratio_leaves_val_empty() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 3);

    let manifest_path = prepare_dataset(&dataset, target.path(), 1.0).unwrap();

    let layout = DatasetLayout::new(target.path());
    assert_eq!(split_counts(&layout, Split::Train), (3, 3));
    assert_eq!(split_counts(&layout, Split::Val), (0, 0));
    assert_eq!(
        prepare_dataset(&dataset, target.path(), 1.0).unwrap(),
        manifest_path
    );
}

#[test]
fn test_prepare_rejects_invalid_input() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let materializer = quiet(SplitStrategy::Random);

    let empty = Dataset::new(Vec::new(), categories(&["cat"]));
    assert!(matches!(
        materializer.prepare(&empty, target.path(), 0.8),
        Err(MaterializeError::EmptyDataset)
    ));

    let dataset = synthetic_dataset(source.path(), 2);
    assert!(matches!(
        materializer.prepare(&dataset, target.path(), 0.0),
        Err(MaterializeError::InvalidSplitRatio(_))
    ));

    let mut zero_width = dataset.clone();
    zero_width.images[0].width = 0;
    assert!(matches!(
        materializer.prepare(&zero_width, target.path(), 0.5),
        Err(MaterializeError::InvalidImageSize { width: 0, .. })
    ));
}

#[test]
fn test_missing_source_image_propagates_io_error() {
    let target = tempfile::tempdir().unwrap();
    let dataset = Dataset::new(
        vec![AnnotatedImage::new("/nonexistent/img.jpg", 10, 10)],
        categories(&["cat"]),
    );

    match quiet(SplitStrategy::Random).prepare(&dataset, target.path(), 1.0) {
        Err(MaterializeError::Io { path, .. }) => {
            assert_eq!(path, PathBuf::from("/nonexistent/img.jpg"))
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_shared_label_name_is_rejected_before_writing() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let jpg = source.path().join("a.jpg");
    let png = source.path().join("a.png");
    fs::write(&jpg, "jpg").unwrap();
    fs::write(&png, "png").unwrap();
    let dataset = Dataset::new(
        vec![
            AnnotatedImage::new(&jpg, 10, 10).with_annotation(Annotation::new(0, vec![])),
            AnnotatedImage::new(&png, 10, 10).with_annotation(Annotation::new(0, vec![])),
        ],
        categories(&["cat"]),
    );

    match quiet(SplitStrategy::Seeded(1)).prepare(&dataset, target.path(), 1.0) {
        Err(MaterializeError::DuplicateFileName { first, second }) => {
            assert_eq!(first, jpg);
            assert_eq!(second, png);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!target.path().join("images").exists());
    assert!(!target.path().join("dataset.yaml").exists());
}

#[test]
fn test_same_leaf_from_different_folders_is_rejected() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let mut images = Vec::new();
    for folder in ["left", "right"] {
        let dir = source.path().join(folder);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.jpg");
        fs::write(&path, folder).unwrap();
        images.push(AnnotatedImage::new(path, 10, 10));
    }
    let dataset = Dataset::new(images, categories(&["cat"]));

    assert!(matches!(
        quiet(SplitStrategy::Random).prepare(&dataset, target.path(), 0.5),
        Err(MaterializeError::DuplicateFileName { .. })
    ));
}

#[test]
fn test_invalid_image_keeps_existing_dataset() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 2);
    let materializer = quiet(SplitStrategy::Random);
    let manifest_path = materializer.prepare(&dataset, target.path(), 0.5).unwrap();

    let mut invalid = dataset.clone();
    invalid.images[0].width = 0;
    invalid.categories.insert(2, "bird".to_string());

    assert!(matches!(
        materializer.prepare(&invalid, target.path(), 0.5),
        Err(MaterializeError::InvalidImageSize { width: 0, .. })
    ));
    assert!(manifest_path.is_file());

    assert!(matches!(
        materializer.invalidate_and_rebuild(
            &invalid,
            target.path(),
            0.5,
            &StaleReason::ClassCountMismatch {
                expected: 3,
                recorded: 2,
            },
        ),
        Err(MaterializeError::InvalidImageSize { .. })
    ));
    assert!(manifest_path.is_file());

    let layout = DatasetLayout::new(target.path());
    assert_eq!(split_counts(&layout, Split::Train), (1, 1));
    assert_eq!(split_counts(&layout, Split::Val), (1, 1));
}

#[test]
fn test_leftover_split_files_without_manifest_are_cleared() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 4);
    let materializer = quiet(SplitStrategy::Random);
    let layout = DatasetLayout::new(target.path());

    layout.create_dirs().unwrap();
    let leftover = layout.images_dir(Split::Train).join("old_frame.jpg");
    fs::write(&leftover, "old").unwrap();

    assert_eq!(
        materializer.validate_existing(&dataset, target.path(), 0.5).unwrap(),
        Validation::Stale(StaleReason::OrphanedSplitDir(layout.images_dir(Split::Train)))
    );

    materializer.prepare(&dataset, target.path(), 0.5).unwrap();

    assert!(!leftover.exists());
    assert_eq!(split_counts(&layout, Split::Train), (2, 2));
    assert_eq!(split_counts(&layout, Split::Val), (2, 2));
}

#[test]
fn test_empty_split_dirs_without_manifest_are_reused() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let dataset = synthetic_dataset(source.path(), 4);
    let materializer = quiet(SplitStrategy::Random);

    DatasetLayout::new(target.path()).create_dirs().unwrap();

    assert_eq!(
        materializer.validate_existing(&dataset, target.path(), 0.5).unwrap(),
        Validation::Missing
    );
}
