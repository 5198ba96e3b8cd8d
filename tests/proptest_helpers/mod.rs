#![allow(dead_code)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use transferpack::graph::ImageId;
use transferpack::packet::PathIdMap;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A packet file: its repository-relative path and how many images it holds.
#[derive(Clone, Debug)]
pub struct FileSpec {
    pub relative: String,
    pub images: usize,
}

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,8}"
}

fn arb_relative() -> impl Strategy<Value = String> {
    (prop::collection::vec(arb_segment(), 0..3), arb_segment()).prop_map(|(dirs, name)| {
        let mut parts = dirs;
        parts.push(format!("{}.tif", name));
        parts.join("/")
    })
}

/// Files with distinct relative paths, each backing 1..=max_images images.
pub fn arb_files(max_files: usize, max_images: usize) -> BoxedStrategy<Vec<FileSpec>> {
    prop::collection::btree_map(arb_relative(), 1..=max_images, 1..=max_files)
        .prop_map(|files| {
            files
                .into_iter()
                .map(|(relative, images)| FileSpec { relative, images })
                .collect()
        })
        .boxed()
}

/// Gives every file its own run of fresh ids after `first_id`, keyed by a
/// marked path under `base`. `reverse` hands each run out descending.
pub fn assign_ids(files: &[FileSpec], base: &str, first_id: u64, reverse: bool) -> PathIdMap {
    let mut next = first_id;
    let mut map = PathIdMap::new();
    for file in files {
        let mut ids: Vec<ImageId> = (0..file.images)
            .map(|_| {
                next += 1;
                ImageId(next)
            })
            .collect();
        if reverse {
            ids.reverse();
        }
        map.insert(format!("{}/./{}", base, file.relative), ids);
    }
    map
}

pub fn id_set(map: &PathIdMap) -> BTreeSet<ImageId> {
    map.values().flatten().copied().collect()
}
