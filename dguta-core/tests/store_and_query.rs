use std::{io::Cursor, path::Path};

use dguta_core::{
    depth_splits, AgeBucket, Db, Error, FileInfo, FileType, Filter, Summariser, Tree,
};

const YEAR: i64 = 365 * 24 * 60 * 60;
const NOW: i64 = 100 * YEAR;

fn file(path: &str, size: u64, uid: u32, gid: u32) -> FileInfo {
    FileInfo {
        path: path.to_string(),
        size,
        uid,
        gid,
        atime: NOW - 10,
        mtime: NOW - 20,
        is_dir: false,
    }
}

fn dir(path: &str) -> FileInfo {
    FileInfo {
        path: path.to_string(),
        size: 1024,
        uid: 101,
        gid: 1,
        atime: NOW - 10,
        mtime: NOW - 20,
        is_dir: true,
    }
}

// Six files under /a/... with gids {1,2,3} and uids {101,102,103}, plus the
// directories themselves as Dir-typed pseudo-entries of size 1024.
fn fixture_tsv() -> Vec<u8> {
    let mut s = Summariser::new(NOW);
    for d in ["/a", "/a/b", "/a/b/c", "/a/b/c/d", "/a/b/e", "/a/tmp"] {
        s.add(&dir(d)).unwrap();
    }
    // f1 has an access time 4 years back, landing it in a1y..a3y.
    let mut f1 = file("/a/b/c/d/f1.bam", 10, 101, 1);
    f1.atime = NOW - 4 * YEAR;
    s.add(&f1).unwrap();
    s.add(&file("/a/b/c/d/f2.bam", 20, 101, 1)).unwrap();
    s.add(&file("/a/b/c/d/f3.cram", 30, 102, 2)).unwrap();
    s.add(&file("/a/b/e/f4.vcf", 40, 102, 2)).unwrap();
    s.add(&file("/a/b/e/f5.txt", 50, 103, 3)).unwrap();
    s.add(&file("/a/tmp/f6.bam", 60, 103, 3)).unwrap();

    let mut out = Vec::new();
    s.output(&mut out).unwrap();
    out
}

fn build_store(path: &Path, tsv: &[u8]) {
    let mut db = Db::new(vec![path.to_path_buf()]);
    db.create().unwrap();
    db.store(Cursor::new(tsv.to_vec()), 4).unwrap();
    db.close().unwrap();
}

fn fixture_tree(path: &Path) -> Tree {
    build_store(path, &fixture_tsv());
    Tree::new(vec![path.to_path_buf()]).unwrap()
}

fn types(list: &[FileType]) -> Filter {
    Filter {
        types: Some(list.to_vec()),
        ..Filter::default()
    }
}

#[test]
fn root_totals_match_manual_sums() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let di = tree.dir_info("/", &Filter::default()).unwrap();
    // 6 files (the temp one counted once) + 6 directory pseudo-entries.
    assert_eq!(di.current.count, 12);
    assert_eq!(di.current.size, 210 + 6 * 1024);
    assert_eq!(di.current.gids, vec![1, 2, 3]);
    assert_eq!(di.current.uids, vec![101, 102, 103]);
    assert!(di.current.file_types.contains(&FileType::Temp));
    assert!(di.current.file_types.contains(&FileType::Dir));
    // Root's only child branch with content is /a; its nested count is the
    // total minus the /a pseudo-entry held at root level.
    assert_eq!(di.children.len(), 1);
    assert_eq!(di.children[0].dir, "/a");
    assert_eq!(di.children[0].count, di.current.count - 1);
}

#[test]
fn nested_sums_by_branch() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let filter = types(&[FileType::Bam, FileType::Cram, FileType::Vcf, FileType::Text]);
    let di = tree.dir_info("/a/b", &filter).unwrap();
    assert_eq!(di.current.count, 5);
    assert_eq!(di.current.size, 150);
    let by_dir: Vec<(&str, u64, u64)> = di
        .children
        .iter()
        .map(|c| (c.dir.as_str(), c.count, c.size))
        .collect();
    assert_eq!(by_dir, vec![("/a/b/c", 3, 60), ("/a/b/e", 2, 90)]);
}

#[test]
fn temp_data_is_not_double_counted() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    // Unfiltered: the temp file counts once, via its bam row.
    let di = tree.dir_info("/a/tmp", &Filter::default()).unwrap();
    assert_eq!(di.current.count, 1);
    assert_eq!(di.current.size, 60);
    assert!(di.current.file_types.contains(&FileType::Temp));

    // Asking for exactly temp reports it too.
    let di = tree.dir_info("/a/tmp", &types(&[FileType::Temp])).unwrap();
    assert_eq!(di.current.count, 1);
    assert_eq!(di.current.size, 60);

    // Temp alongside another type keeps the avoidance rule.
    let di = tree
        .dir_info("/a/tmp", &types(&[FileType::Temp, FileType::Bam]))
        .unwrap();
    assert_eq!(di.current.count, 1);
}

#[test]
fn filters_do_not_mutate_between_queries() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let filter = Filter {
        gids: Some(vec![1, 2]),
        uids: Some(vec![101, 102]),
        types: Some(vec![FileType::Bam, FileType::Cram]),
        age: AgeBucket::All,
    };
    let first = tree.where_is("/a", &filter, &depth_splits(2)).unwrap();
    let second = tree.where_is("/a", &filter, &depth_splits(2)).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn where_collapses_single_child_chains() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    // All cram data lives under /a/b/c/d; /a, /a/b and /a/b/c are
    // uninformative single-child links and must be collapsed away.
    let results = tree
        .where_is("/a", &types(&[FileType::Cram]), &depth_splits(0))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].dir, "/a/b/c/d");
    assert_eq!(results[0].count, 1);
    assert_eq!(results[0].size, 30);
}

#[test]
fn where_depth_expands_into_children() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let filter = types(&[FileType::Bam, FileType::Cram, FileType::Vcf, FileType::Text]);
    let results = tree.where_is("/a/b", &filter, &depth_splits(1)).unwrap();
    let dirs: Vec<(&str, u64)> = results.iter().map(|s| (s.dir.as_str(), s.size)).collect();
    // Parent entry plus each child branch, collapsed, size descending.
    assert_eq!(
        dirs,
        vec![("/a/b", 150), ("/a/b/e", 90), ("/a/b/c/d", 60)]
    );
}

#[test]
fn where_respects_per_path_split_budgets() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let filter = types(&[FileType::Bam, FileType::Cram, FileType::Vcf, FileType::Text]);
    // Only the /a/b/c branch earns an extra level.
    let splits = |path: &str| if path.starts_with("/a/b/c") { 2 } else { 1 };
    let results = tree.where_is("/a/b", &filter, &splits).unwrap();
    assert!(results.iter().any(|s| s.dir == "/a/b/c/d"));
}

#[test]
fn age_bucket_queries_are_exact() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    // Only f1's atime is past the 3 year band.
    let filter = Filter {
        age: AgeBucket::A3y,
        ..Filter::default()
    };
    let di = tree.dir_info("/a/b/c/d", &filter).unwrap();
    assert_eq!(di.current.count, 1);
    assert_eq!(di.current.size, 10);
    assert_eq!(di.current.age, AgeBucket::A3y);

    // A known directory with nothing in the bucket is empty, not missing.
    let filter = Filter {
        age: AgeBucket::A5y,
        ..Filter::default()
    };
    let di = tree.dir_info("/a/b/c/d", &filter).unwrap();
    assert_eq!(di.current.count, 0);
    assert!(di.children.is_empty());
}

#[test]
fn age_filtered_ancestor_queries_reach_descendants() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    // /a itself has no 3-year-old direct entries, but f1 under /a/b/c/d
    // does; the ancestor query must surface it rather than come up empty.
    let filter = Filter {
        age: AgeBucket::A3y,
        ..Filter::default()
    };
    let di = tree.dir_info("/a", &filter).unwrap();
    assert_eq!(di.current.count, 1);
    assert_eq!(di.current.size, 10);
    assert_eq!(di.children.len(), 1);
    assert_eq!(di.children[0].dir, "/a/b");

    let results = tree.where_is("/a", &filter, &depth_splits(0)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].dir, "/a/b/c/d");
    assert_eq!(results[0].count, 1);
}

#[test]
fn file_locations_finds_shallowest_dirs_with_direct_files() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    let filter = types(&[FileType::Bam, FileType::Cram, FileType::Vcf, FileType::Text]);
    let results = tree.file_locations("/a", &filter).unwrap();
    let dirs: Vec<&str> = results.iter().map(|s| s.dir.as_str()).collect();
    assert_eq!(dirs, vec!["/a/b/c/d", "/a/b/e", "/a/tmp"]);
}

#[test]
fn dir_has_children_reflects_filtered_content() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    assert!(tree.dir_has_children("/a", &Filter::default()));
    assert!(tree.dir_has_children("/a/b", &types(&[FileType::Cram])));
    assert!(!tree.dir_has_children("/a/b/e", &types(&[FileType::Cram])));
    assert!(!tree.dir_has_children("/a/b/c/d", &Filter::default()));
}

#[test]
fn missing_directory_is_dir_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let tree = fixture_tree(&tmp.path().join("store"));

    assert!(matches!(
        tree.dir_info("/nonexistent", &Filter::default()),
        Err(Error::DirNotFound { .. })
    ));
}

#[test]
fn multi_store_union_sums_without_doubling() {
    let tmp = tempfile::tempdir().unwrap();
    let path_a = tmp.path().join("a");
    let path_b = tmp.path().join("b");

    let mut s = Summariser::new(NOW);
    s.add(&dir("/x")).unwrap();
    s.add(&file("/x/f1.bam", 10, 101, 1)).unwrap();
    let mut tsv = Vec::new();
    s.output(&mut tsv).unwrap();
    build_store(&path_a, &tsv);

    let mut s = Summariser::new(NOW);
    s.add(&dir("/x")).unwrap();
    s.add(&dir("/y")).unwrap();
    s.add(&file("/x/f2.bam", 5, 101, 1)).unwrap();
    s.add(&file("/y/f3.bam", 7, 102, 2)).unwrap();
    let mut tsv = Vec::new();
    s.output(&mut tsv).unwrap();
    build_store(&path_b, &tsv);

    let mut db = Db::new(vec![path_a, path_b]);
    db.open().unwrap();

    // Present in both stores: summed, and same-keyed rows coalesced.
    let lookup = db.lookup("/x", AgeBucket::All).unwrap();
    assert_eq!(lookup.not_found, 0);
    let row = &lookup.guts.0[0];
    assert_eq!((row.count, row.size), (2, 15));

    // Present in one store only: un-doubled, partial absence is not an error.
    let lookup = db.lookup("/y", AgeBucket::All).unwrap();
    assert_eq!(lookup.not_found, 1);
    assert_eq!(lookup.guts.0[0].count, 1);

    // Absent everywhere: an error.
    assert!(matches!(
        db.lookup("/zzz", AgeBucket::All),
        Err(Error::DirNotFound { .. })
    ));

    db.close().unwrap();
}

#[test]
fn create_and_open_contracts() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");

    build_store(&path, &fixture_tsv());

    // Create over a populated store is refused.
    let mut db = Db::new(vec![path.clone()]);
    assert!(matches!(db.create(), Err(Error::AlreadyExists { .. })));

    // Open of a missing store is refused.
    let mut db = Db::new(vec![tmp.path().join("missing")]);
    assert!(matches!(db.open(), Err(Error::NotExists { .. })));
}

#[test]
fn corrupt_input_aborts_the_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");

    let mut db = Db::new(vec![path]);
    db.create().unwrap();
    let bad = b"/a\t1\t101\t6\t0\t1\t10\t1\t1\nnot a valid line\n".to_vec();
    assert!(matches!(
        db.store(Cursor::new(bad), 4),
        Err(Error::Parse { line: 2, .. })
    ));
    db.close().unwrap();
}

#[test]
fn unsorted_input_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut db = Db::new(vec![tmp.path().join("store")]);
    db.create().unwrap();
    // A directory recurring after another would silently replace its
    // earlier records; it must be refused instead.
    let bad = b"/b\t1\t101\t6\t0\t1\t10\t1\t1\n/a\t1\t101\t6\t0\t1\t10\t1\t1\n".to_vec();
    assert!(matches!(
        db.store(Cursor::new(bad), 4),
        Err(Error::Parse { line: 2, .. })
    ));
    db.close().unwrap();
}

#[test]
fn info_counts_both_namespaces() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    build_store(&path, &fixture_tsv());

    let mut db = Db::new(vec![path]);
    db.open().unwrap();
    let info = db.info().unwrap();
    // Directories with their own records: /, /a, /a/b, /a/b/c, /a/b/c/d,
    // /a/b/e, /a/tmp. Four of those have record-holding children.
    assert_eq!(info.num_dirs, 7);
    assert!(info.num_dgutas >= info.num_dirs);
    assert_eq!(info.num_parents, 4);
    assert_eq!(info.num_children, 6);
    db.close().unwrap();
}
