use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};

use super::*;

#[test]
fn config_defaults_when_file_is_absent() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");

    let config = UpdateConfig::load(&root).expect("must load defaults");
    assert_eq!(config, UpdateConfig::default());
    assert_eq!(config.staging_dir_name, "temp_nazuna");
    assert_eq!(config.install_args, vec!["run", "config:install"]);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn config_partial_file_keeps_remaining_defaults() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    fs::write(
        root.join(CONFIG_FILE_NAME),
        "repository_url = \"https://example.test/app.git\"\ncountdown_secs = 0\n",
    )
    .expect("must write config");

    let config = UpdateConfig::load(&root).expect("must load config");
    assert_eq!(config.repository_url, "https://example.test/app.git");
    assert_eq!(config.countdown_secs, 0);
    assert_eq!(config.install_program, "npm");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn config_rejects_empty_staging_dir_name() {
    let err = UpdateConfig::from_toml_str("staging_dir_name = \"  \"\n")
        .expect_err("must reject empty staging dir");
    assert!(err.to_string().contains("staging_dir_name"));
}

#[test]
fn preserved_table_captures_customization_pair() {
    let captured = PRESERVED_ENTRIES
        .iter()
        .filter(|entry| entry.captured)
        .map(|entry| entry.relative_path)
        .collect::<Vec<_>>();
    assert_eq!(
        captured,
        vec![
            "dados/database",
            "dados/src/config.json",
            "dados/src/.scripts/update.js",
            "dados/src/index.js",
            "dados/midias",
        ]
    );

    let config = UpdateConfig::default();
    let marked = PRESERVED_ENTRIES
        .iter()
        .filter_map(|entry| config.marker_for(entry).map(|_| entry.relative_path))
        .collect::<Vec<_>>();
    assert_eq!(marked, vec!["dados/src/.scripts/update.js", "dados/src/index.js"]);
}

#[test]
fn preserved_table_never_purges_database_or_media() {
    for entry in PRESERVED_ENTRIES {
        if entry.relative_path == "dados/database" || entry.relative_path == "dados/midias" {
            assert!(!entry.purged, "{} must not be purged", entry.relative_path);
        }
    }
}

#[test]
fn marker_for_uses_configured_markers() {
    let config = UpdateConfig {
        update_marker: "// custom update".to_string(),
        ..UpdateConfig::default()
    };
    let update_entry = PRESERVED_ENTRIES
        .iter()
        .find(|entry| entry.relative_path == "dados/src/.scripts/update.js")
        .expect("update script entry");
    assert_eq!(config.marker_for(update_entry), Some("// custom update"));

    let database_entry = &PRESERVED_ENTRIES[0];
    assert_eq!(config.marker_for(database_entry), None);
}

#[test]
fn backup_stamp_round_trips_through_dir_name() {
    let at = Utc
        .with_ymd_and_hms(2024, 5, 1, 13, 7, 59)
        .single()
        .expect("valid time")
        + chrono::TimeDelta::milliseconds(42);
    let stamp = BackupStamp::from_datetime(at);
    assert_eq!(stamp.dir_name(), "backup_2024-05-01_13_07_59_042Z");
    assert_eq!(BackupStamp::parse(&stamp.dir_name()), Some(stamp));
}

#[test]
fn backup_stamp_rejects_loose_names() {
    for name in [
        "backup_other",
        "backup_2024-01-01_x",
        "backup_2024-01-01_12_00_00Z",
        "backup_2024-13-01_12_00_00_000Z",
        "xbackup_2024-01-01_12_00_00_000Z",
        "backup_2024-01-01_12_00_00_000Z.bak",
        "backup_2024-1-01_12_00_00_000Z",
    ] {
        assert!(BackupStamp::parse(name).is_none(), "{name} must not parse");
    }
}

#[test]
fn backup_stamp_successor_is_strictly_later() {
    let stamp = BackupStamp::now();
    let next = stamp.successor();
    assert!(next > stamp);
    assert_ne!(next.dir_name(), stamp.dir_name());
}

#[test]
fn marker_check_reports_presence_and_absence() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let path = root.join("index.js");
    fs::write(&path, "// --- MARK ---\nconsole.log(1);\n").expect("must write file");

    assert!(file_contains_marker(&path, "// --- MARK ---"));
    assert!(!file_contains_marker(&path, "// --- OTHER ---"));
    assert!(!file_contains_marker(&root.join("missing.js"), "// --- MARK ---"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn members_digest_tracks_content_not_creation_order() {
    let first = test_root();
    let second = test_root();
    for (root, order) in [
        (&first, ["dados/src/config.json", "dados/midias/a/b.png"]),
        (&second, ["dados/midias/a/b.png", "dados/src/config.json"]),
    ] {
        for name in order {
            let path = root.join(name);
            fs::create_dir_all(path.parent().expect("parent")).expect("must create dir");
            fs::write(&path, name.as_bytes()).expect("must write file");
        }
    }
    let members = ["dados/src/config.json", "dados/midias"];

    let first_digest = members_digest(&first, &members).expect("must digest first");
    assert!(first_digest.starts_with("sha256:"));
    assert_eq!(
        first_digest,
        members_digest(&second, &members).expect("must digest second")
    );

    fs::write(second.join("dados/src/config.json"), b"changed").expect("must rewrite file");
    assert_ne!(
        first_digest,
        members_digest(&second, &members).expect("must digest changed")
    );

    fs::write(first.join("dados/unrelated.txt"), b"x").expect("must write unrelated");
    assert_eq!(
        first_digest,
        members_digest(&first, &members).expect("must ignore non-members")
    );

    fs::remove_dir_all(first.join("dados/midias")).expect("must drop member");
    assert!(members_digest(&first, &members).is_err());

    let _ = fs::remove_dir_all(&first);
    let _ = fs::remove_dir_all(&second);
}

#[test]
fn manifest_groups_compare_independent_of_key_order() {
    let left = DependencyManifest::from_json_str(
        r#"{"dependencies": {"a": "^1.0.0", "b": "^2.0.0"}, "scripts": {"start": "node ."}}"#,
    )
    .expect("must parse left");
    let right = DependencyManifest::from_json_str(
        r#"{"scripts": {"start": "node ."}, "dependencies": {"b": "^2.0.0", "a": "^1.0.0"}}"#,
    )
    .expect("must parse right");
    assert_eq!(left, right);
}

#[test]
fn manifest_rejects_non_object_group() {
    let err = DependencyManifest::from_json_str(r#"{"dependencies": ["a"]}"#)
        .expect_err("must reject array group");
    assert!(err.to_string().contains("dependencies"));
}

#[test]
fn manifest_reads_engine_requirement() {
    let manifest =
        DependencyManifest::from_json_str(r#"{"engines": {"node": ">=18.0.0"}}"#).expect("parse");
    assert_eq!(manifest.engine_requirement("node"), Some(">=18.0.0"));
    assert_eq!(manifest.engine_requirement("npm"), None);
}

#[test]
fn classify_reports_manifest_missing() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1"}}"#),
        None,
        &["a"],
    );
    assert_eq!(
        fixture.classify(),
        DependencyClassification::ManifestMissing
    );
    fixture.cleanup();
}

#[test]
fn classify_reports_changed_group() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1"}, "scripts": {"start": "node ."}}"#),
        Some(r#"{"dependencies": {"a": "1"}, "scripts": {"start": "node index.js"}}"#),
        &["a"],
    );
    assert_eq!(
        fixture.classify(),
        DependencyClassification::DependenciesChanged {
            group: DependencyGroup::Scripts
        }
    );
    fixture.cleanup();
}

#[test]
fn classify_treats_missing_group_as_empty() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1"}, "devDependencies": {}}"#),
        Some(r#"{"dependencies": {"a": "1"}}"#),
        &["a"],
    );
    assert_eq!(fixture.classify(), DependencyClassification::NoChange);
    fixture.cleanup();
}

#[test]
fn classify_reports_cache_missing() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1"}}"#),
        Some(r#"{"dependencies": {"a": "1"}}"#),
        &[],
    );
    fs::remove_dir_all(fixture.cache_root()).expect("must remove cache");
    assert_eq!(fixture.classify(), DependencyClassification::CacheMissing);
    fixture.cleanup();
}

#[test]
fn classify_reports_first_missing_dependency() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1"}, "optionalDependencies": {"@scope/b": "2"}}"#),
        Some(r#"{"dependencies": {"a": "1"}, "optionalDependencies": {"@scope/b": "2"}}"#),
        &["a"],
    );
    assert_eq!(
        fixture.classify(),
        DependencyClassification::SpecificDependencyMissing {
            name: "@scope/b".to_string()
        }
    );

    fs::create_dir_all(fixture.cache_root().join("@scope").join("b")).expect("must add scoped");
    assert_eq!(fixture.classify(), DependencyClassification::NoChange);
    fixture.cleanup();
}

#[test]
fn classify_folds_parse_errors_into_comparison_error() {
    let fixture = ClassifyFixture::new(Some("{not json"), Some("{}"), &[]);
    let classification = fixture.classify();
    assert!(matches!(
        classification,
        DependencyClassification::ComparisonError { .. }
    ));
    assert!(classification.requires_install());
    fixture.cleanup();
}

#[test]
fn classify_is_stable_across_repeated_calls() {
    let fixture = ClassifyFixture::new(
        Some(r#"{"dependencies": {"a": "1", "b": "2"}}"#),
        Some(r#"{"dependencies": {"b": "2", "a": "1"}}"#),
        &["a", "b"],
    );
    let first = fixture.classify();
    for _ in 0..5 {
        assert_eq!(fixture.classify(), first);
    }
    assert_eq!(first, DependencyClassification::NoChange);
    assert!(!first.requires_install());
    fixture.cleanup();
}

struct ClassifyFixture {
    root: PathBuf,
}

impl ClassifyFixture {
    fn new(installed: Option<&str>, staged: Option<&str>, cached: &[&str]) -> Self {
        let root = test_root();
        fs::create_dir_all(root.join("staged")).expect("must create staged dir");
        fs::create_dir_all(root.join("node_modules")).expect("must create cache dir");
        if let Some(installed) = installed {
            fs::write(root.join("package.json"), installed).expect("must write installed");
        }
        if let Some(staged) = staged {
            fs::write(root.join("staged").join("package.json"), staged)
                .expect("must write staged");
        }
        for name in cached {
            fs::create_dir_all(root.join("node_modules").join(name)).expect("must seed cache");
        }
        Self { root }
    }

    fn cache_root(&self) -> PathBuf {
        self.root.join("node_modules")
    }

    fn classify(&self) -> DependencyClassification {
        classify_dependencies(
            &self.root.join("package.json"),
            &self.root.join("staged").join("package.json"),
            &self.cache_root(),
        )
    }

    fn cleanup(self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    build_test_root(&std::env::temp_dir(), nanos, counter)
}

fn build_test_root(base: &Path, nanos: u128, counter: u64) -> PathBuf {
    base.join(format!(
        "selfup-core-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ))
}
