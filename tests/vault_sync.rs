//! Dual-storage synchronizer tests over real note files on disk.

use std::collections::BTreeMap;
use std::path::Path;

use rootline::note::frontmatter::{extract_frontmatter, replace_frontmatter};
use rootline::note::record::PersonRecord;
use rootline::report::ParseReport;
use rootline::sync::{plan_repairs, NoteRecord, RecordIndex};

fn write_note(dir: &Path, name: &str, frontmatter: &str) {
    let text = format!("---\n{frontmatter}---\n# {name}\n");
    std::fs::write(dir.join(format!("{name}.md")), text).unwrap();
}

fn load_notes(dir: &Path) -> Vec<NoteRecord> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let note = path.file_stem().unwrap().to_str().unwrap().to_owned();
            let text = std::fs::read_to_string(&path).unwrap();
            let (fields, _) = extract_frontmatter(&text).unwrap();
            NoteRecord {
                note,
                record: PersonRecord::from_fields(&fields),
            }
        })
        .collect()
}

fn apply_all(dir: &Path, patches: &BTreeMap<String, rootline::note::PatchSet>) {
    for (note, patch) in patches {
        if patch.is_empty() {
            continue;
        }
        let path = dir.join(format!("{note}.md"));
        let text = std::fs::read_to_string(&path).unwrap();
        let (mut fields, _) = extract_frontmatter(&text).unwrap();
        patch.apply(&mut fields);
        std::fs::write(&path, replace_frontmatter(&text, &fields)).unwrap();
    }
}

#[test]
fn spouse_self_healing_through_files() {
    let dir = tempfile::tempdir().unwrap();
    write_note(
        dir.path(),
        "Anna",
        "cr_id: a01\nname: Anna\nsex: F\nspouse_id:\n  - x01\n",
    );
    write_note(dir.path(), "Xavier", "cr_id: x01\nname: Xavier\nsex: M\n");

    let notes = load_notes(dir.path());
    let index = RecordIndex::build(&notes);
    let mut report = ParseReport::new();
    let patches = plan_repairs(&notes, &index, &mut report);
    assert!(!patches["Xavier"].is_empty());
    apply_all(dir.path(), &patches);

    // Xavier's record now lists Anna in both representations.
    let notes = load_notes(dir.path());
    let xavier = notes.iter().find(|n| n.note == "Xavier").unwrap();
    assert_eq!(
        xavier.record.spouses.ids,
        vec![rootline::id::CrId::new("a01").unwrap()]
    );
    assert_eq!(xavier.record.spouses.links, vec!["[[Anna]]".to_owned()]);

    // Second run: everything is consistent, no further writes.
    let index = RecordIndex::build(&notes);
    let mut report = ParseReport::new();
    let patches = plan_repairs(&notes, &index, &mut report);
    assert!(
        patches.values().all(|p| p.is_empty()),
        "synchronizer is not idempotent: {patches:?}"
    );
}

#[test]
fn stale_wikilink_repair_after_rename() {
    let dir = tempfile::tempdir().unwrap();
    // The father's note was renamed from "Dad" to "Father Brown"; the child's
    // id field still resolves, the wikilink is stale.
    write_note(
        dir.path(),
        "Kid",
        "cr_id: k01\nname: Kid\nfather: \"[[Dad]]\"\nfather_id: f01\n",
    );
    write_note(
        dir.path(),
        "Father Brown",
        "cr_id: f01\nname: Father Brown\nsex: M\nchildren_id:\n  - k01\n",
    );

    let notes = load_notes(dir.path());
    let index = RecordIndex::build(&notes);
    let mut report = ParseReport::new();
    let patches = plan_repairs(&notes, &index, &mut report);
    apply_all(dir.path(), &patches);

    let notes = load_notes(dir.path());
    let kid = notes.iter().find(|n| n.note == "Kid").unwrap();
    assert_eq!(
        kid.record.father.link.as_deref(),
        Some("[[Father Brown]]"),
        "stale wikilink repaired from the authoritative id"
    );
}

#[test]
fn unrelated_fields_and_unknown_keys_survive_repair() {
    let dir = tempfile::tempdir().unwrap();
    write_note(
        dir.path(),
        "Anna",
        "cr_id: a01\nname: Anna\nsex: F\nspouse_id:\n  - x01\nmy_custom: keepme\n_private_note: secret\n",
    );
    write_note(dir.path(), "Xavier", "cr_id: x01\nname: Xavier\nsex: M\n");

    let notes = load_notes(dir.path());
    let index = RecordIndex::build(&notes);
    let mut report = ParseReport::new();
    let patches = plan_repairs(&notes, &index, &mut report);
    apply_all(dir.path(), &patches);

    let text = std::fs::read_to_string(dir.path().join("Anna.md")).unwrap();
    let (fields, _) = extract_frontmatter(&text).unwrap();
    assert_eq!(fields["my_custom"], serde_json::json!("keepme"));
    assert_eq!(fields["_private_note"], serde_json::json!("secret"));
    assert!(text.contains("# Anna"), "note body untouched");
}
