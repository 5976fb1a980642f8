use std::fs;
use yaml_patcher::config::{load_schema_from_path, load_schema_from_str};
use yaml_patcher::session::{FieldValue, IdentityRow, Session};
use yaml_patcher::yaml::{
    apply_patches, apply_template_patches, extract_top_level_block, KeyOrderMap, Patch, PatchOp,
    Record, YamlPath,
};

const SCHEMA: &str = r##"
[key_order]
"" = ["host", "port", "tls", "ampcode", "channels"]

[[fields]]
id = "host"
path = "host"
kind = "text"

[[fields]]
id = "port"
path = "port"
kind = "number"

[[fields]]
id = "amp-url"
path = "ampcode.upstream-url"
kind = "text"

[[templates]]
id = "ampcode"
root_key = "ampcode"
start_marker = "# ampcode-example-start"
end_marker = "# ampcode-example-end"
fields = ["amp-url"]

[[identity_groups]]
id = "channels"
parent = "channels"
item_key_order = ["name", "alias"]
"##;

const CHANNELS: &str = "\
host: \"x\"
channels:
  alpha:
    - name: m1
      alias: a1
  gamma:
    - name: m2
";

fn p(path: &str) -> YamlPath {
    YamlPath::parse(path).expect("path")
}

fn rows_of<'a>(session: &'a mut Session<'_>) -> &'a mut Vec<IdentityRow> {
    session
        .current_mut()
        .rows_mut("channels")
        .expect("channels group")
}

#[test]
fn saved_document_plans_nothing_for_the_same_edits() {
    let input = fs::read_to_string("tests/fixtures/config.yaml").expect("fixture");
    let schema = load_schema_from_path("tests/fixtures/schema.toml").expect("schema");

    let mut session = Session::load(input, &schema);
    let current = session.current_mut();
    current.set("port", FieldValue::Number("9000".into()));
    current.set("api-keys", FieldValue::List("k1, k2".into()));
    current.set("amp-url", FieldValue::Text("https://amp.example.com".into()));
    current.set("switch-project", FieldValue::Bool(true));
    let rows = current.rows_mut("aliases").expect("aliases");
    rows[0].identity = "gemini".to_string();
    let edited = session.current().clone();

    let saved = session.save().expect("save");
    assert_eq!(saved.skipped().count(), 0, "{:?}", saved.report);

    let mut reloaded = Session::load(saved.text.clone(), &schema);
    *reloaded.current_mut() = edited;
    let again = reloaded.plan();
    assert!(again.is_empty(), "{again:?}");
}

#[test]
fn empty_patch_lists_leave_text_untouched() {
    let text = "# top\nhost: x   # spaced\n\n\nport: 1\n";
    let report = apply_patches(text, &[], &KeyOrderMap::new()).expect("apply");
    assert_eq!(report.text, text);
    assert_eq!(apply_template_patches(text, &[]), text);
}

#[test]
fn new_key_lands_between_ordered_siblings() {
    let order = KeyOrderMap::new().with("", ["host", "port", "tls"]);
    let port = Patch::set_scalar(p("port"), 8317);

    let alone = apply_patches("host: \"x\"\n", std::slice::from_ref(&port), &order)
        .expect("apply")
        .text;
    assert_eq!(alone, "host: \"x\"\nport: 8317\n");

    let with_tls = "host: \"x\"\n# TLS\ntls:\n  enable: true\n";
    let out = apply_patches(with_tls, &[port], &order).expect("apply").text;
    assert_eq!(out, "host: \"x\"\nport: 8317\n# TLS\ntls:\n  enable: true\n");
}

#[test]
fn renamed_channel_is_written_then_original_deleted() {
    let schema = load_schema_from_str(SCHEMA).expect("schema");
    let mut session = Session::load(CHANNELS, &schema);
    rows_of(&mut session)[0].identity = "beta".to_string();

    let plan = session.plan();
    let sets: Vec<String> = plan
        .patches
        .iter()
        .filter(|patch| !patch.is_delete())
        .map(|patch| patch.path.to_string())
        .collect();
    let deletes: Vec<String> = plan
        .patches
        .iter()
        .filter(|patch| patch.is_delete())
        .map(|patch| patch.path.to_string())
        .collect();
    assert_eq!(sets, ["channels.beta"]);
    assert_eq!(deletes, ["channels.alpha"]);

    let saved = session.save().expect("save");
    assert_eq!(
        saved.text,
        "host: \"x\"\nchannels:\n  gamma:\n    - name: m2\n  beta:\n    - name: m1\n      alias: a1\n"
    );
}

#[test]
fn removed_channel_is_deleted_exactly_once() {
    let schema = load_schema_from_str(SCHEMA).expect("schema");
    let mut session = Session::load(CHANNELS, &schema);
    rows_of(&mut session).retain(|row| row.identity != "alpha");

    let plan = session.plan();
    assert_eq!(plan.patches.len(), 1);
    assert_eq!(plan.patches[0].path, p("channels.alpha"));
    assert_eq!(plan.patches[0].op, PatchOp::Delete);

    let saved = session.save().expect("save");
    assert_eq!(saved.text, "host: \"x\"\nchannels:\n  gamma:\n    - name: m2\n");
}

#[test]
fn added_channel_uses_item_key_order() {
    let schema = load_schema_from_str(SCHEMA).expect("schema");
    let mut session = Session::load(CHANNELS, &schema);
    rows_of(&mut session).push(IdentityRow::new(
        "delta",
        vec![Record::new().with("alias", "d").with("name", "m3")],
    ));

    let saved = session.save().expect("save");
    assert!(saved
        .text
        .ends_with("  gamma:\n    - name: m2\n  delta:\n    - name: m3\n      alias: d\n"));
}

#[test]
fn commented_template_expands_when_field_set() {
    let schema = load_schema_from_str(SCHEMA).expect("schema");
    let text = "\
port: 8317

# ampcode-example-start
# ampcode:
#   upstream-url: \"https://ampcode.com\"
# ampcode-example-end
";
    let mut session = Session::load(text, &schema);
    session
        .current_mut()
        .set("amp-url", FieldValue::Text("https://amp.example.com".into()));

    let plan = session.plan();
    assert_eq!(plan.templates.len(), 1);
    assert!(plan.templates[0]
        .snippet
        .contains("upstream-url: \"https://amp.example.com\""));
    assert!(plan.patches.is_empty());

    let expanded = apply_template_patches(text, &plan.templates);
    assert!(!extract_top_level_block(&expanded, "ampcode").is_empty());
    assert!(expanded.contains("# ampcode-example-start\n\nampcode:\n"));
}

#[test]
fn strings_are_quoted_only_when_needed() {
    let out = apply_patches(
        "a: 1\nb: 2\n",
        &[
            Patch::set_scalar(p("a"), "http://a:b"),
            Patch::set_scalar(p("b"), "plainvalue"),
        ],
        &KeyOrderMap::new(),
    )
    .expect("apply")
    .text;
    assert_eq!(out, "a: \"http://a:b\"\nb: plainvalue\n");
}

#[test]
fn unreadable_group_entries_survive_an_untouched_save() {
    let schema = load_schema_from_str(SCHEMA).expect("schema");
    let text = "\
channels:
  gemini:
    - name: g
      alias: x
  codex: []
  legacy: keep-me
";
    let mut session = Session::load(text, &schema);
    assert!(!session.is_dirty());
    assert!(session.plan().is_empty());
    assert_eq!(session.save().expect("save").text, text);

    session
        .current_mut()
        .set("port", FieldValue::Number("9000".into()));
    let saved = session.save().expect("save");
    assert_eq!(saved.text, format!("port: 9000\n{text}"));
}
