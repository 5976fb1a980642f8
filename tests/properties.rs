use proptest::prelude::*;
use yaml_patcher::yaml::{
    apply_patches, apply_template_patches, get_scalar, KeyOrderMap, Patch, PatchOp, ScalarValue,
    YamlPath,
};

fn key() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["host", "port", "debug", "auth-dir", "tls", "proxy-url"])
        .prop_map(str::to_string)
}

fn scalar() -> impl Strategy<Value = ScalarValue> {
    prop_oneof![
        any::<bool>().prop_map(ScalarValue::Bool),
        (-100_000i64..100_000).prop_map(ScalarValue::Integer),
        "[a-zA-Z0-9 :#/.,'\"-]{0,16}".prop_map(ScalarValue::String),
    ]
}

/// A flat document with optional comments, built from unique keys.
fn document() -> impl Strategy<Value = String> {
    prop::collection::btree_map(key(), (scalar(), any::<bool>()), 0..5).prop_map(|entries| {
        let mut text = String::new();
        for (key, (value, commented)) in entries {
            if commented {
                text.push_str(&format!("# {key}\n"));
            }
            text.push_str(&format!("{key}: {}\n", value.render()));
        }
        text
    })
}

fn target() -> impl Strategy<Value = YamlPath> {
    prop_oneof![
        key().prop_map(|k| YamlPath::new([k])),
        (key(), key()).prop_map(|(a, b)| YamlPath::new([format!("{a}-section"), b])),
    ]
}

/// At most one patch per path, the shape a session save produces.
fn patches() -> impl Strategy<Value = Vec<Patch>> {
    let op = prop_oneof![
        3 => scalar().prop_map(|value| PatchOp::SetScalar { value }),
        1 => Just(PatchOp::Delete),
    ];
    prop::collection::btree_map(target(), op, 1..6)
        .prop_map(|ops| ops.into_iter().map(|(path, op)| Patch { path, op }).collect())
}

fn order() -> KeyOrderMap {
    KeyOrderMap::new().with("", ["host", "port", "tls", "auth-dir", "debug"])
}

proptest! {
    #[test]
    fn applying_twice_changes_nothing(text in document(), patches in patches()) {
        let once = apply_patches(&text, &patches, &order()).unwrap();
        let twice = apply_patches(&once.text, &patches, &order()).unwrap();
        prop_assert_eq!(&twice.text, &once.text);
    }

    #[test]
    fn empty_patch_list_is_identity(text in document()) {
        prop_assert_eq!(apply_patches(&text, &[], &order()).unwrap().text, text.clone());
        prop_assert_eq!(apply_template_patches(&text, &[]), text);
    }

    #[test]
    fn set_scalar_reads_back(text in document(), key in key(), value in scalar()) {
        let path = YamlPath::new([key]);
        let patch = Patch::set_scalar(path.clone(), value.clone());
        let out = apply_patches(&text, &[patch], &order()).unwrap();
        prop_assert_eq!(out.skipped(), 0);
        prop_assert_eq!(get_scalar(&out.text, &path), Some(value));
    }
}
