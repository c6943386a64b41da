use std::fs;
use std::io::Write;
use std::path::PathBuf;

use yang_core::context::{Context, ContextFlags};
use yang_core::schema::SchemaNodeKind;

fn tempdir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("yang-core-module-test-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_module(dir: &std::path::Path, filename: &str, name: &str) {
    let source = format!(
        r#"module {name} {{
            namespace "urn:{name}";
            prefix m;

            leaf marker {{
                type string;
            }}
        }}"#
    );
    let mut f = fs::File::create(dir.join(filename)).unwrap();
    f.write_all(source.as_bytes()).unwrap();
}

#[test]
fn loading_unpinned_revision_picks_the_latest() {
    let dir = tempdir("revision-selection");
    write_module(&dir, "mod@2020-01-01.yang", "mod");
    write_module(&dir, "mod@2021-06-01.yang", "mod");

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    let module = ctx.load_module("mod", None).unwrap();
    assert_eq!(module.revision.as_deref(), Some("2021-06-01"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn loading_the_same_module_twice_reuses_the_cached_schema() {
    let dir = tempdir("dedup");
    write_module(&dir, "mod.yang", "mod");

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    let first = ctx.load_module("mod", None).unwrap();
    let second = ctx.load_module("mod", None).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn free_source_on_compile_flag_drops_cached_source_text() {
    let mut ctx_keeps = Context::new(ContextFlags::empty());
    ctx_keeps
        .compile_str(r#"module kept { namespace "urn:kept"; prefix k; }"#)
        .unwrap();
    assert!(ctx_keeps.get_module("kept", None).is_some());

    let mut ctx_frees = Context::new(ContextFlags::FREE_SOURCE_ON_COMPILE);
    let schema = ctx_frees
        .compile_str(r#"module freed { namespace "urn:freed"; prefix f; }"#)
        .unwrap();
    // The compiled schema is unaffected by the flag; only the raw source
    // text backing it is dropped.
    assert_eq!(schema.name.as_str(), "freed");
}

#[test]
fn importing_a_module_resolves_it_through_the_search_path() {
    let dir = tempdir("imports");
    write_module(&dir, "base.yang", "base");

    let importer = r#"
        module importer {
            namespace "urn:importer";
            prefix i;

            import base {
                prefix b;
            }

            leaf ref {
                type string;
            }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    ctx.compile_str(importer).unwrap();
    assert!(ctx.get_module("base", None).is_some());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn uses_splices_grouping_children_without_a_wrapper_container() {
    let source = r#"
        module uses_example {
            namespace "urn:uses-example";
            prefix u;

            grouping common {
                leaf name {
                    type string;
                }
                leaf id {
                    type uint32;
                }
            }

            container top {
                uses common;

                leaf local {
                    type boolean;
                }
            }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    let module = ctx.compile_str(source).unwrap();
    let top = module.find_child("top").unwrap();
    // `name` and `id` land directly under `top`, as siblings of `local`,
    // not inside an extra `common`-named container.
    assert_eq!(top.children.len(), 3);
    assert!(top.children.iter().any(|c| c.name.as_str() == "name"));
    assert!(top.children.iter().any(|c| c.name.as_str() == "id"));
    assert!(top.children.iter().any(|c| c.name.as_str() == "local"));
    assert!(top.children.iter().all(|c| c.name.as_str() != "common"));
}

#[test]
fn uses_at_module_top_level_splices_into_module_children() {
    let source = r#"
        module uses_top_level {
            namespace "urn:uses-top-level";
            prefix u;

            grouping g {
                leaf a {
                    type string;
                }
                leaf b {
                    type string;
                }
            }

            uses g;
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    let module = ctx.compile_str(source).unwrap();
    assert_eq!(module.children.len(), 2);
    assert!(module.find_child("a").is_some());
    assert!(module.find_child("b").is_some());
    assert!(matches!(module.find_child("a").unwrap().kind, SchemaNodeKind::Leaf { .. }));
}

#[test]
fn duplicate_import_prefix_is_rejected() {
    let dir = tempdir("dup-import-prefix");
    write_module(&dir, "base.yang", "base");
    write_module(&dir, "other.yang", "other");

    let importer = r#"
        module dup_prefix {
            namespace "urn:dup-prefix";
            prefix d;

            import base { prefix b; }
            import other { prefix b; }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    let err = ctx.compile_str(importer).unwrap_err();
    assert_eq!(err.code, "import-duplicate-prefix");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_imported_module_under_different_prefixes_is_rejected() {
    let dir = tempdir("dup-import-module");
    write_module(&dir, "base.yang", "base");

    let importer = r#"
        module dup_module {
            namespace "urn:dup-module";
            prefix d;

            import base { prefix b1; }
            import base { prefix b2; }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    let err = ctx.compile_str(importer).unwrap_err();
    assert_eq!(err.code, "import-duplicate-module");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_typedef_name_is_rejected() {
    let source = r#"
        module dup_typedef {
            namespace "urn:dup-typedef";
            prefix d;

            typedef percent {
                type uint8;
            }
            typedef percent {
                type uint8;
            }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    let err = ctx.compile_str(source).unwrap_err();
    assert_eq!(err.code, "typedef-duplicate-name");
}

#[test]
fn duplicate_grouping_name_is_rejected() {
    let source = r#"
        module dup_grouping {
            namespace "urn:dup-grouping";
            prefix d;

            grouping common {
                leaf a {
                    type string;
                }
            }
            container nested {
                grouping common {
                    leaf b {
                        type string;
                    }
                }
            }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    let err = ctx.compile_str(source).unwrap_err();
    assert_eq!(err.code, "grouping-duplicate-name");
}

#[test]
fn cross_module_typedef_chain_resolves_through_the_imported_module() {
    let dir = tempdir("cross-module-typedef");
    let base = r#"
        module base_types {
            namespace "urn:base-types";
            prefix bt;

            typedef percent {
                type uint8 {
                    range "0..100";
                }
            }
        }
    "#;
    let mut f = fs::File::create(dir.join("base_types.yang")).unwrap();
    f.write_all(base.as_bytes()).unwrap();

    let importer = r#"
        module uses_base {
            namespace "urn:uses-base";
            prefix u;

            import base_types { prefix bt; }

            leaf completion {
                type bt:percent;
            }
        }
    "#;

    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.add_search_dir(&dir);
    let module = ctx.compile_str(importer).unwrap();
    let leaf = module.find_child("completion").unwrap();
    match &leaf.kind {
        SchemaNodeKind::Leaf { type_, .. } => {
            assert_eq!(type_.base, yang_core::types::BaseType::UInt8);
            let range = type_.range.as_ref().unwrap();
            assert!(range.contains(50));
            assert!(!range.contains(101));
        }
        other => panic!("expected a leaf, got {other:?}"),
    }

    let _ = fs::remove_dir_all(&dir);
}
