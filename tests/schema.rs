use yang_core::context::{Context, ContextFlags};
use yang_core::iter::{Ancestors, Siblings, Traverse};
use yang_core::schema::SchemaNodeKind;

static INTERFACES_MODULE: &str = r#"
module ietf-interfaces {
    namespace "urn:ietf:params:xml:ns:yang:ietf-interfaces";
    prefix if;

    container interfaces {
        description "Interface parameters.";

        list interface {
            key "name";

            leaf name {
                type string;
            }

            leaf description {
                type string;
            }

            leaf enabled {
                description "Whether the interface is enabled.";
                reference "RFC 7223.";
                type boolean;
                default "true";
            }

            container statistics {
                leaf in-octets {
                    type uint64;
                    config false;
                }

                leaf out-octets {
                    type uint64;
                    config false;
                }
            }
        }
    }
}
"#;

fn create_context() -> Context {
    let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
    ctx.compile_str(INTERFACES_MODULE).expect("failed to compile module");
    ctx
}

#[test]
fn schema_find_child() {
    let ctx = create_context();
    let module = ctx.get_module("ietf-interfaces", None).unwrap();

    let interfaces = module.find_child("interfaces").expect("interfaces container missing");
    let interface = interfaces.children.iter().find(|c| c.name.as_str() == "interface").expect("interface list missing");

    let child_names: Vec<&str> = interface.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(child_names, vec!["name", "description", "enabled", "statistics"]);
}

#[test]
fn schema_iterator_traverse() {
    let ctx = create_context();
    let module = ctx.get_module("ietf-interfaces", None).unwrap();
    let top = module.find_child("interfaces").unwrap().clone();

    let paths: Vec<String> = Traverse::new(top).map(|node| node.path()).collect();
    assert_eq!(
        paths,
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces/interface/name",
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface/statistics/in-octets",
            "/ietf-interfaces:interfaces/interface/statistics/out-octets",
        ]
    );
}

#[test]
fn schema_iterator_ancestors() {
    let ctx = create_context();
    let module = ctx.get_module("ietf-interfaces", None).unwrap();
    let interfaces = module.find_child("interfaces").unwrap().clone();

    let statistics = Traverse::new(interfaces).find(|n| n.name.as_str() == "statistics").unwrap();

    let ancestor_paths: Vec<String> = Ancestors::new(Some(statistics)).map(|n| n.path()).collect();
    assert_eq!(
        ancestor_paths,
        vec![
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces",
        ]
    );
}

#[test]
fn schema_iterator_siblings() {
    let ctx = create_context();
    let module = ctx.get_module("ietf-interfaces", None).unwrap();
    let interfaces = module.find_child("interfaces").unwrap().clone();

    let name_leaf = Traverse::new(interfaces).find(|n| n.name.as_str() == "name").unwrap();

    // `Siblings` starts at (and includes) the given node.
    let sibling_names: Vec<String> = Siblings::new(Some(name_leaf)).map(|n| n.name.as_str().to_string()).collect();
    assert_eq!(sibling_names, vec!["name", "description", "enabled", "statistics"]);
}

#[test]
fn schema_node_attributes() {
    let ctx = create_context();
    let module = ctx.get_module("ietf-interfaces", None).unwrap();
    let interfaces = module.find_child("interfaces").unwrap().clone();

    let enabled = Traverse::new(interfaces.clone()).find(|n| n.name.as_str() == "enabled").unwrap();
    assert!(enabled.description.is_some());
    assert!(enabled.reference.is_some());
    assert!(enabled.config);
    assert!(!enabled.mandatory);
    if let SchemaNodeKind::Leaf { default, .. } = &enabled.kind {
        assert_eq!(default.as_deref(), Some("true"));
    } else {
        panic!("expected a leaf");
    }

    let in_octets = Traverse::new(interfaces).find(|n| n.name.as_str() == "in-octets").unwrap();
    assert!(!in_octets.config);
}
