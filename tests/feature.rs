use yang_core::context::{Context, ContextFlags};
use yang_core::feature;

static POSTFIX_MODULE: &str = r#"
module postfix {
    namespace "urn:postfix";
    prefix p;

    feature a;
    feature b;
    feature c;

    leaf guarded {
        if-feature "a and (b or not c)";
        type string;
    }
}
"#;

static CASCADE_MODULE: &str = r#"
module cascade {
    namespace "urn:cascade";
    prefix c;

    feature x;

    feature y {
        if-feature "x";
    }

    feature z {
        if-feature "y";
    }
}
"#;

#[test]
fn if_feature_postfix_evaluates_boolean_semantics() {
    let mut ctx = Context::new(ContextFlags::empty());
    let module = ctx.compile_str(POSTFIX_MODULE).unwrap();

    feature::change(&module.features, "a", true).unwrap();
    feature::change(&module.features, "b", false).unwrap();
    feature::change(&module.features, "c", false).unwrap();

    let leaf = module.find_child("guarded").unwrap();
    assert!(leaf.if_features[0].evaluate());
}

#[test]
fn feature_change_cascades_disable_without_auto_enabling() {
    let mut ctx = Context::new(ContextFlags::empty());
    let module = ctx.compile_str(CASCADE_MODULE).unwrap();

    for name in ["x", "y", "z"] {
        assert!(module.feature(name).unwrap().enabled.get());
    }

    feature::change(&module.features, "x", false).unwrap();
    for name in ["x", "y", "z"] {
        assert!(!module.feature(name).unwrap().enabled.get(), "'{name}' should be disabled by cascade");
    }

    feature::change(&module.features, "x", true).unwrap();
    assert!(module.feature("x").unwrap().enabled.get());
    assert!(!module.feature("y").unwrap().enabled.get(), "re-enabling x must not auto-enable y");
    assert!(!module.feature("z").unwrap().enabled.get(), "re-enabling x must not auto-enable z");
}

#[test]
fn change_all_reenables_every_feature_with_no_conflicts() {
    let mut ctx = Context::new(ContextFlags::empty());
    let module = ctx.compile_str(CASCADE_MODULE).unwrap();

    feature::change(&module.features, "*", false).unwrap();
    for name in ["x", "y", "z"] {
        assert!(!module.feature(name).unwrap().enabled.get());
    }

    feature::change(&module.features, "*", true).unwrap();
    for name in ["x", "y", "z"] {
        assert!(module.feature(name).unwrap().enabled.get());
    }
}
