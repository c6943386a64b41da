use yang_core::context::{Context, ContextFlags};
use yang_core::iter::Traverse;
use yang_core::schema::SchemaNodeKind;

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-isis";

fn main() {
    let mut ctx = Context::new(ContextFlags::empty());
    ctx.add_search_dir(SEARCH_DIR);

    let module = ctx.load_module(MODULE_NAME, None).expect("failed to load module");

    println!("Data (DFS iteration):");
    for child in &module.children {
        for node in Traverse::new(child.clone()) {
            println!("  {}", node.path());
        }
    }

    println!("RPCs:");
    for node in module.children.iter().filter(|n| matches!(n.kind, SchemaNodeKind::Rpc)) {
        println!("  {}", node.path());
    }

    println!("Notifications:");
    for node in module.children.iter().filter(|n| matches!(n.kind, SchemaNodeKind::Notification)) {
        println!("  {}", node.path());
    }
}
