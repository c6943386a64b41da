use yang_core::context::{Context, ContextFlags};

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-isis";

fn main() {
    let mut ctx = Context::new(ContextFlags::empty());
    ctx.add_search_dir(SEARCH_DIR);

    let module = ctx.load_module(MODULE_NAME, None).expect("failed to load module");

    println!("Module '{}' imports:\n", module.name);
    for import in &module.imports {
        println!("  Import: {}", import.module);
        println!("    Prefix: {}", import.prefix);
        if let Some(revision) = &import.revision {
            println!("    Revision: {revision}");
        }
    }
}
