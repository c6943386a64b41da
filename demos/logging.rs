use log::LevelFilter;
use yang_core::context::{Context, ContextFlags};

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-isis";

fn main() {
    env_logger::Builder::new().filter_level(LevelFilter::max()).init();

    let mut ctx = Context::new(ContextFlags::empty());
    ctx.add_search_dir(SEARCH_DIR);

    // Every typedef aliasing/narrowing decision and feature cascade this
    // load triggers gets logged through the `log` crate.
    let _module = ctx.load_module(MODULE_NAME, None).unwrap();
}
