use std::fs;
use std::path::Path;

use clap::CommandFactory;

// cli.rs only needs clap + clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR not set by Cargo");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man output directory");

    // Top-level page plus one page per visible subcommand (`esmart-run.1`, ...).
    let root = cli::Cli::command();
    write_page(&root, &man_dir);
    for sub in root.get_subcommands().filter(|s| !s.is_hide_set()) {
        let named = sub.clone().name(format!("esmart-{}", sub.get_name()));
        write_page(&named, &man_dir);
    }
}

fn write_page(cmd: &clap::Command, dir: &Path) {
    let path = dir.join(format!("{}.1", cmd.get_name()));
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buf)
        .unwrap_or_else(|e| panic!("failed to render {}: {e}", path.display()));
    fs::write(&path, buf).unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}
